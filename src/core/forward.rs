use crate::{
    core::{ParamBuffer, ResultBuffer},
    error::{Error, Result, check_shape},
};

/// Runs `input` through every layer, caching each layer's inputs, sums and outputs in
/// `result_buffer`.
///
/// `param_buffer` and `result_buffer` must be created from the same topology.
pub fn forward(
    input: &[f64],
    param_buffer: &ParamBuffer,
    result_buffer: &mut ResultBuffer,
) -> Result<()> {
    if input.len() != param_buffer.n_inputs() {
        return Err(Error::InputLength {
            expected: param_buffer.n_inputs(),
            actual: input.len(),
        });
    }
    check_shape("result layers", param_buffer.n_layers(), result_buffer.n_layers())?;
    result_buffer.input_mut().copy_from_slice(input);
    for layer_params in param_buffer.layers() {
        let n_layers = param_buffer.n_layers();
        let layer_results =
            result_buffer
                .layer_mut(layer_params.index)
                .ok_or(Error::LayerOutOfRange {
                    index: layer_params.index,
                    n_layers,
                })?;
        layer_params.forward(layer_results.inputs, layer_results.z, layer_results.a)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, LayerDescription, Topology};

    #[test]
    fn outputs_chain_into_next_layer() {
        let topology = Topology::new(
            2,
            vec![
                LayerDescription::new(2, Activation::ReLU),
                LayerDescription::new(1, Activation::Unit),
            ],
        )
        .unwrap();
        let params = ParamBuffer::from_nested(
            &topology,
            &[
                vec![vec![1.0, -1.0], vec![-1.0, 1.0]],
                vec![vec![2.0, 3.0]],
            ],
            &[vec![0.0, 0.5], vec![-1.0]],
        )
        .unwrap();
        let mut results = ResultBuffer::create(&topology);
        forward(&[3.0, 1.0], &params, &mut results).unwrap();
        let hidden = results.layer(0).unwrap();
        assert_eq!(hidden.inputs, [3.0, 1.0]);
        assert_eq!(hidden.z, [2.0, -1.5]);
        assert_eq!(hidden.a, [2.0, 0.0]);
        let output = results.layer(1).unwrap();
        assert_eq!(output.inputs, [2.0, 0.0]);
        assert_eq!(output.z, [3.0]);
        assert_eq!(results.output()[0], 3.0);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let topology =
            Topology::new(3, vec![LayerDescription::new(1, Activation::Unit)]).unwrap();
        let params = ParamBuffer::create(&topology);
        let mut results = ResultBuffer::create(&topology);
        assert_eq!(
            forward(&[1.0, 2.0], &params, &mut results),
            Err(Error::InputLength {
                expected: 3,
                actual: 2,
            })
        );
    }
}
