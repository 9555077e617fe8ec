use std::iter;

use faer::{linalg::matmul::matmul, prelude::*};
use tracing::trace;

use crate::{
    core::{DerivBuffer, ParamBuffer, ResultBuffer},
    error::{Error, Result, check_shape},
};

/// Back-propagates one sample whose forward pass is cached in `result_buffer`.
///
/// Computes every neuron's error for this sample (output layer first, then each hidden layer in
/// decreasing order) and adds the sample's gradient into the accumulator of `deriv_buffer`.
///
/// `d_loss` is dl_i/da of the output layer.
pub fn propagate_backwards(
    param_buffer: &ParamBuffer,
    result_buffer: &ResultBuffer,
    deriv_buffer: &mut DerivBuffer,
    d_loss: ColRef<f64>,
) -> Result<()> {
    let n_layers = param_buffer.n_layers();
    check_shape("result layers", n_layers, result_buffer.n_layers())?;
    check_shape("deriv layers", n_layers, deriv_buffer.n_layers())?;
    check_shape("loss derivative", param_buffer.output_layer().n, d_loss.nrows())?;
    let out_of_range = |index| Error::LayerOutOfRange { index, n_layers };
    for layer_params in param_buffer.layers().rev() {
        let u = layer_params.index;
        let layer_results = result_buffer.layer(u).ok_or(out_of_range(u))?;
        let (layer_derivs, e_next) = deriv_buffer
            .layer_mut_with_next_errors(u)
            .ok_or(out_of_range(u))?;
        match e_next {
            // Output layer.
            None => {
                for (e, &dl) in iter::zip(layer_derivs.e.iter_mut(), d_loss.iter()) {
                    *e = dl;
                }
            }
            // Errors of the next layer were already computed in this pass.
            Some(e_next) => {
                let next_params = param_buffer.layer(u + 1).ok_or(out_of_range(u + 1))?;
                let next_results = result_buffer.layer(u + 1).ok_or(out_of_range(u + 1))?;
                // Chain factor of each next-layer neuron times its error.
                let delta_next = Col::from_fn(next_params.n, |k| {
                    next_params.phi.deriv(next_results.z[k]) * e_next[k]
                });
                // e = W_nextᵀ * delta_next
                matmul(
                    ColMut::from_slice_mut(&mut layer_derivs.e[..]),
                    faer::Accum::Replace,
                    next_params.w().transpose(),
                    delta_next.as_ref(),
                    1.0,
                    Par::Seq,
                );
            }
        }
        let phi = layer_params.phi;
        let n_previous = layer_params.n_previous;
        for (k, (&e, &z)) in iter::zip(layer_derivs.e.iter(), layer_results.z).enumerate() {
            let phi_deriv_z = phi.deriv(z);
            layer_derivs.db[k] += e * phi_deriv_z;
            let dw_k = &mut layer_derivs.dw[k * n_previous..(k + 1) * n_previous];
            for (g, dw) in dw_k.iter_mut().enumerate() {
                let input = layer_results.inputs.get(g).copied().unwrap_or(0.0);
                *dw += e * phi_deriv_z * input;
            }
        }
    }
    Ok(())
}

/// Applies the gradients accumulated over `divisor` samples.
///
/// Each gradient is clipped to `[-clip, clip]`; a NaN gradient leaves its parameter untouched.
/// Returns the number of skipped (NaN) gradients.
pub fn update_weights_and_biases(
    param_buffer: &mut ParamBuffer,
    deriv_buffer: &DerivBuffer,
    eta: f64,
    clip: f64,
    divisor: f64,
) -> Result<usize> {
    if clip.is_nan() || clip < 0.0 {
        return Err(Error::InvalidClip { clip });
    }
    // Params buffer and deriv buffer have the same layout for the weights and biases.
    let params = param_buffer.as_mut_slice();
    let grads = deriv_buffer.params();
    check_shape("gradients", params.len(), grads.len())?;
    let mut n_skipped = 0usize;
    for (p, &g) in iter::zip(params, grads) {
        if g.is_nan() {
            n_skipped += 1;
            continue;
        }
        *p -= g.clamp(-clip, clip) * eta / divisor;
    }
    trace!(n_skipped, "applied gradients");
    Ok(n_skipped)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{Activation, LayerDescription, Topology, core::forward};

    /// 1 -> 2 (tanh) -> 1 (sigmoid), with hand-picked parameters.
    fn setup() -> (Topology, ParamBuffer) {
        let topology = Topology::new(
            1,
            vec![
                LayerDescription::new(2, Activation::Tanh),
                LayerDescription::new(1, Activation::Sigmoid),
            ],
        )
        .unwrap();
        let params = ParamBuffer::from_nested(
            &topology,
            &[vec![vec![0.5], vec![-0.3]], vec![vec![0.8, -1.2]]],
            &[vec![0.1, 0.2], vec![-0.05]],
        )
        .unwrap();
        (topology, params)
    }

    fn half_squared_error(params: &ParamBuffer, topology: &Topology, x: f64, y: f64) -> f64 {
        let mut results = ResultBuffer::create(topology);
        forward(&[x], params, &mut results).unwrap();
        0.5 * (results.output()[0] - y).powi(2)
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let (topology, params) = setup();
        let (x, y) = (0.7, 0.2);
        let mut results = ResultBuffer::create(&topology);
        let mut derivs = DerivBuffer::create(&topology);
        forward(&[x], &params, &mut results).unwrap();
        // d(0.5 (a - y)^2)/da
        let d_loss = [results.output()[0] - y];
        propagate_backwards(&params, &results, &mut derivs, ColRef::from_slice(&d_loss)).unwrap();

        let h = 1e-6;
        for i in 0..params.as_slice().len() {
            let mut plus = params.clone();
            plus.as_mut_slice()[i] += h;
            let mut minus = params.clone();
            minus.as_mut_slice()[i] -= h;
            let numeric = (half_squared_error(&plus, &topology, x, y)
                - half_squared_error(&minus, &topology, x, y))
                / (2.0 * h);
            assert_relative_eq!(derivs.params()[i], numeric, epsilon = 1e-8);
        }
    }

    #[test]
    fn hidden_errors_flow_through_transposed_weights() {
        let (topology, params) = setup();
        let mut results = ResultBuffer::create(&topology);
        let mut derivs = DerivBuffer::create(&topology);
        forward(&[1.0], &params, &mut results).unwrap();
        propagate_backwards(&params, &results, &mut derivs, ColRef::from_slice(&[1.0])).unwrap();
        let z_out = results.layer(1).unwrap().z[0];
        let chain = Activation::Sigmoid.deriv(z_out);
        let hidden = derivs.layer(0).unwrap();
        assert_relative_eq!(hidden.e[0], chain * 0.8);
        assert_relative_eq!(hidden.e[1], chain * -1.2);
        assert_eq!(derivs.layer(1).unwrap().e, [1.0]);
    }

    #[test]
    fn gradients_accumulate_across_samples() {
        let (topology, params) = setup();
        let mut results = ResultBuffer::create(&topology);
        let mut derivs = DerivBuffer::create(&topology);
        forward(&[0.3], &params, &mut results).unwrap();
        propagate_backwards(&params, &results, &mut derivs, ColRef::from_slice(&[0.5])).unwrap();
        let once = derivs.params().to_vec();
        propagate_backwards(&params, &results, &mut derivs, ColRef::from_slice(&[0.5])).unwrap();
        for (&twice, once) in iter::zip(derivs.params(), once) {
            assert_relative_eq!(twice, 2.0 * once);
        }
        derivs.clear_params();
        assert!(derivs.params().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn rejects_wrong_loss_width() {
        let (topology, params) = setup();
        let results = ResultBuffer::create(&topology);
        let mut derivs = DerivBuffer::create(&topology);
        let d_loss = ColRef::from_slice(&[1.0, 2.0]);
        let err = propagate_backwards(&params, &results, &mut derivs, d_loss).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn update_clips_and_skips_nan() {
        let topology =
            Topology::new(2, vec![LayerDescription::new(1, Activation::Unit)]).unwrap();
        let mut params = ParamBuffer::create(&topology);
        let mut derivs = DerivBuffer::create(&topology);
        derivs
            .params_mut()
            .copy_from_slice(&[-116.0, f64::NAN, 0.5]);
        let n_skipped = update_weights_and_biases(&mut params, &derivs, 0.1, 1.0, 2.0).unwrap();
        assert_eq!(n_skipped, 1);
        assert_relative_eq!(params.as_slice()[0], 0.05);
        assert_eq!(params.as_slice()[1], 0.0);
        assert_relative_eq!(params.as_slice()[2], -0.025);

        for clip in [-0.5, f64::NAN] {
            assert!(matches!(
                update_weights_and_biases(&mut params, &derivs, 0.1, clip, 2.0),
                Err(Error::InvalidClip { .. })
            ));
        }
        assert_relative_eq!(params.as_slice()[0], 0.05);
    }
}
