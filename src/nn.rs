use std::iter;

use faer::prelude::*;

use crate::{
    Activation,
    core::{ParamBuffer, ResultBuffer, forward, param_buffer},
    error::{Error, Result, check_shape},
};

#[derive(Debug, Clone)]
pub struct Topology {
    n_inputs: usize,
    layer_descriptions: Vec<LayerDescription>,
}

impl Topology {
    pub fn new(n_inputs: usize, layer_descriptions: Vec<LayerDescription>) -> Result<Self> {
        if n_inputs == 0 || layer_descriptions.is_empty() {
            return Err(Error::EmptyTopology);
        }
        if let Some(index) = layer_descriptions.iter().position(|l| l.n_neurons == 0) {
            return Err(Error::EmptyLayer { index });
        }
        Ok(Self {
            n_inputs,
            layer_descriptions,
        })
    }

    /// Topology with `layer_sizes[i]` neurons activated by `activations[i]` in layer `i`.
    pub fn from_sizes(
        n_inputs: usize,
        layer_sizes: &[usize],
        activations: &[Activation],
    ) -> Result<Self> {
        check_shape("activation functions", layer_sizes.len(), activations.len())?;
        let layer_descriptions = iter::zip(layer_sizes, activations)
            .map(|(&n_neurons, &phi)| LayerDescription::new(n_neurons, phi))
            .collect();
        Self::new(n_inputs, layer_descriptions)
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.layer_descriptions()
            .last()
            .map_or(self.n_inputs, |last_layer| last_layer.n_neurons)
    }

    pub fn layer_descriptions(&self) -> &[LayerDescription] {
        &self.layer_descriptions
    }

    pub fn n_layers(&self) -> usize {
        self.layer_descriptions().len()
    }

    /// Zero-initialized parameter and result buffers for this topology.
    pub fn build(&self) -> (ParamBuffer, ResultBuffer) {
        (ParamBuffer::create(self), ResultBuffer::create(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDescription {
    pub n_neurons: usize,
    pub phi: Activation,
}

impl LayerDescription {
    pub fn new(n_neurons: usize, phi: Activation) -> Self {
        Self { n_neurons, phi }
    }
}

#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    topology: Topology,
    params: ParamBuffer,
    results: ResultBuffer,
}

impl NeuralNetwork {
    pub fn new(topology: Topology) -> Self {
        let (params, results) = topology.build();
        Self {
            topology,
            params,
            results,
        }
    }

    /// Assembles a network from buffers built elsewhere, checking they match `topology`.
    pub fn from_raw_parts(
        topology: Topology,
        params: ParamBuffer,
        results: ResultBuffer,
    ) -> Result<Self> {
        check_shape("parameter inputs", topology.n_inputs(), params.n_inputs())?;
        check_shape("result inputs", topology.n_inputs(), results.input().len())?;
        check_shape("parameter layers", topology.n_layers(), params.n_layers())?;
        check_shape("result layers", topology.n_layers(), results.n_layers())?;
        let n_layers = topology.n_layers();
        let mut n_previous = topology.n_inputs();
        for (index, description) in topology.layer_descriptions().iter().enumerate() {
            let out_of_range = Error::LayerOutOfRange { index, n_layers };
            let layer_params = params.layer(index).ok_or(out_of_range.clone())?;
            let layer_results = results.layer(index).ok_or(out_of_range)?;
            let n = description.n_neurons;
            check_shape("parameter neurons", n, layer_params.n)?;
            check_shape("parameter weights per neuron", n_previous, layer_params.n_previous)?;
            check_shape("result neurons", n, layer_results.n)?;
            check_shape("result inputs per layer", n_previous, layer_results.n_previous)?;
            if layer_params.phi != description.phi {
                return Err(Error::ActivationMismatch {
                    index,
                    expected: description.phi,
                    actual: layer_params.phi,
                });
            }
            n_previous = n;
        }
        Ok(Self {
            topology,
            params,
            results,
        })
    }

    pub fn into_raw_parts(self) -> (ParamBuffer, ResultBuffer) {
        (self.params, self.results)
    }

    pub fn n_inputs(&self) -> usize {
        self.topology().n_inputs()
    }

    pub fn n_outputs(&self) -> usize {
        self.topology().n_outputs()
    }

    pub fn n_layers(&self) -> usize {
        self.topology().n_layers()
    }

    /// Full forward pass. The returned column is the output layer's activations.
    pub fn forward(&mut self, input: ColRef<f64>) -> Result<ColRef<'_, f64>> {
        let input: Vec<f64> = input.iter().copied().collect();
        forward(&input, &self.params, &mut self.results)?;
        Ok(self.results.output())
    }

    /// Full forward pass over a plain slice.
    pub fn predict(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        forward(input, &self.params, &mut self.results)?;
        Ok(self.results.output().iter().copied().collect())
    }

    /// Summed squared error of the network over `samples`.
    pub fn loss(&mut self, samples: &[(&[f64], &[f64])]) -> Result<f64> {
        let mut loss = 0.0f64;
        for (x, y) in samples {
            let a = self.predict(x)?;
            check_shape("observed output", a.len(), y.len())?;
            loss += iter::zip(&a, *y)
                .map(|(&ak, &yk)| (ak - yk).powi(2))
                .sum::<f64>();
        }
        Ok(loss)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn params(&self) -> &ParamBuffer {
        &self.params
    }

    /// The parameter layout is fixed; only values can be changed through this.
    pub fn params_mut(&mut self) -> &mut ParamBuffer {
        &mut self.params
    }

    pub fn results(&self) -> &ResultBuffer {
        &self.results
    }

    /// Parameters and results borrowed at the same time, for the trainer.
    pub(crate) fn buffers_mut(&mut self) -> (&mut ParamBuffer, &mut ResultBuffer) {
        (&mut self.params, &mut self.results)
    }

    pub fn randomize_weights(&mut self, low: f64, high: f64) -> Result<()> {
        self.params.randomize_weights(low, high)
    }

    pub fn layer(&self, index: usize) -> Result<param_buffer::LayerRef<'_>> {
        self.params.layer(index).ok_or(Error::LayerOutOfRange {
            index,
            n_layers: self.n_layers(),
        })
    }

    /// The layer feeding into layer `index`.
    pub fn previous_layer(&self, index: usize) -> Result<param_buffer::LayerRef<'_>> {
        self.layer(index)?;
        let previous = index
            .checked_sub(1)
            .ok_or(Error::NoPreviousLayer { index })?;
        self.layer(previous)
    }

    /// The layer layer `index` feeds into.
    pub fn next_layer(&self, index: usize) -> Result<param_buffer::LayerRef<'_>> {
        self.layer(index)?;
        if index + 1 == self.n_layers() {
            return Err(Error::NoNextLayer { index });
        }
        self.layer(index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(phi: Activation) -> NeuralNetwork {
        NeuralNetwork::new(
            Topology::from_sizes(3, &[4, 2], &[Activation::Tanh, phi]).unwrap(),
        )
    }

    #[test]
    fn topology_validation() {
        assert_eq!(Topology::new(0, vec![]).unwrap_err(), Error::EmptyTopology);
        assert_eq!(Topology::new(2, vec![]).unwrap_err(), Error::EmptyTopology);
        assert_eq!(
            Topology::from_sizes(2, &[3, 0], &[Activation::Unit; 2]).unwrap_err(),
            Error::EmptyLayer { index: 1 }
        );
        assert!(matches!(
            Topology::from_sizes(2, &[3, 1], &[Activation::Unit]),
            Err(Error::ShapeMismatch { .. })
        ));
        let topology = Topology::from_sizes(2, &[3, 1], &[Activation::Unit; 2]).unwrap();
        assert_eq!(topology.n_outputs(), 1);
        assert_eq!(topology.n_layers(), 2);
    }

    #[test]
    fn zero_weights_predict_zero() {
        let mut nn = NeuralNetwork::new(
            Topology::from_sizes(3, &[5, 4, 2], &[Activation::Unit; 3]).unwrap(),
        );
        for x in [[1.0, 2.0, 3.0], [-7.5, 0.0, 1e9]] {
            assert_eq!(nn.predict(&x).unwrap(), vec![0.0, 0.0]);
        }
    }

    #[test]
    fn predict_is_deterministic_and_shaped() {
        let mut nn = network(Activation::Sigmoid);
        nn.randomize_weights(-1.0, 1.0).unwrap();
        let x = [0.3, -0.2, 0.9];
        let first = nn.predict(&x).unwrap();
        let second = nn.predict(&x).unwrap();
        assert_eq!(first.len(), nn.n_outputs());
        assert_eq!(
            first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
        let col = nn.forward(ColRef::from_slice(&x)).unwrap();
        assert_eq!(col.nrows(), 2);
        assert_eq!(col[0].to_bits(), first[0].to_bits());
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let mut nn = network(Activation::Unit);
        assert_eq!(
            nn.predict(&[1.0]),
            Err(Error::InputLength {
                expected: 3,
                actual: 1,
            })
        );
    }

    #[test]
    fn infinite_outputs_are_not_clamped() {
        let topology = Topology::from_sizes(1, &[1], &[Activation::Unit]).unwrap();
        let params =
            ParamBuffer::from_nested(&topology, &[vec![vec![f64::MAX]]], &[vec![0.0]]).unwrap();
        let results = ResultBuffer::create(&topology);
        let mut nn = NeuralNetwork::from_raw_parts(topology, params, results).unwrap();
        assert_eq!(nn.predict(&[10.0]).unwrap(), vec![f64::INFINITY]);
        assert!(nn.predict(&[f64::NAN]).unwrap()[0].is_nan());
    }

    #[test]
    fn raw_parts_must_match_topology() {
        let small = Topology::from_sizes(3, &[2], &[Activation::Unit]).unwrap();
        let big = Topology::from_sizes(3, &[4], &[Activation::Unit]).unwrap();
        let (params, results) = small.build();
        assert!(matches!(
            NeuralNetwork::from_raw_parts(big, params, results),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn raw_parts_must_agree_on_inputs() {
        let two = Topology::from_sizes(2, &[1], &[Activation::Unit]).unwrap();
        let three = Topology::from_sizes(3, &[1], &[Activation::Unit]).unwrap();
        let (params, _) = two.build();
        let (_, results) = three.build();
        assert_eq!(
            NeuralNetwork::from_raw_parts(two, params, results).unwrap_err(),
            Error::ShapeMismatch {
                what: "result inputs",
                expected: 2,
                actual: 3,
            }
        );
    }

    #[test]
    fn raw_parts_must_agree_on_activations() {
        let tanh = Topology::from_sizes(2, &[3, 1], &[Activation::Tanh; 2]).unwrap();
        let relu =
            Topology::from_sizes(2, &[3, 1], &[Activation::Tanh, Activation::ReLU]).unwrap();
        let (params, results) = relu.build();
        assert_eq!(
            NeuralNetwork::from_raw_parts(tanh, params, results).unwrap_err(),
            Error::ActivationMismatch {
                index: 1,
                expected: Activation::Tanh,
                actual: Activation::ReLU,
            }
        );
    }

    #[test]
    fn neighbouring_layers() {
        let nn = NeuralNetwork::new(
            Topology::from_sizes(2, &[3, 4, 1], &[Activation::ReLU; 3]).unwrap(),
        );
        assert_eq!(nn.next_layer(0).unwrap().n, 4);
        assert_eq!(nn.previous_layer(2).unwrap().n, 4);
        assert_eq!(nn.previous_layer(1).unwrap().index, 0);
        assert_eq!(
            nn.previous_layer(0).unwrap_err(),
            Error::NoPreviousLayer { index: 0 }
        );
        assert_eq!(nn.next_layer(2).unwrap_err(), Error::NoNextLayer { index: 2 });
        assert_eq!(
            nn.next_layer(3).unwrap_err(),
            Error::LayerOutOfRange {
                index: 3,
                n_layers: 3,
            }
        );
    }

    #[test]
    fn loss_sums_squared_errors() {
        let topology = Topology::from_sizes(1, &[1], &[Activation::Unit]).unwrap();
        let params =
            ParamBuffer::from_nested(&topology, &[vec![vec![2.0]]], &[vec![1.0]]).unwrap();
        let results = ResultBuffer::create(&topology);
        let mut nn = NeuralNetwork::from_raw_parts(topology, params, results).unwrap();
        // Predictions are 1 and 3.
        let loss = nn.loss(&[(&[0.0], &[0.0]), (&[1.0], &[1.0])]).unwrap();
        assert_eq!(loss, 1.0 + 4.0);
    }
}
