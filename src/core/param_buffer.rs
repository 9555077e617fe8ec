use std::iter;

use faer::prelude::*;
use rand::{Rng, distr::Uniform, rngs::ThreadRng};
use tracing::debug;

use crate::{
    Activation, PrettyPrintParams, Topology,
    error::{Error, Result, check_shape},
};

/// Where a layer lives inside the flat parameter buffer.
///
/// Weights come first (row-major, one row per neuron), followed by biases.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LayerLayout {
    pub(crate) n: usize,
    pub(crate) n_previous: usize,
    pub(crate) offset: usize,
    pub(crate) phi: Activation,
}

impl LayerLayout {
    pub(crate) fn n_params(&self) -> usize {
        self.n * self.n_previous + self.n
    }

    pub(crate) fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.n_params()
    }

    /// Computes the layout of every layer of `topology`, and the total number of floats.
    pub(crate) fn of_topology(topology: &Topology) -> (Box<[LayerLayout]>, usize) {
        let mut n_previous = topology.n_inputs();
        let mut counter = 0usize;
        let layouts = topology
            .layer_descriptions()
            .iter()
            .map(|layer_description| {
                let layout = LayerLayout {
                    n: layer_description.n_neurons,
                    n_previous,
                    offset: counter,
                    phi: layer_description.phi,
                };
                counter += layout.n_params();
                n_previous = layout.n;
                layout
            })
            .collect();
        (layouts, counter)
    }
}

/// Output of a single neuron.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeOutput {
    /// Pre-activation sum.
    pub sum: f64,
    pub output: f64,
}

/// View of a single neuron: one row of its layer's weight matrix plus its bias.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    pub weights: &'a [f64],
    pub bias: f64,
    pub phi: Activation,
}

impl Node<'_> {
    pub fn process_inputs(&self, inputs: &[f64]) -> Result<NodeOutput> {
        if inputs.len() != self.weights.len() {
            return Err(Error::InputLength {
                expected: self.weights.len(),
                actual: inputs.len(),
            });
        }
        let sum = iter::zip(inputs, self.weights)
            .map(|(&x, &w)| x * w)
            .sum::<f64>()
            + self.bias;
        Ok(NodeOutput {
            sum,
            output: self.phi.apply(sum),
        })
    }
}

/// Immutable view of a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    pub index: usize,
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    pub phi: Activation,
    weights: &'a [f64],
    biases: &'a [f64],
}

impl<'a> LayerRef<'a> {
    pub fn w(&self) -> MatRef<'a, f64> {
        MatRef::from_row_major_slice(self.weights, self.n, self.n_previous)
    }

    pub fn b(&self) -> ColRef<'a, f64> {
        ColRef::from_slice(self.biases)
    }

    pub fn node(&self, k: usize) -> Option<Node<'a>> {
        if k >= self.n {
            return None;
        }
        let start = k * self.n_previous;
        Some(Node {
            weights: &self.weights[start..start + self.n_previous],
            bias: self.biases[k],
            phi: self.phi,
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node<'a>> + use<'a> {
        let LayerRef {
            phi,
            weights,
            biases,
            n_previous,
            ..
        } = *self;
        iter::zip(weights.chunks_exact(n_previous), biases).map(
            move |(weights, &bias)| Node { weights, bias, phi },
        )
    }

    /// Runs every neuron over `inputs`, writing pre-activation sums into `z` and outputs into
    /// `a`.
    pub fn forward(&self, inputs: &[f64], z: &mut [f64], a: &mut [f64]) -> Result<()> {
        check_shape("layer sums", self.n, z.len())?;
        check_shape("layer outputs", self.n, a.len())?;
        for (node, (zk, ak)) in iter::zip(self.nodes(), iter::zip(z, a)) {
            let NodeOutput { sum, output } = node.process_inputs(inputs)?;
            *zk = sum;
            *ak = output;
        }
        Ok(())
    }
}

/// Mutable view of a layer.
#[derive(Debug)]
pub struct LayerMut<'a> {
    pub index: usize,
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    pub phi: Activation,
    weights: &'a mut [f64],
    biases: &'a mut [f64],
}

impl LayerMut<'_> {
    /// Weights of neuron `k`.
    pub fn node_weights_mut(&mut self, k: usize) -> Option<&mut [f64]> {
        let start = k.checked_mul(self.n_previous)?;
        self.weights.get_mut(start..start + self.n_previous)
    }

    pub fn bias_mut(&mut self, k: usize) -> Option<&mut f64> {
        self.biases.get_mut(k)
    }
}

/// Buffer owning the weights and biases of every layer.
#[derive(Debug, Clone)]
pub struct ParamBuffer {
    n_inputs: usize,
    layers: Box<[LayerLayout]>,
    buffer: Box<[f64]>,
}

impl ParamBuffer {
    /// Zero-initialized parameters for `topology`.
    pub fn create(topology: &Topology) -> Self {
        let (layers, n_floats) = LayerLayout::of_topology(topology);
        debug!(n_floats, n_layers = layers.len(), "created parameter buffer");
        let buffer: Box<[f64]> = bytemuck::zeroed_slice_box(n_floats);
        Self {
            n_inputs: topology.n_inputs(),
            layers,
            buffer,
        }
    }

    /// Parameters for `topology` from nested `weights[layer][neuron][input]` and
    /// `biases[layer][neuron]`.
    pub fn from_nested(
        topology: &Topology,
        weights: &[Vec<Vec<f64>>],
        biases: &[Vec<f64>],
    ) -> Result<Self> {
        let mut params = Self::create(topology);
        check_shape("weight layers", params.n_layers(), weights.len())?;
        check_shape("bias layers", params.n_layers(), biases.len())?;
        let n_layers = params.n_layers();
        for (u, (layer_w, layer_b)) in iter::zip(weights, biases).enumerate() {
            let mut layer = params
                .layer_mut(u)
                .ok_or(Error::LayerOutOfRange { index: u, n_layers })?;
            check_shape("weight rows", layer.n, layer_w.len())?;
            check_shape("biases", layer.n, layer_b.len())?;
            for (k, (row, &bias)) in iter::zip(layer_w, layer_b).enumerate() {
                check_shape("weight columns", layer.n_previous, row.len())?;
                if let Some(node_weights) = layer.node_weights_mut(k) {
                    node_weights.copy_from_slice(row);
                }
                if let Some(b) = layer.bias_mut(k) {
                    *b = bias;
                }
            }
        }
        Ok(params)
    }

    /// Inverse of `from_nested`.
    pub fn to_nested(&self) -> (Vec<Vec<Vec<f64>>>, Vec<Vec<f64>>) {
        self.layers()
            .map(|layer| {
                let weights: Vec<Vec<f64>> =
                    layer.nodes().map(|node| node.weights.to_vec()).collect();
                (weights, layer.biases.to_vec())
            })
            .unzip()
    }

    /// Fills every weight uniformly in `[low, high]`. Biases are left untouched.
    pub fn randomize_weights(&mut self, low: f64, high: f64) -> Result<()> {
        self.randomize_weights_with(&mut ThreadRng::default(), low, high)
    }

    pub fn randomize_weights_with(
        &mut self,
        rng: &mut impl Rng,
        low: f64,
        high: f64,
    ) -> Result<()> {
        let distr = Uniform::<f64>::new_inclusive(low, high)
            .map_err(|_| Error::InvalidRange { low, high })?;
        for layout in &self.layers {
            let n_weights = layout.n * layout.n_previous;
            for w in &mut self.buffer[layout.offset..layout.offset + n_weights] {
                *w = rng.sample(&distr);
            }
        }
        Ok(())
    }

    pub fn pretty_print_layer(&self, index: usize) -> Option<PrettyPrintParams<'_>> {
        let layer = self.layer(index)?;
        Some(PrettyPrintParams::new(layer))
    }

    /// Direct access to the underlying buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.buffer
    }

    /// Direct access to the underlying buffer.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.buffer
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Number of layers in the neural network.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    fn make_ref(&self, index: usize, layout: LayerLayout) -> LayerRef<'_> {
        let (weights, biases) = self.buffer[layout.range()].split_at(layout.n * layout.n_previous);
        LayerRef {
            index,
            n: layout.n,
            n_previous: layout.n_previous,
            phi: layout.phi,
            weights,
            biases,
        }
    }

    /// Get a immutable view of a layer.
    /// Returns `None` if `index` is out of range.
    pub fn layer(&self, index: usize) -> Option<LayerRef<'_>> {
        let layout = *self.layers.get(index)?;
        Some(self.make_ref(index, layout))
    }

    /// Get a mutable view of a layer.
    /// Returns `None` if `index` is out of range.
    pub fn layer_mut(&mut self, index: usize) -> Option<LayerMut<'_>> {
        let layout = *self.layers.get(index)?;
        let (weights, biases) =
            self.buffer[layout.range()].split_at_mut(layout.n * layout.n_previous);
        Some(LayerMut {
            index,
            n: layout.n,
            n_previous: layout.n_previous,
            phi: layout.phi,
            weights,
            biases,
        })
    }

    pub fn layers(&self) -> impl DoubleEndedIterator<Item = LayerRef<'_>> + ExactSizeIterator {
        self.layers
            .iter()
            .enumerate()
            .map(|(index, &layout)| self.make_ref(index, layout))
    }

    pub fn output_layer(&self) -> LayerRef<'_> {
        // A topology always has at least one layer.
        let index = self.n_layers() - 1;
        self.make_ref(index, self.layers[index])
    }
}
