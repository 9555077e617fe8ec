use faer::prelude::*;
use tracing::debug;

use crate::Topology;

#[derive(Debug, Clone, Copy)]
struct LayerLayout {
    n: usize,
    n_previous: usize,
    /// Offset of `z`, `a` follows right after.
    offset: usize,
}

/// Immutable view of a layer's results.
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    /// Inputs this layer saw in the last forward pass.
    pub inputs: &'a [f64],
    /// Pre-activation sums.
    pub z: &'a [f64],
    /// Outputs.
    pub a: &'a [f64],
}

/// Mutable view of a layer's results, alongside its (immutable) inputs.
#[derive(Debug)]
pub struct LayerMut<'a> {
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    pub inputs: &'a [f64],
    pub z: &'a mut [f64],
    pub a: &'a mut [f64],
}

/// Buffer for storing the network input and the activation results of every layer.
///
/// The input of layer `u` is `a` of layer `u - 1`, or the network input for `u == 0`, so they
/// are laid out contiguously: `x | z_0 a_0 | z_1 a_1 | ...`.
#[derive(Debug, Clone)]
pub struct ResultBuffer {
    n_inputs: usize,
    layers: Box<[LayerLayout]>,
    buffer: Box<[f64]>,
}

impl ResultBuffer {
    pub fn create(topology: &Topology) -> Self {
        let mut n_previous = topology.n_inputs();
        let mut counter = topology.n_inputs();
        let layers: Box<[LayerLayout]> = topology
            .layer_descriptions()
            .iter()
            .map(|layer_description| {
                let n = layer_description.n_neurons;
                let layout = LayerLayout {
                    n,
                    n_previous,
                    offset: counter,
                };
                counter += 2 * n;
                n_previous = n;
                layout
            })
            .collect();
        debug!(n_floats = counter, "created result buffer");
        Self {
            n_inputs: topology.n_inputs(),
            layers,
            buffer: bytemuck::zeroed_slice_box(counter),
        }
    }

    /// Number of layers in the neural network.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input(&self) -> &[f64] {
        &self.buffer[..self.n_inputs]
    }

    pub(crate) fn input_mut(&mut self) -> &mut [f64] {
        &mut self.buffer[..self.n_inputs]
    }

    /// Get a immutable view of a layer.
    /// Returns `None` if `index` is out of range.
    pub fn layer(&self, index: usize) -> Option<LayerRef<'_>> {
        let LayerLayout {
            n,
            n_previous,
            offset,
        } = *self.layers.get(index)?;
        Some(LayerRef {
            n,
            n_previous,
            inputs: &self.buffer[offset - n_previous..offset],
            z: &self.buffer[offset..offset + n],
            a: &self.buffer[offset + n..offset + 2 * n],
        })
    }

    /// Get a mutable view of a layer.
    /// Returns `None` if `index` is out of range.
    pub fn layer_mut(&mut self, index: usize) -> Option<LayerMut<'_>> {
        let LayerLayout {
            n,
            n_previous,
            offset,
        } = *self.layers.get(index)?;
        let (head, tail) = self.buffer.split_at_mut(offset);
        let (z, tail) = tail.split_at_mut(n);
        Some(LayerMut {
            n,
            n_previous,
            inputs: &head[offset - n_previous..],
            z,
            a: &mut tail[..n],
        })
    }

    /// Output of the last layer.
    pub fn output(&self) -> ColRef<'_, f64> {
        let a = match self.layers.last() {
            Some(&LayerLayout { n, offset, .. }) => &self.buffer[offset + n..offset + 2 * n],
            None => self.input(),
        };
        ColRef::from_slice(a)
    }
}
