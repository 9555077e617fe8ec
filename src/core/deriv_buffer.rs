use crate::{PrettyPrintDerivs, Topology, core::param_buffer::LayerLayout};

/// Immutable view of a layer.
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    pub index: usize,
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    /// dL/dW summed over the samples of the current epoch, row-major.
    pub dw: &'a [f64],
    /// dL/db summed over the samples of the current epoch.
    pub db: &'a [f64],
    /// dl_i/da for the sample currently being back-propagated.
    /// Overwritten per sample, unlike `dw` and `db`.
    pub e: &'a [f64],
}

/// Mutable view of a layer.
#[derive(Debug)]
pub struct LayerMut<'a> {
    pub index: usize,
    /// Number of neurons in this layer.
    pub n: usize,
    /// Number of neurons in the previous layer.
    pub n_previous: usize,
    pub dw: &'a mut [f64],
    pub db: &'a mut [f64],
    pub e: &'a mut [f64],
}

/// Gradient accumulator and per-sample neuron error cache.
///
/// The `dw`/`db` section has exactly the layout of `ParamBuffer`, so the two can be zipped
/// element-wise when applying the update.
#[derive(Debug, Clone)]
pub struct DerivBuffer {
    layers: Box<[LayerLayout]>,
    /// Offset of each layer's error cache in `buffer`.
    e_offsets: Box<[usize]>,
    e_start: usize,
    buffer: Box<[f64]>,
}

impl DerivBuffer {
    pub fn create(topology: &Topology) -> Self {
        let (layers, e_start) = LayerLayout::of_topology(topology);
        let mut counter = e_start;
        let e_offsets = layers
            .iter()
            .map(|layout| {
                let offset = counter;
                counter += layout.n;
                offset
            })
            .collect();
        Self {
            layers,
            e_offsets,
            e_start,
            buffer: bytemuck::zeroed_slice_box(counter),
        }
    }

    /// Zero all the `dw` and `db`s.
    pub(crate) fn clear_params(&mut self) {
        bytemuck::fill_zeroes(self.params_mut());
    }

    /// Number of layers in the neural network.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn pretty_print_layer(&self, index: usize) -> Option<PrettyPrintDerivs<'_>> {
        let layer = self.layer(index)?;
        Some(PrettyPrintDerivs::new(layer))
    }

    /// The accumulated gradient section (`dw` and `db`s) of the buffer.
    pub fn params(&self) -> &[f64] {
        &self.buffer[..self.e_start]
    }

    pub(crate) fn params_mut(&mut self) -> &mut [f64] {
        &mut self.buffer[..self.e_start]
    }

    /// Get a immutable view of a layer.
    /// Returns `None` if `index` is out of range.
    pub fn layer(&self, index: usize) -> Option<LayerRef<'_>> {
        let layout = *self.layers.get(index)?;
        let (dw, db) = self.buffer[layout.range()].split_at(layout.n * layout.n_previous);
        let e_offset = self.e_offsets[index];
        Some(LayerRef {
            index,
            n: layout.n,
            n_previous: layout.n_previous,
            dw,
            db,
            e: &self.buffer[e_offset..e_offset + layout.n],
        })
    }

    /// Get a mutable view of a layer, together with the error cache of the layer after it (if
    /// any).
    /// Returns `None` if `index` is out of range.
    pub fn layer_mut_with_next_errors(
        &mut self,
        index: usize,
    ) -> Option<(LayerMut<'_>, Option<&[f64]>)> {
        let layout = *self.layers.get(index)?;
        let e_offset = self.e_offsets[index];
        let (params, errors) = self.buffer.split_at_mut(self.e_start);
        let (dw, db) = params[layout.range()].split_at_mut(layout.n * layout.n_previous);
        let (e, e_rest) = errors[e_offset - self.e_start..].split_at_mut(layout.n);
        let e_rest: &[f64] = e_rest;
        let e_next = self.layers.get(index + 1).map(move |next| &e_rest[..next.n]);
        Some((
            LayerMut {
                index,
                n: layout.n,
                n_previous: layout.n_previous,
                dw,
                db,
                e,
            },
            e_next,
        ))
    }
}
