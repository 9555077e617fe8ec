use thiserror::Error;

use crate::Activation;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An input vector does not match the width a node or layer expects.
    #[error("expected an input of length {expected}, got {actual}")]
    InputLength { expected: usize, actual: usize },

    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cannot train on an empty batch")]
    EmptyBatch,

    #[error("a topology needs at least one input and one layer")]
    EmptyTopology,

    #[error("layer {index} has no neurons")]
    EmptyLayer { index: usize },

    #[error("layer {index} is the first layer and has no previous layer")]
    NoPreviousLayer { index: usize },

    #[error("layer {index} is the output layer and has no next layer")]
    NoNextLayer { index: usize },

    #[error("layer index {index} is out of range for a network of {n_layers} layers")]
    LayerOutOfRange { index: usize, n_layers: usize },

    #[error("invalid randomization range [{low}, {high}]")]
    InvalidRange { low: f64, high: f64 },

    #[error("layer {index} uses {actual}, expected {expected}")]
    ActivationMismatch {
        index: usize,
        expected: Activation,
        actual: Activation,
    },

    /// The gradient clip bound must be a non-negative number.
    #[error("invalid gradient clip bound {clip}")]
    InvalidClip { clip: f64 },
}

/// Returns `Error::ShapeMismatch` unless `expected == actual`.
pub(crate) fn check_shape(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}
