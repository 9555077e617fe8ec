pub use faer;

mod activation;
pub mod core;
mod error;
mod loss;
mod nn;
mod pretty_print;
mod trainer;

pub use activation::*;
pub use crate::core::{DerivBuffer, ParamBuffer, ResultBuffer};
pub use error::*;
pub use loss::*;
pub use nn::*;
pub use pretty_print::*;
pub use trainer::*;
