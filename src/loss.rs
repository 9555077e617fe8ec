use std::fmt::{self, Debug};

use faer::prelude::*;

use crate::error::{Result, check_shape};

/// A loss function applied per output dimension.
pub trait LossFunction: Send + Sync + 'static {
    const NAME: &'static str;

    /// Loss of one output dimension.
    fn loss(predicted: f64, observed: f64) -> f64;

    /// Partial derivative of `loss` with respect to `predicted`.
    fn deriv(predicted: f64, observed: f64) -> f64;
}

/// Type-erased `LossFunction`, held by the trainer.
#[derive(Clone, Copy)]
pub struct DynLossFunction {
    name: &'static str,
    loss: fn(f64, f64) -> f64,
    deriv: fn(f64, f64) -> f64,
}

impl Debug for DynLossFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self.name, f)
    }
}

impl Default for DynLossFunction {
    fn default() -> Self {
        Self::new(loss_functions::SquaredError)
    }
}

impl DynLossFunction {
    pub fn new<L: LossFunction>(_: L) -> Self {
        Self {
            name: L::NAME,
            loss: L::loss,
            deriv: L::deriv,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Per-dimension loss of one prediction.
    pub fn loss(&self, predicted: ColRef<f64>, observed: ColRef<f64>) -> Result<Col<f64>> {
        Self::zip_with(self.loss, predicted, observed)
    }

    /// Per-dimension loss derivative of one prediction.
    pub fn deriv(&self, predicted: ColRef<f64>, observed: ColRef<f64>) -> Result<Col<f64>> {
        Self::zip_with(self.deriv, predicted, observed)
    }

    /// Per-dimension loss summed over a batch, one sample per row.
    pub fn batch_loss(&self, predicted: MatRef<f64>, observed: MatRef<f64>) -> Result<Col<f64>> {
        Self::sum_rows_with(self.loss, predicted, observed)
    }

    /// Per-dimension loss derivative summed over a batch, one sample per row.
    pub fn batch_deriv(&self, predicted: MatRef<f64>, observed: MatRef<f64>) -> Result<Col<f64>> {
        Self::sum_rows_with(self.deriv, predicted, observed)
    }

    fn zip_with(
        f: fn(f64, f64) -> f64,
        predicted: ColRef<f64>,
        observed: ColRef<f64>,
    ) -> Result<Col<f64>> {
        check_shape("observed output", predicted.nrows(), observed.nrows())?;
        Ok(Col::from_fn(predicted.nrows(), |k| f(predicted[k], observed[k])))
    }

    fn sum_rows_with(
        f: fn(f64, f64) -> f64,
        predicted: MatRef<f64>,
        observed: MatRef<f64>,
    ) -> Result<Col<f64>> {
        check_shape("observed batch size", predicted.nrows(), observed.nrows())?;
        check_shape("observed output", predicted.ncols(), observed.ncols())?;
        let mut total = Col::<f64>::zeros(predicted.ncols());
        for i in 0..predicted.nrows() {
            for k in 0..predicted.ncols() {
                total[k] += f(predicted[(i, k)], observed[(i, k)]);
            }
        }
        Ok(total)
    }
}

/// Sum of squared errors over a batch, per output dimension.
pub fn sum_squared_error(predicted: MatRef<f64>, observed: MatRef<f64>) -> Result<Col<f64>> {
    DynLossFunction::new(loss_functions::SquaredError).batch_loss(predicted, observed)
}

pub mod loss_functions {
    use super::LossFunction;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct SquaredError;
    impl LossFunction for SquaredError {
        const NAME: &'static str = "squared_error";

        fn loss(predicted: f64, observed: f64) -> f64 {
            (predicted - observed).powi(2)
        }

        fn deriv(predicted: f64, observed: f64) -> f64 {
            2.0 * (predicted - observed)
        }
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct AbsoluteError;
    impl LossFunction for AbsoluteError {
        const NAME: &'static str = "absolute_error";

        fn loss(predicted: f64, observed: f64) -> f64 {
            (predicted - observed).abs()
        }

        fn deriv(predicted: f64, observed: f64) -> f64 {
            let e = predicted - observed;
            if e > 0.0 {
                1.0
            } else if e < 0.0 {
                -1.0
            } else {
                // Also reached for NaN.
                e * 0.0
            }
        }
    }
}
