use faer::prelude::*;
use tracing::{debug, warn};

use crate::{
    DynLossFunction, NeuralNetwork,
    core::{DerivBuffer, forward, propagate_backwards, update_weights_and_biases},
    error::{Error, Result, check_shape},
};

#[derive(Debug, Clone, Copy)]
pub struct TrainerConfig {
    /// Learning rate.
    pub eta: f64,
    pub loss: DynLossFunction,
    /// Accumulated gradients are clipped to `[-clip, clip]` before being applied.
    pub clip: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            eta: 0.1,
            loss: DynLossFunction::default(),
            clip: 1.0,
        }
    }
}

impl TrainerConfig {
    /// Returns `Error::InvalidClip` unless `clip` is a non-negative number.
    pub fn validate(&self) -> Result<()> {
        if self.clip >= 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidClip { clip: self.clip })
        }
    }
}

/// Which of the two tasks a multi-task `Sample` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    First,
    Second,
}

impl Task {
    pub fn one_hot(self) -> [f64; 2] {
        match self {
            Task::First => [1.0, 0.0],
            Task::Second => [0.0, 1.0],
        }
    }
}

/// A training sample for networks that learn two tasks at once.
///
/// The network sees `input` followed by the one-hot encoding of `task`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Vec<f64>,
    pub task: Task,
    pub expected: Vec<f64>,
}

impl Sample {
    pub fn new(input: Vec<f64>, task: Task, expected: Vec<f64>) -> Self {
        Self {
            input,
            task,
            expected,
        }
    }

    pub fn network_input(&self) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.input.len() + 2);
        x.extend_from_slice(&self.input);
        x.extend_from_slice(&self.task.one_hot());
        x
    }
}

/// Full-batch gradient descent over a network.
pub struct Trainer<'a> {
    nn: &'a mut NeuralNetwork,
    config: TrainerConfig,
    deriv_buffer: DerivBuffer,
    n_epochs: usize,
}

impl<'a> Trainer<'a> {
    pub fn new(nn: &'a mut NeuralNetwork, eta: f64) -> Self {
        Self::with_config(
            nn,
            TrainerConfig {
                eta,
                ..Default::default()
            },
        )
    }

    pub fn with_config(nn: &'a mut NeuralNetwork, config: TrainerConfig) -> Self {
        let deriv_buffer = DerivBuffer::create(nn.topology());
        Self {
            nn,
            config,
            deriv_buffer,
            n_epochs: 0,
        }
    }

    pub fn finish(self) {}

    pub fn nn<'b, 'x>(&'b mut self) -> &'x mut NeuralNetwork
    where
        'a: 'x,
        'b: 'x,
    {
        self.nn
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Gradients accumulated by the last epoch.
    pub fn derivs(&self) -> &DerivBuffer {
        &self.deriv_buffer
    }

    /// Number of epochs trained so far.
    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    /// Trains one epoch, one sample per row of `samples` and `observed`.
    ///
    /// Returns the loss per output dimension, averaged over the samples.
    pub fn train_one_epoch(
        &mut self,
        samples: MatRef<f64>,
        observed: MatRef<f64>,
    ) -> Result<Col<f64>> {
        let rows = |m: MatRef<f64>| {
            (0..m.nrows())
                .map(|i| m.row(i).iter().copied().collect::<Vec<f64>>())
                .collect::<Vec<_>>()
        };
        let xs = rows(samples);
        let ys = rows(observed);
        if xs.is_empty() {
            return Err(Error::EmptyBatch);
        }
        check_shape("observed batch size", xs.len(), ys.len())?;
        let pairs: Vec<(&[f64], &[f64])> = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (x.as_slice(), y.as_slice()))
            .collect();
        self.train_one_epoch_slices(&pairs)
    }

    /// Convenience overload for multi-task samples.
    pub fn train_samples(&mut self, samples: &[Sample]) -> Result<Col<f64>> {
        let xs: Vec<Vec<f64>> = samples.iter().map(Sample::network_input).collect();
        let pairs: Vec<(&[f64], &[f64])> = xs
            .iter()
            .zip(samples)
            .map(|(x, sample)| (x.as_slice(), sample.expected.as_slice()))
            .collect();
        self.train_one_epoch_slices(&pairs)
    }

    /// Trains one epoch over `(input, observed output)` pairs.
    ///
    /// Returns the loss per output dimension, averaged over the samples.
    pub fn train_one_epoch_slices(&mut self, samples: &[(&[f64], &[f64])]) -> Result<Col<f64>> {
        if samples.is_empty() {
            return Err(Error::EmptyBatch);
        }
        self.config.validate()?;
        let n_inputs = self.nn.n_inputs();
        let n_outputs = self.nn.n_outputs();
        for (x, y) in samples {
            if x.len() != n_inputs {
                return Err(Error::InputLength {
                    expected: n_inputs,
                    actual: x.len(),
                });
            }
            check_shape("observed output", n_outputs, y.len())?;
        }

        let TrainerConfig { eta, loss, clip } = self.config;
        self.deriv_buffer.clear_params();
        let mut total_loss = Col::<f64>::zeros(n_outputs);
        let mut total_d_loss = Col::<f64>::zeros(n_outputs);
        let (params, results) = self.nn.buffers_mut();
        for (x, y) in samples {
            forward(x, params, results)?;
            let prediction = results.output();
            let observed = ColRef::from_slice(y);
            let loss_part = loss.loss(prediction, observed)?;
            let d_loss_part = loss.deriv(prediction, observed)?;
            for k in 0..n_outputs {
                total_loss[k] += loss_part[k];
                total_d_loss[k] += d_loss_part[k];
            }
            propagate_backwards(params, results, &mut self.deriv_buffer, d_loss_part.as_ref())?;
        }

        let n = samples.len() as f64;
        let n_skipped = update_weights_and_biases(params, &self.deriv_buffer, eta, clip, n)?;
        if n_skipped != 0 {
            warn!(n_skipped, epoch = self.n_epochs, "skipped NaN gradients");
        }
        let mean_loss = Col::from_fn(n_outputs, |k| total_loss[k] / n);
        debug!(
            epoch = self.n_epochs,
            loss = ?mean_loss.as_ref().iter().collect::<Vec<_>>(),
            d_loss = ?total_d_loss.as_ref().iter().map(|d| d / n).collect::<Vec<_>>(),
            "trained epoch"
        );
        self.n_epochs += 1;
        Ok(mean_loss)
    }
}
