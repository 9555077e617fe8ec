use derive_more::Display;

/// Activation function of a layer, paired with its closed-form derivative.
///
/// `deriv` always takes the pre-activation sum `z` of a node, for every variant.
#[derive(Debug, Display, Clone, Copy, PartialEq, Default)]
pub enum Activation {
    #[default]
    #[display("unit")]
    Unit,
    #[display("sigmoid")]
    Sigmoid,
    #[display("softplus")]
    SoftPlus,
    #[display("tanh")]
    Tanh,
    #[display("relu")]
    ReLU,
    #[display("leaky_relu({alpha})")]
    LeakyReLU { alpha: f64 },
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-x))
}

impl Activation {
    pub const LEAKY_RELU: Self = Self::LeakyReLU { alpha: 0.01 };

    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Self::Unit => x,
            Self::Sigmoid => sigmoid(x),
            Self::SoftPlus => f64::ln_1p(f64::exp(x)),
            Self::Tanh => f64::tanh(x),
            Self::ReLU => x.max(0.0),
            Self::LeakyReLU { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
        }
    }

    /// Derivative at the pre-activation sum `z`.
    pub fn deriv(&self, z: f64) -> f64 {
        match *self {
            Self::Unit => 1.0,
            Self::Sigmoid => {
                let s = sigmoid(z);
                s * (1.0 - s)
            }
            Self::SoftPlus => sigmoid(z),
            Self::Tanh => 1.0 - f64::tanh(z).powi(2),
            // ReLU is not differentiable at 0, 1 is used there.
            Self::ReLU => {
                if z < 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Self::LeakyReLU { alpha } => {
                if z > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
        }
    }
}
