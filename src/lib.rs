//! # Shared Dropout
//!
//! A dropout layer that applies one Bernoulli mask to several equally shaped
//! tensor slots at once, with a gradient pass that reuses the same mask.
//!
//! ## Example
//!
//! ```rust
//! use shared_dropout::{layers::Layer, DropoutConfig, Phase, SharedDropout, Tensor};
//!
//! # fn main() -> shared_dropout::Result<()> {
//! let config = DropoutConfig::new(0.5, true).with_seed(7);
//! let mut layer = SharedDropout::new("drop1".to_string(), config)?;
//!
//! let inputs = vec![Tensor::full(&[2, 3], 1.0), Tensor::full(&[2, 3], 2.0)];
//! let mut outputs = Vec::new();
//! layer.reshape(&inputs, &mut outputs)?;
//!
//! let ctx = layer.forward(Phase::Train, &inputs, &mut outputs)?;
//! let mut grads = vec![Tensor::zeros(&[2, 3]), Tensor::zeros(&[2, 3])];
//! layer.backward(Phase::Train, &ctx, &outputs, &[true], &mut grads)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod layers;
pub mod mask;
pub mod phase;
pub mod tensor;

#[cfg(feature = "python")]
pub mod python;

pub use backend::Backend;
pub use config::DropoutConfig;
pub use error::{Error, Result};
pub use layers::{DropoutContext, SharedDropout};
pub use mask::Mask;
pub use phase::Phase;
pub use tensor::Tensor;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn shared_dropout(m: &Bound<'_, PyModule>) -> PyResult<()> {
    python::register_module(m)?;
    Ok(())
}
