//! Dropout with one mask shared across several paired input/output slots.
//!
//! In the training phase a fresh Bernoulli mask is drawn per forward call and
//! applied to every slot; kept elements are scaled by `1 / (1 - ratio)` when
//! `scale_train` is set. In the test phase inputs pass through, scaled by
//! `1 - ratio` instead when scaling was deferred to inference.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, trace};

use crate::backend::{Backend, Executor};
use crate::{DropoutConfig, Error, Mask, Phase, Result, Tensor};

/// State produced by [`SharedDropout::forward`] and consumed by the matching
/// backward call.
#[derive(Debug, Clone)]
pub struct DropoutContext {
    phase: Phase,
    mask: Option<Arc<Mask>>,
}

impl DropoutContext {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The mask drawn by the forward call; `None` for test-phase forwards.
    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_deref()
    }
}

pub struct SharedDropout {
    name: String,
    config: DropoutConfig,
    scale: f32,
    uint_threshold: u32,
    executor: Box<dyn Executor>,
    rng: Box<dyn RngCore + Send + Sync>,
    bound_shape: Option<Vec<usize>>,
    slots: usize,
    mask: Arc<Mask>,
}

impl SharedDropout {
    /// Builds a layer whose random stream is seeded from `config.seed`, or
    /// from OS entropy when no seed is given.
    pub fn new(name: String, config: DropoutConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(name, config, rng)
    }

    /// Builds a layer drawing its masks from `rng`.
    pub fn with_rng<R>(name: String, config: DropoutConfig, rng: R) -> Result<Self>
    where
        R: RngCore + Send + Sync + 'static,
    {
        config.validate()?;
        let scale = config.scale();
        let uint_threshold = config.uint_threshold();
        debug!(
            layer = %name,
            ratio = config.dropout_ratio,
            scale,
            scale_train = config.scale_train,
            backend = %config.backend,
            "configured shared dropout"
        );

        Ok(Self {
            name,
            config,
            scale,
            uint_threshold,
            executor: config.backend.executor(),
            rng: Box::new(rng),
            bound_shape: None,
            slots: 0,
            mask: Arc::new(Mask::new(&[0])),
        })
    }

    pub fn config(&self) -> &DropoutConfig {
        &self.config
    }

    pub fn dropout_ratio(&self) -> f32 {
        self.config.dropout_ratio
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn uint_threshold(&self) -> u32 {
        self.uint_threshold
    }

    pub fn backend(&self) -> Backend {
        self.executor.backend()
    }

    pub fn bound_shape(&self) -> Option<&[usize]> {
        self.bound_shape.as_deref()
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Mask written by the most recent training-phase forward.
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    fn train_factor(&self) -> f32 {
        if self.config.scale_train {
            self.scale
        } else {
            1.0
        }
    }

    fn test_factor(&self) -> Option<f32> {
        if self.config.scale_train {
            None
        } else {
            Some(1.0 / self.scale)
        }
    }

    /// Checks that both slot lists match the bound slot count and shape.
    fn check_slots(&self, inputs: &[Tensor], outputs: &[Tensor]) -> Result<()> {
        let shape = self.bound_shape.as_deref().ok_or_else(|| {
            Error::Layer(format!("{}: reshape must be called before running", self.name))
        })?;

        if inputs.len() != self.slots || outputs.len() != self.slots {
            return Err(Error::Layer(format!(
                "{}: bound to {} slots, got {} inputs and {} outputs",
                self.name,
                self.slots,
                inputs.len(),
                outputs.len()
            )));
        }

        for tensor in inputs.iter().chain(outputs) {
            if tensor.shape() != shape {
                return Err(Error::ShapeMismatch {
                    expected: shape.to_vec(),
                    actual: tensor.shape().to_vec(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SharedDropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDropout")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("scale", &self.scale)
            .field("backend", &self.executor.backend())
            .field("bound_shape", &self.bound_shape)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl super::Layer for SharedDropout {
    type Context = DropoutContext;

    fn name(&self) -> &str {
        &self.name
    }

    fn reshape(&mut self, bottom: &[Tensor], top: &mut Vec<Tensor>) -> Result<()> {
        let (first, rest) = bottom.split_first().ok_or_else(|| {
            Error::Layer(format!("{}: requires at least one input", self.name))
        })?;
        let shape = first.shape().to_vec();

        if let Some(other) = rest.iter().find(|t| t.shape() != shape.as_slice()) {
            return Err(Error::ShapeMismatch {
                expected: shape,
                actual: other.shape().to_vec(),
            });
        }

        top.resize_with(bottom.len(), || Tensor::zeros(&shape));
        for output in top.iter_mut() {
            output.resize(&shape);
        }

        if self.bound_shape.as_deref() != Some(shape.as_slice()) {
            self.mask = Arc::new(Mask::new(&shape));
        }
        debug!(layer = %self.name, shape = ?shape, slots = bottom.len(), "bound shared dropout");
        self.slots = bottom.len();
        self.bound_shape = Some(shape);
        Ok(())
    }

    fn forward(
        &mut self,
        phase: Phase,
        bottom: &[Tensor],
        top: &mut [Tensor],
    ) -> Result<DropoutContext> {
        self.check_slots(bottom, top)?;

        match phase {
            Phase::Train => {
                let threshold = self.uint_threshold;
                // Clones only if a previous context still holds the buffer.
                let mask = Arc::make_mut(&mut self.mask);
                let kept = mask.resample(&mut *self.rng, threshold);
                trace!(layer = %self.name, kept, total = mask.len(), "drew dropout mask");

                let factor = self.train_factor();
                for (input, output) in bottom.iter().zip(top.iter_mut()) {
                    self.executor
                        .masked_scale(input.data(), self.mask.bits(), factor, output.data_mut());
                }

                Ok(DropoutContext {
                    phase,
                    mask: Some(Arc::clone(&self.mask)),
                })
            }
            Phase::Test => {
                let factor = self.test_factor();
                for (input, output) in bottom.iter().zip(top.iter_mut()) {
                    self.executor
                        .scaled_copy(input.data(), factor, output.data_mut());
                }
                trace!(layer = %self.name, "test-phase passthrough");

                Ok(DropoutContext { phase, mask: None })
            }
        }
    }

    fn backward(
        &self,
        phase: Phase,
        context: &DropoutContext,
        top_diff: &[Tensor],
        propagate_down: &[bool],
        bottom_diff: &mut [Tensor],
    ) -> Result<()> {
        if !propagate_down.first().copied().unwrap_or(false) {
            trace!(layer = %self.name, "propagate_down unset, skipping backward");
            return Ok(());
        }
        self.check_slots(top_diff, bottom_diff)?;

        match phase {
            Phase::Train => {
                let mask = context.mask().ok_or_else(|| {
                    Error::Layer(format!(
                        "{}: training backward needs the context of a training forward, got {}",
                        self.name, context.phase
                    ))
                })?;
                if let Some(shape) = self.bound_shape.as_deref() {
                    if mask.shape() != shape {
                        return Err(Error::ShapeMismatch {
                            expected: shape.to_vec(),
                            actual: mask.shape().to_vec(),
                        });
                    }
                }

                let factor = self.train_factor();
                for (grad, diff) in top_diff.iter().zip(bottom_diff.iter_mut()) {
                    self.executor
                        .masked_scale(grad.data(), mask.bits(), factor, diff.data_mut());
                }
            }
            Phase::Test => {
                let factor = self.test_factor();
                for (grad, diff) in top_diff.iter().zip(bottom_diff.iter_mut()) {
                    self.executor.scaled_copy(grad.data(), factor, diff.data_mut());
                }
            }
        }
        trace!(layer = %self.name, %phase, slots = self.slots, "backward done");
        Ok(())
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        Ok(input_shape.to_vec())
    }
}
