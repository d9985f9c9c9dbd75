pub mod shared_dropout;

use crate::{Phase, Result, Tensor};

/// A layer driven by the host in `reshape → (forward, backward)*` cycles.
///
/// `forward` hands back a `Context` holding whatever state the matching
/// `backward` needs, so the pairing between the two calls is explicit.
pub trait Layer: std::fmt::Debug + Send + Sync {
    type Context;

    fn name(&self) -> &str;

    /// Binds input shapes, resizing `top` to one output per input.
    fn reshape(&mut self, bottom: &[Tensor], top: &mut Vec<Tensor>) -> Result<()>;

    fn forward(
        &mut self,
        phase: Phase,
        bottom: &[Tensor],
        top: &mut [Tensor],
    ) -> Result<Self::Context>;

    /// Writes input gradients into `bottom_diff`. Leaves `bottom_diff`
    /// untouched when `propagate_down[0]` is false.
    fn backward(
        &self,
        phase: Phase,
        context: &Self::Context,
        top_diff: &[Tensor],
        propagate_down: &[bool],
        bottom_diff: &mut [Tensor],
    ) -> Result<()>;

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>>;
}

pub use shared_dropout::{DropoutContext, SharedDropout};
