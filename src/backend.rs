//! Element-wise execution strategies.
//!
//! The dropout arithmetic is the same everywhere; only the loop driver
//! changes. [`Backend`] is picked once in the layer configuration and turned
//! into a boxed [`Executor`] at construction time.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Below this many elements the parallel executor runs the sequential loop.
pub const PARALLEL_MIN_ELEMENTS: usize = 1 << 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Cpu,
    Parallel,
}

impl Backend {
    pub fn executor(self) -> Box<dyn Executor> {
        match self {
            Backend::Cpu => Box::new(CpuExecutor),
            Backend::Parallel => Box::new(ParallelExecutor::default()),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "parallel" | "rayon" => Ok(Backend::Parallel),
            _ => Err(Error::UnsupportedBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => f.write_str("cpu"),
            Backend::Parallel => f.write_str("parallel"),
        }
    }
}

/// Loop driver for the two kernels dropout needs.
///
/// Callers guarantee that `src`, `mask` and `dst` share one shape.
pub trait Executor: fmt::Debug + Send + Sync {
    /// `dst[n] = src[n] * mask[n] * factor`
    fn masked_scale(&self, src: &ArrayD<f32>, mask: &ArrayD<u32>, factor: f32, dst: &mut ArrayD<f32>);

    /// `dst[n] = src[n] * factor`, or a plain copy when `factor` is `None`.
    fn scaled_copy(&self, src: &ArrayD<f32>, factor: Option<f32>, dst: &mut ArrayD<f32>);

    fn backend(&self) -> Backend;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuExecutor;

impl Executor for CpuExecutor {
    fn masked_scale(&self, src: &ArrayD<f32>, mask: &ArrayD<u32>, factor: f32, dst: &mut ArrayD<f32>) {
        Zip::from(dst)
            .and(src)
            .and(mask)
            .for_each(|d, &s, &m| *d = s * m as f32 * factor);
    }

    fn scaled_copy(&self, src: &ArrayD<f32>, factor: Option<f32>, dst: &mut ArrayD<f32>) {
        match factor {
            Some(factor) => Zip::from(dst).and(src).for_each(|d, &s| *d = s * factor),
            None => dst.assign(src),
        }
    }

    fn backend(&self) -> Backend {
        Backend::Cpu
    }
}

/// Runs on the rayon pool for tensors of at least `min_elements`.
#[derive(Debug, Clone, Copy)]
pub struct ParallelExecutor {
    min_elements: usize,
}

impl ParallelExecutor {
    pub fn with_min_elements(min_elements: usize) -> Self {
        Self { min_elements }
    }

    fn is_parallel(&self, len: usize) -> bool {
        len >= self.min_elements
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::with_min_elements(PARALLEL_MIN_ELEMENTS)
    }
}

impl Executor for ParallelExecutor {
    fn masked_scale(&self, src: &ArrayD<f32>, mask: &ArrayD<u32>, factor: f32, dst: &mut ArrayD<f32>) {
        if !self.is_parallel(dst.len()) {
            return CpuExecutor.masked_scale(src, mask, factor, dst);
        }
        Zip::from(dst)
            .and(src)
            .and(mask)
            .par_for_each(|d, &s, &m| *d = s * m as f32 * factor);
    }

    fn scaled_copy(&self, src: &ArrayD<f32>, factor: Option<f32>, dst: &mut ArrayD<f32>) {
        if !self.is_parallel(dst.len()) {
            return CpuExecutor.scaled_copy(src, factor, dst);
        }
        match factor {
            Some(factor) => Zip::from(dst).and(src).par_for_each(|d, &s| *d = s * factor),
            None => Zip::from(dst).and(src).par_for_each(|d, &s| *d = s),
        }
    }

    fn backend(&self) -> Backend {
        Backend::Parallel
    }
}
