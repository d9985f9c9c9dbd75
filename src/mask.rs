use ndarray::{ArrayD, IxDyn};
use rand::RngCore;

/// Discretizes a drop probability onto the `u32` range.
///
/// A uniform draw `u` keeps its position iff `u > threshold`, so the keep
/// probability is `1 - ratio` up to `2^-32`.
pub fn uint_threshold(ratio: f32) -> u32 {
    (u32::MAX as f64 * ratio as f64) as u32
}

/// Per-position keep flags, `1` = keep and `0` = drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    bits: ArrayD<u32>,
}

impl Mask {
    /// All-ones mask of the given shape.
    pub fn new(shape: &[usize]) -> Self {
        Self {
            bits: ArrayD::ones(IxDyn(shape)),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.bits.shape()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &ArrayD<u32> {
        &self.bits
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.bits.iter().copied().collect()
    }

    pub fn kept(&self) -> usize {
        self.bits.iter().filter(|&&b| b != 0).count()
    }

    /// Redraws every position from `rng`, one `u32` per element in row-major
    /// order. Returns the number of kept positions.
    pub fn resample<R: RngCore + ?Sized>(&mut self, rng: &mut R, threshold: u32) -> usize {
        let mut kept = 0;
        for bit in self.bits.iter_mut() {
            let keep = rng.next_u32() > threshold;
            *bit = keep as u32;
            kept += keep as usize;
        }
        kept
    }
}
