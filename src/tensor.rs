use ndarray::{Array, ArrayD, IxDyn};

use crate::{Error, Result};

/// Dense, row-major `f32` buffer handed between the host and a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    pub fn from_vec(vec: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        let actual = vec.len();
        let data = Array::from_shape_vec(IxDyn(shape), vec).map_err(|_| Error::ShapeMismatch {
            expected: vec![expected],
            actual: vec![actual],
        })?;
        Ok(Self { data })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reallocates to `shape` if it differs from the current one. Contents are
    /// zeroed on reallocation and left alone otherwise.
    pub fn resize(&mut self, shape: &[usize]) {
        if self.shape() != shape {
            self.data = ArrayD::zeros(IxDyn(shape));
        }
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self> {
        let total_elements: usize = new_shape.iter().product();
        if total_elements != self.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![total_elements],
                actual: vec![self.len()],
            });
        }

        let reshaped = self
            .data
            .clone()
            .into_shape_with_order(IxDyn(new_shape))
            .map_err(|e| Error::Layer(format!("Reshape failed: {}", e)))?;
        Ok(Self { data: reshaped })
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

impl AsRef<ArrayD<f32>> for Tensor {
    fn as_ref(&self) -> &ArrayD<f32> {
        &self.data
    }
}
