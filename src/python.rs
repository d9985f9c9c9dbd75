use ndarray::ArrayD;
use numpy::{PyArray, PyArrayDyn, PyArrayMethods};
use pyo3::prelude::*;

use crate::layers::Layer;
use crate::{Backend, DropoutConfig, DropoutContext, Phase, SharedDropout as RustSharedDropout, Tensor};

fn runtime_error(context: &str, e: crate::Error) -> PyErr {
    pyo3::exceptions::PyRuntimeError::new_err(format!("{}: {}", context, e))
}

fn phase_of(training: bool) -> Phase {
    if training {
        Phase::Train
    } else {
        Phase::Test
    }
}

fn to_tensors(arrays: &[Bound<'_, PyArrayDyn<f32>>]) -> Vec<Tensor> {
    arrays
        .iter()
        .map(|a| Tensor::new(a.readonly().as_array().to_owned()))
        .collect()
}

fn to_arrays<'py>(py: Python<'py>, tensors: Vec<Tensor>) -> Vec<Bound<'py, PyArrayDyn<f32>>> {
    tensors
        .into_iter()
        .map(|t| {
            let data: ArrayD<f32> = t.into_data();
            PyArray::from_owned_array(py, data)
        })
        .collect()
}

/// Python handle holding the layer plus the context of its last forward.
#[pyclass(name = "SharedDropout")]
pub struct PySharedDropout {
    inner: RustSharedDropout,
    last: Option<DropoutContext>,
}

#[pymethods]
impl PySharedDropout {
    #[new]
    #[pyo3(signature = (ratio, scale_train = true, seed = None, parallel = false))]
    fn new(ratio: f32, scale_train: bool, seed: Option<u64>, parallel: bool) -> PyResult<Self> {
        let mut config = DropoutConfig::new(ratio, scale_train);
        config.seed = seed;
        if parallel {
            config = config.with_backend(Backend::Parallel);
        }
        let inner = RustSharedDropout::new("shared_dropout".to_string(), config)
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner, last: None })
    }

    #[pyo3(signature = (inputs, training = true))]
    fn forward<'py>(
        &mut self,
        py: Python<'py>,
        inputs: Vec<Bound<'py, PyArrayDyn<f32>>>,
        training: bool,
    ) -> PyResult<Vec<Bound<'py, PyArrayDyn<f32>>>> {
        let bottom = to_tensors(&inputs);
        let mut top = Vec::new();
        self.inner
            .reshape(&bottom, &mut top)
            .map_err(|e| runtime_error("Reshape failed", e))?;
        let ctx = self
            .inner
            .forward(phase_of(training), &bottom, &mut top)
            .map_err(|e| runtime_error("Forward failed", e))?;
        self.last = Some(ctx);
        Ok(to_arrays(py, top))
    }

    #[pyo3(signature = (grads, training = true))]
    fn backward<'py>(
        &self,
        py: Python<'py>,
        grads: Vec<Bound<'py, PyArrayDyn<f32>>>,
        training: bool,
    ) -> PyResult<Vec<Bound<'py, PyArrayDyn<f32>>>> {
        let ctx = self.last.as_ref().ok_or_else(|| {
            pyo3::exceptions::PyRuntimeError::new_err("backward called before forward")
        })?;
        let top_diff = to_tensors(&grads);
        let mut bottom_diff: Vec<Tensor> = top_diff.iter().map(|t| Tensor::zeros(t.shape())).collect();
        self.inner
            .backward(phase_of(training), ctx, &top_diff, &[true], &mut bottom_diff)
            .map_err(|e| runtime_error("Backward failed", e))?;
        Ok(to_arrays(py, bottom_diff))
    }

    #[getter]
    fn scale(&self) -> f32 {
        self.inner.scale()
    }

    #[getter]
    fn ratio(&self) -> f32 {
        self.inner.dropout_ratio()
    }

    fn __repr__(&self) -> String {
        format!(
            "<SharedDropout ratio={} scale_train={}>",
            self.inner.dropout_ratio(),
            self.inner.config().scale_train
        )
    }
}

pub fn register_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySharedDropout>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
