//! Python bindings for analysis windows

use numpy::PyArray1;
use pyo3::prelude::*;

use crate::spectrum::WindowType;

/// Window type enum exposed to Python
#[pyclass(name = "WindowType")]
#[derive(Clone)]
pub enum PyWindowType {
    Hann,
    Hamming,
    Blackman,
    BlackmanNuttall,
    Rectangular,
}

impl From<PyWindowType> for WindowType {
    fn from(py_win: PyWindowType) -> Self {
        match py_win {
            PyWindowType::Hann => WindowType::Hann,
            PyWindowType::Hamming => WindowType::Hamming,
            PyWindowType::Blackman => WindowType::Blackman,
            PyWindowType::BlackmanNuttall => WindowType::BlackmanNuttall,
            PyWindowType::Rectangular => WindowType::Rectangular,
        }
    }
}

/// Window weights of the given length
///
/// Args:
///     window_type: Window type
///     length: Number of samples
///
/// Returns:
///     Weights as numpy array
#[pyfunction]
pub fn generate_window(py: Python<'_>, window_type: PyWindowType, length: usize) -> &PyArray1<f64> {
    PyArray1::from_vec(py, crate::spectrum::generate_window(window_type.into(), length))
}
