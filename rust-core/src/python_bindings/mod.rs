//! PyO3 bindings for Python integration

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::error::SpectrumError;

mod stream_bindings;
mod window_bindings;

impl From<SpectrumError> for PyErr {
    fn from(err: SpectrumError) -> Self {
        match err {
            SpectrumError::InvalidConfiguration(_) | SpectrumError::ConfigParse(_) => {
                PyValueError::new_err(err.to_string())
            }
            SpectrumError::Io(_) | SpectrumError::Wav(_) => PyIOError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

/// Python module definition
#[pymodule]
fn spectral_stream(_py: Python, m: &PyModule) -> PyResult<()> {
    // RUST_LOG controls verbosity; a host that already installed a logger wins
    let _ = env_logger::try_init();

    m.add_class::<stream_bindings::PySpectrumStream>()?;
    m.add_class::<window_bindings::PyWindowType>()?;
    m.add_function(wrap_pyfunction!(window_bindings::generate_window, m)?)?;

    Ok(())
}
