use logiclink_rs::capture::DemoCapture as CoreDemoCapture;
use logiclink_rs::ffi::c::getMeaning;
use numpy::PyArray1;
use pyo3::prelude::*;
use std::sync::Mutex;

#[pyclass(unsendable)]
struct DemoCapture {
    inner: Mutex<CoreDemoCapture>,
}

#[pymethods]
impl DemoCapture {
    #[new]
    fn new(channels: usize, sample_rate: u32) -> PyResult<Self> {
        let inner = CoreDemoCapture::new(channels, sample_rate).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{e}"))
        })?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Capture roughly `bytes` of raw transfer data from the built-in
    /// square wave generator and feed it into the block store.
    fn run(&self, bytes: usize) -> PyResult<()> {
        let mut cap = self
            .inner
            .lock()
            .map_err(|_| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>("lock poisoned"))?;
        cap.run(bytes).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{e}"))
        })
    }

    fn channels(&self) -> PyResult<usize> {
        let cap = self
            .inner
            .lock()
            .map_err(|_| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>("lock poisoned"))?;
        Ok(cap.channels())
    }

    fn channel_len(&self) -> PyResult<u64> {
        let cap = self
            .inner
            .lock()
            .map_err(|_| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>("lock poisoned"))?;
        Ok(cap.channel_len())
    }

    /// Read `length` samples of one channel starting at `begin`, packed
    /// MSB first, 8 samples per byte.
    fn read_channel<'py>(
        &self,
        py: Python<'py>,
        channel: usize,
        begin: u64,
        length: u64,
    ) -> PyResult<Bound<'py, PyArray1<u8>>> {
        let cap = self
            .inner
            .lock()
            .map_err(|_| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>("lock poisoned"))?;
        if channel >= cap.channels() {
            return Err(PyErr::new::<pyo3::exceptions::PyIndexError, _>(format!(
                "channel {channel} out of range"
            )));
        }
        Ok(PyArray1::from_vec_bound(
            py,
            cap.read_channel(channel, begin, length),
        ))
    }
}

/// Sanity hook for binding smoke tests.
#[pyfunction]
fn get_meaning(n: i32) -> i32 {
    getMeaning(n)
}

#[pymodule]
fn logiclink_py_native(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<DemoCapture>()?;
    m.add_function(wrap_pyfunction!(get_meaning, m)?)?;
    Ok(())
}
