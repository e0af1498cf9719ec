//! Python Bindings
//!
//! Exposes [`Graph`] to Python with Python objects as values and Python
//! callables as derivations and sinks:
//!
//! ```python
//! from ripple_core._core import Graph
//!
//! g = Graph("app")
//! g.add_signal("n", 10)
//! g.derivation("half", ["n"], lambda n: n / 2)
//! g.sink("show", ["half"], print)
//! g.run_all(g.set("n", 20))   # prints 10.0
//! ```
//!
//! Callables receive the dependency values as positional arguments. An
//! exception raised by a derivation propagates out of `get` unchanged.

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyTuple;

use crate::config::GraphConfig;
use crate::error::{BoxError, GraphError};
use crate::graph::Graph;
use crate::reactive::{Derivation, Sink};

/// A Python object stored in the graph.
///
/// `Py<PyAny>` only clones with the GIL held, so the clone takes it.
struct PyValue(Py<PyAny>);

impl Clone for PyValue {
    fn clone(&self) -> Self {
        Python::with_gil(|py| Self(self.0.clone_ref(py)))
    }
}

fn call(callable: &Py<PyAny>, inputs: &[PyValue]) -> Result<Py<PyAny>, BoxError> {
    Python::with_gil(|py| {
        let args = PyTuple::new_bound(py, inputs.iter().map(|value| &value.0));
        callable
            .call1(py, args)
            .map_err(|err| Box::new(err) as BoxError)
    })
}

fn to_py_err(err: GraphError) -> PyErr {
    match err {
        GraphError::Evaluation { source, .. } => match source.downcast::<PyErr>() {
            Ok(original) => *original,
            Err(other) => PyRuntimeError::new_err(other.to_string()),
        },
        GraphError::UnknownNode(_) => PyKeyError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python-exposed Graph type.
#[pyclass(name = "Graph")]
pub struct PyGraph {
    inner: Graph<PyValue>,
}

#[pymethods]
impl PyGraph {
    #[new]
    #[pyo3(signature = (label = None))]
    fn new(label: Option<String>) -> Self {
        let mut config = GraphConfig::default();
        if let Some(label) = label {
            config = config.with_label(label);
        }
        Self {
            inner: Graph::with_config(config),
        }
    }

    fn add_signal(&mut self, id: String, value: PyObject) -> PyResult<()> {
        self.inner.add_signal(id, PyValue(value)).map_err(to_py_err)
    }

    /// Register a cached computation over `dependencies`.
    fn derivation(&mut self, id: String, dependencies: Vec<String>, compute: PyObject) -> PyResult<()> {
        let derivation = Derivation::new(id, move |inputs: &[PyValue]| call(&compute, inputs).map(PyValue));
        self.inner.register(derivation, dependencies).map_err(to_py_err)
    }

    /// Register a side effect over `dependencies`. Its return value is ignored.
    fn sink(&mut self, id: String, dependencies: Vec<String>, run: PyObject) -> PyResult<()> {
        let sink = Sink::new(id, move |inputs: &[PyValue]| call(&run, inputs).map(|_| ()));
        self.inner.register(sink, dependencies).map_err(to_py_err)
    }

    /// Set a signal; returns the ids of the sinks to re-run.
    fn set(&mut self, id: &str, value: PyObject) -> PyResult<Vec<String>> {
        let sinks = self.inner.set(id, PyValue(value)).map_err(to_py_err)?;
        Ok(sinks.into_iter().map(|sink| sink.as_str().to_owned()).collect())
    }

    fn get(&mut self, id: &str) -> PyResult<PyObject> {
        self.inner.get(id).map(|value| value.0).map_err(to_py_err)
    }

    /// Run sinks; returns `(id, error message or None)` pairs.
    fn run_all(&mut self, sinks: Vec<String>) -> Vec<(String, Option<String>)> {
        self.inner
            .run_all(&sinks)
            .into_iter()
            .map(|(id, outcome)| (id.as_str().to_owned(), outcome.err().map(|err| err.to_string())))
            .collect()
    }

    fn sink_ids(&self) -> Vec<String> {
        self.inner
            .sink_ids()
            .into_iter()
            .map(|id| id.as_str().to_owned())
            .collect()
    }

    fn snapshot_json(&self) -> PyResult<String> {
        self.inner
            .snapshot()
            .to_json()
            .map_err(|err| PyRuntimeError::new_err(err.to_string()))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Graph(label={:?}, nodes={})",
            self.inner.config().label,
            self.inner.len()
        )
    }
}
