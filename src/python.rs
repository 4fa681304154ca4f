//! Python bindings: `sminalib.run(params: dict) -> str`

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyString};

use crate::config::{ConfigMap, ConfigValue};
use crate::error::Error;

fn to_config_value(key: &str, value: &Bound<'_, PyAny>) -> PyResult<ConfigValue> {
    // bool first: Python booleans are also ints
    if value.is_instance_of::<PyBool>() {
        Ok(ConfigValue::Bool(value.extract()?))
    } else if value.is_instance_of::<PyInt>() {
        Ok(ConfigValue::Int(value.extract()?))
    } else if value.is_instance_of::<PyFloat>() {
        Ok(ConfigValue::Float(value.extract()?))
    } else if value.is_instance_of::<PyString>() {
        Ok(ConfigValue::Str(value.extract()?))
    } else if let Ok(items) = value.extract::<Vec<String>>() {
        Ok(ConfigValue::List(items))
    } else {
        Err(PyTypeError::new_err(format!(
            "Unsupported value for option '{}': {}",
            key,
            value.get_type().name()?
        )))
    }
}

fn to_py_err(err: Error) -> PyErr {
    if err.is_file_error() {
        PyIOError::new_err(err.to_string())
    } else {
        match err {
            Error::Config(_) | Error::ForceField(_) | Error::Io(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

/// Options from a Python dict; `None` values are left unset
fn to_config_map(params: &Bound<'_, PyDict>) -> PyResult<ConfigMap> {
    let mut map = ConfigMap::new();
    for (key, value) in params.iter() {
        if value.is_none() {
            continue;
        }
        let key: String = key.extract()?;
        let value = to_config_value(&key, &value)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Run smina with the options in `params` and return the poses as SDF text
#[pyfunction]
fn run(py: Python<'_>, params: &Bound<'_, PyDict>) -> PyResult<String> {
    let map = to_config_map(params)?;
    py.allow_threads(|| crate::run(&map)).map_err(to_py_err)
}

/// Molecular docking with a smina-style option dictionary
#[pymodule]
fn sminalib(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(run, m)?)?;
    m.add("__version__", crate::VERSION)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_conversion() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let params = PyDict::new(py);
            params.set_item("ligand", vec!["a.pdbqt", "b.pdbqt"]).unwrap();
            params.set_item("score_only", true).unwrap();
            params.set_item("exhaustiveness", 4).unwrap();
            params.set_item("size_x", 12.5).unwrap();
            params.set_item("autobox_ligand", py.None()).unwrap();

            let map = to_config_map(&params).unwrap();
            assert_eq!(map.len(), 4);
            assert!(!map.contains_key("autobox_ligand"));
            assert_eq!(map["score_only"], ConfigValue::Bool(true));
            assert_eq!(map["exhaustiveness"], ConfigValue::Int(4));
            assert_eq!(map["size_x"], ConfigValue::Float(12.5));
            assert_eq!(
                map["ligand"],
                ConfigValue::List(vec!["a.pdbqt".to_string(), "b.pdbqt".to_string()])
            );

            params.set_item("center_x", PyDict::new(py)).unwrap();
            let err = to_config_map(&params).unwrap_err();
            assert!(err.is_instance_of::<PyTypeError>(py));
        });
    }
}
