//! Python bindings for the asm_rebase normalizer

use std::collections::HashMap;

use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::exceptions::{PyIOError, PyValueError};

use crate::{
    batch::BatchNormalizer,
    format::{DatasetFormatter, OutputFormat},
    rebase::rebase as rebase_function,
    resolve::{CompiledDialect, Dialect},
    source::ListingSource,
    Instruction, RebaseError,
};

fn to_py_err(e: RebaseError) -> PyErr {
    match e {
        RebaseError::IoError(io) => PyIOError::new_err(io.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Build a dialect from optional keyword overrides
fn dialect_from(branch_prefixes: Option<Vec<String>>) -> Result<CompiledDialect, RebaseError> {
    match branch_prefixes {
        Some(branch_prefixes) => Dialect {
            branch_prefixes,
            ..Dialect::default()
        }
        .compile(),
        None => Ok(CompiledDialect::default()),
    }
}

/// Rebase one function given as `{address: text}`
#[pyfunction]
#[pyo3(signature = (instructions, branch_prefixes=None))]
fn rebase<'py>(
    py: Python<'py>,
    instructions: HashMap<u64, String>,
    branch_prefixes: Option<Vec<String>>,
) -> PyResult<Bound<'py, PyDict>> {
    let dialect = dialect_from(branch_prefixes).map_err(to_py_err)?;
    let insns: Vec<Instruction> = instructions
        .into_iter()
        .map(|(address, text)| Instruction::new(address, text))
        .collect();

    let func = rebase_function(&insns, &dialect).map_err(to_py_err)?;

    let result = PyDict::new(py);
    for (position, text) in func.iter() {
        result.set_item(position.to_string(), text)?;
    }
    Ok(result)
}

/// Rebase every function of a listing file and return the formatted dataset
#[pyfunction]
#[pyo3(signature = (path, output_format="json", parallel=false))]
fn rebase_listing(path: &str, output_format: &str, parallel: bool) -> PyResult<String> {
    let format: OutputFormat = output_format
        .parse()
        .map_err(|e: String| PyValueError::new_err(e))?;

    let source = ListingSource::from_path(path).map_err(to_py_err)?;
    let dataset = BatchNormalizer::new()
        .parallel(parallel)
        .run(&source)
        .map_err(to_py_err)?;

    format.get_formatter().format(&dataset).map_err(to_py_err)
}

/// Python module initialization
#[pymodule]
fn asm_rebase(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(rebase, m)?)?;
    m.add_function(wrap_pyfunction!(rebase_listing, m)?)?;

    let py = m.py();
    let output_format = PyDict::new(py);
    output_format.set_item("JSON", "json")?;
    output_format.set_item("JSONL", "jsonl")?;
    output_format.set_item("CSV", "csv")?;
    output_format.set_item("TEXT", "text")?;
    m.setattr("OutputFormat", output_format)?;

    Ok(())
}
