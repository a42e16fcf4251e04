#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
use pyo3::prelude::*;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod ast;
pub mod compiler;
pub mod emitter;
pub mod error;
mod grammar;
pub mod parser;
pub mod runtime;
pub mod types;


pub use error::{CompileError, SyntaxError};
pub use types::{CompileOptions, ModuleFormat};

/// Parses dialog source into its dialogs, in source order.
pub fn parse(source: &str) -> Result<Vec<ast::Dialog>, SyntaxError> {
    parser::parse(source)
}

/// Compiles dialog source into a CommonJS module with the default registry.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let dialogs = parser::parse(source)?;
    Ok(compiler::Compiler::new().compile(dialogs))
}

pub fn compile_with_options(source: &str, options: CompileOptions) -> Result<String, CompileError> {
    let dialogs = parser::parse(source)?;
    Ok(compiler::Compiler::with_options(options).compile(dialogs))
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
fn syntax_error(err: CompileError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PySyntaxError, _>(err.to_string())
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pyfunction]
fn compile_text(text: String) -> PyResult<String> {
    compile(&text).map_err(syntax_error)
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pyfunction]
fn compile_text_with_options(text: String, options_json: String) -> PyResult<String> {
    let options = CompileOptions::from_json(&options_json)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))?;
    compile_with_options(&text, options).map_err(syntax_error)
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pyfunction]
fn dump_ast(text: String) -> PyResult<String> {
    let dialogs = parse(&text).map_err(|e| syntax_error(e.into()))?;
    serde_json::to_string_pretty(&dialogs)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn compile_text_wasm(text: &str) -> Result<String, JsValue> {
    compile(text).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn compile_text_with_options_wasm(text: &str, options_json: &str) -> Result<String, JsValue> {
    let options =
        CompileOptions::from_json(options_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    compile_with_options(text, options).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn dump_ast_wasm(text: &str) -> Result<String, JsValue> {
    let dialogs = parse(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string_pretty(&dialogs).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pymodule]
fn diac_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compile_text, m)?)?;
    m.add_function(wrap_pyfunction!(compile_text_with_options, m)?)?;
    m.add_function(wrap_pyfunction!(dump_ast, m)?)?;
    Ok(())
}
