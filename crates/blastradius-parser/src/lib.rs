pub mod extractor;
pub mod language;

pub use extractor::extract_symbols;
pub use language::{create_parser, is_builtin, module_name_for, PYTHON_BUILTINS};
