use blastradius_core::{BlastRadiusError, Result};
use std::path::Path;
use tree_sitter::Parser;

/// Build a parser for the one language this engine analyzes.
pub fn create_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| BlastRadiusError::Parse(format!("failed to load Python grammar: {e}")))?;
    Ok(parser)
}

/// Module name used as the root scope segment: the file stem, matching
/// Python's own module naming.
pub fn module_name_for(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string()
}

/// Names bound by the Python prelude. References to these are never
/// recorded as dependencies.
pub const PYTHON_BUILTINS: &[&str] = &[
    "abs",
    "all",
    "any",
    "ascii",
    "bin",
    "bool",
    "bytearray",
    "bytes",
    "callable",
    "chr",
    "classmethod",
    "complex",
    "delattr",
    "dict",
    "dir",
    "divmod",
    "enumerate",
    "eval",
    "exec",
    "filter",
    "float",
    "format",
    "frozenset",
    "getattr",
    "globals",
    "hasattr",
    "hash",
    "hex",
    "id",
    "input",
    "int",
    "isinstance",
    "issubclass",
    "iter",
    "len",
    "list",
    "locals",
    "map",
    "max",
    "memoryview",
    "min",
    "next",
    "object",
    "oct",
    "open",
    "ord",
    "pow",
    "print",
    "property",
    "range",
    "repr",
    "reversed",
    "round",
    "set",
    "setattr",
    "slice",
    "sorted",
    "staticmethod",
    "str",
    "sum",
    "super",
    "tuple",
    "type",
    "vars",
    "zip",
    "ArithmeticError",
    "AssertionError",
    "AttributeError",
    "BaseException",
    "Exception",
    "FileNotFoundError",
    "ImportError",
    "IndexError",
    "IOError",
    "KeyError",
    "KeyboardInterrupt",
    "NameError",
    "NotImplementedError",
    "OSError",
    "RuntimeError",
    "StopIteration",
    "TypeError",
    "ValueError",
    "ZeroDivisionError",
];

pub fn is_builtin(name: &str) -> bool {
    PYTHON_BUILTINS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_strips_directory_and_extension() {
        assert_eq!(module_name_for("/srv/app/billing.py"), "billing");
        assert_eq!(module_name_for("billing.py"), "billing");
    }

    #[test]
    fn builtins_contain_common_names() {
        assert!(is_builtin("print"));
        assert!(is_builtin("ValueError"));
        assert!(!is_builtin("my_helper"));
    }

    #[test]
    fn parser_accepts_python_grammar() {
        let mut parser = create_parser().unwrap();
        let tree = parser.parse("x = 1\n", None).unwrap();
        assert_eq!(tree.root_node().kind(), "module");
    }
}
