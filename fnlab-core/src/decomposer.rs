//! Splits a submitted source text into its top-level elements.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::analyzer::{Program, SyntaxError};
use crate::ast::StatementKind;

/// Top-level elements of one source text, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeElements {
    pub imports: Vec<String>,
    /// Module-level assignments.
    pub globals: Vec<String>,
    pub others: Vec<String>,
    /// Function name to its source, decorators included. A redefinition
    /// replaces the text but keeps the first position.
    pub functions: IndexMap<String, String>,
}

impl CodeElements {
    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn function(&self, name: &str) -> Option<&str> {
        self.functions.get(name).map(String::as_str)
    }

    /// Every element except the function `name`, as transformer context.
    pub fn context_without(&self, name: &str) -> String {
        let siblings = self
            .functions
            .iter()
            .filter(|(function, _)| function.as_str() != name)
            .map(|(_, source)| source);
        self.imports
            .iter()
            .chain(&self.globals)
            .chain(siblings)
            .chain(&self.others)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[tracing::instrument(level = "debug", skip(source), fields(bytes = source.len()))]
pub fn decompose(source: &str) -> Result<CodeElements, SyntaxError> {
    let program = Program::parse(source)?;
    let mut elements = CodeElements::default();
    for statement in &program.module().body {
        let text = program.statement_source(statement);
        match &statement.kind {
            StatementKind::Import(_) | StatementKind::ImportFrom { .. } => {
                elements.imports.push(text)
            }
            StatementKind::Assign { .. }
            | StatementKind::AugAssign { .. }
            | StatementKind::AnnAssign { .. } => elements.globals.push(text),
            StatementKind::FunctionDef(def) => {
                elements.functions.insert(def.name.clone(), text);
            }
            _ => elements.others.push(text),
        }
    }
    debug!(
        functions = elements.functions.len(),
        imports = elements.imports.len(),
        "decomposed source"
    );
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"import math
from math import sqrt

RATE = 0.2

def get_price():
    return float(input("Enter price: "))

@staticmethod
def total(price):
    # tax included
    return price * (1 + RATE)

print(total(get_price()))
"#;

    #[test]
    fn test_classification() {
        let elements = decompose(SOURCE).unwrap();
        assert_eq!(elements.imports, vec!["import math", "from math import sqrt"]);
        assert_eq!(elements.globals, vec!["RATE = 0.2"]);
        assert_eq!(elements.others, vec!["print(total(get_price()))"]);
        assert_eq!(elements.function_names(), vec!["get_price", "total"]);
        assert_eq!(
            elements.function("total").unwrap(),
            "@staticmethod\ndef total(price):\n    # tax included\n    return price * (1 + RATE)"
        );
    }

    #[test]
    fn test_nested_functions_are_not_top_level() {
        let elements =
            decompose("def outer():\n    def inner():\n        return 1\n    return inner()\n")
                .unwrap();
        assert_eq!(elements.function_names(), vec!["outer"]);
    }

    #[test]
    fn test_redefinition_keeps_first_position() {
        let elements =
            decompose("def a():\n    return 1\ndef b():\n    return 2\ndef a():\n    return 3\n")
                .unwrap();
        assert_eq!(elements.function_names(), vec!["a", "b"]);
        assert_eq!(elements.function("a").unwrap(), "def a():\n    return 3");
    }

    #[test]
    fn test_context_without() {
        let elements = decompose(SOURCE).unwrap();
        let context = elements.context_without("total");
        assert!(context.contains("import math"));
        assert!(context.contains("def get_price"));
        assert!(!context.contains("def total"));
    }

    #[test]
    fn test_syntax_error() {
        let error = decompose("def broken(:\n    pass\n").unwrap_err();
        assert_eq!(error.line, 1);
    }
}
