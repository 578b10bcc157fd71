//! Finds interactive-input assignments such as `price = float(input("Price: "))`.

use crate::analyzer::{Program, SyntaxError};
use crate::ast::{Argument, Constant, Expression, Statement, StatementKind};
use crate::schema::ValueType;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectedInput {
    pub name: String,
    pub value_type: ValueType,
    pub prompt: Option<String>,
}

/// Detects inputs in every function of `source`, in first-seen order.
pub fn detect_inputs(source: &str) -> Result<Vec<DetectedInput>, SyntaxError> {
    let program = Program::parse(source)?;
    let mut found = Vec::new();
    for statement in &program.module().body {
        match &statement.kind {
            StatementKind::FunctionDef(def) => walk(&def.body, &mut found),
            _ => walk(std::slice::from_ref(statement), &mut found),
        }
    }
    Ok(found)
}

fn walk(block: &[Statement], found: &mut Vec<DetectedInput>) {
    for statement in block {
        match &statement.kind {
            StatementKind::Assign { targets, value } => {
                if let [Expression::Name(name)] = targets.as_slice() {
                    record(name, value, found);
                }
            }
            StatementKind::AnnAssign {
                target: Expression::Name(name),
                value: Some(value),
                ..
            } => record(name, value, found),
            StatementKind::If { branches, orelse } => {
                for (_, body) in branches {
                    walk(body, found);
                }
                walk(orelse, found);
            }
            StatementKind::While { body, orelse, .. } | StatementKind::For { body, orelse, .. } => {
                walk(body, found);
                walk(orelse, found);
            }
            StatementKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                walk(body, found);
                for handler in handlers {
                    walk(&handler.body, found);
                }
                walk(orelse, found);
                walk(finalbody, found);
            }
            StatementKind::With { body, .. } => walk(body, found),
            _ => {}
        }
    }
}

fn record(name: &str, value: &Expression, found: &mut Vec<DetectedInput>) {
    if found.iter().any(|input| input.name == name) {
        return;
    }
    if let Some((value_type, prompt)) = classify(value) {
        found.push(DetectedInput {
            name: name.to_string(),
            value_type,
            prompt,
        });
    }
}

/// `input(p)` → str, `int(input(p))` → int, `float(input(p))` → float.
fn classify(value: &Expression) -> Option<(ValueType, Option<String>)> {
    let (callee, args) = call_parts(value)?;
    if callee == "input" {
        return Some((ValueType::Str, prompt_of(args)));
    }
    let value_type = match callee {
        "int" => ValueType::Int,
        "float" => ValueType::Float,
        "str" => ValueType::Str,
        _ => return None,
    };
    let [Argument::Positional(inner)] = args else {
        return None;
    };
    match call_parts(inner)? {
        ("input", inner_args) => Some((value_type, prompt_of(inner_args))),
        _ => None,
    }
}

fn call_parts(expression: &Expression) -> Option<(&str, &[Argument])> {
    match expression {
        Expression::Call { func, args } => match func.as_ref() {
            Expression::Name(name) => Some((name.as_str(), args.as_slice())),
            _ => None,
        },
        _ => None,
    }
}

fn prompt_of(args: &[Argument]) -> Option<String> {
    match args.first() {
        Some(Argument::Positional(Expression::Constant(Constant::Str(prompt)))) => {
            Some(prompt.trim().trim_end_matches(':').trim().to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detects_typed_inputs() {
        let source = r#"def checkout():
    price = float(input("Enter price: "))
    qty = int(input("Quantity"))
    name = input()
    if qty > 1:
        note = input("Note: ")
    print(price * qty, name, note)
"#;
        let found = detect_inputs(source).unwrap();
        assert_eq!(
            found,
            vec![
                DetectedInput {
                    name: "price".to_string(),
                    value_type: ValueType::Float,
                    prompt: Some("Enter price".to_string()),
                },
                DetectedInput {
                    name: "qty".to_string(),
                    value_type: ValueType::Int,
                    prompt: Some("Quantity".to_string()),
                },
                DetectedInput {
                    name: "name".to_string(),
                    value_type: ValueType::Str,
                    prompt: None,
                },
                DetectedInput {
                    name: "note".to_string(),
                    value_type: ValueType::Str,
                    prompt: Some("Note".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_first_assignment_wins_and_other_calls_are_ignored() {
        let source = "def f():\n    x = int(input('a'))\n    x = float(input('b'))\n    y = len(input())\n    z = int('3')\n";
        let found = detect_inputs(source).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value_type, ValueType::Int);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(detect_inputs("def f(:\n").is_err());
    }
}
