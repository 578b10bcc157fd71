//! Turns raw model output into a valid [`TransformResult`].
//!
//! Strategies run in order until one yields a value that validates:
//! fenced/direct JSON, the outermost `{...}` in surrounding prose, and finally
//! field-by-field extraction of `full_code` and `inputs`. When none works the
//! deterministic fallback is returned.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, warn};

use super::TransformResponse;
use crate::analyzer::Program;
use crate::ast::StatementKind;
use crate::detector::DetectedInput;
use crate::schema::{InputSpec, TransformResult};

lazy_static! {
    static ref FENCED_REGEX: Regex =
        Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\n?(.*?)\s*```\s*$").unwrap();
    static ref BRACE_JSON_REGEX: Regex = Regex::new(r"(?s)(\{.*\})").unwrap();
    static ref FULL_CODE_REGEX: Regex =
        Regex::new(r#"(?s)"full_code"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap();
    static ref INPUTS_REGEX: Regex =
        Regex::new(r#"(?s)"inputs"\s*:\s*(\[.*?\])\s*(?:,\s*"|\}|$)"#).unwrap();
    static ref FUNCTION_NAME_REGEX: Regex =
        Regex::new(r#""function_name"\s*:\s*"([A-Za-z_][A-Za-z0-9_]*)""#).unwrap();
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("no JSON object found")]
    NoJsonObject,
    #[error("invalid JSON: {0}")]
    Parse(String),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

type Strategy = fn(&str) -> Result<Json, NormalizeError>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("outer_object", parse_outer_object),
    ("field_extraction", extract_fields),
];

/// Removes a surrounding ```` ```json ```` fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    match FENCED_REGEX.captures(text).and_then(|captures| captures.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Escapes raw control characters that appear inside JSON string literals.
pub fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

fn parse_json(text: &str) -> Result<Json, NormalizeError> {
    serde_json::from_str(&escape_control_chars(text)).map_err(|e| NormalizeError::Parse(e.to_string()))
}

fn parse_direct(text: &str) -> Result<Json, NormalizeError> {
    parse_json(strip_code_fences(text))
}

fn parse_outer_object(text: &str) -> Result<Json, NormalizeError> {
    let object = BRACE_JSON_REGEX
        .captures(text)
        .and_then(|captures| captures.get(1))
        .ok_or(NormalizeError::NoJsonObject)?;
    parse_json(object.as_str())
}

fn extract_fields(text: &str) -> Result<Json, NormalizeError> {
    let full_code = FULL_CODE_REGEX
        .captures(text)
        .and_then(|captures| captures.get(1))
        .ok_or(NormalizeError::MissingField("full_code"))?;
    let full_code = parse_json(&format!("\"{}\"", full_code.as_str()))?;
    let inputs = INPUTS_REGEX
        .captures(text)
        .and_then(|captures| captures.get(1))
        .ok_or(NormalizeError::MissingField("inputs"))?;
    let inputs = parse_json(inputs.as_str())?;
    let mut object = serde_json::Map::new();
    object.insert("full_code".to_string(), full_code);
    object.insert("inputs".to_string(), inputs);
    if let Some(name) = FUNCTION_NAME_REGEX.captures(text).and_then(|c| c.get(1)) {
        object.insert("function_name".to_string(), Json::from(name.as_str()));
    }
    Ok(Json::Object(object))
}

/// A model answer that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub full_code: String,
    pub inputs: Vec<InputSpec>,
    pub function_name: Option<String>,
}

pub fn validate(value: &Json) -> Result<Validated, NormalizeError> {
    let object = value.as_object().ok_or(NormalizeError::NoJsonObject)?;
    let full_code = object
        .get("full_code")
        .ok_or(NormalizeError::MissingField("full_code"))?
        .as_str()
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| NormalizeError::InvalidField {
            field: "full_code",
            reason: "expected a non-empty string".to_string(),
        })?;
    let entries = object
        .get("inputs")
        .ok_or(NormalizeError::MissingField("inputs"))?
        .as_array()
        .ok_or_else(|| NormalizeError::InvalidField {
            field: "inputs",
            reason: "expected a list".to_string(),
        })?;

    let mut seen = HashSet::new();
    let mut inputs = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut spec: InputSpec =
            serde_json::from_value(entry.clone()).map_err(|e| NormalizeError::InvalidField {
                field: "inputs",
                reason: e.to_string(),
            })?;
        spec.name = spec.name.trim().to_string();
        if entry.get("type").is_none() {
            spec.frontend_type = spec.python_type.frontend();
        }
        if spec.name.is_empty() || !seen.insert(spec.name.clone()) {
            return Err(NormalizeError::InvalidField {
                field: "inputs",
                reason: format!("input names must be non-empty and unique: '{}'", spec.name),
            });
        }
        if spec.description.trim().is_empty() {
            spec.description = format!("Value for {}", spec.name);
        }
        inputs.push(spec);
    }

    let function_name = object
        .get("function_name")
        .and_then(Json::as_str)
        .map(str::to_string);
    Ok(Validated {
        full_code: full_code.to_string(),
        inputs,
        function_name,
    })
}

/// Names of the top-level functions in `code`; empty if it does not parse.
pub fn defined_functions(code: &str) -> Vec<String> {
    let Ok(program) = Program::parse(code) else {
        return Vec::new();
    };
    program
        .module()
        .body
        .iter()
        .filter_map(|statement| match &statement.kind {
            StatementKind::FunctionDef(def) => Some(def.name.clone()),
            _ => None,
        })
        .collect()
}

/// `hint` when `code` defines it, else the first function `code` defines.
pub fn resolve_entry_point(code: &str, hint: Option<&str>) -> Option<String> {
    let defined = defined_functions(code);
    match hint {
        Some(hint) if defined.iter().any(|name| name == hint) => Some(hint.to_string()),
        _ => defined.into_iter().next(),
    }
}

/// Builds the result for `function_name` from the transformer's response.
pub fn normalize(
    response: &TransformResponse,
    function_name: &str,
    function_source: &str,
) -> TransformResult {
    let fallback = || {
        TransformResult::fallback(
            function_source,
            resolve_entry_point(function_source, Some(function_name)),
        )
    };
    let raw = match response {
        Ok(raw) => raw,
        Err(error) => {
            warn!(%error, function = function_name, "transformer failed, using fallback");
            return fallback();
        }
    };

    let mut failures = Vec::new();
    for (name, strategy) in STRATEGIES {
        match strategy(raw).and_then(|value| validate(&value)) {
            Ok(validated) => {
                debug!(strategy = name, inputs = validated.inputs.len(), "normalized response");
                let hint = validated.function_name.as_deref().or(Some(function_name));
                let entry_point = resolve_entry_point(&validated.full_code, hint);
                return TransformResult {
                    full_code: validated.full_code,
                    inputs: validated.inputs,
                    entry_point,
                    fallback: false,
                };
            }
            Err(error) => failures.push(format!("{name}: {error}")),
        }
    }
    warn!(
        function = function_name,
        failures = ?failures,
        "could not normalize transformer output, using fallback"
    );
    fallback()
}

/// Replaces declared value types with the ones detected in the original
/// function, matching by parameter name.
pub fn reconcile(result: &mut TransformResult, detected: &[DetectedInput]) {
    for spec in &mut result.inputs {
        let Some(found) = detected.iter().find(|input| input.name == spec.name) else {
            continue;
        };
        if spec.python_type != found.value_type {
            debug!(
                input = %spec.name,
                declared = %spec.python_type,
                detected = %found.value_type,
                "reconciled input type"
            );
        }
        spec.retype(found.value_type);
        if let Some(prompt) = &found.prompt {
            if spec.description == format!("Value for {}", spec.name) && !prompt.is_empty() {
                spec.description = prompt.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FrontendType, ValueType};
    use crate::transformer::TransformError;
    use pretty_assertions::assert_eq;

    const FUNCTION: &str = "def area():\n    r = float(input('Radius: '))\n    print(3.14 * r * r)";

    fn ok(text: &str) -> TransformResponse {
        Ok(text.to_string())
    }

    #[test]
    fn test_fenced_json_with_raw_newlines() {
        let raw = "```json\n{\"full_code\": \"def area(r):\n    return 3.14 * r * r\", \"inputs\": [{\"name\": \"r\", \"type\": \"number\", \"python_type\": \"float\"}]}\n```";
        let result = normalize(&ok(raw), "area", FUNCTION);
        assert!(!result.fallback);
        assert_eq!(result.full_code, "def area(r):\n    return 3.14 * r * r");
        assert_eq!(result.entry_point.as_deref(), Some("area"));
        assert_eq!(result.inputs[0].description, "Value for r");
        assert_eq!(result.inputs[0].python_type, ValueType::Float);
    }

    #[test]
    fn test_object_inside_prose() {
        let raw = "Sure! Here it is:\n{\"full_code\": \"def f(x):\\n    return x\", \"inputs\": [{\"name\": \"x\"}]}\nHope this helps.";
        let result = normalize(&ok(raw), "f", "def f():\n    print(input())");
        assert!(!result.fallback);
        assert_eq!(result.inputs[0].frontend_type, FrontendType::Text);
        assert_eq!(result.inputs[0].python_type, ValueType::Str);
    }

    #[test]
    fn test_field_extraction_from_broken_json() {
        let raw = r#"{"full_code": "def g(n):\n    return n * 2", "inputs": [{"name": "n", "type": "number", "python_type": "int"}], "notes": oops}"#;
        assert!(parse_direct(raw).is_err());
        let result = normalize(&ok(raw), "g", "def g():\n    pass");
        assert!(!result.fallback);
        assert_eq!(result.full_code, "def g(n):\n    return n * 2");
        assert_eq!(result.inputs, vec![InputSpec::new("n", ValueType::Int, "Value for n")]);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let raw = ok("I cannot help with that");
        let first = normalize(&raw, "area", FUNCTION);
        let second = normalize(&raw, "area", FUNCTION);
        assert_eq!(first, second);
        assert!(first.fallback);
        assert_eq!(first.full_code, FUNCTION);
        assert_eq!(first.entry_point.as_deref(), Some("area"));
    }

    #[test]
    fn test_transport_error_falls_back() {
        let result = normalize(
            &Err(TransformError::Authentication("no key".to_string())),
            "area",
            FUNCTION,
        );
        assert!(result.fallback);
    }

    #[test]
    fn test_validation_failures_fall_back() {
        for raw in [
            r#"{"full_code": "", "inputs": []}"#,
            r#"{"full_code": "def f(): pass", "inputs": {}}"#,
            r#"{"full_code": "def f(): pass"}"#,
            r#"{"full_code": "def f(a, a): pass", "inputs": [{"name": "a"}, {"name": "a"}]}"#,
            r#"{"full_code": "def f(): pass", "inputs": [{"name": ""}]}"#,
            r#"[1, 2, 3]"#,
        ] {
            assert!(normalize(&ok(raw), "f", "def f(): pass").fallback, "{raw}");
        }
    }

    #[test]
    fn test_entry_point_resolution() {
        let code = "def helper(x):\n    return x\n\ndef main(a):\n    return helper(a)\n";
        assert_eq!(resolve_entry_point(code, Some("main")).as_deref(), Some("main"));
        assert_eq!(resolve_entry_point(code, Some("missing")).as_deref(), Some("helper"));
        assert_eq!(resolve_entry_point(code, None).as_deref(), Some("helper"));
        assert_eq!(resolve_entry_point("x = 1\n", None), None);
        assert_eq!(resolve_entry_point("def (", None), None);
    }

    #[test]
    fn test_function_name_field_selects_entry_point() {
        let raw = r#"{"full_code": "def helper():\n    return 1\n\ndef run(a):\n    return a", "function_name": "run", "inputs": [{"name": "a"}]}"#;
        let result = normalize(&ok(raw), "original", "def original(): pass");
        assert_eq!(result.entry_point.as_deref(), Some("run"));
    }

    #[test]
    fn test_reconcile_by_name() {
        let mut result = TransformResult {
            full_code: "def f(qty, price): pass".to_string(),
            inputs: vec![
                InputSpec::new("qty", ValueType::Str, "Value for qty"),
                InputSpec::new("price", ValueType::Str, "Unit price"),
            ],
            entry_point: Some("f".to_string()),
            fallback: false,
        };
        let detected = vec![
            DetectedInput {
                name: "price".to_string(),
                value_type: ValueType::Float,
                prompt: Some("Price".to_string()),
            },
            DetectedInput {
                name: "qty".to_string(),
                value_type: ValueType::Int,
                prompt: Some("Quantity".to_string()),
            },
        ];
        reconcile(&mut result, &detected);
        assert_eq!(result.inputs[0].python_type, ValueType::Int);
        assert_eq!(result.inputs[0].frontend_type, FrontendType::Number);
        assert_eq!(result.inputs[0].description, "Quantity");
        assert_eq!(result.inputs[1].python_type, ValueType::Float);
        assert_eq!(result.inputs[1].description, "Unit price");
    }

    #[test]
    fn test_escape_control_chars_only_inside_strings() {
        assert_eq!(
            escape_control_chars("{\n\"a\": \"x\ty\\\"\n\"}"),
            "{\n\"a\": \"x\\ty\\\"\\n\"}"
        );
    }
}
