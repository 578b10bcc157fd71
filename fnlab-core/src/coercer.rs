//! Converts submitted form values into typed arguments.

use indexmap::IndexMap;

use crate::error::{PipelineError, PipelineResult};
use crate::eval::Value;
use crate::schema::{InputSpec, ValueType};

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];

/// A coerced argument. Plain data so it can cross into the executor thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Coerced {
    pub fn value_type(&self) -> ValueType {
        match self {
            Coerced::Str(_) => ValueType::Str,
            Coerced::Int(_) => ValueType::Int,
            Coerced::Float(_) => ValueType::Float,
            Coerced::Bool(_) => ValueType::Bool,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Coerced::Str(s) => Value::from(s),
            Coerced::Int(i) => Value::from(i),
            Coerced::Float(f) => Value::from(f),
            Coerced::Bool(b) => Value::from(b),
        }
    }
}

pub type CoercedInputs = IndexMap<String, Coerced>;

fn parse_int(raw: &str) -> Option<i64> {
    let text = raw.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(i);
    }
    // "3.0" is accepted as 3
    let f = text.parse::<f64>().ok()?;
    let integral = f.is_finite() && f.fract() == 0.0;
    (integral && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok()
}

/// Converts one raw value to `value_type`.
pub fn coerce_value(field: &str, raw: &str, value_type: ValueType) -> PipelineResult<Coerced> {
    let invalid = || PipelineError::Validation {
        field: field.to_string(),
        expected: value_type.to_string(),
        value: raw.to_string(),
    };
    match value_type {
        ValueType::Str => Ok(Coerced::Str(raw.to_string())),
        ValueType::Int => parse_int(raw).map(Coerced::Int).ok_or_else(invalid),
        ValueType::Float => parse_float(raw).map(Coerced::Float).ok_or_else(invalid),
        ValueType::Bool => {
            let word = raw.trim().to_ascii_lowercase();
            Ok(Coerced::Bool(TRUE_WORDS.contains(&word.as_str())))
        }
    }
}

/// Guesses the type of a value submitted without a schema: integer literal,
/// then finite float literal, otherwise text. Unlike a declared `str`,
/// numeric text becomes a number here.
pub fn coerce_untyped(raw: &str) -> Coerced {
    let text = raw.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Coerced::Int(i);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Coerced::Float(f),
        _ => Coerced::Str(raw.to_string()),
    }
}

/// Coerces every submitted value. Values without a declaration stay text;
/// without any declaration list the untyped rules apply.
pub fn coerce_inputs(
    specs: Option<&[InputSpec]>,
    values: &IndexMap<String, String>,
) -> PipelineResult<CoercedInputs> {
    values
        .iter()
        .map(|(name, raw)| {
            let coerced = match specs {
                None => coerce_untyped(raw),
                Some(specs) => match specs.iter().find(|spec| &spec.name == name) {
                    Some(spec) => coerce_value(name, raw, spec.python_type)?,
                    None => Coerced::Str(raw.clone()),
                },
            };
            Ok((name.clone(), coerced))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_declared_types() {
        assert_eq!(coerce_value("n", " 42 ", ValueType::Int), Ok(Coerced::Int(42)));
        assert_eq!(coerce_value("n", "3.0", ValueType::Int), Ok(Coerced::Int(3)));
        assert_eq!(coerce_value("x", "2.5", ValueType::Float), Ok(Coerced::Float(2.5)));
        assert_eq!(coerce_value("x", "7", ValueType::Float), Ok(Coerced::Float(7.0)));
        assert_eq!(coerce_value("s", " a b ", ValueType::Str), Ok(Coerced::Str(" a b ".into())));
        assert_eq!(Coerced::Float(7.0).value_type(), ValueType::Float);
        assert_eq!(coerce_untyped("12").value_type(), ValueType::Int);
        for word in ["true", "TRUE", "1", "Yes", "on"] {
            assert_eq!(coerce_value("b", word, ValueType::Bool), Ok(Coerced::Bool(true)));
        }
        for word in ["false", "0", "no", "maybe", ""] {
            assert_eq!(coerce_value("b", word, ValueType::Bool), Ok(Coerced::Bool(false)));
        }
    }

    #[test]
    fn test_invalid_int_names_the_field() {
        assert_eq!(
            coerce_value("age", "abc", ValueType::Int),
            Err(PipelineError::Validation {
                field: "age".to_string(),
                expected: "int".to_string(),
                value: "abc".to_string(),
            })
        );
        assert!(coerce_value("age", "3.5", ValueType::Int).is_err());
        assert!(coerce_value("x", "", ValueType::Float).is_err());
    }

    #[test]
    fn test_undeclared_values_stay_text() {
        let specs = vec![InputSpec::new("a", ValueType::Int, "A")];
        let mut values = IndexMap::new();
        values.insert("a".to_string(), "2".to_string());
        values.insert("extra".to_string(), "3".to_string());
        let coerced = coerce_inputs(Some(&specs), &values).unwrap();
        assert_eq!(coerced["a"], Coerced::Int(2));
        assert_eq!(coerced["extra"], Coerced::Str("3".to_string()));
    }

    #[test]
    fn test_untyped_mode() {
        let mut values = IndexMap::new();
        values.insert("a".to_string(), "2".to_string());
        values.insert("b".to_string(), "2.5".to_string());
        values.insert("c".to_string(), "hello".to_string());
        values.insert("d".to_string(), "inf".to_string());
        let coerced = coerce_inputs(None, &values).unwrap();
        assert_eq!(
            coerced.values().cloned().collect::<Vec<_>>(),
            vec![
                Coerced::Int(2),
                Coerced::Float(2.5),
                Coerced::Str("hello".to_string()),
                Coerced::Str("inf".to_string()),
            ]
        );
    }

    #[test]
    fn test_first_failure_stops_coercion() {
        let specs = vec![
            InputSpec::new("a", ValueType::Int, "A"),
            InputSpec::new("b", ValueType::Float, "B"),
        ];
        let mut values = IndexMap::new();
        values.insert("a".to_string(), "1".to_string());
        values.insert("b".to_string(), "x".to_string());
        let error = coerce_inputs(Some(&specs), &values).unwrap_err();
        assert!(matches!(error, PipelineError::Validation { ref field, .. } if field == "b"));
    }

    proptest! {
        #[test]
        fn test_canonical_values_are_stable(i in any::<i64>(), f in -1e12f64..1e12, s in ".*") {
            prop_assert_eq!(coerce_value("i", &i.to_string(), ValueType::Int).unwrap(), Coerced::Int(i));
            prop_assert_eq!(coerce_value("f", &f.to_string(), ValueType::Float).unwrap(), Coerced::Float(f));
            prop_assert_eq!(coerce_value("s", &s, ValueType::Str).unwrap(), Coerced::Str(s.clone()));
            prop_assert_eq!(coerce_untyped(&i.to_string()), Coerced::Int(i));
            if let Coerced::Str(text) = coerce_untyped(&s) {
                prop_assert_eq!(coerce_untyped(&text), Coerced::Str(text.clone()));
            }
        }
    }
}
