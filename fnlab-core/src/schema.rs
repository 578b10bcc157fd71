//! Typed contract between the transformer, the coercer and the HTTP surface.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};
use utoipa::ToSchema;

/// Python value type a parameter is converted to before the call.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

impl ValueType {
    /// Accepts the canonical names and common aliases; unknown names are `None`.
    pub fn parse_lenient(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "str" | "string" | "text" => Some(ValueType::Str),
            "int" | "integer" | "long" => Some(ValueType::Int),
            "float" | "double" | "decimal" | "real" | "number" => Some(ValueType::Float),
            "bool" | "boolean" => Some(ValueType::Bool),
            _ => None,
        }
    }

    /// Form widget used for this value type.
    pub fn frontend(self) -> FrontendType {
        match self {
            ValueType::Int | ValueType::Float => FrontendType::Number,
            ValueType::Str | ValueType::Bool => FrontendType::Text,
        }
    }
}

impl From<String> for ValueType {
    fn from(name: String) -> Self {
        ValueType::parse_lenient(&name).unwrap_or_default()
    }
}

/// Form widget type shown to the user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase", from = "String")]
#[strum(serialize_all = "lowercase")]
pub enum FrontendType {
    #[default]
    Text,
    Number,
    Image,
}

impl FrontendType {
    pub fn parse_lenient(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" | "string" | "str" | "textarea" => Some(FrontendType::Text),
            "number" | "numeric" | "int" | "integer" | "float" | "double" => {
                Some(FrontendType::Number)
            }
            "image" | "img" | "file" | "upload" | "photo" => Some(FrontendType::Image),
            _ => None,
        }
    }
}

impl From<String> for FrontendType {
    fn from(name: String) -> Self {
        FrontendType::parse_lenient(&name).unwrap_or_default()
    }
}

/// One parameter of a transformed function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InputSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub frontend_type: FrontendType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub python_type: ValueType,
}

impl InputSpec {
    pub fn new(name: impl Into<String>, python_type: ValueType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frontend_type: python_type.frontend(),
            description: description.into(),
            python_type,
        }
    }

    /// Changes the value type, keeping an `image` widget as is.
    pub fn retype(&mut self, python_type: ValueType) {
        self.python_type = python_type;
        if self.frontend_type != FrontendType::Image {
            self.frontend_type = python_type.frontend();
        }
    }
}

/// Output of the transformer after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransformResult {
    pub full_code: String,
    pub inputs: Vec<InputSpec>,
    pub entry_point: Option<String>,
    /// The deterministic fallback was used instead of the model's answer.
    #[serde(default)]
    pub fallback: bool,
}

impl TransformResult {
    pub const FALLBACK_INPUT: &'static str = "input";

    /// Original function text with a single untyped `input` parameter.
    pub fn fallback(function_source: &str, entry_point: Option<String>) -> Self {
        Self {
            full_code: function_source.to_string(),
            inputs: vec![InputSpec::new(
                Self::FALLBACK_INPUT,
                ValueType::Str,
                "Input value",
            )],
            entry_point,
            fallback: true,
        }
    }
}

/// One `/test` submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionRequest {
    pub code: String,
    /// `None` selects untyped coercion.
    pub inputs: Option<Vec<InputSpec>>,
    /// Raw submitted values keyed by parameter name.
    pub values: IndexMap<String, String>,
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionOutcome {
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
    pub stdout: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_lenient_aliases() {
        assert_eq!(ValueType::parse_lenient("Integer"), Some(ValueType::Int));
        assert_eq!(ValueType::parse_lenient(" double "), Some(ValueType::Float));
        assert_eq!(ValueType::parse_lenient("boolean"), Some(ValueType::Bool));
        assert_eq!(ValueType::parse_lenient("list"), None);
        assert_eq!(FrontendType::parse_lenient("file"), Some(FrontendType::Image));
        assert_eq!(FrontendType::parse_lenient("text/image/number"), None);
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for value_type in ValueType::iter() {
            assert_eq!(ValueType::parse_lenient(value_type.as_ref()), Some(value_type));
        }
        for frontend in FrontendType::iter() {
            assert_eq!(FrontendType::parse_lenient(frontend.as_ref()), Some(frontend));
        }
    }

    #[test]
    fn test_input_spec_json_keys() {
        let spec = InputSpec::new("price", ValueType::Float, "Enter price");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "name": "price",
                "type": "number",
                "description": "Enter price",
                "python_type": "float"
            })
        );
    }

    #[test]
    fn test_input_spec_defaults_and_aliases() {
        let spec: InputSpec =
            serde_json::from_value(json!({ "name": "n", "type": "integer", "python_type": "integer" }))
                .unwrap();
        assert_eq!(spec.frontend_type, FrontendType::Number);
        assert_eq!(spec.python_type, ValueType::Int);
        let spec: InputSpec = serde_json::from_value(json!({ "name": "n" })).unwrap();
        assert_eq!(spec.frontend_type, FrontendType::Text);
        assert_eq!(spec.python_type, ValueType::Str);
        assert_eq!(spec.description, "");
    }

    #[test]
    fn test_retype_keeps_image() {
        let mut spec = InputSpec::new("photo", ValueType::Str, "");
        spec.frontend_type = FrontendType::Image;
        spec.retype(ValueType::Int);
        assert_eq!(spec.frontend_type, FrontendType::Image);
        let mut spec = InputSpec::new("n", ValueType::Str, "");
        spec.retype(ValueType::Int);
        assert_eq!(spec.frontend_type, FrontendType::Number);
    }

    #[test]
    fn test_fallback_shape() {
        let fallback = TransformResult::fallback("def f(): pass", None);
        assert!(fallback.fallback);
        assert_eq!(
            fallback.inputs,
            vec![InputSpec {
                name: "input".to_string(),
                frontend_type: FrontendType::Text,
                description: "Input value".to_string(),
                python_type: ValueType::Str,
            }]
        );
    }
}
