use fnlab_core::{
    ExecutionRequest, PipelineError, SecretConfig, SystemConfig, ValueType, Workbench, config,
    schema::{FrontendType, InputSpec},
};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::should_run_external_api_tests;

const SOURCE: &str = r#"import math

TAX = 0.1

def add(a, b):
    return a + b

def with_tax():
    price = float(input("Enter price: "))
    qty = int(input("Quantity: "))
    print(f"Total: {price * qty * (1 + TAX):.2f}")

def greet():
    name = input("Name: ")
    print("Hello " + name)
"#;

fn canned_config() -> SystemConfig {
    let replies = json!({
        "transformer": {
            "kind": "canned",
            "canned_responses": [
                {
                    "pattern": "Rewrite the function `add`",
                    "reply": "{\"full_code\": \"def add(a, b):\\n    return a + b\", \"function_name\": \"add\", \"inputs\": [{\"name\": \"a\", \"type\": \"number\", \"python_type\": \"int\"}, {\"name\": \"b\", \"type\": \"number\", \"python_type\": \"int\"}]}"
                },
                {
                    "pattern": "Rewrite the function `with_tax`",
                    "reply": "```json\n{\"full_code\": \"TAX = 0.1\\n\\ndef with_tax(qty, price):\\n    return f'Total: {price * qty * (1 + TAX):.2f}'\", \"inputs\": [{\"name\": \"qty\", \"type\": \"text\", \"python_type\": \"str\"}, {\"name\": \"price\", \"type\": \"text\", \"description\": \"Price\", \"python_type\": \"str\"}]}\n```"
                }
            ]
        }
    });
    config::from_str(&replies.to_string()).unwrap()
}

fn values(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[tokio::test]
async fn test_add_end_to_end() {
    let bench = Workbench::from_config(&canned_config(), &SecretConfig::default());
    assert_eq!(bench.transformer_name(), "canned");

    let session = bench.submit(SOURCE).unwrap();
    assert_eq!(
        session.elements.function_names(),
        vec!["add", "with_tax", "greet"]
    );

    let analyzed = bench.analyze(&session.id, "add").await.unwrap();
    assert!(!analyzed.fallback);
    assert!(!analyzed.inputs.is_empty());

    let outcome = bench
        .run(ExecutionRequest {
            code: analyzed.full_code,
            inputs: Some(analyzed.inputs),
            values: values(&[("a", "2"), ("b", "3")]),
            entry_point: analyzed.entry_point,
        })
        .await
        .unwrap();
    assert_eq!(outcome.result, json!(5));
}

#[tokio::test]
async fn test_detected_types_override_declared_ones() {
    let bench = Workbench::from_config(&canned_config(), &SecretConfig::default());
    let session = bench.submit(SOURCE).unwrap();
    let analyzed = bench.analyze(&session.id, "with_tax").await.unwrap();

    // 順序ではなく名前で照合される
    assert_eq!(
        analyzed.inputs,
        vec![
            InputSpec::new("qty", ValueType::Int, "Quantity"),
            InputSpec::new("price", ValueType::Float, "Price"),
        ]
    );
    assert_eq!(analyzed.inputs[1].frontend_type, FrontendType::Number);

    let outcome = bench
        .run(ExecutionRequest {
            code: analyzed.full_code.clone(),
            inputs: Some(analyzed.inputs.clone()),
            values: values(&[("price", "10"), ("qty", "3")]),
            entry_point: analyzed.entry_point.clone(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.result, json!("Total: 33.00"));

    let rejected = bench
        .run(ExecutionRequest {
            code: analyzed.full_code,
            inputs: Some(analyzed.inputs),
            values: values(&[("price", "10"), ("qty", "abc")]),
            entry_point: analyzed.entry_point,
        })
        .await;
    assert_eq!(
        rejected,
        Err(PipelineError::Validation {
            field: "qty".to_string(),
            expected: "int".to_string(),
            value: "abc".to_string(),
        })
    );
}

#[tokio::test]
async fn test_unmatched_function_uses_fallback() {
    let bench = Workbench::from_config(&canned_config(), &SecretConfig::default());
    let session = bench.submit(SOURCE).unwrap();
    let analyzed = bench.analyze(&session.id, "greet").await.unwrap();
    assert!(analyzed.fallback);
    assert_eq!(
        analyzed.inputs,
        vec![InputSpec::new("input", ValueType::Str, "Input value")]
    );
    assert!(analyzed.full_code.starts_with("def greet():"));
}

#[tokio::test]
async fn test_untyped_run_picks_first_function() {
    let bench = Workbench::from_config(&SystemConfig::default(), &SecretConfig::default());
    let outcome = bench
        .run(ExecutionRequest {
            code: "def first(x):\n    return x * 2\n\ndef second(x):\n    return -x\n".to_string(),
            inputs: None,
            values: values(&[("x", "2.5")]),
            entry_point: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome.result, json!(5.0));
}

#[tokio::test]
async fn test_missing_parameter() {
    let bench = Workbench::from_config(&SystemConfig::default(), &SecretConfig::default());
    let result = bench
        .run(ExecutionRequest {
            code: "def add(a, b):\n    return a + b\n".to_string(),
            inputs: None,
            values: values(&[("a", "1")]),
            entry_point: Some("add".to_string()),
        })
        .await;
    assert_eq!(
        result,
        Err(PipelineError::MissingParameter {
            name: "b".to_string()
        })
    );
}

#[tokio::test]
async fn test_live_transformer() {
    if !should_run_external_api_tests() {
        return;
    }
    let Some(api_key) = std::env::var("FNLAB_API_KEY")
        .or_else(|_| std::env::var("GROQ_API_KEY"))
        .ok()
    else {
        println!("Skipping live transformer test: no API key");
        return;
    };
    let bench = Workbench::from_config(
        &SystemConfig::default(),
        &SecretConfig::with_api_key(api_key),
    );
    let session = bench.submit(SOURCE).unwrap();
    let analyzed = bench.analyze(&session.id, "add").await.unwrap();
    assert!(analyzed.inputs.iter().any(|input| input.name == "a"));
}
