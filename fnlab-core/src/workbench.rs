//! Entry point of the pipeline: submit, analyze and run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coercer::coerce_inputs;
use crate::config::{SecretConfig, SystemConfig};
use crate::decomposer::decompose;
use crate::detector::detect_inputs;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::Executor;
use crate::schema::{ExecutionOutcome, ExecutionRequest, TransformResult};
use crate::session::{Session, SessionStore};
use crate::transformer::normalizer::{normalize, reconcile};
use crate::transformer::{CodeTransformer, TransformRequest, build_transformer};

pub struct Workbench {
    sessions: SessionStore,
    transformer: Arc<dyn CodeTransformer>,
    executor: Executor,
    max_source_bytes: usize,
}

impl Workbench {
    pub fn new(config: &SystemConfig, transformer: Arc<dyn CodeTransformer>) -> Self {
        Self {
            sessions: SessionStore::new(&config.session),
            transformer,
            executor: Executor::new(config.sandbox.clone()),
            max_source_bytes: config.max_source_bytes,
        }
    }

    /// Builds the configured transformer from `secret`.
    pub fn from_config(config: &SystemConfig, secret: &SecretConfig) -> Self {
        Self::new(config, build_transformer(&config.transformer, secret))
    }

    pub fn transformer_name(&self) -> &str {
        self.transformer.name()
    }

    fn check_size(&self, field: &str, code: &str) -> PipelineResult<()> {
        if code.len() > self.max_source_bytes {
            return Err(PipelineError::Validation {
                field: field.to_string(),
                expected: format!("at most {} bytes", self.max_source_bytes),
                value: format!("{} bytes", code.len()),
            });
        }
        Ok(())
    }

    /// Decomposes `code` and stores it as a new session.
    #[tracing::instrument(skip(self, code), fields(bytes = code.len()))]
    pub fn submit(&self, code: &str) -> PipelineResult<Arc<Session>> {
        self.check_size("code", code)?;
        let elements = decompose(code)?;
        let session = self.sessions.insert(Session::new(code, elements));
        info!(
            session = %session.id,
            functions = session.elements.functions.len(),
            "session created"
        );
        Ok(session)
    }

    /// Transforms one function of a session. Transformer problems end in the
    /// fallback result; only unknown sessions and functions are errors.
    #[tracing::instrument(skip(self))]
    pub async fn analyze(&self, uid: &str, function_name: &str) -> PipelineResult<TransformResult> {
        let session = self
            .sessions
            .get(uid)
            .ok_or_else(|| PipelineError::NotFound(format!("Session not found: {uid}")))?;
        let function_source = session.elements.function(function_name).ok_or_else(|| {
            PipelineError::NotFound(format!("Function not found: {function_name}"))
        })?;

        let request = TransformRequest {
            function_name: function_name.to_string(),
            function_source: function_source.to_string(),
            context: session.elements.context_without(function_name),
        };
        let response = self.transformer.transform(&request).await;
        let mut result = normalize(&response, function_name, function_source);
        if !result.fallback {
            match detect_inputs(function_source) {
                Ok(detected) => reconcile(&mut result, &detected),
                Err(error) => warn!(%error, "input detection failed"),
            }
        }
        info!(
            inputs = result.inputs.len(),
            fallback = result.fallback,
            entry_point = ?result.entry_point,
            "function analyzed"
        );
        Ok(result)
    }

    /// Coerces the submitted values and executes the code.
    #[tracing::instrument(skip(self, request), fields(entry_point = ?request.entry_point))]
    pub async fn run(&self, request: ExecutionRequest) -> PipelineResult<ExecutionOutcome> {
        self.check_size("full_code", &request.code)?;
        let inputs = coerce_inputs(request.inputs.as_deref(), &request.values)?;
        debug!(
            inputs = ?inputs
                .iter()
                .map(|(name, value)| (name.as_str(), value.value_type()))
                .collect::<Vec<_>>(),
            "coerced inputs"
        );
        self.executor
            .execute(request.code, inputs, request.entry_point)
            .await
    }

    pub fn session_count(&self) -> u64 {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InputSpec, ValueType};
    use crate::transformer::{MockCodeTransformer, TransformError};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SOURCE: &str = "import math\n\nRATE = 2\n\ndef area():\n    r = float(input('Radius: '))\n    print(math.pi * r * r)\n\ndef double(x):\n    return x * RATE\n";

    fn workbench(reply: Result<&'static str, TransformError>) -> Workbench {
        let mut mock = MockCodeTransformer::new();
        mock.expect_transform()
            .returning(move |_| reply.clone().map(str::to_string));
        Workbench::new(&SystemConfig::default(), Arc::new(mock))
    }

    #[test]
    fn test_submit() {
        let bench = workbench(Err(TransformError::EmptyResponse));
        let session = bench.submit(SOURCE).unwrap();
        assert_eq!(session.elements.function_names(), vec!["area", "double"]);
        assert_eq!(bench.session_count(), 1);
        assert!(matches!(bench.submit("def broken(:\n"), Err(PipelineError::Syntax(_))));
        assert_eq!(bench.session_count(), 1);
    }

    #[tokio::test]
    async fn test_analyze_reconciles_types() {
        let bench = workbench(Ok(
            r#"{"full_code": "import math\n\ndef area(r):\n    return math.pi * r * r", "function_name": "area", "inputs": [{"name": "r", "type": "text", "python_type": "str"}]}"#,
        ));
        let session = bench.submit(SOURCE).unwrap();
        let result = bench.analyze(&session.id, "area").await.unwrap();
        assert!(!result.fallback);
        assert_eq!(result.entry_point.as_deref(), Some("area"));
        assert_eq!(result.inputs, vec![InputSpec::new("r", ValueType::Float, "Radius")]);
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_transformer_error() {
        let bench = workbench(Err(TransformError::Timeout(std::time::Duration::from_secs(1))));
        let session = bench.submit(SOURCE).unwrap();
        let result = bench.analyze(&session.id, "double").await.unwrap();
        assert!(result.fallback);
        assert_eq!(result.full_code, "def double(x):\n    return x * RATE");
        assert_eq!(result.entry_point.as_deref(), Some("double"));
    }

    #[tokio::test]
    async fn test_analyze_not_found() {
        let bench = workbench(Err(TransformError::EmptyResponse));
        let session = bench.submit(SOURCE).unwrap();
        assert!(matches!(
            bench.analyze("missing", "area").await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            bench.analyze(&session.id, "missing").await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_run_validates_before_executing() {
        let bench = workbench(Err(TransformError::EmptyResponse));
        let mut values = IndexMap::new();
        values.insert("a".to_string(), "abc".to_string());
        let request = ExecutionRequest {
            code: "def f(a):\n    print('ran')\n    return a\n".to_string(),
            inputs: Some(vec![InputSpec::new("a", ValueType::Int, "A")]),
            values,
            entry_point: None,
        };
        assert!(matches!(
            bench.run(request.clone()).await,
            Err(PipelineError::Validation { ref field, .. }) if field == "a"
        ));

        let mut ok = request;
        ok.values.insert("a".to_string(), "7".to_string());
        let outcome = bench.run(ok).await.unwrap();
        assert_eq!(outcome.result, json!(7));
        assert_eq!(outcome.stdout, "ran\n");
    }

    #[test]
    fn test_source_size_limit() {
        let config = SystemConfig {
            max_source_bytes: 8,
            ..SystemConfig::default()
        };
        let bench = Workbench::new(&config, Arc::new(MockCodeTransformer::new()));
        assert!(matches!(
            bench.submit("def f():\n    pass\n"),
            Err(PipelineError::Validation { ref field, .. }) if field == "code"
        ));
    }
}
