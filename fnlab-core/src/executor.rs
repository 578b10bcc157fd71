//! Runs transformed code in the sandboxed interpreter.
//!
//! Every execution gets a fresh global namespace and its own worker thread
//! with the configured stack; quotas come from [`SandboxLimits`].

use std::time::Duration;

use tracing::{debug, info};

use crate::analyzer::Program;
use crate::ast::ParameterKind;
use crate::coercer::CoercedInputs;
use crate::config::SandboxLimits;
use crate::error::{PipelineError, PipelineResult};
use crate::eval::{CallArgs, Evaluator, Value};
use crate::schema::ExecutionOutcome;
use crate::stack::run_with_stack;

pub const NO_RETURN_VALUE: &str = "No return value";

const PARSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct Executor {
    limits: SandboxLimits,
}

impl Executor {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Runs `code` on a blocking worker and calls the target function with
    /// `inputs`.
    #[tracing::instrument(skip(self, code, inputs), fields(inputs = inputs.len()))]
    pub async fn execute(
        &self,
        code: String,
        inputs: CoercedInputs,
        entry_point: Option<String>,
    ) -> PipelineResult<ExecutionOutcome> {
        let limits = self.limits.clone();
        // パース時間も含めた上限。解釈中の超過は評価器側で検出される
        let wall_clock = limits.timeout + PARSE_GRACE;
        let task = tokio::task::spawn_blocking(move || {
            run_with_stack(limits.stack_size, || {
                execute_sync(&code, inputs, entry_point.as_deref(), &limits)
            })
        });
        match tokio::time::timeout(wall_clock, task).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(error))) => Err(PipelineError::Execution(format!(
                "failed to start execution: {error}"
            ))),
            Ok(Err(error)) => Err(PipelineError::Execution(format!(
                "execution aborted: {error}"
            ))),
            Err(_) => Err(PipelineError::Execution(format!(
                "execution timed out after {} ms",
                wall_clock.as_millis()
            ))),
        }
    }
}

/// Synchronous body of [`Executor::execute`]; runs on the calling thread.
pub fn execute_sync(
    code: &str,
    inputs: CoercedInputs,
    entry_point: Option<&str>,
    limits: &SandboxLimits,
) -> PipelineResult<ExecutionOutcome> {
    let program = Program::parse(code).map_err(|e| PipelineError::Execution(e.to_string()))?;
    let mut evaluator = Evaluator::new(limits.clone());
    evaluator.run_module(program.module())?;

    let (name, target) = find_target(&evaluator, entry_point)?;
    let args = bind_arguments(&target, inputs)?;
    debug!(target = %name, args = args.len(), "calling entry point");

    let result = evaluator.call(&target, CallArgs::keywords(args))?;
    let stdout = evaluator.take_stdout();
    info!(
        target = %name,
        result_type = result.type_name(),
        steps = evaluator.ctx.steps(),
        "execution finished"
    );
    Ok(ExecutionOutcome {
        result: render_result(&result, limits)?,
        stdout,
    })
}

fn find_target(evaluator: &Evaluator, entry_point: Option<&str>) -> PipelineResult<(String, Value)> {
    let globals = evaluator.globals();
    match entry_point {
        Some(name) => match globals.get(name) {
            Some(value) if value.is_callable() => Ok((name.to_string(), value.clone())),
            Some(value) => Err(PipelineError::Execution(format!(
                "Entry point '{name}' is not callable ('{}' object)",
                value.type_name()
            ))),
            None => Err(PipelineError::Execution(format!(
                "Entry point '{name}' not found"
            ))),
        },
        None => globals
            .iter()
            .find(|(name, value)| !name.starts_with("__") && value.is_callable())
            .map(|(name, value)| (name.clone(), value.clone()))
            .ok_or_else(|| PipelineError::Execution("No callable function found in code".into())),
    }
}

/// Keyword arguments for `target`: its named parameters that were supplied.
/// Targets without inspectable parameters are called without arguments.
fn bind_arguments(target: &Value, mut inputs: CoercedInputs) -> PipelineResult<Vec<(String, Value)>> {
    let Value::Function(function) = target else {
        return Ok(Vec::new());
    };
    let mut args = Vec::new();
    for param in function.params() {
        if !matches!(
            param.kind,
            ParameterKind::Positional | ParameterKind::KeywordOnly
        ) {
            continue;
        }
        match inputs.shift_remove(&param.name) {
            Some(value) => args.push((param.name.clone(), value.into_value())),
            None if param.default.is_none() => {
                return Err(PipelineError::MissingParameter {
                    name: param.name.clone(),
                });
            }
            None => {}
        }
    }
    if !inputs.is_empty() {
        debug!(dropped = ?inputs.keys().collect::<Vec<_>>(), "ignoring undeclared inputs");
    }
    Ok(args)
}

/// JSON for the caller: `None` becomes a marker text, plain data is kept,
/// everything else is shown by its repr. Results larger than the collection
/// limit are rejected.
pub fn render_result(value: &Value, limits: &SandboxLimits) -> PipelineResult<serde_json::Value> {
    match value {
        Value::None => Ok(serde_json::Value::from(NO_RETURN_VALUE)),
        value => value.to_json(limits.max_collection_len).map_err(|_| {
            PipelineError::Execution(format!(
                "MemoryError: result exceeds the limit of {} rendered items",
                limits.max_collection_len
            ))
        }),
    }
}
