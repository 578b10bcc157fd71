use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use super::builtins::lookup_builtin;
use super::context::ExecutionContext;
use super::exception::{ExceptionKind, PyException};
use super::math;
use super::statement::{ControlFlow, StatementResult};
use super::value::{Function, FunctionBody, HashKey, PyIterator, RangeValue, Value};
use crate::ast::{Module, ParameterKind};
use crate::config::SandboxLimits;

/// Outcome of evaluating untrusted code that did not finish normally.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// A Python exception; `try`/`except` can handle it.
    #[error("{0}")]
    Exception(Rc<PyException>),
    /// A sandbox quota ran out. Never catchable.
    #[error("{0}")]
    LimitExceeded(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

impl From<PyException> for EvalError {
    fn from(exception: PyException) -> Self {
        EvalError::Exception(Rc::new(exception))
    }
}

pub fn raise<T>(kind: ExceptionKind, message: impl Into<String>) -> EvalResult<T> {
    Err(PyException::new(kind, message).into())
}

pub fn type_error<T>(message: impl Into<String>) -> EvalResult<T> {
    raise(ExceptionKind::TypeError, message)
}

/// Arguments of one call after unpacking.
#[derive(Debug, Default, Clone)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keywords: Vec::new(),
        }
    }

    pub fn keywords(keywords: Vec<(String, Value)>) -> Self {
        Self {
            positional: Vec::new(),
            keywords,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Fails unless every keyword is in `allowed`.
    pub fn expect_keywords(&self, function: &str, allowed: &[&str]) -> EvalResult<()> {
        match self
            .keywords
            .iter()
            .find(|(key, _)| !allowed.contains(&key.as_str()))
        {
            Some((key, _)) => type_error(format!(
                "{function}() got an unexpected keyword argument '{key}'"
            )),
            None => Ok(()),
        }
    }

    /// Fails unless the positional count is within `min..=max`.
    pub fn expect_positional(&self, function: &str, min: usize, max: usize) -> EvalResult<()> {
        let given = self.positional.len();
        if given < min {
            if min == max {
                return type_error(format!(
                    "{function}() takes exactly {min} argument{} ({given} given)",
                    plural(min)
                ));
            }
            return type_error(format!(
                "{function}() expected at least {min} argument{}, got {given}",
                plural(min)
            ));
        }
        if given > max {
            if max == 0 {
                return type_error(format!("{function}() takes no arguments ({given} given)"));
            }
            return type_error(format!(
                "{function}() expected at most {max} argument{}, got {given}",
                plural(max)
            ));
        }
        Ok(())
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Lazily walks an iterable value.
pub enum ValueIter {
    Range { next: i64, step: i64, remaining: usize },
    Items(std::vec::IntoIter<Value>),
    Shared(Rc<std::cell::RefCell<PyIterator>>),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Range {
                next,
                step,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Value::Int(value))
            }
            ValueIter::Items(items) => items.next(),
            ValueIter::Shared(iterator) => iterator.borrow_mut().items.pop_front(),
        }
    }
}

/// Tree-walking interpreter over one global namespace.
#[derive(Debug)]
pub struct Evaluator {
    pub ctx: ExecutionContext,
}

impl Evaluator {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            ctx: ExecutionContext::new(limits),
        }
    }

    /// Executes a module body in the global namespace.
    pub fn run_module(&mut self, module: &Module) -> EvalResult<()> {
        debug!(statements = module.body.len(), "running module");
        match self.exec_block(&module.body)? {
            StatementResult::Normal => Ok(()),
            StatementResult::Control(ControlFlow::Return(_)) => {
                raise(ExceptionKind::SyntaxError, "'return' outside function")
            }
            StatementResult::Control(ControlFlow::Break) => {
                raise(ExceptionKind::SyntaxError, "'break' outside loop")
            }
            StatementResult::Control(ControlFlow::Continue) => {
                raise(ExceptionKind::SyntaxError, "'continue' not properly in loop")
            }
        }
    }

    pub fn globals(&self) -> &IndexMap<String, Value> {
        &self.ctx.globals
    }

    pub fn take_stdout(&mut self) -> String {
        self.ctx.take_stdout()
    }

    pub fn lookup_name(&self, name: &str) -> EvalResult<Value> {
        match self.ctx.lookup(name).or_else(|| lookup_builtin(name)) {
            Some(value) => Ok(value),
            None => raise(
                ExceptionKind::NameError,
                format!("name '{name}' is not defined"),
            ),
        }
    }

    pub fn call(&mut self, callee: &Value, args: CallArgs) -> EvalResult<Value> {
        self.ctx.step()?;
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::Builtin(builtin) => self.call_builtin(*builtin, args),
            Value::BoundMethod(method) => {
                let receiver = method.receiver.clone();
                self.call_method(&receiver, &method.name, args)
            }
            Value::MathFunction(function) => {
                args.expect_keywords(function.name(), &[])?;
                math::call(*function, &args.positional)
            }
            Value::ExceptionClass(kind) => {
                args.expect_keywords(kind.name(), &[])?;
                Ok(Value::Exception(Rc::new(PyException::with_args(
                    *kind,
                    args.positional,
                ))))
            }
            Value::Type(name) => type_error(format!("cannot create '{name}' instances")),
            other => type_error(format!("'{}' object is not callable", other.type_name())),
        }
    }

    fn call_function(&mut self, function: &Rc<Function>, args: CallArgs) -> EvalResult<Value> {
        self.ctx.enter_call()?;
        let scope = self.ctx.scopes.push(function.closure);
        let saved = self.ctx.current.replace(scope);
        let result = self
            .bind_arguments(function, args)
            .and_then(|_| self.run_function_body(function));
        self.ctx.current = saved;
        self.ctx.scopes.release(scope);
        self.ctx.exit_call();
        result
    }

    fn run_function_body(&mut self, function: &Function) -> EvalResult<Value> {
        match &function.body {
            FunctionBody::Lambda(lambda) => self.eval(&lambda.body),
            FunctionBody::Def(def) if function.is_generator => {
                // generators run to completion up front
                self.ctx.generator_sinks.push(Vec::new());
                let result = self.exec_block(&def.body);
                let items = self.ctx.generator_sinks.pop().unwrap_or_default();
                result?;
                Ok(Value::iterator("generator", items))
            }
            FunctionBody::Def(def) => match self.exec_block(&def.body)? {
                StatementResult::Control(ControlFlow::Return(value)) => Ok(value),
                _ => Ok(Value::None),
            },
        }
    }

    /// Binds call arguments into the current (fresh) scope.
    fn bind_arguments(&mut self, function: &Function, args: CallArgs) -> EvalResult<()> {
        let name = &function.name;
        let params = function.params();
        let mut bound: HashSet<&str> = HashSet::new();
        let mut positional = args.positional.into_iter();
        let positional_count = params
            .iter()
            .filter(|p| p.kind == ParameterKind::Positional)
            .count();
        let mut given = 0usize;

        for param in params {
            match param.kind {
                ParameterKind::Positional => {
                    if let Some(value) = positional.next() {
                        given += 1;
                        self.ctx.assign(&param.name, value);
                        bound.insert(&param.name);
                    }
                }
                ParameterKind::VarPositional => {
                    let rest: Vec<Value> = positional.by_ref().collect();
                    self.ctx.assign(&param.name, Value::tuple(rest));
                    bound.insert(&param.name);
                }
                _ => {}
            }
        }
        let extra = positional.count();
        if extra > 0 {
            return type_error(format!(
                "{name}() takes {positional_count} positional argument{} but {} {} given",
                plural(positional_count),
                given + extra,
                if given + extra == 1 { "was" } else { "were" }
            ));
        }

        let var_keyword = params.iter().find(|p| p.kind == ParameterKind::VarKeyword);
        let mut extra_keywords = IndexMap::new();
        for (key, value) in args.keywords {
            let target = params.iter().find(|p| {
                p.name == key
                    && matches!(p.kind, ParameterKind::Positional | ParameterKind::KeywordOnly)
            });
            match target {
                Some(param) if bound.contains(param.name.as_str()) => {
                    return type_error(format!(
                        "{name}() got multiple values for argument '{key}'"
                    ));
                }
                Some(param) => {
                    self.ctx.assign(&param.name, value);
                    bound.insert(&param.name);
                }
                None if var_keyword.is_some() => {
                    let hash_key = HashKey::Str(Rc::from(key.as_str()));
                    extra_keywords.insert(hash_key, (Value::from(key), value));
                }
                None => {
                    return type_error(format!(
                        "{name}() got an unexpected keyword argument '{key}'"
                    ));
                }
            }
        }
        if let Some(param) = var_keyword {
            self.ctx.assign(&param.name, Value::dict(extra_keywords));
        }

        let mut missing = Vec::new();
        let mut missing_kind = "positional";
        for (param, default) in params.iter().zip(&function.defaults) {
            if bound.contains(param.name.as_str())
                || !matches!(param.kind, ParameterKind::Positional | ParameterKind::KeywordOnly)
            {
                continue;
            }
            match default {
                Some(value) => self.ctx.assign(&param.name, value.clone()),
                None => {
                    if missing.is_empty() && param.kind == ParameterKind::KeywordOnly {
                        missing_kind = "keyword-only";
                    }
                    missing.push(format!("'{}'", param.name));
                }
            }
        }
        if !missing.is_empty() {
            let listed = match missing.as_slice() {
                [one] => one.clone(),
                [init @ .., last] => format!("{} and {}", init.join(", "), last),
                [] => String::new(),
            };
            return type_error(format!(
                "{name}() missing {} required {missing_kind} argument{}: {listed}",
                missing.len(),
                plural(missing.len())
            ));
        }
        Ok(())
    }

    pub fn iter_value(&self, value: &Value) -> EvalResult<ValueIter> {
        Ok(match value {
            Value::Range(range) => range_iter(range),
            Value::List(items) => ValueIter::Items(items.borrow().clone().into_iter()),
            Value::Tuple(items) => ValueIter::Items(items.to_vec().into_iter()),
            Value::Str(s) => ValueIter::Items(
                s.chars()
                    .map(|c| Value::from(c.to_string()))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Dict(entries) => ValueIter::Items(
                entries
                    .borrow()
                    .values()
                    .map(|(key, _)| key.clone())
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Set(items) => {
                ValueIter::Items(items.borrow().values().cloned().collect::<Vec<_>>().into_iter())
            }
            Value::Iterator(iterator) => ValueIter::Shared(iterator.clone()),
            other => {
                return type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                ));
            }
        })
    }

    /// Materializes an iterable, charging one step per element.
    pub fn collect(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        if let Value::Range(range) = value {
            self.ctx.check_len(range.len())?;
        }
        let mut items = Vec::new();
        for item in self.iter_value(value)? {
            self.ctx.step()?;
            items.push(item);
            self.ctx.check_len(items.len())?;
        }
        Ok(items)
    }

    /// Appends to the collector of the running generator.
    pub fn yield_value(&mut self, value: Value) -> EvalResult<()> {
        let max = self.ctx.limits().max_collection_len;
        match self.ctx.generator_sinks.last_mut() {
            Some(sink) => {
                sink.push(value);
                if sink.len() > max {
                    return Err(EvalError::LimitExceeded(format!(
                        "MemoryError: generator produced more than {max} items"
                    )));
                }
                Ok(())
            }
            None => raise(ExceptionKind::SyntaxError, "'yield' outside function"),
        }
    }
}

fn range_iter(range: &RangeValue) -> ValueIter {
    ValueIter::Range {
        next: range.start,
        step: range.step,
        remaining: range.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Program;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> Evaluator {
        let program = Program::parse(source).unwrap();
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        evaluator.run_module(program.module()).unwrap();
        evaluator
    }

    fn call(evaluator: &mut Evaluator, name: &str, args: CallArgs) -> EvalResult<Value> {
        let function = evaluator.globals().get(name).cloned().unwrap();
        evaluator.call(&function, args)
    }

    #[test]
    fn test_keyword_and_default_binding() {
        let mut evaluator = run("def f(a, b=10, *rest, c, **extra):\n    return (a, b, rest, c, extra)\n");
        let result = call(
            &mut evaluator,
            "f",
            CallArgs {
                positional: vec![Value::Int(1)],
                keywords: vec![
                    ("c".to_string(), Value::Int(3)),
                    ("z".to_string(), Value::Int(4)),
                ],
            },
        )
        .unwrap();
        assert_eq!(result.repr(), "(1, 10, (), 3, {'z': 4})");
    }

    #[test]
    fn test_binding_errors() {
        let mut evaluator = run("def f(a, b):\n    return a\n");
        let missing = call(&mut evaluator, "f", CallArgs::positional(vec![Value::Int(1)]));
        assert_eq!(
            missing.unwrap_err().to_string(),
            "TypeError: f() missing 1 required positional argument: 'b'"
        );
        let extra = call(
            &mut evaluator,
            "f",
            CallArgs::positional(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );
        assert_eq!(
            extra.unwrap_err().to_string(),
            "TypeError: f() takes 2 positional arguments but 3 were given"
        );
        let unexpected = call(
            &mut evaluator,
            "f",
            CallArgs::keywords(vec![("q".to_string(), Value::None)]),
        );
        assert_eq!(
            unexpected.unwrap_err().to_string(),
            "TypeError: f() got an unexpected keyword argument 'q'"
        );
    }

    #[test]
    fn test_name_error() {
        let evaluator = run("x = 1\n");
        assert!(evaluator.lookup_name("x").is_ok());
        assert!(evaluator.lookup_name("len").is_ok());
        assert_eq!(
            evaluator.lookup_name("y").unwrap_err().to_string(),
            "NameError: name 'y' is not defined"
        );
    }

    #[test]
    fn test_scopes_are_released_after_calls() {
        let mut evaluator = run("def f(n):\n    return n * 2\n");
        for i in 0..10 {
            call(&mut evaluator, "f", CallArgs::positional(vec![Value::Int(i)])).unwrap();
        }
        assert_eq!(evaluator.ctx.scopes.live(), 0);
    }

    #[test]
    fn test_module_level_return_is_rejected() {
        let program = Program::parse("return 1\n").unwrap();
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        assert!(evaluator.run_module(program.module()).is_err());
    }
}
