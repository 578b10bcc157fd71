use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use indexmap::IndexMap;

use super::evaluator::{EvalError, EvalResult};
use super::exception::PyException;
use super::value::Value;
use crate::config::SandboxLimits;

/// Steps between two wall-clock checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;
/// Bound on nested expression evaluation across all active calls.
pub const MAX_NESTED_EVALUATION: usize = 3_000;
/// Rendered text is paid for like the elements it shows.
const RENDER_BYTES_PER_STEP: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Local namespace of one function call or comprehension.
#[derive(Debug, Default)]
pub struct Scope {
    pub variables: HashMap<String, Value>,
    /// Enclosing function scope; `None` means the module namespace.
    pub parent: Option<ScopeId>,
    pub globals: HashSet<String>,
    pub nonlocals: HashSet<String>,
    captured: bool,
}

/// Scopes live in an arena so closures can refer to them by index.
/// A scope is recycled when its call returns unless a closure captured it;
/// everything is dropped with the context.
#[derive(Debug, Default)]
pub struct ScopeArena {
    slots: Vec<Option<Scope>>,
    free: Vec<usize>,
}

impl ScopeArena {
    pub fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let scope = Scope {
            parent,
            ..Default::default()
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(scope);
                ScopeId(index)
            }
            None => {
                self.slots.push(Some(scope));
                ScopeId(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Keeps `id` and its ancestors alive for a closure.
    pub fn mark_captured(&mut self, id: ScopeId) {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.get_mut(id) {
                Some(scope) if !scope.captured => {
                    scope.captured = true;
                    current = scope.parent;
                }
                _ => break,
            }
        }
    }

    pub fn release(&mut self, id: ScopeId) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return;
        };
        if slot.as_ref().is_some_and(|scope| !scope.captured) {
            *slot = None;
            self.free.push(id.0);
        }
    }

    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Mutable state of one execution: namespaces, quotas and captured output.
#[derive(Debug)]
pub struct ExecutionContext {
    pub scopes: ScopeArena,
    pub globals: IndexMap<String, Value>,
    /// Innermost scope of the running frame; `None` at module level.
    pub current: Option<ScopeId>,
    limits: SandboxLimits,
    started: Instant,
    steps: u64,
    call_depth: usize,
    nesting: usize,
    stdout: String,
    /// Exceptions being handled by enclosing `except` blocks, for bare `raise`.
    pub handling: Vec<Rc<PyException>>,
    /// Collectors of the generator bodies currently running.
    pub generator_sinks: Vec<Vec<Value>>,
}

impl ExecutionContext {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            scopes: ScopeArena::default(),
            globals: IndexMap::new(),
            current: None,
            limits,
            started: Instant::now(),
            steps: 0,
            call_depth: 0,
            nesting: 0,
            stdout: String::new(),
            handling: Vec::new(),
            generator_sinks: Vec::new(),
        }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn step(&mut self) -> EvalResult<()> {
        self.charge(1)
    }

    /// Accounts `n` units of work; bulk operations pay per element.
    pub fn charge(&mut self, n: u64) -> EvalResult<()> {
        let before = self.steps;
        self.steps = self.steps.saturating_add(n);
        if self.steps > self.limits.max_steps {
            return Err(EvalError::LimitExceeded(format!(
                "step limit of {} exceeded",
                self.limits.max_steps
            )));
        }
        if before / DEADLINE_CHECK_INTERVAL != self.steps / DEADLINE_CHECK_INTERVAL
            && self.started.elapsed() > self.limits.timeout
        {
            return Err(EvalError::LimitExceeded(format!(
                "execution timed out after {} ms",
                self.limits.timeout.as_millis()
            )));
        }
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn enter_call(&mut self) -> EvalResult<()> {
        if self.call_depth >= self.limits.max_call_depth {
            return Err(EvalError::LimitExceeded(
                "RecursionError: maximum recursion depth exceeded".to_string(),
            ));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn enter_nested(&mut self) -> EvalResult<()> {
        if self.nesting >= MAX_NESTED_EVALUATION {
            return Err(EvalError::LimitExceeded(
                "RecursionError: maximum recursion depth exceeded during evaluation".to_string(),
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    pub fn exit_nested(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    /// Rejects containers and strings above the configured size.
    pub fn check_len(&self, len: usize) -> EvalResult<()> {
        if len > self.limits.max_collection_len {
            return Err(EvalError::LimitExceeded(format!(
                "MemoryError: collection of {} items exceeds the limit of {}",
                len, self.limits.max_collection_len
            )));
        }
        Ok(())
    }

    /// `repr(value)` bounded by the collection limit and charged per byte
    /// rendered.
    pub fn render_repr(&mut self, value: &Value) -> EvalResult<String> {
        let text = value
            .try_repr(self.limits.max_collection_len)
            .map_err(|_| self.render_overflow())?;
        self.charge_text(&text)?;
        Ok(text)
    }

    /// `str(value)` with the accounting of [`ExecutionContext::render_repr`].
    pub fn render_str(&mut self, value: &Value) -> EvalResult<String> {
        let text = value
            .try_str(self.limits.max_collection_len)
            .map_err(|_| self.render_overflow())?;
        self.charge_text(&text)?;
        Ok(text)
    }

    /// Charges text produced outside the evaluator (formatting helpers).
    pub fn charge_text(&mut self, text: &str) -> EvalResult<()> {
        self.charge(text.len() as u64 / RENDER_BYTES_PER_STEP + 1)
    }

    fn render_overflow(&self) -> EvalError {
        EvalError::LimitExceeded(format!(
            "MemoryError: rendered text exceeds the limit of {} bytes",
            self.limits.max_collection_len
        ))
    }

    pub fn write_stdout(&mut self, text: &str) -> EvalResult<()> {
        if self.stdout.len() + text.len() > self.limits.max_stdout_bytes {
            return Err(EvalError::LimitExceeded(format!(
                "output exceeds the limit of {} bytes",
                self.limits.max_stdout_bytes
            )));
        }
        self.stdout.push_str(text);
        Ok(())
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn take_stdout(&mut self) -> String {
        std::mem::take(&mut self.stdout)
    }

    // 名前解決: ローカル -> 外側の関数 -> グローバル
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = self.current;
        while let Some(id) = current {
            let scope = self.scopes.get(id)?;
            if scope.globals.contains(name) {
                break;
            }
            if let Some(value) = scope.variables.get(name) {
                return Some(value.clone());
            }
            current = scope.parent;
        }
        self.globals.get(name).cloned()
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        let Some(id) = self.current else {
            self.globals.insert(name.to_string(), value);
            return;
        };
        match self.binding_scope(id, name) {
            Some(target) => {
                if let Some(scope) = self.scopes.get_mut(target) {
                    scope.variables.insert(name.to_string(), value);
                }
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    /// Removes a binding, returning whether it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        let Some(id) = self.current else {
            return self.globals.shift_remove(name).is_some();
        };
        match self.binding_scope(id, name) {
            Some(target) => self
                .scopes
                .get_mut(target)
                .is_some_and(|scope| scope.variables.remove(name).is_some()),
            None => self.globals.shift_remove(name).is_some(),
        }
    }

    /// Scope that owns `name` for writes from `id`; `None` for the globals.
    fn binding_scope(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        let scope = self.scopes.get(id)?;
        if scope.globals.contains(name) {
            return None;
        }
        if !scope.nonlocals.contains(name) {
            return Some(id);
        }
        let mut current = scope.parent;
        while let Some(outer) = current {
            let scope = self.scopes.get(outer)?;
            if scope.variables.contains_key(name) {
                return Some(outer);
            }
            current = scope.parent;
        }
        None
    }

    pub fn declare_global(&mut self, name: &str) {
        if let Some(scope) = self.current.and_then(|id| self.scopes.get_mut(id)) {
            scope.globals.insert(name.to_string());
        }
    }

    /// Returns false when no enclosing function binds `name`.
    pub fn declare_nonlocal(&mut self, name: &str) -> bool {
        let Some(id) = self.current else {
            return false;
        };
        let mut parent = self.scopes.get(id).and_then(|scope| scope.parent);
        let mut found = false;
        while let Some(outer) = parent {
            match self.scopes.get(outer) {
                Some(scope) if scope.variables.contains_key(name) => {
                    found = true;
                    break;
                }
                Some(scope) => parent = scope.parent,
                None => break,
            }
        }
        if found {
            if let Some(scope) = self.scopes.get_mut(id) {
                scope.nonlocals.insert(name.to_string());
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn context() -> ExecutionContext {
        ExecutionContext::new(SandboxLimits::default())
    }

    #[test]
    fn test_rendering_is_charged_and_bounded() {
        let mut ctx = ExecutionContext::new(SandboxLimits {
            max_collection_len: 50,
            ..Default::default()
        });
        let small = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(ctx.render_repr(&small).unwrap(), "[1, 2]");
        assert_eq!(ctx.steps(), 2);

        let large = Value::list(vec![Value::Int(12345); 20]);
        let error = ctx.render_str(&large).unwrap_err();
        assert!(error.to_string().starts_with("MemoryError"), "{error}");
    }

    #[test]
    fn test_module_level_assignment_goes_to_globals() {
        let mut ctx = context();
        ctx.assign("x", Value::Int(1));
        assert_eq!(ctx.globals.get_index(0).map(|(k, _)| k.as_str()), Some("x"));
        assert!(ctx.lookup("x").is_some());
        assert!(ctx.delete("x"));
        assert!(ctx.lookup("x").is_none());
    }

    #[test]
    fn test_scope_chain_and_nonlocal() {
        let mut ctx = context();
        ctx.assign("g", Value::Int(0));
        let outer = ctx.scopes.push(None);
        ctx.current = Some(outer);
        ctx.assign("count", Value::Int(1));
        let inner = ctx.scopes.push(Some(outer));
        ctx.current = Some(inner);

        assert_eq!(ctx.lookup("count").and_then(|v| v.as_int()), Some(1));
        assert_eq!(ctx.lookup("g").and_then(|v| v.as_int()), Some(0));

        assert!(ctx.declare_nonlocal("count"));
        assert!(!ctx.declare_nonlocal("missing"));
        ctx.assign("count", Value::Int(2));
        ctx.current = Some(outer);
        assert_eq!(ctx.lookup("count").and_then(|v| v.as_int()), Some(2));
    }

    #[test]
    fn test_global_declaration() {
        let mut ctx = context();
        let frame = ctx.scopes.push(None);
        ctx.current = Some(frame);
        ctx.declare_global("total");
        ctx.assign("total", Value::Int(3));
        assert!(ctx.globals.contains_key("total"));
    }

    #[test]
    fn test_release_keeps_captured_scopes() {
        let mut ctx = context();
        let outer = ctx.scopes.push(None);
        let inner = ctx.scopes.push(Some(outer));
        ctx.scopes.mark_captured(inner);
        ctx.scopes.release(inner);
        ctx.scopes.release(outer);
        assert_eq!(ctx.scopes.live(), 2);

        let plain = ctx.scopes.push(None);
        ctx.scopes.release(plain);
        assert_eq!(ctx.scopes.live(), 2);
    }

    #[test]
    fn test_step_limit() {
        let mut ctx = ExecutionContext::new(SandboxLimits {
            max_steps: 10,
            ..Default::default()
        });
        assert!(ctx.charge(10).is_ok());
        assert!(matches!(ctx.step(), Err(EvalError::LimitExceeded(_))));
    }

    #[test]
    fn test_deadline() {
        let mut ctx = ExecutionContext::new(SandboxLimits {
            timeout: Duration::ZERO,
            ..Default::default()
        });
        std::thread::sleep(Duration::from_millis(2));
        let result = ctx.charge(DEADLINE_CHECK_INTERVAL);
        assert!(matches!(result, Err(EvalError::LimitExceeded(msg)) if msg.contains("timed out")));
    }

    #[test]
    fn test_call_depth_and_stdout_limits() {
        let mut ctx = ExecutionContext::new(SandboxLimits {
            max_call_depth: 1,
            max_stdout_bytes: 4,
            ..Default::default()
        });
        assert!(ctx.enter_call().is_ok());
        assert!(ctx.enter_call().is_err());
        ctx.exit_call();
        assert!(ctx.write_stdout("abcd").is_ok());
        assert!(ctx.write_stdout("e").is_err());
        assert_eq!(ctx.take_stdout(), "abcd");
    }
}
