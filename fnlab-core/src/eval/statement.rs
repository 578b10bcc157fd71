//! Statement execution.

use std::rc::Rc;
use std::sync::Arc;

use super::evaluator::{CallArgs, EvalError, EvalResult, Evaluator, raise, type_error};
use super::exception::{ExceptionKind, PyException};
use super::math;
use super::operators::binary;
use super::value::{Function, FunctionBody, Value};
use crate::ast::{
    Argument, BinaryOperator, Comprehension, DictEntry, ExceptHandler, Expression,
    FStringElement, FunctionDef, Statement, StatementKind,
};

/// Non-local exits out of a block.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

#[derive(Debug, Clone)]
pub enum StatementResult {
    Normal,
    Control(ControlFlow),
}

impl Evaluator {
    pub fn exec_block(&mut self, block: &[Statement]) -> EvalResult<StatementResult> {
        for statement in block {
            let result = self.exec_statement(statement)?;
            if let StatementResult::Control(_) = result {
                return Ok(result);
            }
        }
        Ok(StatementResult::Normal)
    }

    fn exec_statement(&mut self, statement: &Statement) -> EvalResult<StatementResult> {
        self.ctx.step()?;
        match &statement.kind {
            StatementKind::Expression(expression) => {
                self.eval(expression)?;
            }
            StatementKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
            }
            StatementKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(target, *op, value)?;
            }
            StatementKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.eval(value)?;
                    self.assign_target(target, value)?;
                }
            }
            StatementKind::FunctionDef(def) => self.exec_function_def(def)?,
            StatementKind::ClassDef(class) => {
                return raise(
                    ExceptionKind::NotImplementedError,
                    format!("class definitions are not supported (class '{}')", class.name),
                );
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expression) => self.eval(expression)?,
                    None => Value::None,
                };
                return Ok(StatementResult::Control(ControlFlow::Return(value)));
            }
            StatementKind::If { branches, orelse } => {
                for (condition, body) in branches {
                    if self.eval(condition)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(orelse);
            }
            StatementKind::While {
                condition,
                body,
                orelse,
            } => {
                while self.eval(condition)?.truthy() {
                    match self.exec_block(body)? {
                        StatementResult::Control(ControlFlow::Break) => {
                            return Ok(StatementResult::Normal);
                        }
                        StatementResult::Control(ControlFlow::Return(value)) => {
                            return Ok(StatementResult::Control(ControlFlow::Return(value)));
                        }
                        _ => {}
                    }
                }
                return self.exec_block(orelse);
            }
            StatementKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval(iter)?;
                for item in self.iter_value(&iterable)? {
                    self.ctx.step()?;
                    self.assign_target(target, item)?;
                    match self.exec_block(body)? {
                        StatementResult::Control(ControlFlow::Break) => {
                            return Ok(StatementResult::Normal);
                        }
                        StatementResult::Control(ControlFlow::Return(value)) => {
                            return Ok(StatementResult::Control(ControlFlow::Return(value)));
                        }
                        _ => {}
                    }
                }
                return self.exec_block(orelse);
            }
            StatementKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => return self.exec_try(body, handlers, orelse, finalbody),
            StatementKind::With { items, .. } => {
                // no value supports the context manager protocol
                let manager = match items.first() {
                    Some((expression, _)) => self.eval(expression)?,
                    None => Value::None,
                };
                return type_error(format!(
                    "'{}' object does not support the context manager protocol",
                    manager.type_name()
                ));
            }
            StatementKind::Raise { exception, cause } => {
                if let Some(cause) = cause {
                    self.eval(cause)?;
                }
                return Err(self.exception_to_raise(exception.as_ref())?);
            }
            StatementKind::Assert { test, message } => {
                if !self.eval(test)?.truthy() {
                    let args = match message {
                        Some(message) => vec![self.eval(message)?],
                        None => Vec::new(),
                    };
                    return Err(
                        PyException::with_args(ExceptionKind::AssertionError, args).into()
                    );
                }
            }
            StatementKind::Delete(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
            }
            StatementKind::Import(aliases) => {
                for alias in aliases {
                    let module = import_module(&alias.name)?;
                    self.ctx.assign(alias.binding(), module);
                }
            }
            StatementKind::ImportFrom { module, names } => {
                let Value::Module(imported) = import_module(module)? else {
                    return raise(ExceptionKind::ImportError, format!("cannot import '{module}'"));
                };
                for alias in names {
                    if alias.name == "*" {
                        for (name, value) in &imported.members {
                            self.ctx.assign(name, value.clone());
                        }
                        continue;
                    }
                    match imported.members.get(&alias.name) {
                        Some(value) => self.ctx.assign(alias.binding(), value.clone()),
                        None => {
                            return raise(
                                ExceptionKind::ImportError,
                                format!("cannot import name '{}' from '{module}'", alias.name),
                            );
                        }
                    }
                }
            }
            StatementKind::Global(names) => {
                for name in names {
                    self.ctx.declare_global(name);
                }
            }
            StatementKind::Nonlocal(names) => {
                if self.ctx.current.is_none() {
                    return raise(
                        ExceptionKind::SyntaxError,
                        "nonlocal declaration not allowed at module level",
                    );
                }
                for name in names {
                    if !self.ctx.declare_nonlocal(name) {
                        return raise(
                            ExceptionKind::SyntaxError,
                            format!("no binding for nonlocal '{name}' found"),
                        );
                    }
                }
            }
            StatementKind::Pass => {}
            StatementKind::Break => return Ok(StatementResult::Control(ControlFlow::Break)),
            StatementKind::Continue => {
                return Ok(StatementResult::Control(ControlFlow::Continue));
            }
        }
        Ok(StatementResult::Normal)
    }

    fn exec_function_def(&mut self, def: &Arc<FunctionDef>) -> EvalResult<()> {
        let mut decorators = Vec::with_capacity(def.decorators.len());
        for decorator in &def.decorators {
            decorators.push(self.eval(decorator)?);
        }
        let mut function = self.make_function(def.name.clone(), FunctionBody::Def(def.clone()))?;
        for decorator in decorators.iter().rev() {
            function = self.call(decorator, CallArgs::positional(vec![function]))?;
        }
        self.ctx.assign(&def.name, function);
        Ok(())
    }

    /// Evaluates parameter defaults and closes over the running scope.
    pub(super) fn make_function(&mut self, name: String, body: FunctionBody) -> EvalResult<Value> {
        let (params, is_generator) = match &body {
            FunctionBody::Def(def) => (&def.params, block_yields(&def.body)),
            FunctionBody::Lambda(lambda) => (&lambda.params, false),
        };
        let mut defaults = Vec::with_capacity(params.len());
        for param in params {
            defaults.push(match &param.default {
                Some(default) => Some(self.eval(default)?),
                None => None,
            });
        }
        let closure = self.ctx.current;
        if let Some(scope) = closure {
            self.ctx.scopes.mark_captured(scope);
        }
        Ok(Value::Function(Rc::new(Function {
            name,
            body,
            defaults,
            closure,
            is_generator,
        })))
    }

    fn exec_try(
        &mut self,
        body: &[Statement],
        handlers: &[ExceptHandler],
        orelse: &[Statement],
        finalbody: &[Statement],
    ) -> EvalResult<StatementResult> {
        let outcome = match self.exec_block(body) {
            Err(EvalError::Exception(exception)) => self.handle_exception(exception, handlers),
            Ok(StatementResult::Normal) => self.exec_block(orelse),
            other => other,
        };
        if finalbody.is_empty() || matches!(outcome, Err(EvalError::LimitExceeded(_))) {
            return outcome;
        }
        match self.exec_block(finalbody)? {
            StatementResult::Normal => outcome,
            control => Ok(control),
        }
    }

    fn handle_exception(
        &mut self,
        exception: Rc<PyException>,
        handlers: &[ExceptHandler],
    ) -> EvalResult<StatementResult> {
        for handler in handlers {
            let matched = match &handler.class {
                None => true,
                Some(class) => {
                    let class = self.eval(class)?;
                    exception_matches(&exception, &class)?
                }
            };
            if !matched {
                continue;
            }
            if let Some(name) = &handler.name {
                self.ctx.assign(name, Value::Exception(exception.clone()));
            }
            self.ctx.handling.push(exception.clone());
            let result = self.exec_block(&handler.body);
            self.ctx.handling.pop();
            if let Some(name) = &handler.name {
                self.ctx.delete(name);
            }
            return result;
        }
        Err(EvalError::Exception(exception))
    }

    fn exception_to_raise(&mut self, exception: Option<&Expression>) -> EvalResult<EvalError> {
        let Some(expression) = exception else {
            return match self.ctx.handling.last() {
                Some(active) => Ok(EvalError::Exception(active.clone())),
                None => raise(ExceptionKind::RuntimeError, "No active exception to reraise"),
            };
        };
        match self.eval(expression)? {
            Value::ExceptionClass(kind) => Ok(PyException::with_args(kind, Vec::new()).into()),
            Value::Exception(exception) => Ok(EvalError::Exception(exception)),
            _ => type_error("exceptions must derive from BaseException"),
        }
    }

    pub(super) fn assign_target(&mut self, target: &Expression, value: Value) -> EvalResult<()> {
        match target {
            Expression::Name(name) => {
                self.ctx.assign(name, value);
                Ok(())
            }
            Expression::Tuple(targets) | Expression::List(targets) => {
                self.unpack_into(targets, value)
            }
            Expression::Subscript { value: container, index } => {
                let container = self.eval(container)?;
                if let Expression::Slice { lower, upper, step } = index.as_ref() {
                    let (lower, upper, step) = self.eval_slice_parts(lower, upper, step)?;
                    return self.assign_slice(&container, lower, upper, step, value);
                }
                let key = self.eval(index)?;
                self.set_item(&container, &key, value)
            }
            Expression::Attribute { value: object, attr } => {
                let object = self.eval(object)?;
                raise(
                    ExceptionKind::AttributeError,
                    format!("'{}' object has no attribute '{attr}'", object.type_name()),
                )
            }
            Expression::Starred(_) => raise(
                ExceptionKind::SyntaxError,
                "starred assignment target must be in a list or tuple",
            ),
            _ => raise(ExceptionKind::SyntaxError, "cannot assign to expression"),
        }
    }

    fn unpack_into(&mut self, targets: &[Expression], value: Value) -> EvalResult<()> {
        let items = self.collect(&value)?;
        let starred = targets
            .iter()
            .position(|target| matches!(target, Expression::Starred(_)));
        match starred {
            None => {
                if items.len() > targets.len() {
                    return raise(
                        ExceptionKind::ValueError,
                        format!("too many values to unpack (expected {})", targets.len()),
                    );
                }
                if items.len() < targets.len() {
                    return raise(
                        ExceptionKind::ValueError,
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        ),
                    );
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign_target(target, item)?;
                }
            }
            Some(star) => {
                let required = targets.len() - 1;
                if items.len() < required {
                    return raise(
                        ExceptionKind::ValueError,
                        format!(
                            "not enough values to unpack (expected at least {required}, got {})",
                            items.len()
                        ),
                    );
                }
                let after = targets.len() - star - 1;
                let mut items = items;
                let tail = items.split_off(items.len() - after);
                let middle = items.split_off(star);
                for (target, item) in targets[..star].iter().zip(items) {
                    self.assign_target(target, item)?;
                }
                if let Expression::Starred(inner) = &targets[star] {
                    self.assign_target(inner, Value::list(middle))?;
                }
                for (target, item) in targets[star + 1..].iter().zip(tail) {
                    self.assign_target(target, item)?;
                }
            }
        }
        Ok(())
    }

    fn set_item(&mut self, container: &Value, key: &Value, value: Value) -> EvalResult<()> {
        match container {
            Value::List(items) => {
                let len = items.borrow().len();
                let Some(index) = key.as_int() else {
                    return type_error(format!(
                        "list indices must be integers or slices, not {}",
                        key.type_name()
                    ));
                };
                let position = if index < 0 { index + len as i64 } else { index };
                if !(0..len as i64).contains(&position) {
                    return raise(ExceptionKind::IndexError, "list assignment index out of range");
                }
                items.borrow_mut()[position as usize] = value;
                Ok(())
            }
            Value::Dict(entries) => {
                let hash_key = key.hash_key()?;
                let len = entries.borrow().len();
                self.ctx.check_len(len + 1)?;
                entries.borrow_mut().insert(hash_key, (key.clone(), value));
                Ok(())
            }
            other => type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            )),
        }
    }

    fn assign_slice(
        &mut self,
        container: &Value,
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
        value: Value,
    ) -> EvalResult<()> {
        let Value::List(items) = container else {
            return type_error(format!(
                "'{}' object does not support item assignment",
                container.type_name()
            ));
        };
        let replacement = self.collect(&value)?;
        let len = items.borrow().len();
        let positions = slice_positions(len, lower, upper, step)?;
        if step.unwrap_or(1) == 1 {
            let start = match lower {
                None => 0,
                Some(index) if index < 0 => (index + len as i64).max(0) as usize,
                Some(index) => (index as usize).min(len),
            };
            let end = start + positions.len();
            self.ctx.check_len(len - positions.len() + replacement.len())?;
            items.borrow_mut().splice(start..end, replacement);
            return Ok(());
        }
        if positions.len() != replacement.len() {
            return raise(
                ExceptionKind::ValueError,
                format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    replacement.len(),
                    positions.len()
                ),
            );
        }
        let mut items = items.borrow_mut();
        for (position, item) in positions.into_iter().zip(replacement) {
            items[position] = item;
        }
        Ok(())
    }

    fn delete_target(&mut self, target: &Expression) -> EvalResult<()> {
        match target {
            Expression::Name(name) => {
                if !self.ctx.delete(name) {
                    return raise(
                        ExceptionKind::NameError,
                        format!("name '{name}' is not defined"),
                    );
                }
                Ok(())
            }
            Expression::Tuple(targets) | Expression::List(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
                Ok(())
            }
            Expression::Subscript { value, index } => {
                let container = self.eval(value)?;
                if let Expression::Slice { lower, upper, step } = index.as_ref() {
                    let (lower, upper, step) = self.eval_slice_parts(lower, upper, step)?;
                    let Value::List(items) = &container else {
                        return type_error(format!(
                            "'{}' object does not support item deletion",
                            container.type_name()
                        ));
                    };
                    let len = items.borrow().len();
                    let mut positions = slice_positions(len, lower, upper, step)?;
                    positions.sort_unstable();
                    let mut items = items.borrow_mut();
                    for position in positions.into_iter().rev() {
                        items.remove(position);
                    }
                    return Ok(());
                }
                let key = self.eval(index)?;
                match &container {
                    Value::List(items) => {
                        let len = items.borrow().len() as i64;
                        let Some(index) = key.as_int() else {
                            return type_error(format!(
                                "list indices must be integers or slices, not {}",
                                key.type_name()
                            ));
                        };
                        let position = if index < 0 { index + len } else { index };
                        if !(0..len).contains(&position) {
                            return raise(
                                ExceptionKind::IndexError,
                                "list assignment index out of range",
                            );
                        }
                        items.borrow_mut().remove(position as usize);
                        Ok(())
                    }
                    Value::Dict(entries) => {
                        let hash_key = key.hash_key()?;
                        match entries.borrow_mut().shift_remove(&hash_key) {
                            Some(_) => Ok(()),
                            None => Err(
                                PyException::with_args(ExceptionKind::KeyError, vec![key.clone()])
                                    .into(),
                            ),
                        }
                    }
                    other => type_error(format!(
                        "'{}' object does not support item deletion",
                        other.type_name()
                    )),
                }
            }
            _ => raise(ExceptionKind::SyntaxError, "cannot delete expression"),
        }
    }

    fn exec_aug_assign(
        &mut self,
        target: &Expression,
        op: BinaryOperator,
        value: &Expression,
    ) -> EvalResult<()> {
        match target {
            Expression::Name(name) => {
                let current = self.lookup_name(name)?;
                let rhs = self.eval(value)?;
                let result = self.augmented(op, current, rhs)?;
                self.ctx.assign(name, result);
                Ok(())
            }
            Expression::Subscript {
                value: container,
                index,
            } if !matches!(index.as_ref(), Expression::Slice { .. }) => {
                let container = self.eval(container)?;
                let key = self.eval(index)?;
                let current = self.get_item(&container, &key)?;
                let rhs = self.eval(value)?;
                let result = self.augmented(op, current, rhs)?;
                self.set_item(&container, &key, result)
            }
            Expression::Attribute { value: object, attr } => {
                let object = self.eval(object)?;
                raise(
                    ExceptionKind::AttributeError,
                    format!("'{}' object has no attribute '{attr}'", object.type_name()),
                )
            }
            _ => raise(
                ExceptionKind::SyntaxError,
                "illegal expression for augmented assignment",
            ),
        }
    }

    /// `x op= y`; lists, dicts and sets are updated in place.
    fn augmented(&mut self, op: BinaryOperator, current: Value, rhs: Value) -> EvalResult<Value> {
        match (op, &current, &rhs) {
            (BinaryOperator::Add, Value::List(items), _) => {
                let extra = self.collect(&rhs)?;
                let len = items.borrow().len();
                self.ctx.check_len(len + extra.len())?;
                items.borrow_mut().extend(extra);
                Ok(current)
            }
            (BinaryOperator::Mul, Value::List(items), Value::Int(_) | Value::Bool(_)) => {
                let Value::List(repeated) = binary(&mut self.ctx, op, &current, &rhs)? else {
                    return Ok(current);
                };
                let repeated = repeated.borrow().clone();
                *items.borrow_mut() = repeated;
                Ok(current)
            }
            (BinaryOperator::BitOr, Value::Dict(entries), Value::Dict(_)) => {
                let mut updated = entries.borrow().clone();
                self.update_dict(&mut updated, &rhs)?;
                self.ctx.check_len(updated.len())?;
                *entries.borrow_mut() = updated;
                Ok(current)
            }
            (
                BinaryOperator::BitOr
                | BinaryOperator::BitAnd
                | BinaryOperator::Sub
                | BinaryOperator::BitXor,
                Value::Set(items),
                Value::Set(_),
            ) => {
                if let Value::Set(result) = binary(&mut self.ctx, op, &current, &rhs)? {
                    let contents = result.borrow().clone();
                    *items.borrow_mut() = contents;
                }
                Ok(current)
            }
            _ => binary(&mut self.ctx, op, &current, &rhs),
        }
    }
}

fn import_module(name: &str) -> EvalResult<Value> {
    match name {
        "math" => Ok(math::module()),
        other => raise(
            ExceptionKind::ModuleNotFoundError,
            format!("No module named '{other}'"),
        ),
    }
}

fn exception_matches(exception: &PyException, class: &Value) -> EvalResult<bool> {
    match class {
        Value::ExceptionClass(kind) => Ok(exception.kind.is_subclass_of(*kind)),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(exception, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => type_error("catching classes that do not inherit from BaseException is not allowed"),
    }
}

/// Indices selected by `[lower:upper:step]` over `len` items, in slice order.
pub(super) fn slice_positions(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return raise(ExceptionKind::ValueError, "slice step cannot be zero");
    }
    let signed_len = len as i64;
    let resolve = |bound: Option<i64>, default: i64| -> i64 {
        match bound {
            None => default,
            Some(index) if index < 0 => (index + signed_len).max(if step < 0 { -1 } else { 0 }),
            Some(index) if index >= signed_len => {
                if step < 0 {
                    signed_len - 1
                } else {
                    signed_len
                }
            }
            Some(index) => index,
        }
    };
    let (start, stop) = if step > 0 {
        (resolve(lower, 0), resolve(upper, signed_len))
    } else {
        (resolve(lower, signed_len - 1), resolve(upper, -1))
    };
    let mut positions = Vec::new();
    let mut index = start;
    while (step > 0 && index < stop) || (step < 0 && index > stop) {
        positions.push(index as usize);
        index += step;
    }
    Ok(positions)
}

fn block_yields(block: &[Statement]) -> bool {
    block.iter().any(statement_yields)
}

fn statement_yields(statement: &Statement) -> bool {
    match &statement.kind {
        StatementKind::Expression(e) => expression_yields(e),
        StatementKind::Assign { targets, value } => {
            expression_yields(value) || targets.iter().any(expression_yields)
        }
        StatementKind::AugAssign { target, value, .. } => {
            expression_yields(target) || expression_yields(value)
        }
        StatementKind::AnnAssign { value, .. } => value.as_ref().is_some_and(expression_yields),
        // nested functions have their own generator status
        StatementKind::FunctionDef(_) | StatementKind::ClassDef(_) => false,
        StatementKind::Return(value) => value.as_ref().is_some_and(expression_yields),
        StatementKind::If { branches, orelse } => {
            branches
                .iter()
                .any(|(condition, body)| expression_yields(condition) || block_yields(body))
                || block_yields(orelse)
        }
        StatementKind::While {
            condition,
            body,
            orelse,
        } => expression_yields(condition) || block_yields(body) || block_yields(orelse),
        StatementKind::For {
            iter, body, orelse, ..
        } => expression_yields(iter) || block_yields(body) || block_yields(orelse),
        StatementKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            block_yields(body)
                || handlers.iter().any(|h| block_yields(&h.body))
                || block_yields(orelse)
                || block_yields(finalbody)
        }
        StatementKind::With { items, body } => {
            items.iter().any(|(e, _)| expression_yields(e)) || block_yields(body)
        }
        StatementKind::Raise { exception, cause } => {
            exception.as_ref().is_some_and(expression_yields)
                || cause.as_ref().is_some_and(expression_yields)
        }
        StatementKind::Assert { test, message } => {
            expression_yields(test) || message.as_ref().is_some_and(expression_yields)
        }
        StatementKind::Delete(targets) => targets.iter().any(expression_yields),
        _ => false,
    }
}

fn expression_yields(expression: &Expression) -> bool {
    let any = |items: &[Expression]| items.iter().any(expression_yields);
    let generators_yield = |generators: &[Comprehension]| {
        generators.iter().any(|g| {
            expression_yields(&g.iter) || g.conditions.iter().any(expression_yields)
        })
    };
    match expression {
        Expression::Yield(_) | Expression::YieldFrom(_) => true,
        Expression::Constant(_) | Expression::Name(_) | Expression::Lambda(_) => false,
        Expression::FString(elements) => elements.iter().any(|element| match element {
            FStringElement::Field { value, .. } => expression_yields(value),
            FStringElement::Text(_) => false,
        }),
        Expression::List(items) | Expression::Tuple(items) | Expression::Set(items) => any(items),
        Expression::Dict(entries) => entries.iter().any(|entry| match entry {
            DictEntry::Pair(key, value) => expression_yields(key) || expression_yields(value),
            DictEntry::Unpack(value) => expression_yields(value),
        }),
        Expression::ListComp { generators, .. }
        | Expression::SetComp { generators, .. }
        | Expression::DictComp { generators, .. } => generators_yield(generators),
        Expression::Starred(inner)
        | Expression::Unary { operand: inner, .. }
        | Expression::Attribute { value: inner, .. }
        | Expression::NamedExpr { value: inner, .. } => expression_yields(inner),
        Expression::Binary { left, right, .. } | Expression::BoolOp { left, right, .. } => {
            expression_yields(left) || expression_yields(right)
        }
        Expression::Compare { left, comparisons } => {
            expression_yields(left) || comparisons.iter().any(|(_, e)| expression_yields(e))
        }
        Expression::IfExp {
            condition,
            body,
            orelse,
        } => expression_yields(condition) || expression_yields(body) || expression_yields(orelse),
        Expression::Call { func, args } => {
            expression_yields(func)
                || args.iter().any(|arg| match arg {
                    Argument::Positional(e) | Argument::Unpack(e) | Argument::UnpackKeywords(e) => {
                        expression_yields(e)
                    }
                    Argument::Keyword { value, .. } => expression_yields(value),
                })
        }
        Expression::Subscript { value, index } => {
            expression_yields(value) || expression_yields(index)
        }
        Expression::Slice { lower, upper, step } => [lower, upper, step]
            .into_iter()
            .any(|bound| bound.as_deref().is_some_and(expression_yields)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Program;
    use crate::config::SandboxLimits;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (Evaluator, EvalResult<()>) {
        let program = Program::parse(source).unwrap();
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        let result = evaluator.run_module(program.module());
        (evaluator, result)
    }

    fn global(source: &str, name: &str) -> String {
        let (evaluator, result) = run(source);
        result.unwrap();
        evaluator.globals().get(name).unwrap().repr()
    }

    fn error(source: &str) -> String {
        run(source).1.unwrap_err().to_string()
    }

    #[test]
    fn test_unpacking() {
        assert_eq!(global("a, (b, c) = 1, [2, 3]\nr = (a, b, c)\n", "r"), "(1, 2, 3)");
        assert_eq!(global("first, *rest = 'abc'\nr = rest\n", "r"), "['b', 'c']");
        assert_eq!(global("*init, last = [1, 2, 3]\nr = init\n", "r"), "[1, 2]");
        assert_eq!(error("a, b = [1, 2, 3]\n"), "ValueError: too many values to unpack (expected 2)");
        assert_eq!(
            error("a, b, c = (1, 2)\n"),
            "ValueError: not enough values to unpack (expected 3, got 2)"
        );
    }

    #[test]
    fn test_subscript_and_slice_assignment() {
        assert_eq!(global("x = [1, 2, 3, 4]\nx[-1] = 9\nx[0:2] = ['a']\n", "x"), "['a', 3, 9]");
        assert_eq!(global("x = [0] * 6\nx[::2] = [1, 1, 1]\n", "x"), "[1, 0, 1, 0, 1, 0]");
        assert_eq!(global("d = {}\nd['k'] = 1\nd['k'] += 2\n", "d"), "{'k': 3}");
        assert_eq!(global("x = [1, 2, 3, 4]\ndel x[1:3]\n", "x"), "[1, 4]");
        assert_eq!(
            error("t = (1, 2)\nt[0] = 5\n"),
            "TypeError: 'tuple' object does not support item assignment"
        );
    }

    #[test]
    fn test_augmented_assignment_is_in_place_for_lists() {
        assert_eq!(global("a = [1]\nb = a\na += (2, 3)\n", "b"), "[1, 2, 3]");
        assert_eq!(global("s = {1, 2}\nt = s\ns -= {1}\n", "t"), "{2}");
        assert_eq!(global("n = 5\nn //= 2\n", "n"), "2");
    }

    #[test]
    fn test_loops_with_else() {
        let source = "found = None\nfor i in range(10):\n    if i * i > 20:\n        found = i\n        break\nelse:\n    found = -1\n";
        assert_eq!(global(source, "found"), "5");
        let source = "n = 0\nwhile n < 3:\n    n += 1\nelse:\n    n = 100\n";
        assert_eq!(global(source, "n"), "100");
        let source = "out = []\nfor i in range(5):\n    if i % 2:\n        continue\n    out.append(i)\n";
        assert_eq!(global(source, "out"), "[0, 2, 4]");
    }

    #[test]
    fn test_try_except_finally() {
        let source = "log = []\ntry:\n    1 / 0\nexcept (KeyError, ArithmeticError) as e:\n    log.append(str(e))\nelse:\n    log.append('else')\nfinally:\n    log.append('finally')\n";
        assert_eq!(global(source, "log"), "['division by zero', 'finally']");
        let source = "def f():\n    try:\n        return 1\n    finally:\n        return 2\nr = f()\n";
        assert_eq!(global(source, "r"), "2");
        let source = "try:\n    try:\n        raise ValueError('inner')\n    except ValueError:\n        raise\nexcept Exception as e:\n    r = repr(e)\n";
        assert_eq!(global(source, "r"), "\"ValueError('inner')\"");
        assert_eq!(error("raise\n"), "RuntimeError: No active exception to reraise");
    }

    #[test]
    fn test_except_name_is_unbound_afterwards() {
        assert_eq!(
            error("try:\n    raise KeyError('k')\nexcept KeyError as e:\n    pass\nprint(e)\n"),
            "NameError: name 'e' is not defined"
        );
    }

    #[test]
    fn test_limits_are_not_catchable() {
        let program = Program::parse("try:\n    while True:\n        pass\nexcept BaseException:\n    pass\n").unwrap();
        let limits = SandboxLimits {
            max_steps: 1_000,
            ..SandboxLimits::default()
        };
        let mut evaluator = Evaluator::new(limits);
        let result = evaluator.run_module(program.module());
        assert!(matches!(result, Err(EvalError::LimitExceeded(_))));
    }

    #[test]
    fn test_assert_and_imports() {
        assert_eq!(error("assert 1 == 2, 'nope'\n"), "AssertionError: nope");
        assert_eq!(global("import math\nr = math.floor(2.5)\n", "r"), "2");
        assert_eq!(global("from math import sqrt as s\nr = s(16)\n", "r"), "4.0");
        assert_eq!(global("from math import *\nr = pi > 3\n", "r"), "True");
        assert_eq!(error("import os\n"), "ModuleNotFoundError: No module named 'os'");
        assert_eq!(
            error("from math import nope\n"),
            "ImportError: cannot import name 'nope' from 'math'"
        );
    }

    #[test]
    fn test_global_and_nonlocal() {
        let source = "count = 0\ndef bump():\n    global count\n    count += 1\nbump()\nbump()\n";
        assert_eq!(global(source, "count"), "2");
        let source = "def counter():\n    n = 0\n    def inc():\n        nonlocal n\n        n += 1\n        return n\n    return inc\nc = counter()\nc()\nr = c()\n";
        assert_eq!(global(source, "r"), "2");
        assert_eq!(
            error("def f():\n    nonlocal x\nf()\n"),
            "SyntaxError: no binding for nonlocal 'x' found"
        );
    }

    #[test]
    fn test_generators_and_decorators() {
        let source = "def gen(n):\n    for i in range(n):\n        yield i * i\n    yield from 'ab'\nr = list(gen(3))\n";
        assert_eq!(global(source, "r"), "[0, 1, 4, 'a', 'b']");
        let source = "def twice(f):\n    return lambda x: f(f(x))\n@twice\ndef inc(x):\n    return x + 1\nr = inc(1)\n";
        assert_eq!(global(source, "r"), "3");
    }

    #[test]
    fn test_unsupported_statements() {
        assert_eq!(
            error("class A:\n    pass\n"),
            "NotImplementedError: class definitions are not supported (class 'A')"
        );
        assert_eq!(
            error("with 1 as f:\n    pass\n"),
            "TypeError: 'int' object does not support the context manager protocol"
        );
    }

    #[test]
    fn test_slice_positions() {
        assert_eq!(slice_positions(5, None, None, Some(-1)).unwrap(), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_positions(5, Some(-2), None, None).unwrap(), vec![3, 4]);
        assert_eq!(slice_positions(5, Some(10), Some(20), None).unwrap(), Vec::<usize>::new());
        assert!(slice_positions(5, None, None, Some(0)).is_err());
    }
}
