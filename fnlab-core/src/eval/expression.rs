//! Expression evaluation.

use std::cmp::Ordering;

use super::evaluator::{CallArgs, EvalResult, Evaluator, raise, type_error};
use super::exception::{ExceptionKind, PyException};
use super::format::format_value;
use super::operators::{binary, unary};
use super::statement::slice_positions;
use super::value::{FunctionBody, HashKey, RangeValue, Value};
use crate::analyzer::parse_expression_source;
use crate::ast::{
    Argument, BoolOperator, CompareOperator, Comprehension, Constant, DictEntry, Expression,
    FStringElement, UnaryOperator,
};

type Emit<'a> = dyn FnMut(&mut Evaluator) -> EvalResult<()> + 'a;

fn constant_value(constant: &Constant) -> Value {
    match constant {
        // `...` only shows up as a placeholder body
        Constant::None | Constant::Ellipsis => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str(s) => Value::from(s.as_str()),
    }
}

fn slice_index(value: Value) -> EvalResult<Option<i64>> {
    match value {
        Value::None => Ok(None),
        other => match other.as_int() {
            Some(i) => Ok(Some(i)),
            None => type_error(
                "slice indices must be integers or None or have an __index__ method",
            ),
        },
    }
}

fn sequence_index(value: &Value, key: &Value, len: usize) -> EvalResult<usize> {
    let Some(index) = key.as_int() else {
        return type_error(format!(
            "{} indices must be integers or slices, not {}",
            value.type_name(),
            key.type_name()
        ));
    };
    let signed = len as i64;
    let position = if index < 0 { index + signed } else { index };
    if !(0..signed).contains(&position) {
        let what = match value {
            Value::Str(_) => "string",
            other => other.type_name(),
        };
        return raise(
            ExceptionKind::IndexError,
            format!("{what} index out of range"),
        );
    }
    Ok(position as usize)
}

impl Evaluator {
    pub fn eval(&mut self, expression: &Expression) -> EvalResult<Value> {
        self.ctx.enter_nested()?;
        let result = self.eval_nested(expression);
        self.ctx.exit_nested();
        result
    }

    fn eval_nested(&mut self, expression: &Expression) -> EvalResult<Value> {
        self.ctx.step()?;
        match expression {
            Expression::Constant(constant) => Ok(constant_value(constant)),
            Expression::FString(elements) => self.eval_fstring(elements),
            Expression::Name(name) => self.lookup_name(name),
            Expression::List(items) => Ok(Value::list(self.eval_items(items)?)),
            Expression::Tuple(items) => Ok(Value::tuple(self.eval_items(items)?)),
            Expression::Set(items) => {
                let items = self.eval_items(items)?;
                self.make_set(items)
            }
            Expression::Dict(entries) => self.eval_dict(entries),
            Expression::ListComp {
                element,
                generators,
            } => {
                let mut items = Vec::new();
                self.comprehension(generators, &mut |ev: &mut Evaluator| {
                    items.push(ev.eval(element)?);
                    ev.ctx.check_len(items.len())
                })?;
                Ok(Value::list(items))
            }
            Expression::SetComp {
                element,
                generators,
            } => {
                let mut items = Vec::new();
                self.comprehension(generators, &mut |ev: &mut Evaluator| {
                    items.push(ev.eval(element)?);
                    ev.ctx.check_len(items.len())
                })?;
                self.make_set(items)
            }
            Expression::DictComp {
                key,
                value,
                generators,
            } => {
                let mut entries = super::value::Dict::new();
                self.comprehension(generators, &mut |ev: &mut Evaluator| {
                    let key = ev.eval(key)?;
                    let value = ev.eval(value)?;
                    entries.insert(key.hash_key()?, (key, value));
                    ev.ctx.check_len(entries.len())
                })?;
                Ok(Value::dict(entries))
            }
            Expression::Starred(_) => raise(
                ExceptionKind::SyntaxError,
                "can't use starred expression here",
            ),
            Expression::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOperator::Not => Ok(Value::Bool(!operand.truthy())),
                    _ => unary(*op, &operand),
                }
            }
            Expression::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(&mut self.ctx, *op, &left, &right)
            }
            Expression::BoolOp { op, left, right } => {
                let left = self.eval(left)?;
                match (op, left.truthy()) {
                    (BoolOperator::And, false) | (BoolOperator::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }
            Expression::Compare { left, comparisons } => {
                let mut left = self.eval(left)?;
                for (op, right) in comparisons {
                    let right = self.eval(right)?;
                    if !self.compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expression::IfExp {
                condition,
                body,
                orelse,
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expression::Lambda(lambda) => {
                self.make_function("<lambda>".to_string(), FunctionBody::Lambda(lambda.clone()))
            }
            Expression::Call { func, args } => {
                let callee = self.eval(func)?;
                let args = self.eval_arguments(args)?;
                self.call(&callee, args)
            }
            Expression::Attribute { value, attr } => {
                let value = self.eval(value)?;
                self.get_attribute(&value, attr)
            }
            Expression::Subscript { value, index } => {
                let container = self.eval(value)?;
                if let Expression::Slice { lower, upper, step } = index.as_ref() {
                    let (lower, upper, step) = self.eval_slice_parts(lower, upper, step)?;
                    return self.get_slice(&container, lower, upper, step);
                }
                let key = self.eval(index)?;
                self.get_item(&container, &key)
            }
            Expression::Slice { .. } => raise(ExceptionKind::SyntaxError, "invalid syntax"),
            Expression::NamedExpr { name, value } => {
                let value = self.eval(value)?;
                self.ctx.assign(name, value.clone());
                Ok(value)
            }
            Expression::Yield(value) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::None,
                };
                self.yield_value(value)?;
                Ok(Value::None)
            }
            Expression::YieldFrom(source) => {
                let source = self.eval(source)?;
                for item in self.collect(&source)? {
                    self.yield_value(item)?;
                }
                Ok(Value::None)
            }
        }
    }

    /// Evaluates display items, expanding `*iterable`.
    fn eval_items(&mut self, items: &[Expression]) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expression::Starred(inner) => {
                    let iterable = self.eval(inner)?;
                    values.extend(self.collect(&iterable)?);
                    self.ctx.check_len(values.len())?;
                }
                other => values.push(self.eval(other)?),
            }
        }
        Ok(values)
    }

    fn eval_dict(&mut self, entries: &[DictEntry]) -> EvalResult<Value> {
        let mut dict = super::value::Dict::with_capacity(entries.len());
        for entry in entries {
            match entry {
                DictEntry::Pair(key, value) => {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    dict.insert(key.hash_key()?, (key, value));
                }
                DictEntry::Unpack(source) => {
                    let source = self.eval(source)?;
                    if !matches!(source, Value::Dict(_)) {
                        return type_error(format!(
                            "'{}' object is not a mapping",
                            source.type_name()
                        ));
                    }
                    self.update_dict(&mut dict, &source)?;
                }
            }
            self.ctx.check_len(dict.len())?;
        }
        Ok(Value::dict(dict))
    }

    fn eval_arguments(&mut self, arguments: &[Argument]) -> EvalResult<CallArgs> {
        let mut args = CallArgs::default();
        for argument in arguments {
            match argument {
                Argument::Positional(expression) => args.positional.push(self.eval(expression)?),
                Argument::Keyword { name, value } => {
                    let value = self.eval(value)?;
                    args.keywords.push((name.clone(), value));
                }
                Argument::Unpack(expression) => {
                    let iterable = self.eval(expression)?;
                    args.positional.extend(self.collect(&iterable)?);
                }
                Argument::UnpackKeywords(expression) => {
                    let Value::Dict(entries) = self.eval(expression)? else {
                        return type_error("argument after ** must be a mapping");
                    };
                    for (key, value) in entries.borrow().values() {
                        let Value::Str(name) = key else {
                            return type_error("keywords must be strings");
                        };
                        if args.keyword(name).is_some() {
                            return type_error(format!(
                                "got multiple values for keyword argument '{name}'"
                            ));
                        }
                        args.keywords.push((name.to_string(), value.clone()));
                    }
                }
            }
        }
        self.ctx.check_len(args.positional.len())?;
        Ok(args)
    }

    fn eval_fstring(&mut self, elements: &[FStringElement]) -> EvalResult<Value> {
        let mut out = String::new();
        for element in elements {
            match element {
                FStringElement::Text(text) => out.push_str(text),
                FStringElement::Field {
                    value,
                    conversion,
                    format_spec,
                } => {
                    let mut value = self.eval(value)?;
                    match conversion {
                        Some('r') | Some('a') => value = Value::from(self.ctx.render_repr(&value)?),
                        Some('s') => value = Value::from(self.ctx.render_str(&value)?),
                        _ => {}
                    }
                    let spec = match format_spec {
                        Some(spec) => self.expand_spec(spec)?,
                        None => String::new(),
                    };
                    let text = if spec.is_empty() {
                        self.ctx.render_str(&value)?
                    } else {
                        format_value(&value, &spec)?
                    };
                    out.push_str(&text);
                }
            }
            self.ctx.check_len(out.len())?;
        }
        Ok(Value::from(out))
    }

    /// Substitutes `{expr}` fields nested in a format spec.
    fn expand_spec(&mut self, spec: &str) -> EvalResult<String> {
        if !spec.contains('{') {
            return Ok(spec.to_string());
        }
        let mut out = String::new();
        let mut rest = spec;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let Some(close) = rest[open..].find('}') else {
                return raise(ExceptionKind::ValueError, "unmatched '{' in format spec");
            };
            let source = &rest[open + 1..open + close];
            let expression = parse_expression_source(source).map_err(|error| {
                PyException::new(ExceptionKind::SyntaxError, format!("f-string: {}", error.message))
            })?;
            let value = self.eval(&expression)?;
            out.push_str(&self.ctx.render_str(&value)?);
            rest = &rest[open + close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Runs `generators` in a fresh scope, calling `emit` for each combination.
    ///
    /// The outermost iterable is evaluated in the enclosing scope.
    fn comprehension(
        &mut self,
        generators: &[Comprehension],
        emit: &mut Emit<'_>,
    ) -> EvalResult<()> {
        let Some(first) = generators.first() else {
            return emit(self);
        };
        let iterable = self.eval(&first.iter)?;
        let scope = self.ctx.scopes.push(self.ctx.current);
        let saved = self.ctx.current.replace(scope);
        let result = self.comprehension_level(generators, Some(iterable), emit);
        self.ctx.current = saved;
        self.ctx.scopes.release(scope);
        result
    }

    fn comprehension_level(
        &mut self,
        generators: &[Comprehension],
        iterable: Option<Value>,
        emit: &mut Emit<'_>,
    ) -> EvalResult<()> {
        let Some((generator, inner)) = generators.split_first() else {
            return emit(self);
        };
        let iterable = match iterable {
            Some(iterable) => iterable,
            None => self.eval(&generator.iter)?,
        };
        'items: for item in self.iter_value(&iterable)? {
            self.ctx.step()?;
            self.assign_target(&generator.target, item)?;
            for condition in &generator.conditions {
                if !self.eval(condition)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehension_level(inner, None, emit)?;
        }
        Ok(())
    }

    fn compare(&mut self, op: CompareOperator, left: &Value, right: &Value) -> EvalResult<bool> {
        let ordered = |expected: &[Ordering]| -> EvalResult<bool> {
            match left.compare(right) {
                Some(Some(ordering)) => Ok(expected.contains(&ordering)),
                Some(None) => Ok(false),
                None => type_error(format!(
                    "'{op}' not supported between instances of '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                )),
            }
        };
        match op {
            CompareOperator::Eq => Ok(left.py_eq(right)),
            CompareOperator::NotEq => Ok(!left.py_eq(right)),
            CompareOperator::Lt => ordered(&[Ordering::Less]),
            CompareOperator::LtE => ordered(&[Ordering::Less, Ordering::Equal]),
            CompareOperator::Gt => ordered(&[Ordering::Greater]),
            CompareOperator::GtE => ordered(&[Ordering::Greater, Ordering::Equal]),
            CompareOperator::In => self.contains(right, left),
            CompareOperator::NotIn => Ok(!self.contains(right, left)?),
            CompareOperator::Is => Ok(left.is_same(right)),
            CompareOperator::IsNot => Ok(!left.is_same(right)),
        }
    }

    /// `item in container`
    pub(super) fn contains(&mut self, container: &Value, item: &Value) -> EvalResult<bool> {
        match container {
            Value::Str(s) => match item {
                Value::Str(needle) => Ok(s.contains(needle.as_ref())),
                other => type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                )),
            },
            Value::List(items) => {
                let len = items.borrow().len();
                self.ctx.charge(len as u64)?;
                Ok(items.borrow().iter().any(|candidate| candidate.py_eq(item)))
            }
            Value::Tuple(items) => {
                self.ctx.charge(items.len() as u64)?;
                Ok(items.iter().any(|candidate| candidate.py_eq(item)))
            }
            Value::Dict(entries) => Ok(entries.borrow().contains_key(&item.hash_key()?)),
            Value::Set(items) => Ok(items.borrow().contains_key(&item.hash_key()?)),
            Value::Range(range) => Ok(match item {
                Value::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    range.contains(*f as i64)
                }
                other => other.as_int().is_some_and(|i| range.contains(i)),
            }),
            Value::Iterator(iterator) => loop {
                self.ctx.step()?;
                let next = iterator.borrow_mut().items.pop_front();
                match next {
                    Some(candidate) if candidate.py_eq(item) => break Ok(true),
                    Some(_) => {}
                    None => break Ok(false),
                }
            },
            other => type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            )),
        }
    }

    pub(super) fn get_item(&mut self, container: &Value, key: &Value) -> EvalResult<Value> {
        match container {
            Value::List(items) => {
                let items = items.borrow();
                let index = sequence_index(container, key, items.len())?;
                Ok(items[index].clone())
            }
            Value::Tuple(items) => {
                let index = sequence_index(container, key, items.len())?;
                Ok(items[index].clone())
            }
            Value::Str(s) => {
                let index = sequence_index(container, key, s.chars().count())?;
                Ok(s.chars()
                    .nth(index)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default())
            }
            Value::Range(range) => {
                let index = sequence_index(container, key, range.len())?;
                Ok(range.get(index).map(Value::Int).unwrap_or_default())
            }
            Value::Dict(entries) => {
                let hash_key: HashKey = key.hash_key()?;
                match entries.borrow().get(&hash_key) {
                    Some((_, value)) => Ok(value.clone()),
                    None => Err(
                        PyException::with_args(ExceptionKind::KeyError, vec![key.clone()]).into(),
                    ),
                }
            }
            // `list[int]` and friends in annotations
            Value::Type(_) | Value::Builtin(_) => Ok(container.clone()),
            other => type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            )),
        }
    }

    pub(super) fn eval_slice_parts(
        &mut self,
        lower: &Option<Box<Expression>>,
        upper: &Option<Box<Expression>>,
        step: &Option<Box<Expression>>,
    ) -> EvalResult<(Option<i64>, Option<i64>, Option<i64>)> {
        let mut bounds = [None, None, None];
        for (slot, bound) in bounds.iter_mut().zip([lower, upper, step]) {
            if let Some(bound) = bound {
                let value = self.eval(bound)?;
                *slot = slice_index(value)?;
            }
        }
        let [lower, upper, step] = bounds;
        Ok((lower, upper, step))
    }

    fn get_slice(
        &mut self,
        container: &Value,
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
    ) -> EvalResult<Value> {
        match container {
            Value::List(items) => {
                let items = items.borrow();
                let positions = slice_positions(items.len(), lower, upper, step)?;
                self.ctx.charge(positions.len() as u64)?;
                Ok(Value::list(positions.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Tuple(items) => {
                let positions = slice_positions(items.len(), lower, upper, step)?;
                self.ctx.charge(positions.len() as u64)?;
                Ok(Value::tuple(positions.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let positions = slice_positions(chars.len(), lower, upper, step)?;
                self.ctx.charge(positions.len() as u64)?;
                Ok(Value::from(
                    positions.into_iter().map(|i| chars[i]).collect::<String>(),
                ))
            }
            Value::Range(range) => {
                let positions = slice_positions(range.len(), lower, upper, step)?;
                let step = range.step * step.unwrap_or(1);
                let sliced = match positions.first().and_then(|first| range.get(*first)) {
                    Some(start) => RangeValue {
                        start,
                        stop: start + step * positions.len() as i64,
                        step,
                    },
                    None => RangeValue {
                        start: 0,
                        stop: 0,
                        step: 1,
                    },
                };
                Ok(Value::Range(sliced))
            }
            other => type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::Program;
    use crate::config::SandboxLimits;
    use crate::eval::Evaluator;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> String {
        let program = Program::parse(&format!("result = {source}\n")).unwrap();
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        match evaluator.run_module(program.module()) {
            Ok(()) => evaluator.globals().get("result").unwrap().repr(),
            Err(error) => error.to_string(),
        }
    }

    #[test]
    fn test_arithmetic_and_logic() {
        assert_eq!(eval("1 + 2 * 3 ** 2"), "19");
        assert_eq!(eval("7 // -2, 7 % -2"), "(-4, -1)");
        assert_eq!(eval("0 or [] or 'x'"), "'x'");
        assert_eq!(eval("1 and 0"), "0");
        assert_eq!(eval("not []"), "True");
        assert_eq!(eval("1 < 2 < 3 > 2"), "True");
        assert_eq!(eval("1 < 2 > 5"), "False");
        assert_eq!(
            eval("1 < 'a'"),
            "TypeError: '<' not supported between instances of 'int' and 'str'"
        );
    }

    #[test]
    fn test_membership() {
        assert_eq!(eval("'ell' in 'hello'"), "True");
        assert_eq!(eval("3 in range(0, 10, 3)"), "True");
        assert_eq!(eval("'k' not in {'k': 1}"), "False");
        assert_eq!(
            eval("1 in 'abc'"),
            "TypeError: 'in <string>' requires string as left operand, not int"
        );
        assert_eq!(eval("[1] in [[1], 2]"), "True");
    }

    #[test]
    fn test_indexing_and_slicing() {
        assert_eq!(eval("'hello'[-1]"), "'o'");
        assert_eq!(eval("'hello'[::-1]"), "'olleh'");
        assert_eq!(eval("[1, 2, 3, 4][1:3]"), "[2, 3]");
        assert_eq!(eval("(1, 2, 3)[5:]"), "()");
        assert_eq!(eval("list(range(10)[2:8:3])"), "[2, 5]");
        assert_eq!(eval("[1][3]"), "IndexError: list index out of range");
        assert_eq!(eval("{'a': 1}['b']"), "KeyError: 'b'");
        assert_eq!(eval("5[0]"), "TypeError: 'int' object is not subscriptable");
    }

    #[test]
    fn test_displays_and_comprehensions() {
        assert_eq!(eval("[*range(3), *'ab']"), "[0, 1, 2, 'a', 'b']");
        assert_eq!(eval("{**{'a': 1}, 'b': 2}"), "{'a': 1, 'b': 2}");
        assert_eq!(eval("[x * y for x in range(3) for y in range(x) if y]"), "[2]");
        assert_eq!(eval("{k: v for k, v in zip('ab', [1, 2])}"), "{'a': 1, 'b': 2}");
        assert_eq!(eval("{x % 3 for x in range(10)}"), "{0, 1, 2}");
        assert_eq!(eval("sum(x for x in range(5))"), "10");
    }

    #[test]
    fn test_comprehension_variables_do_not_leak() {
        let program = Program::parse("x = 'outer'\nr = [x for x in range(3)]\n").unwrap();
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        evaluator.run_module(program.module()).unwrap();
        assert_eq!(evaluator.globals().get("x").unwrap().repr(), "'outer'");
    }

    #[test]
    fn test_fstrings() {
        assert_eq!(eval("f'{1 + 1}-{\"x\"!r}'"), "\"2-'x'\"");
        assert_eq!(eval("f'{3.14159:.2f}'"), "'3.14'");
        assert_eq!(eval("f'{42:>{2 + 3}}'"), "'   42'");
    }

    #[test]
    fn test_calls_with_unpacking() {
        assert_eq!(eval("max(*[3, 9], **{'key': lambda v: -v})"), "3");
        assert_eq!(eval("(lambda *a, **k: (a, k))(1, x=2)"), "((1,), {'x': 2})");
        assert_eq!(eval("(y := 5) + y"), "10");
        assert_eq!(eval("'abc'.upper()"), "'ABC'");
    }

    #[test]
    fn test_deep_nesting_is_a_limit_not_a_crash() {
        let source = format!("{}1{}", "(".repeat(90), ")".repeat(90));
        assert_eq!(eval(&source), "1");
    }
}
