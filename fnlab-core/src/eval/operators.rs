//! Arithmetic, bitwise and container operators.

use std::rc::Rc;

use super::context::ExecutionContext;
use super::evaluator::{EvalResult, raise, type_error};
use super::exception::ExceptionKind;
use super::format::percent_format;
use super::value::{Dict, Set, Value};
use crate::ast::{BinaryOperator, UnaryOperator};

fn overflow<T>() -> EvalResult<T> {
    raise(ExceptionKind::OverflowError, "integer overflow")
}

fn unsupported<T>(op: BinaryOperator, left: &Value, right: &Value) -> EvalResult<T> {
    type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

pub fn unary(op: UnaryOperator, operand: &Value) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOperator::Not, value) => Ok(Value::Bool(!value.truthy())),
        (UnaryOperator::Plus, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOperator::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
        (op, value) => match (op, value.as_int()) {
            (UnaryOperator::Plus, Some(i)) => Ok(Value::Int(i)),
            (UnaryOperator::Minus, Some(i)) => i.checked_neg().map(Value::Int).map_or_else(overflow, Ok),
            (UnaryOperator::Invert, Some(i)) => Ok(Value::Int(!i)),
            _ => type_error(format!(
                "bad operand type for {}: '{}'",
                op,
                value.type_name()
            )),
        },
    }
}

pub fn binary(
    ctx: &mut ExecutionContext,
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> EvalResult<Value> {
    use BinaryOperator::*;

    // bool & bool stays a bool
    if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
        match op {
            BitAnd => return Ok(Value::Bool(a & b)),
            BitOr => return Ok(Value::Bool(a | b)),
            BitXor => return Ok(Value::Bool(a ^ b)),
            _ => {}
        }
    }

    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return int_binary(op, a, b);
    }
    if left.is_number() && right.is_number() {
        if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
            return float_binary(op, a, b);
        }
    }

    match (op, left, right) {
        (Add, Value::Str(a), Value::Str(b)) => {
            ctx.check_len(a.len() + b.len())?;
            ctx.charge((a.len() + b.len()) as u64 / 64)?;
            Ok(Value::from(format!("{a}{b}")))
        }
        (Add, Value::Str(_), other) => type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        )),
        (Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            ctx.check_len(items.len())?;
            ctx.charge(items.len() as u64)?;
            Ok(Value::list(items))
        }
        (Add, Value::List(_), other) => type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        )),
        (Add, Value::Tuple(a), Value::Tuple(b)) => {
            let items: Vec<Value> = a.iter().chain(b.iter()).cloned().collect();
            ctx.check_len(items.len())?;
            ctx.charge(items.len() as u64)?;
            Ok(Value::tuple(items))
        }
        (Mul, sequence, count) | (Mul, count, sequence)
            if count.as_int().is_some()
                && matches!(sequence, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            let times = count.as_int().unwrap_or(0).max(0) as usize;
            repeat(ctx, sequence, times)
        }
        (Mod, Value::Str(template), args) => {
            let text = percent_format(template, args)?;
            ctx.check_len(text.len())?;
            ctx.charge_text(&text)?;
            Ok(Value::from(text))
        }
        (BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged: Dict = a.borrow().clone();
            for (key, entry) in b.borrow().iter() {
                merged.insert(key.clone(), entry.clone());
            }
            Ok(Value::dict(merged))
        }
        (Sub | BitOr | BitAnd | BitXor, Value::Set(a), Value::Set(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            let result: Set = match op {
                Sub => a
                    .iter()
                    .filter(|(key, _)| !b.contains_key(*key))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                BitAnd => a
                    .iter()
                    .filter(|(key, _)| b.contains_key(*key))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                BitOr => {
                    let mut union = a.clone();
                    for (k, v) in b.iter() {
                        union.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                    union
                }
                _ => a
                    .iter()
                    .filter(|(key, _)| !b.contains_key(*key))
                    .chain(b.iter().filter(|(key, _)| !a.contains_key(*key)))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            };
            ctx.charge((a.len() + b.len()) as u64)?;
            Ok(Value::set(result))
        }
        _ => unsupported(op, left, right),
    }
}

fn repeat(ctx: &mut ExecutionContext, sequence: &Value, times: usize) -> EvalResult<Value> {
    match sequence {
        Value::Str(s) => {
            let len = s.chars().count().saturating_mul(times);
            ctx.check_len(len)?;
            ctx.charge(len as u64 / 64)?;
            Ok(Value::from(s.repeat(times)))
        }
        Value::List(items) => {
            let items = items.borrow();
            let len = items.len().saturating_mul(times);
            ctx.check_len(len)?;
            ctx.charge(len as u64)?;
            Ok(Value::list(repeat_items(&items, times)))
        }
        Value::Tuple(items) => {
            let len = items.len().saturating_mul(times);
            ctx.check_len(len)?;
            ctx.charge(len as u64)?;
            Ok(Value::Tuple(Rc::from(repeat_items(&items, times))))
        }
        _ => Ok(sequence.clone()),
    }
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    std::iter::repeat_n(items, times)
        .flat_map(|chunk| chunk.iter().cloned())
        .collect()
}

fn int_binary(op: BinaryOperator, a: i64, b: i64) -> EvalResult<Value> {
    use BinaryOperator::*;
    let checked = |result: Option<i64>| result.map(Value::Int).map_or_else(overflow, Ok);
    match op {
        Add => checked(a.checked_add(b)),
        Sub => checked(a.checked_sub(b)),
        Mul => checked(a.checked_mul(b)),
        Div => {
            if b == 0 {
                return raise(ExceptionKind::ZeroDivisionError, "division by zero");
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        FloorDiv => {
            if b == 0 {
                return raise(
                    ExceptionKind::ZeroDivisionError,
                    "integer division or modulo by zero",
                );
            }
            checked(floor_div(a, b))
        }
        Mod => {
            if b == 0 {
                return raise(
                    ExceptionKind::ZeroDivisionError,
                    "integer division or modulo by zero",
                );
            }
            checked(floor_mod(a, b))
        }
        Pow => int_pow(a, b),
        LShift => {
            if b < 0 {
                return raise(ExceptionKind::ValueError, "negative shift count");
            }
            if a == 0 {
                return Ok(Value::Int(0));
            }
            let shifted = u32::try_from(b)
                .ok()
                .and_then(|b| a.checked_shl(b))
                .filter(|r| r >> b == a);
            checked(shifted)
        }
        RShift => {
            if b < 0 {
                return raise(ExceptionKind::ValueError, "negative shift count");
            }
            Ok(Value::Int(a >> b.min(63)))
        }
        BitAnd => Ok(Value::Int(a & b)),
        BitOr => Ok(Value::Int(a | b)),
        BitXor => Ok(Value::Int(a ^ b)),
        MatMul => unsupported(op, &Value::Int(a), &Value::Int(b)),
    }
}

pub fn int_pow(base: i64, exponent: i64) -> EvalResult<Value> {
    if exponent < 0 {
        if base == 0 {
            return raise(
                ExceptionKind::ZeroDivisionError,
                "0.0 cannot be raised to a negative power",
            );
        }
        return Ok(Value::Float((base as f64).powf(exponent as f64)));
    }
    match base {
        0 | 1 => Ok(Value::Int(if exponent == 0 { 1 } else { base })),
        -1 => Ok(Value::Int(if exponent % 2 == 0 { 1 } else { -1 })),
        _ => u32::try_from(exponent)
            .ok()
            .and_then(|e| base.checked_pow(e))
            .map(Value::Int)
            .map_or_else(overflow, Ok),
    }
}

fn float_binary(op: BinaryOperator, a: f64, b: f64) -> EvalResult<Value> {
    use BinaryOperator::*;
    let result = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => {
            if b == 0.0 {
                return raise(ExceptionKind::ZeroDivisionError, "float division by zero");
            }
            a / b
        }
        FloorDiv => {
            if b == 0.0 {
                return raise(
                    ExceptionKind::ZeroDivisionError,
                    "float floor division by zero",
                );
            }
            (a / b).floor()
        }
        Mod => {
            if b == 0.0 {
                return raise(ExceptionKind::ZeroDivisionError, "float modulo");
            }
            float_mod(a, b)
        }
        Pow => return float_pow(a, b),
        _ => return unsupported(op, &Value::Float(a), &Value::Float(b)),
    };
    Ok(Value::Float(result))
}

pub fn float_pow(base: f64, exponent: f64) -> EvalResult<Value> {
    if base == 0.0 && exponent < 0.0 {
        return raise(
            ExceptionKind::ZeroDivisionError,
            "0.0 cannot be raised to a negative power",
        );
    }
    if base < 0.0 && exponent.fract() != 0.0 && exponent.is_finite() {
        return raise(ExceptionKind::ValueError, "math domain error");
    }
    let result = base.powf(exponent);
    if result.is_infinite() && base.is_finite() && exponent.is_finite() {
        return raise(ExceptionKind::OverflowError, "(34, 'Numerical result out of range')");
    }
    Ok(Value::Float(result))
}

pub fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

pub fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

pub fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxLimits;
    use pretty_assertions::assert_eq;

    fn eval(op: BinaryOperator, left: Value, right: Value) -> String {
        let mut ctx = ExecutionContext::new(SandboxLimits::default());
        match binary(&mut ctx, op, &left, &right) {
            Ok(value) => value.repr(),
            Err(error) => error.to_string(),
        }
    }

    #[test]
    fn test_python_division_semantics() {
        use BinaryOperator::*;
        assert_eq!(eval(FloorDiv, Value::Int(-7), Value::Int(2)), "-4");
        assert_eq!(eval(Mod, Value::Int(-7), Value::Int(2)), "1");
        assert_eq!(eval(Mod, Value::Int(7), Value::Int(-2)), "-1");
        assert_eq!(eval(Div, Value::Int(7), Value::Int(2)), "3.5");
        assert_eq!(eval(Mod, Value::Float(-1.5), Value::Int(1)), "0.5");
        assert_eq!(
            eval(Div, Value::Int(1), Value::Int(0)),
            "ZeroDivisionError: division by zero"
        );
        assert_eq!(
            eval(FloorDiv, Value::Int(1), Value::Int(0)),
            "ZeroDivisionError: integer division or modulo by zero"
        );
    }

    #[test]
    fn test_overflow() {
        assert_eq!(
            eval(BinaryOperator::Mul, Value::Int(i64::MAX), Value::Int(2)),
            "OverflowError: integer overflow"
        );
        assert_eq!(
            eval(BinaryOperator::Pow, Value::Int(2), Value::Int(64)),
            "OverflowError: integer overflow"
        );
        assert_eq!(eval(BinaryOperator::Pow, Value::Int(2), Value::Int(-1)), "0.5");
        assert_eq!(
            eval(BinaryOperator::FloorDiv, Value::Int(i64::MIN), Value::Int(-1)),
            "OverflowError: integer overflow"
        );
    }

    #[test]
    fn test_sequences() {
        use BinaryOperator::*;
        assert_eq!(eval(Mul, Value::from("ab"), Value::Int(3)), "'ababab'");
        assert_eq!(eval(Mul, Value::Int(2), Value::list(vec![Value::Int(0)])), "[0, 0]");
        assert_eq!(
            eval(Mul, Value::list(vec![Value::Int(1), Value::from("x")]), Value::Int(2)),
            "[1, 'x', 1, 'x']"
        );
        assert_eq!(
            eval(Mul, Value::Tuple(Rc::from(vec![Value::Int(1)])), Value::Int(3)),
            "(1, 1, 1)"
        );
        assert_eq!(
            eval(Add, Value::from("a"), Value::Int(1)),
            "TypeError: can only concatenate str (not \"int\") to str"
        );
        assert_eq!(
            eval(Sub, Value::from("a"), Value::Int(1)),
            "TypeError: unsupported operand type(s) for -: 'str' and 'int'"
        );
        assert_eq!(eval(Mod, Value::from("%d%%"), Value::Int(5)), "'5%'");
    }

    #[test]
    fn test_repeat_respects_length_limit() {
        let mut ctx = ExecutionContext::new(SandboxLimits {
            max_collection_len: 10,
            ..Default::default()
        });
        let result = binary(
            &mut ctx,
            BinaryOperator::Mul,
            &Value::list(vec![Value::None]),
            &Value::Int(1_000_000_000),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOperator::Minus, &Value::Bool(true)).unwrap().repr(), "-1");
        assert_eq!(unary(UnaryOperator::Invert, &Value::Int(5)).unwrap().repr(), "-6");
        assert_eq!(
            unary(UnaryOperator::Minus, &Value::from("x"))
                .unwrap_err()
                .to_string(),
            "TypeError: bad operand type for unary -: 'str'"
        );
    }
}
