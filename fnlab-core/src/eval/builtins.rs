//! Builtin functions and types bound in every namespace.

use std::cmp::Ordering;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::str::FromStr;

use strum::{EnumIter, EnumString, IntoStaticStr};

use super::evaluator::{CallArgs, EvalError, EvalResult, Evaluator, raise, type_error};
use super::exception::{ExceptionKind, PyException};
use super::format::format_value;
use super::operators::{self, floor_div, floor_mod};
use super::value::{Dict, HashKey, RangeValue, Set, Value};
use crate::ast::BinaryOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Print,
    Input,
    Len,
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Dict,
    Set,
    Range,
    Type,
    Abs,
    Min,
    Max,
    Sum,
    Round,
    Sorted,
    Reversed,
    Enumerate,
    Zip,
    Any,
    All,
    Pow,
    Divmod,
    Chr,
    Ord,
    Repr,
    Isinstance,
    Map,
    Filter,
    Iter,
    Next,
    Hex,
    Bin,
    Oct,
    Hash,
    Callable,
    Format,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        (*self).into()
    }

    /// Builtins that are classes rather than functions.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Builtin::Str
                | Builtin::Int
                | Builtin::Float
                | Builtin::Bool
                | Builtin::List
                | Builtin::Tuple
                | Builtin::Dict
                | Builtin::Set
                | Builtin::Range
                | Builtin::Type
        )
    }
}

/// Resolves a name that is not bound in any user namespace.
pub fn lookup_builtin(name: &str) -> Option<Value> {
    if name == "__name__" {
        // keeps `if __name__ == "__main__":` blocks from running on load
        return Some(Value::from("builtins"));
    }
    if let Ok(builtin) = Builtin::from_str(name) {
        return Some(Value::Builtin(builtin));
    }
    ExceptionKind::from_str(name).ok().map(Value::ExceptionClass)
}

/// Class object returned by `type(value)`.
pub fn type_of(value: &Value) -> Value {
    let builtin = match value {
        Value::Bool(_) => Builtin::Bool,
        Value::Int(_) => Builtin::Int,
        Value::Float(_) => Builtin::Float,
        Value::Str(_) => Builtin::Str,
        Value::List(_) => Builtin::List,
        Value::Tuple(_) => Builtin::Tuple,
        Value::Dict(_) => Builtin::Dict,
        Value::Set(_) => Builtin::Set,
        Value::Range(_) => Builtin::Range,
        Value::Exception(exception) => return Value::ExceptionClass(exception.kind),
        Value::ExceptionClass(_) | Value::Type(_) => Builtin::Type,
        Value::Builtin(b) if b.is_type() => Builtin::Type,
        other => return Value::Type(other.type_name()),
    };
    Value::Builtin(builtin)
}

fn is_instance(value: &Value, class: &Value) -> EvalResult<bool> {
    Ok(match class {
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(value, class)? {
                    return Ok(true);
                }
            }
            false
        }
        Value::Builtin(Builtin::Int) => matches!(value, Value::Int(_) | Value::Bool(_)),
        Value::Builtin(Builtin::Type) => {
            matches!(value, Value::ExceptionClass(_) | Value::Type(_))
                || matches!(value, Value::Builtin(b) if b.is_type())
        }
        Value::Builtin(builtin) if builtin.is_type() => {
            matches!(type_of(value), Value::Builtin(b) if b == *builtin)
        }
        Value::ExceptionClass(kind) => {
            matches!(value, Value::Exception(exception) if exception.kind.is_subclass_of(*kind))
        }
        Value::Type(name) => value.type_name() == *name,
        _ => {
            return type_error(
                "isinstance() arg 2 must be a type, a tuple of types, or a union",
            );
        }
    })
}

/// `int("...", base)`
pub fn parse_int(text: &str, base: u32) -> EvalResult<i64> {
    let invalid = || {
        PyException::new(
            ExceptionKind::ValueError,
            format!(
                "invalid literal for int() with base {base}: {}",
                Value::from(text).repr()
            ),
        )
    };
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = unsigned.to_ascii_lowercase();
    let (radix, digits) = match (base, lower.get(..2)) {
        (0 | 16, Some("0x")) => (16, &unsigned[2..]),
        (0 | 8, Some("0o")) => (8, &unsigned[2..]),
        (0 | 2, Some("0b")) => (2, &unsigned[2..]),
        (0, _) => (10, unsigned),
        (base, _) => (base, unsigned),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
        || (base == 0 && radix == 10 && digits.starts_with('0')
            && !digits.trim_start_matches(['0', '_']).is_empty())
    {
        return Err(invalid().into());
    }
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if !cleaned.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid().into());
    }
    let magnitude = u64::from_str_radix(&cleaned, radix).map_err(|_| {
        PyException::new(ExceptionKind::OverflowError, "int too large to convert")
    })?;
    let value = if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    };
    value.ok_or_else(|| {
        PyException::new(ExceptionKind::OverflowError, "int too large to convert").into()
    })
}

/// `float("...")`
pub fn parse_float(text: &str) -> EvalResult<f64> {
    let trimmed = text.trim();
    let cleaned = if trimmed.contains('_') {
        let valid = trimmed
            .split('_')
            .all(|part| !part.is_empty() && part.ends_with(|c: char| c.is_ascii_digit()));
        if !valid {
            return raise(
                ExceptionKind::ValueError,
                format!("could not convert string to float: {}", Value::from(text).repr()),
            );
        }
        trimmed.replace('_', "")
    } else {
        trimmed.to_string()
    };
    cleaned.parse::<f64>().or_else(|_| {
        raise(
            ExceptionKind::ValueError,
            format!("could not convert string to float: {}", Value::from(text).repr()),
        )
    })
}

/// Integral value of a float, as `int(float)` computes it.
pub fn float_to_int(f: f64) -> EvalResult<i64> {
    if f.is_nan() {
        return raise(ExceptionKind::ValueError, "cannot convert float NaN to integer");
    }
    if f.is_infinite() {
        return raise(
            ExceptionKind::OverflowError,
            "cannot convert float infinity to integer",
        );
    }
    let truncated = f.trunc();
    if truncated.abs() >= 9.223_372_036_854_776e18 {
        return raise(ExceptionKind::OverflowError, "int too large to convert");
    }
    Ok(truncated as i64)
}

fn index_arg(value: &Value) -> EvalResult<i64> {
    value.as_int().ok_or_else(|| {
        PyException::new(
            ExceptionKind::TypeError,
            format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ),
        )
        .into()
    })
}

fn mod_pow(base: i64, exponent: i64, modulus: i64) -> EvalResult<Value> {
    if modulus == 0 {
        return raise(ExceptionKind::ValueError, "pow() 3rd argument cannot be 0");
    }
    if exponent < 0 {
        return raise(
            ExceptionKind::ValueError,
            "base is not invertible for the given modulus",
        );
    }
    let m = modulus as i128;
    let mut result: i128 = 1;
    let mut b = (base as i128).rem_euclid(m);
    let mut e = exponent;
    while e > 0 {
        if e & 1 == 1 {
            result = result * b % m;
        }
        b = b * b % m;
        e >>= 1;
    }
    // result takes the sign of the modulus
    let mut result = result.rem_euclid(m);
    if modulus < 0 && result != 0 {
        result += m;
    }
    Ok(Value::Int(result as i64))
}

fn round_float(x: f64, digits: i64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if digits >= 0 {
        let digits = digits.min(340) as usize;
        // decimal formatting is correctly rounded, half to even on exact ties
        format!("{x:.digits$}").parse().unwrap_or(x)
    } else {
        let factor = 10f64.powi((-digits).min(330) as i32);
        (x / factor).round_ties_even() * factor
    }
}

fn round_int(i: i64, digits: i64) -> EvalResult<i64> {
    if digits >= 0 {
        return Ok(i);
    }
    let Some(factor) = u32::try_from(-digits).ok().and_then(|d| 10i64.checked_pow(d)) else {
        return Ok(0);
    };
    let quotient = floor_div(i, factor).unwrap_or(0);
    let remainder = floor_mod(i, factor).unwrap_or(0);
    let rounded = match (remainder * 2).cmp(&factor) {
        Ordering::Greater => quotient + 1,
        Ordering::Equal if quotient % 2 != 0 => quotient + 1,
        _ => quotient,
    };
    rounded
        .checked_mul(factor)
        .ok_or_else(|| PyException::new(ExceptionKind::OverflowError, "integer overflow").into())
}

fn radix_string(value: &Value, radix: u32, prefix: &str) -> EvalResult<Value> {
    let i = index_arg(value)?;
    let magnitude = i.unsigned_abs();
    let digits = match radix {
        2 => format!("{magnitude:b}"),
        8 => format!("{magnitude:o}"),
        _ => format!("{magnitude:x}"),
    };
    let sign = if i < 0 { "-" } else { "" };
    Ok(Value::from(format!("{sign}{prefix}{digits}")))
}

impl Evaluator {
    pub fn call_builtin(&mut self, builtin: Builtin, args: CallArgs) -> EvalResult<Value> {
        let name = builtin.name();
        match builtin {
            Builtin::Print => {
                args.expect_keywords(name, &["sep", "end", "file", "flush"])?;
                let text_of = |key: &str, default: &str| match args.keyword(key) {
                    None | Some(Value::None) => Ok(default.to_string()),
                    Some(Value::Str(s)) => Ok(s.to_string()),
                    Some(other) => type_error(format!(
                        "{key} must be None or a string, not {}",
                        other.type_name()
                    )),
                };
                let sep = text_of("sep", " ")?;
                let end = text_of("end", "\n")?;
                let line = args
                    .positional
                    .iter()
                    .map(|value| self.ctx.render_str(value))
                    .collect::<EvalResult<Vec<_>>>()?
                    .join(&sep);
                self.ctx.write_stdout(&line)?;
                self.ctx.write_stdout(&end)?;
                Ok(Value::None)
            }
            Builtin::Input => {
                args.expect_positional(name, 0, 1)?;
                if let Some(prompt) = args.positional.first() {
                    let prompt = self.ctx.render_str(prompt)?;
                    self.ctx.write_stdout(&prompt)?;
                }
                raise(ExceptionKind::EOFError, "EOF when reading a line")
            }
            Builtin::Len => {
                args.expect_positional(name, 1, 1)?;
                let len = match &args.positional[0] {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Dict(entries) => entries.borrow().len(),
                    Value::Set(items) => items.borrow().len(),
                    Value::Range(range) => range.len(),
                    other => {
                        return type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        ));
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Builtin::Str => {
                args.expect_positional(name, 0, 1)?;
                let text = match args.positional.first() {
                    Some(value) => self.ctx.render_str(value)?,
                    None => String::new(),
                };
                Ok(Value::from(text))
            }
            Builtin::Int => {
                args.expect_keywords(name, &["base"])?;
                args.expect_positional(name, 0, 2)?;
                let base = args.positional.get(1).or(args.keyword("base"));
                let Some(value) = args.positional.first() else {
                    return Ok(Value::Int(0));
                };
                match (value, base) {
                    (Value::Str(s), base) => {
                        let base = match base {
                            Some(base) => index_arg(base)?,
                            None => 10,
                        };
                        if base != 0 && !(2..=36).contains(&base) {
                            return raise(
                                ExceptionKind::ValueError,
                                "int() base must be >= 2 and <= 36, or 0",
                            );
                        }
                        Ok(Value::Int(parse_int(s, base as u32)?))
                    }
                    (_, Some(_)) => type_error("int() can't convert non-string with explicit base"),
                    (Value::Float(f), None) => Ok(Value::Int(float_to_int(*f)?)),
                    (other, None) => match other.as_int() {
                        Some(i) => Ok(Value::Int(i)),
                        None => type_error(format!(
                            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                            other.type_name()
                        )),
                    },
                }
            }
            Builtin::Float => {
                args.expect_positional(name, 0, 1)?;
                match args.positional.first() {
                    None => Ok(Value::Float(0.0)),
                    Some(Value::Str(s)) => Ok(Value::Float(parse_float(s)?)),
                    Some(other) => match other.as_float() {
                        Some(f) => Ok(Value::Float(f)),
                        None => type_error(format!(
                            "float() argument must be a string or a real number, not '{}'",
                            other.type_name()
                        )),
                    },
                }
            }
            Builtin::Bool => {
                args.expect_positional(name, 0, 1)?;
                Ok(Value::Bool(
                    args.positional.first().is_some_and(Value::truthy),
                ))
            }
            Builtin::List | Builtin::Tuple | Builtin::Set => {
                args.expect_keywords(name, &[])?;
                args.expect_positional(name, 0, 1)?;
                let items = match args.positional.first() {
                    Some(iterable) => self.collect(iterable)?,
                    None => Vec::new(),
                };
                match builtin {
                    Builtin::List => Ok(Value::list(items)),
                    Builtin::Tuple => Ok(Value::tuple(items)),
                    _ => self.make_set(items),
                }
            }
            Builtin::Dict => {
                args.expect_positional(name, 0, 1)?;
                let mut entries = Dict::new();
                if let Some(source) = args.positional.first() {
                    self.update_dict(&mut entries, source)?;
                }
                for (key, value) in args.keywords {
                    entries.insert(
                        Value::from(key.as_str()).hash_key()?,
                        (Value::from(key), value),
                    );
                }
                Ok(Value::dict(entries))
            }
            Builtin::Range => {
                args.expect_keywords(name, &[])?;
                args.expect_positional(name, 1, 3)?;
                let mut bounds = Vec::with_capacity(3);
                for value in &args.positional {
                    bounds.push(index_arg(value)?);
                }
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => (0, 0, 1),
                };
                if step == 0 {
                    return raise(ExceptionKind::ValueError, "range() arg 3 must not be zero");
                }
                Ok(Value::Range(RangeValue { start, stop, step }))
            }
            Builtin::Type => {
                args.expect_positional(name, 1, 1)?;
                Ok(type_of(&args.positional[0]))
            }
            Builtin::Abs => {
                args.expect_positional(name, 1, 1)?;
                match &args.positional[0] {
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => match other.as_int() {
                        Some(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
                            PyException::new(ExceptionKind::OverflowError, "integer overflow")
                                .into()
                        }),
                        None => type_error(format!(
                            "bad operand type for abs(): '{}'",
                            other.type_name()
                        )),
                    },
                }
            }
            Builtin::Min | Builtin::Max => self.min_max(builtin, args),
            Builtin::Sum => {
                args.expect_keywords(name, &["start"])?;
                args.expect_positional(name, 1, 2)?;
                let start = args
                    .positional
                    .get(1)
                    .or(args.keyword("start"))
                    .cloned()
                    .unwrap_or(Value::Int(0));
                if matches!(start, Value::Str(_)) {
                    return type_error("sum() can't sum strings [use ''.join(seq) instead]");
                }
                let mut total = start;
                for item in self.iter_value(&args.positional[0])? {
                    self.ctx.step()?;
                    total = operators::binary(&mut self.ctx, BinaryOperator::Add, &total, &item)?;
                }
                Ok(total)
            }
            Builtin::Round => {
                args.expect_keywords(name, &["ndigits"])?;
                args.expect_positional(name, 1, 2)?;
                let digits = match args.positional.get(1).or(args.keyword("ndigits")) {
                    None | Some(Value::None) => None,
                    Some(value) => Some(index_arg(value)?),
                };
                match (&args.positional[0], digits) {
                    (Value::Float(f), None) => Ok(Value::Int(float_to_int(f.round_ties_even())?)),
                    (Value::Float(f), Some(digits)) => Ok(Value::Float(round_float(*f, digits))),
                    (other, digits) => match other.as_int() {
                        Some(i) => Ok(Value::Int(round_int(i, digits.unwrap_or(0))?)),
                        None => type_error(format!(
                            "type {} doesn't define __round__ method",
                            other.type_name()
                        )),
                    },
                }
            }
            Builtin::Sorted => {
                args.expect_keywords(name, &["key", "reverse"])?;
                args.expect_positional(name, 1, 1)?;
                let items = self.collect(&args.positional[0])?;
                let reverse = args.keyword("reverse").is_some_and(Value::truthy);
                let sorted = self.sort_values(items, args.keyword("key"), reverse)?;
                Ok(Value::list(sorted))
            }
            Builtin::Reversed => {
                args.expect_positional(name, 1, 1)?;
                let (type_name, mut items) = match &args.positional[0] {
                    Value::List(_) => ("list_reverseiterator", self.collect(&args.positional[0])?),
                    Value::Range(_) => ("range_iterator", self.collect(&args.positional[0])?),
                    Value::Dict(_) => ("dict_reversekeyiterator", self.collect(&args.positional[0])?),
                    value @ (Value::Tuple(_) | Value::Str(_)) => ("reversed", self.collect(value)?),
                    other => {
                        return type_error(format!(
                            "'{}' object is not reversible",
                            other.type_name()
                        ));
                    }
                };
                items.reverse();
                Ok(Value::iterator(type_name, items))
            }
            Builtin::Enumerate => {
                args.expect_keywords(name, &["start"])?;
                args.expect_positional(name, 1, 2)?;
                let start = match args.positional.get(1).or(args.keyword("start")) {
                    Some(value) => index_arg(value)?,
                    None => 0,
                };
                let items = self.collect(&args.positional[0])?;
                let pairs = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Value::tuple(vec![Value::Int(start + i as i64), item]));
                Ok(Value::iterator("enumerate", pairs))
            }
            Builtin::Zip => {
                args.expect_keywords(name, &["strict"])?;
                let rows = self.zip_rows(&args.positional)?;
                Ok(Value::iterator("zip", rows.into_iter().map(Value::tuple)))
            }
            Builtin::Any | Builtin::All => {
                args.expect_positional(name, 1, 1)?;
                let want = builtin == Builtin::Any;
                for item in self.iter_value(&args.positional[0])? {
                    self.ctx.step()?;
                    if item.truthy() == want {
                        return Ok(Value::Bool(want));
                    }
                }
                Ok(Value::Bool(!want))
            }
            Builtin::Pow => {
                args.expect_positional(name, 2, 3)?;
                match args.positional.get(2) {
                    Some(Value::None) | None => operators::binary(
                        &mut self.ctx,
                        BinaryOperator::Pow,
                        &args.positional[0],
                        &args.positional[1],
                    ),
                    Some(modulus) => {
                        match (args.positional[0].as_int(), args.positional[1].as_int(), modulus.as_int()) {
                            (Some(b), Some(e), Some(m)) => mod_pow(b, e, m),
                            _ => type_error(
                                "pow() 3rd argument not allowed unless all arguments are integers",
                            ),
                        }
                    }
                }
            }
            Builtin::Divmod => {
                args.expect_positional(name, 2, 2)?;
                let (a, b) = (&args.positional[0], &args.positional[1]);
                let quotient = operators::binary(&mut self.ctx, BinaryOperator::FloorDiv, a, b)?;
                let remainder = operators::binary(&mut self.ctx, BinaryOperator::Mod, a, b)?;
                Ok(Value::tuple(vec![quotient, remainder]))
            }
            Builtin::Chr => {
                args.expect_positional(name, 1, 1)?;
                let code = index_arg(&args.positional[0])?;
                match u32::try_from(code).ok().and_then(char::from_u32) {
                    Some(c) => Ok(Value::from(c.to_string())),
                    None => raise(ExceptionKind::ValueError, "chr() arg not in range(0x110000)"),
                }
            }
            Builtin::Ord => {
                args.expect_positional(name, 1, 1)?;
                match &args.positional[0] {
                    Value::Str(s) => {
                        let mut chars = s.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => Ok(Value::Int(c as i64)),
                            _ => type_error(format!(
                                "ord() expected a character, but string of length {} found",
                                s.chars().count()
                            )),
                        }
                    }
                    other => type_error(format!(
                        "ord() expected string of length 1, but {} found",
                        other.type_name()
                    )),
                }
            }
            Builtin::Repr => {
                args.expect_positional(name, 1, 1)?;
                Ok(Value::from(self.ctx.render_repr(&args.positional[0])?))
            }
            Builtin::Isinstance => {
                args.expect_positional(name, 2, 2)?;
                Ok(Value::Bool(is_instance(&args.positional[0], &args.positional[1])?))
            }
            Builtin::Map => {
                if args.positional.len() < 2 {
                    return type_error("map() must have at least two arguments.");
                }
                let function = args.positional[0].clone();
                let rows = self.zip_rows(&args.positional[1..])?;
                let mut results = Vec::with_capacity(rows.len());
                for row in rows {
                    results.push(self.call(&function, CallArgs::positional(row))?);
                }
                Ok(Value::iterator("map", results))
            }
            Builtin::Filter => {
                args.expect_positional(name, 2, 2)?;
                let predicate = args.positional[0].clone();
                let mut kept = Vec::new();
                for item in self.collect(&args.positional[1])? {
                    let keep = match &predicate {
                        Value::None => item.truthy(),
                        function => self
                            .call(function, CallArgs::positional(vec![item.clone()]))?
                            .truthy(),
                    };
                    if keep {
                        kept.push(item);
                    }
                }
                Ok(Value::iterator("filter", kept))
            }
            Builtin::Iter => {
                args.expect_positional(name, 1, 1)?;
                match &args.positional[0] {
                    iterator @ Value::Iterator(_) => Ok(iterator.clone()),
                    other => {
                        let type_name = match other {
                            Value::List(_) => "list_iterator",
                            Value::Tuple(_) => "tuple_iterator",
                            Value::Str(_) => "str_ascii_iterator",
                            Value::Dict(_) => "dict_keyiterator",
                            Value::Set(_) => "set_iterator",
                            _ => "range_iterator",
                        };
                        let items = self.collect(other)?;
                        Ok(Value::iterator(type_name, items))
                    }
                }
            }
            Builtin::Next => {
                args.expect_positional(name, 1, 2)?;
                match &args.positional[0] {
                    Value::Iterator(iterator) => {
                        let next = iterator.borrow_mut().items.pop_front();
                        match (next, args.positional.get(1)) {
                            (Some(value), _) => Ok(value),
                            (None, Some(default)) => Ok(default.clone()),
                            (None, None) => raise(ExceptionKind::StopIteration, ""),
                        }
                    }
                    other => type_error(format!(
                        "'{}' object is not an iterator",
                        other.type_name()
                    )),
                }
            }
            Builtin::Hex => {
                args.expect_positional(name, 1, 1)?;
                radix_string(&args.positional[0], 16, "0x")
            }
            Builtin::Bin => {
                args.expect_positional(name, 1, 1)?;
                radix_string(&args.positional[0], 2, "0b")
            }
            Builtin::Oct => {
                args.expect_positional(name, 1, 1)?;
                radix_string(&args.positional[0], 8, "0o")
            }
            Builtin::Hash => {
                args.expect_positional(name, 1, 1)?;
                let key = args.positional[0].hash_key()?;
                if let HashKey::Int(i) = key {
                    return Ok(Value::Int(i));
                }
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                Ok(Value::Int(hasher.finish() as i64))
            }
            Builtin::Callable => {
                args.expect_positional(name, 1, 1)?;
                Ok(Value::Bool(args.positional[0].is_callable()))
            }
            Builtin::Format => {
                args.expect_positional(name, 1, 2)?;
                let spec = match args.positional.get(1) {
                    Some(Value::Str(spec)) => spec.to_string(),
                    Some(other) => {
                        return type_error(format!(
                            "format() argument 2 must be str, not {}",
                            other.type_name()
                        ));
                    }
                    None => String::new(),
                };
                let text = format_value(&args.positional[0], &spec)?;
                self.ctx.check_len(text.len())?;
                self.ctx.charge_text(&text)?;
                Ok(Value::from(text))
            }
        }
    }

    fn min_max(&mut self, builtin: Builtin, args: CallArgs) -> EvalResult<Value> {
        let name = builtin.name();
        args.expect_keywords(name, &["key", "default"])?;
        let items = match args.positional.as_slice() {
            [] => return type_error(format!("{name} expected at least 1 argument, got 0")),
            [iterable] => self.collect(iterable)?,
            many => {
                if args.keyword("default").is_some() {
                    return type_error(format!(
                        "Cannot specify a default for {name}() with multiple positional arguments"
                    ));
                }
                many.to_vec()
            }
        };
        if items.is_empty() {
            return match args.keyword("default") {
                Some(default) => Ok(default.clone()),
                None => raise(
                    ExceptionKind::ValueError,
                    format!("{name}() iterable argument is empty"),
                ),
            };
        }
        let key = args.keyword("key").filter(|key| !matches!(key, Value::None));
        let wanted = if builtin == Builtin::Max {
            Ordering::Greater
        } else {
            Ordering::Less
        };
        let mut best: Option<(Value, Value)> = None;
        for item in items {
            let item_key = match key {
                Some(function) => self.call(function, CallArgs::positional(vec![item.clone()]))?,
                None => item.clone(),
            };
            best = match best {
                None => Some((item_key, item)),
                Some((best_key, best_item)) => match item_key.compare(&best_key) {
                    Some(Some(ordering)) if ordering == wanted => Some((item_key, item)),
                    Some(_) => Some((best_key, best_item)),
                    None => {
                        let op = if builtin == Builtin::Max { '>' } else { '<' };
                        return type_error(format!(
                            "'{op}' not supported between instances of '{}' and '{}'",
                            item_key.type_name(),
                            best_key.type_name()
                        ));
                    }
                },
            };
        }
        Ok(best.map(|(_, item)| item).unwrap_or_default())
    }

    /// Rows of `zip(*iterables)`, stopping at the shortest input.
    fn zip_rows(&mut self, iterables: &[Value]) -> EvalResult<Vec<Vec<Value>>> {
        if iterables.is_empty() {
            return Ok(Vec::new());
        }
        let mut iterators = Vec::with_capacity(iterables.len());
        for iterable in iterables {
            iterators.push(self.iter_value(iterable)?);
        }
        let mut rows = Vec::new();
        'rows: loop {
            let mut row = Vec::with_capacity(iterators.len());
            for iterator in iterators.iter_mut() {
                match iterator.next() {
                    Some(item) => row.push(item),
                    None => break 'rows,
                }
            }
            self.ctx.step()?;
            rows.push(row);
            self.ctx.check_len(rows.len())?;
        }
        Ok(rows)
    }

    pub fn make_set(&mut self, items: Vec<Value>) -> EvalResult<Value> {
        let mut set = Set::with_capacity(items.len());
        for item in items {
            set.entry(item.hash_key()?).or_insert(item);
        }
        Ok(Value::set(set))
    }

    /// `dict.update(source)` for a mapping or an iterable of pairs.
    pub fn update_dict(&mut self, entries: &mut Dict, source: &Value) -> EvalResult<()> {
        if let Value::Dict(other) = source {
            let other = other.borrow().clone();
            for (key, entry) in other {
                entries.insert(key, entry);
            }
            return Ok(());
        }
        for (index, pair) in self.collect(source)?.into_iter().enumerate() {
            let items = match self.collect(&pair) {
                Ok(items) => items,
                Err(EvalError::Exception(_)) => {
                    return type_error(format!(
                        "cannot convert dictionary update sequence element #{index} to a sequence"
                    ));
                }
                Err(limit) => return Err(limit),
            };
            let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
                PyException::new(
                    ExceptionKind::ValueError,
                    format!(
                        "dictionary update sequence element #{index} has length {}; 2 is required",
                        items.len()
                    ),
                )
            })?;
            entries.insert(key.hash_key()?, (key, value));
        }
        Ok(())
    }

    /// Stable sort by optional key function.
    pub fn sort_values(
        &mut self,
        items: Vec<Value>,
        key: Option<&Value>,
        reverse: bool,
    ) -> EvalResult<Vec<Value>> {
        let n = items.len() as u64;
        self.ctx.charge(n.saturating_mul(64 - n.leading_zeros() as u64))?;
        let keys = match key {
            Some(function) if !matches!(function, Value::None) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in &items {
                    keys.push(self.call(function, CallArgs::positional(vec![item.clone()]))?);
                }
                keys
            }
            _ => items.clone(),
        };
        let mut order: Vec<usize> = (0..items.len()).collect();
        let mut failure: Option<(usize, usize)> = None;
        order.sort_by(|&a, &b| {
            if failure.is_some() {
                return Ordering::Equal;
            }
            match keys[a].compare(&keys[b]) {
                Some(Some(ordering)) if reverse => ordering.reverse(),
                Some(Some(ordering)) => ordering,
                Some(None) => Ordering::Equal,
                None => {
                    failure = Some((a, b));
                    Ordering::Equal
                }
            }
        });
        if let Some((a, b)) = failure {
            return type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                keys[a].type_name(),
                keys[b].type_name()
            ));
        }
        let mut slots: Vec<Option<Value>> = items.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect())
    }
}

impl From<Builtin> for Value {
    fn from(builtin: Builtin) -> Self {
        Value::Builtin(builtin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[test]
    fn test_lookup() {
        assert!(matches!(lookup_builtin("len"), Some(Value::Builtin(Builtin::Len))));
        assert!(matches!(
            lookup_builtin("ValueError"),
            Some(Value::ExceptionClass(ExceptionKind::ValueError))
        ));
        assert!(lookup_builtin("open").is_none());
        assert!(lookup_builtin("eval").is_none());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 42 ", 10).unwrap(), 42);
        assert_eq!(parse_int("-0x1F", 0).unwrap(), -31);
        assert_eq!(parse_int("1_000", 10).unwrap(), 1000);
        assert_eq!(parse_int("ff", 16).unwrap(), 255);
        assert_eq!(
            parse_int("abc", 10).unwrap_err().to_string(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        assert!(parse_int("3.0", 10).is_err());
        assert!(parse_int("", 10).is_err());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("2.5").unwrap(), 2.5);
        assert_eq!(parse_float(" -1e3 ").unwrap(), -1000.0);
        assert!(parse_float("inf").unwrap().is_infinite());
        assert_eq!(
            parse_float("x").unwrap_err().to_string(),
            "ValueError: could not convert string to float: 'x'"
        );
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_float(2.675, 2), 2.67);
        assert_eq!(round_float(1234.5, -2), 1200.0);
        assert_eq!(round_int(1250, -2).unwrap(), 1200);
        assert_eq!(round_int(1350, -2).unwrap(), 1400);
        assert_eq!(2.5f64.round_ties_even(), 2.0);
    }

    #[test]
    fn test_mod_pow() {
        assert_eq!(mod_pow(3, 200, 7).unwrap().repr(), "2");
        assert_eq!(mod_pow(-2, 3, 5).unwrap().repr(), "2");
    }

    #[test]
    fn test_isinstance() {
        assert!(is_instance(&Value::Bool(true), &Value::Builtin(Builtin::Int)).unwrap());
        assert!(!is_instance(&Value::Int(1), &Value::Builtin(Builtin::Bool)).unwrap());
        let classes = Value::tuple(vec![Value::Builtin(Builtin::Str), Value::Builtin(Builtin::Float)]);
        assert!(is_instance(&Value::Float(1.0), &classes).unwrap());
        let error = Value::Exception(Rc::new(PyException::new(ExceptionKind::KeyError, "k")));
        assert!(is_instance(&error, &Value::ExceptionClass(ExceptionKind::LookupError)).unwrap());
        assert!(is_instance(&Value::Int(1), &Value::Int(2)).is_err());
    }
}
