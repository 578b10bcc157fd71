//! The `math` module, the only importable module.

use std::rc::Rc;

use indexmap::IndexMap;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use super::evaluator::{EvalResult, raise, type_error};
use super::exception::ExceptionKind;
use super::operators::float_pow;
use super::value::{Module, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MathFunction {
    Sqrt,
    Isqrt,
    Floor,
    Ceil,
    Trunc,
    Fabs,
    Pow,
    Exp,
    Log,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Hypot,
    Degrees,
    Radians,
    Factorial,
    Gcd,
    Lcm,
    Comb,
    Perm,
    Isclose,
    Isfinite,
    Isinf,
    Isnan,
    Copysign,
    Fmod,
    Fsum,
    Prod,
}

impl MathFunction {
    pub fn name(&self) -> &'static str {
        (*self).into()
    }
}

/// Builds a fresh `math` module value.
pub fn module() -> Value {
    let mut members: IndexMap<String, Value> = MathFunction::iter()
        .map(|function| (function.name().to_string(), Value::MathFunction(function)))
        .collect();
    for (name, value) in [
        ("pi", std::f64::consts::PI),
        ("e", std::f64::consts::E),
        ("tau", std::f64::consts::TAU),
        ("inf", f64::INFINITY),
        ("nan", f64::NAN),
    ] {
        members.insert(name.to_string(), Value::Float(value));
    }
    Value::Module(Rc::new(Module {
        name: "math".to_string(),
        members,
    }))
}

fn domain_error<T>() -> EvalResult<T> {
    raise(ExceptionKind::ValueError, "math domain error")
}

fn real(function: MathFunction, value: &Value) -> EvalResult<f64> {
    match value.as_float() {
        Some(f) => Ok(f),
        None => type_error(format!(
            "must be real number, not {} (in math.{})",
            value.type_name(),
            function.name()
        )),
    }
}

fn integer(function: MathFunction, value: &Value) -> EvalResult<i64> {
    match value.as_int() {
        Some(i) => Ok(i),
        None => type_error(format!(
            "'{}' object cannot be interpreted as an integer (in math.{})",
            value.type_name(),
            function.name()
        )),
    }
}

fn arity(function: MathFunction, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() != expected {
        return type_error(format!(
            "math.{}() takes exactly {} argument{} ({} given)",
            function.name(),
            expected,
            if expected == 1 { "" } else { "s" },
            args.len()
        ));
    }
    Ok(())
}

/// Integral result of floor/ceil/trunc.
fn to_int(f: f64) -> EvalResult<Value> {
    if f.is_nan() {
        return raise(ExceptionKind::ValueError, "cannot convert float NaN to integer");
    }
    if f.is_infinite() || f.abs() >= 9.223_372_036_854_776e18 {
        return raise(
            ExceptionKind::OverflowError,
            "cannot convert float infinity to integer",
        );
    }
    Ok(Value::Int(f as i64))
}

fn checked_float(f: f64) -> EvalResult<Value> {
    if f.is_nan() {
        return domain_error();
    }
    Ok(Value::Float(f))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn overflow<T>() -> EvalResult<T> {
    raise(ExceptionKind::OverflowError, "integer overflow")
}

pub fn call(function: MathFunction, args: &[Value]) -> EvalResult<Value> {
    use MathFunction::*;
    match function {
        Gcd | Lcm | Fsum | Prod => {}
        Log => {
            if args.is_empty() || args.len() > 2 {
                return type_error(format!(
                    "math.log() takes 1 or 2 arguments ({} given)",
                    args.len()
                ));
            }
        }
        Pow | Isclose | Atan2 | Copysign | Fmod | Comb | Perm | Hypot => arity(function, args, 2)?,
        _ => arity(function, args, 1)?,
    }

    let x = || real(function, &args[0]);
    let y = || real(function, &args[1]);
    match function {
        Sqrt => {
            let x = x()?;
            if x < 0.0 {
                return domain_error();
            }
            Ok(Value::Float(x.sqrt()))
        }
        Isqrt => {
            let n = integer(function, &args[0])?;
            if n < 0 {
                return raise(
                    ExceptionKind::ValueError,
                    "isqrt() argument must be nonnegative",
                );
            }
            let mut root = (n as f64).sqrt() as i64;
            while root.saturating_mul(root) > n {
                root -= 1;
            }
            while (root + 1).saturating_mul(root + 1) <= n {
                root += 1;
            }
            Ok(Value::Int(root))
        }
        Floor => match &args[0] {
            Value::Float(f) => to_int(f.floor()),
            other => Ok(Value::Int(integer(function, other)?)),
        },
        Ceil => match &args[0] {
            Value::Float(f) => to_int(f.ceil()),
            other => Ok(Value::Int(integer(function, other)?)),
        },
        Trunc => match &args[0] {
            Value::Float(f) => to_int(f.trunc()),
            other => Ok(Value::Int(integer(function, other)?)),
        },
        Fabs => Ok(Value::Float(x()?.abs())),
        Pow => float_pow(x()?, y()?),
        Exp => {
            let result = x()?.exp();
            if result.is_infinite() {
                return raise(ExceptionKind::OverflowError, "math range error");
            }
            Ok(Value::Float(result))
        }
        Log => {
            let value = x()?;
            if value <= 0.0 {
                return domain_error();
            }
            match args.get(1) {
                Some(base) => {
                    let base = real(function, base)?;
                    if base <= 0.0 || base == 1.0 {
                        return domain_error();
                    }
                    Ok(Value::Float(value.ln() / base.ln()))
                }
                None => Ok(Value::Float(value.ln())),
            }
        }
        Log10 | Log2 => {
            let value = x()?;
            if value <= 0.0 {
                return domain_error();
            }
            Ok(Value::Float(if function == Log10 {
                value.log10()
            } else {
                value.log2()
            }))
        }
        Sin => checked_float(x()?.sin()),
        Cos => checked_float(x()?.cos()),
        Tan => checked_float(x()?.tan()),
        Asin | Acos => {
            let value = x()?;
            if !(-1.0..=1.0).contains(&value) {
                return domain_error();
            }
            Ok(Value::Float(if function == Asin {
                value.asin()
            } else {
                value.acos()
            }))
        }
        Atan => Ok(Value::Float(x()?.atan())),
        Atan2 => Ok(Value::Float(x()?.atan2(y()?))),
        Hypot => Ok(Value::Float(x()?.hypot(y()?))),
        Degrees => Ok(Value::Float(x()?.to_degrees())),
        Radians => Ok(Value::Float(x()?.to_radians())),
        Factorial => {
            let n = integer(function, &args[0])?;
            if n < 0 {
                return raise(
                    ExceptionKind::ValueError,
                    "factorial() not defined for negative values",
                );
            }
            (1..=n)
                .try_fold(1i64, |acc, k| acc.checked_mul(k))
                .map(Value::Int)
                .map_or_else(overflow, Ok)
        }
        Gcd | Lcm => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(integer(function, arg)?);
            }
            if function == Gcd {
                return Ok(Value::Int(values.into_iter().fold(0, gcd)));
            }
            values
                .into_iter()
                .try_fold(1i64, |acc, v| {
                    if acc == 0 || v == 0 {
                        return Some(0);
                    }
                    (acc / gcd(acc, v)).checked_mul(v.abs())
                })
                .map(Value::Int)
                .map_or_else(overflow, Ok)
        }
        Comb | Perm => {
            let n = integer(function, &args[0])?;
            let k = integer(function, &args[1])?;
            if n < 0 || k < 0 {
                return raise(
                    ExceptionKind::ValueError,
                    format!("{}() arguments must be non-negative", function.name()),
                );
            }
            if k > n {
                return Ok(Value::Int(0));
            }
            let result = if function == Comb {
                let k = k.min(n - k);
                (0..k).try_fold(1i64, |acc, i| {
                    acc.checked_mul(n - i).map(|product| product / (i + 1))
                })
            } else {
                (0..k).try_fold(1i64, |acc, i| acc.checked_mul(n - i))
            };
            result.map(Value::Int).map_or_else(overflow, Ok)
        }
        Isclose => {
            let (a, b) = (x()?, y()?);
            if a == b {
                return Ok(Value::Bool(true));
            }
            let rel_tol = 1e-9;
            let diff = (a - b).abs();
            Ok(Value::Bool(
                diff.is_finite() && diff <= (rel_tol * b.abs()).max(rel_tol * a.abs()),
            ))
        }
        Isfinite => Ok(Value::Bool(x()?.is_finite())),
        Isinf => Ok(Value::Bool(x()?.is_infinite())),
        Isnan => Ok(Value::Bool(x()?.is_nan())),
        Copysign => Ok(Value::Float(x()?.copysign(y()?))),
        Fmod => {
            let (a, b) = (x()?, y()?);
            if b == 0.0 {
                return domain_error();
            }
            Ok(Value::Float(a % b))
        }
        Fsum | Prod => {
            let [iterable] = args else {
                return type_error(format!(
                    "math.{}() takes exactly one argument ({} given)",
                    function.name(),
                    args.len()
                ));
            };
            let items: Vec<Value> = match iterable {
                Value::List(items) => items.borrow().clone(),
                Value::Tuple(items) => items.to_vec(),
                Value::Range(range) => range.iter().map(Value::Int).collect(),
                other => {
                    return type_error(format!(
                        "'{}' object is not iterable",
                        other.type_name()
                    ));
                }
            };
            if function == Fsum {
                let mut total = 0.0;
                for item in &items {
                    total += real(function, item)?;
                }
                return Ok(Value::Float(total));
            }
            if items.iter().all(|item| item.as_int().is_some()) {
                return items
                    .iter()
                    .try_fold(1i64, |acc, item| acc.checked_mul(item.as_int().unwrap_or(1)))
                    .map(Value::Int)
                    .map_or_else(overflow, Ok);
            }
            let mut product = 1.0;
            for item in &items {
                product *= real(function, item)?;
            }
            Ok(Value::Float(product))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn math(name: &str, args: Vec<Value>) -> String {
        let function = MathFunction::from_str(name).unwrap();
        match call(function, &args) {
            Ok(value) => value.repr(),
            Err(error) => error.to_string(),
        }
    }

    #[test]
    fn test_functions() {
        assert_eq!(math("sqrt", vec![Value::Int(16)]), "4.0");
        assert_eq!(math("floor", vec![Value::Float(-2.5)]), "-3");
        assert_eq!(math("ceil", vec![Value::Float(2.1)]), "3");
        assert_eq!(math("factorial", vec![Value::Int(5)]), "120");
        assert_eq!(math("gcd", vec![Value::Int(12), Value::Int(18)]), "6");
        assert_eq!(math("comb", vec![Value::Int(5), Value::Int(2)]), "10");
        assert_eq!(math("log", vec![Value::Int(8), Value::Int(2)]), "3.0");
        assert_eq!(math("isqrt", vec![Value::Int(17)]), "4");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            math("sqrt", vec![Value::Int(-1)]),
            "ValueError: math domain error"
        );
        assert_eq!(
            math("sqrt", vec![Value::from("x")]),
            "TypeError: must be real number, not str (in math.sqrt)"
        );
        assert_eq!(
            math("factorial", vec![Value::Int(30)]),
            "OverflowError: integer overflow"
        );
        assert_eq!(
            math("floor", vec![Value::Float(f64::INFINITY)]),
            "OverflowError: cannot convert float infinity to integer"
        );
    }

    #[test]
    fn test_module_members() {
        let Value::Module(module) = module() else {
            panic!("math is a module");
        };
        assert!(module.members.contains_key("pi"));
        assert!(module.members.contains_key("sqrt"));
        assert_eq!(module.name, "math");
    }
}
