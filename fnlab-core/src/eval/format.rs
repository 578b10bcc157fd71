//! Text formatting: float repr, the format-spec mini-language, `%`
//! interpolation and `str.format` templates.

use super::evaluator::{CallArgs, EvalResult, raise, type_error};
use super::exception::{ExceptionKind, PyException};
use super::value::{HashKey, Value};

/// Shortest round-trip representation, switching to exponent notation
/// outside `1e-4 <= |f| < 1e16`.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    // `{:e}` gives the shortest round-trip digits
    let shortest = format!("{f:e}");
    let exponent = shortest
        .split_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0);
    if (-4..16).contains(&exponent) {
        let plain = format!("{f}");
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        python_exponent(&shortest)
    }
}

/// `1.5e-7` -> `1.5e-07`, `1e20` -> `1e+20`
fn python_exponent(rust: &str) -> String {
    match rust.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => rust.to_string(),
    }
}

fn scientific(x: f64, precision: usize) -> String {
    python_exponent(&format!("{x:.precision$e}"))
}

fn general(x: f64, precision: usize, alternate: bool) -> String {
    let precision = precision.max(1);
    let exponent = if x == 0.0 {
        0
    } else {
        format!("{:.*e}", precision - 1, x)
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };
    let text = if (-4..precision as i32).contains(&exponent) {
        format!("{:.*}", (precision as i32 - 1 - exponent).max(0) as usize, x)
    } else {
        scientific(x, precision - 1)
    };
    if alternate {
        return text;
    }
    let (mantissa, exp) = match text.split_once('e') {
        Some((m, e)) => (m.to_string(), format!("e{e}")),
        None => (text, String::new()),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        mantissa
    };
    format!("{mantissa}{exp}")
}

#[derive(Debug, Clone, PartialEq)]
struct FormatSpec {
    fill: char,
    align: Option<char>,
    sign: char,
    alternate: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            fill: ' ',
            align: None,
            sign: '-',
            alternate: false,
            width: 0,
            grouping: None,
            precision: None,
            kind: None,
        }
    }
}

fn invalid_spec<T>(spec: &str) -> EvalResult<T> {
    raise(
        ExceptionKind::ValueError,
        format!("Invalid format specifier '{spec}'"),
    )
}

fn parse_spec(spec: &str) -> EvalResult<FormatSpec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut i = 0;
    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');

    if chars.len() >= 2 && is_align(chars[1]) {
        parsed.fill = chars[0];
        parsed.align = Some(chars[1]);
        i = 2;
    } else if chars.first().copied().is_some_and(is_align) {
        parsed.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
        parsed.sign = c;
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        parsed.alternate = true;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        if parsed.align.is_none() {
            parsed.fill = '0';
            parsed.align = Some('=');
        }
        i += 1;
    }
    let start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > start {
        let digits: String = chars[start..i].iter().collect();
        parsed.width = digits.parse().or_else(|_| invalid_spec(spec))?;
    }
    if let Some(&c @ (',' | '_')) = chars.get(i) {
        parsed.grouping = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return raise(ExceptionKind::ValueError, "Format specifier missing precision");
        }
        let digits: String = chars[start..i].iter().collect();
        parsed.precision = Some(digits.parse().or_else(|_| invalid_spec(spec))?);
    }
    if let Some(&c) = chars.get(i) {
        parsed.kind = Some(c);
        i += 1;
    }
    if i != chars.len() {
        return invalid_spec(spec);
    }
    Ok(parsed)
}

fn group_digits(digits: &str, separator: char) -> String {
    let (integer, rest) = match digits.find(|c: char| !c.is_ascii_digit()) {
        Some(index) => digits.split_at(index),
        None => (digits, ""),
    };
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped.push_str(rest);
    grouped
}

/// Pads `body` (already signed through `sign`) to the requested width.
fn pad(spec: &FormatSpec, sign: &str, body: &str, default_align: char) -> String {
    let len = sign.chars().count() + body.chars().count();
    if len >= spec.width {
        return format!("{sign}{body}");
    }
    let padding = spec.width - len;
    let fill = |n: usize| spec.fill.to_string().repeat(n);
    match spec.align.unwrap_or(default_align) {
        '<' => format!("{sign}{body}{}", fill(padding)),
        '^' => format!(
            "{}{sign}{body}{}",
            fill(padding / 2),
            fill(padding - padding / 2)
        ),
        '=' => format!("{sign}{}{body}", fill(padding)),
        _ => format!("{}{sign}{body}", fill(padding)),
    }
}

fn sign_prefix(spec: &FormatSpec, negative: bool) -> &'static str {
    match (negative, spec.sign) {
        (true, _) => "-",
        (false, '+') => "+",
        (false, ' ') => " ",
        _ => "",
    }
}

fn format_int(i: i64, spec: &FormatSpec) -> EvalResult<String> {
    let magnitude = i.unsigned_abs();
    let (prefix, digits) = match spec.kind {
        None | Some('d') | Some('n') => ("", magnitude.to_string()),
        Some('b') => ("0b", format!("{magnitude:b}")),
        Some('o') => ("0o", format!("{magnitude:o}")),
        Some('x') => ("0x", format!("{magnitude:x}")),
        Some('X') => ("0X", format!("{magnitude:X}")),
        Some('c') => {
            let c = u32::try_from(i).ok().and_then(char::from_u32).ok_or_else(|| {
                PyException::new(ExceptionKind::OverflowError, "%c arg not in range(0x110000)")
            })?;
            return Ok(pad(spec, "", &c.to_string(), '<'));
        }
        Some(kind @ ('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%')) => {
            return format_float(i as f64, &FormatSpec {
                kind: Some(kind),
                ..spec.clone()
            });
        }
        Some(kind) => {
            return raise(
                ExceptionKind::ValueError,
                format!("Unknown format code '{kind}' for object of type 'int'"),
            );
        }
    };
    let digits = match spec.grouping {
        Some(separator) => group_digits(&digits, separator),
        None => digits,
    };
    let prefix = if spec.alternate { prefix } else { "" };
    let sign = format!("{}{}", sign_prefix(spec, i < 0), prefix);
    Ok(pad(spec, &sign, &digits, '>'))
}

fn format_float(x: f64, spec: &FormatSpec) -> EvalResult<String> {
    let magnitude = x.abs();
    let upper = matches!(spec.kind, Some('E' | 'F' | 'G'));
    let body = if !x.is_finite() {
        let text = if x.is_nan() { "nan" } else { "inf" };
        if upper { text.to_uppercase() } else { text.to_string() }
    } else {
        match spec.kind {
            Some('f' | 'F') => format!("{:.*}", spec.precision.unwrap_or(6), magnitude),
            Some('e' | 'E') => scientific(magnitude, spec.precision.unwrap_or(6)),
            Some('g' | 'G') => general(magnitude, spec.precision.unwrap_or(6), spec.alternate),
            Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
            Some('n') => general(magnitude, spec.precision.unwrap_or(6), false),
            None => match spec.precision {
                Some(precision) => {
                    let text = general(magnitude, precision, spec.alternate);
                    if text.contains(['.', 'e']) {
                        text
                    } else {
                        format!("{text}.0")
                    }
                }
                None => float_repr(magnitude),
            },
            Some(kind) => {
                return raise(
                    ExceptionKind::ValueError,
                    format!("Unknown format code '{kind}' for object of type 'float'"),
                );
            }
        }
    };
    let body = if upper { body.to_uppercase() } else { body };
    let body = match spec.grouping {
        Some(separator) if x.is_finite() => group_digits(&body, separator),
        _ => body,
    };
    let negative = x.is_sign_negative() && !x.is_nan();
    Ok(pad(spec, sign_prefix(spec, negative), &body, '>'))
}

fn format_str(s: &str, spec: &FormatSpec) -> EvalResult<String> {
    match spec.kind {
        None | Some('s') => {}
        Some(kind) => {
            return raise(
                ExceptionKind::ValueError,
                format!("Unknown format code '{kind}' for object of type 'str'"),
            );
        }
    }
    if spec.sign != '-' {
        return raise(
            ExceptionKind::ValueError,
            "Sign not allowed in string format specifier",
        );
    }
    let text: String = match spec.precision {
        Some(precision) => s.chars().take(precision).collect(),
        None => s.to_string(),
    };
    Ok(pad(spec, "", &text, '<'))
}

/// `format(value, spec)`
pub fn format_value(value: &Value, spec: &str) -> EvalResult<String> {
    if spec.is_empty() {
        return Ok(value.str());
    }
    let parsed = parse_spec(spec)?;
    match value {
        Value::Bool(_) if parsed.kind.is_none() => format_str(&value.str(), &parsed),
        Value::Int(_) | Value::Bool(_) => format_int(value.as_int().unwrap_or(0), &parsed),
        Value::Float(f) => format_float(*f, &parsed),
        Value::Str(s) => format_str(s, &parsed),
        other => type_error(format!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        )),
    }
}

enum PercentArgs<'a> {
    Positional(Vec<Value>),
    Mapping(&'a Value),
}

/// `template % args`
pub fn percent_format(template: &str, args: &Value) -> EvalResult<String> {
    let arguments = match args {
        Value::Tuple(items) => PercentArgs::Positional(items.to_vec()),
        Value::Dict(_) if template.contains("%(") => PercentArgs::Mapping(args),
        other => PercentArgs::Positional(vec![other.clone()]),
    };
    let mut next_positional = 0usize;
    let mut out = String::with_capacity(template.len());
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;

    let not_enough = || {
        PyException::new(
            ExceptionKind::TypeError,
            "not enough arguments for format string",
        )
    };

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        i += 1;
        let mut key = None;
        if chars.get(i) == Some(&'(') {
            let close = chars[i..]
                .iter()
                .position(|&c| c == ')')
                .map(|p| p + i)
                .ok_or_else(|| PyException::new(ExceptionKind::ValueError, "incomplete format key"))?;
            key = Some(chars[i + 1..close].iter().collect::<String>());
            i = close + 1;
        }
        let mut spec = FormatSpec::default();
        while let Some(&flag @ ('-' | '+' | ' ' | '0' | '#')) = chars.get(i) {
            match flag {
                '-' => spec.align = Some('<'),
                '+' | ' ' => {
                    if spec.sign != '+' {
                        spec.sign = flag;
                    }
                }
                '0' => {
                    if spec.align.is_none() {
                        spec.fill = '0';
                        spec.align = Some('=');
                    }
                }
                _ => spec.alternate = true,
            }
            i += 1;
        }
        if spec.align == Some('<') {
            spec.fill = ' ';
        }
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > start {
            spec.width = chars[start..i].iter().collect::<String>().parse().unwrap_or(0);
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            spec.precision = Some(chars[start..i].iter().collect::<String>().parse().unwrap_or(0));
        }
        let Some(&conversion) = chars.get(i) else {
            return raise(ExceptionKind::ValueError, "incomplete format");
        };
        i += 1;
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let value = match (&key, &arguments) {
            (Some(key), PercentArgs::Mapping(Value::Dict(entries))) => entries
                .borrow()
                .get(&HashKey::Str(key.as_str().into()))
                .map(|(_, value)| value.clone())
                .ok_or_else(|| {
                    PyException::with_args(ExceptionKind::KeyError, vec![Value::from(key.as_str())])
                })?,
            (Some(_), _) => return type_error("format requires a mapping"),
            (None, PercentArgs::Positional(values)) => {
                let value = values.get(next_positional).cloned().ok_or_else(not_enough)?;
                next_positional += 1;
                value
            }
            (None, PercentArgs::Mapping(mapping)) => {
                next_positional += 1;
                (*mapping).clone()
            }
        };

        let text = match conversion {
            's' => format_str(&value.str(), &FormatSpec { kind: None, sign: '-', ..spec })?,
            'r' | 'a' => format_str(&value.repr(), &FormatSpec { kind: None, sign: '-', ..spec })?,
            'd' | 'i' | 'u' => {
                let number = match &value {
                    Value::Float(f) if f.is_finite() => f.trunc() as i64,
                    other => other.as_int().ok_or_else(|| {
                        PyException::new(
                            ExceptionKind::TypeError,
                            format!(
                                "%{conversion} format: a real number is required, not {}",
                                other.type_name()
                            ),
                        )
                    })?,
                };
                format_int(number, &FormatSpec { kind: Some('d'), precision: None, ..spec })?
            }
            'x' | 'X' | 'o' => {
                let number = value.as_int().ok_or_else(|| {
                    PyException::new(
                        ExceptionKind::TypeError,
                        format!(
                            "%{conversion} format: an integer is required, not {}",
                            value.type_name()
                        ),
                    )
                })?;
                format_int(number, &FormatSpec { kind: Some(conversion), precision: None, ..spec })?
            }
            'c' => match &value {
                Value::Str(s) if s.chars().count() == 1 => format_str(s, &spec)?,
                other => match other.as_int() {
                    Some(code) => format_int(code, &FormatSpec { kind: Some('c'), ..spec })?,
                    None => return type_error("%c requires int or char"),
                },
            },
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let number = value.as_float().ok_or_else(|| {
                    PyException::new(
                        ExceptionKind::TypeError,
                        format!("must be real number, not {}", value.type_name()),
                    )
                })?;
                format_float(number, &FormatSpec { kind: Some(conversion), ..spec })?
            }
            other => {
                return raise(
                    ExceptionKind::ValueError,
                    format!(
                        "unsupported format character '{other}' (0x{:x}) at index {}",
                        other as u32,
                        i - 1
                    ),
                );
            }
        };
        out.push_str(&text);
    }

    if let PercentArgs::Positional(values) = &arguments {
        if next_positional < values.len() && !matches!(args, Value::Dict(_)) {
            return type_error("not all arguments converted during string formatting");
        }
    }
    Ok(out)
}

fn lookup_index(value: &Value, key: &str) -> EvalResult<Value> {
    match value {
        Value::List(_) | Value::Tuple(_) => {
            let index: usize = key.parse().or_else(|_| {
                type_error(format!(
                    "{} indices must be integers or slices, not str",
                    value.type_name()
                ))
            })?;
            let item = match value {
                Value::List(items) => items.borrow().get(index).cloned(),
                Value::Tuple(items) => items.get(index).cloned(),
                _ => None,
            };
            item.ok_or_else(|| {
                PyException::new(
                    ExceptionKind::IndexError,
                    format!("{} index out of range", value.type_name()),
                )
                .into()
            })
        }
        Value::Dict(entries) => {
            let hash = match key.parse::<i64>() {
                Ok(i) => HashKey::Int(i),
                Err(_) => HashKey::Str(key.into()),
            };
            entries
                .borrow()
                .get(&hash)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| {
                    PyException::with_args(ExceptionKind::KeyError, vec![Value::from(key)]).into()
                })
        }
        other => type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        )),
    }
}

/// `template.format(*args, **kwargs)`
pub fn format_template(template: &str, args: &CallArgs) -> EvalResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut auto_index = 0usize;
    let mut manual = false;
    let mut rest = template;

    while let Some(position) = rest.find(['{', '}']) {
        out.push_str(&rest[..position]);
        let tail = &rest[position..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            return raise(
                ExceptionKind::ValueError,
                "Single '}' encountered in format string",
            );
        }
        // find the matching close brace, allowing one level of nesting in the spec
        let mut depth = 0usize;
        let mut close = None;
        for (offset, c) in tail.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return raise(
                ExceptionKind::ValueError,
                "expected '}' before end of string",
            );
        };
        let field = &tail[1..close];
        rest = &tail[close + 1..];

        let (field, spec) = match field.split_once(':') {
            Some((field, spec)) => (field, spec),
            None => (field, ""),
        };
        let (field, conversion) = match field.split_once('!') {
            Some((field, conversion)) => (field, conversion.chars().next()),
            None => (field, None),
        };
        let (name, mut accessors) = match field.find(['[', '.']) {
            Some(index) => (&field[..index], &field[index..]),
            None => (field, ""),
        };

        let mut value = if name.is_empty() {
            if manual {
                return raise(
                    ExceptionKind::ValueError,
                    "cannot switch from manual field specification to automatic field numbering",
                );
            }
            let index = auto_index;
            auto_index += 1;
            positional_field(args, index)?
        } else if let Ok(index) = name.parse::<usize>() {
            if auto_index > 0 {
                return raise(
                    ExceptionKind::ValueError,
                    "cannot switch from automatic field numbering to manual field specification",
                );
            }
            manual = true;
            positional_field(args, index)?
        } else {
            args.keyword(name).cloned().ok_or_else(|| {
                PyException::with_args(ExceptionKind::KeyError, vec![Value::from(name)])
            })?
        };

        while !accessors.is_empty() {
            if let Some(inner) = accessors.strip_prefix('[') {
                let Some(end) = inner.find(']') else {
                    return raise(ExceptionKind::ValueError, "Missing ']' in format string");
                };
                value = lookup_index(&value, &inner[..end])?;
                accessors = &inner[end + 1..];
            } else {
                let attribute = accessors.trim_start_matches('.');
                let end = attribute.find(['[', '.']).unwrap_or(attribute.len());
                return raise(
                    ExceptionKind::AttributeError,
                    format!(
                        "'{}' object has no attribute '{}'",
                        value.type_name(),
                        &attribute[..end]
                    ),
                );
            }
        }

        let value = match conversion {
            Some('r') | Some('a') => Value::from(value.repr()),
            Some('s') => Value::from(value.str()),
            Some(other) => {
                return raise(
                    ExceptionKind::ValueError,
                    format!("Unknown conversion specifier {other}"),
                );
            }
            None => value,
        };
        let spec = if spec.contains('{') {
            format_template(spec, args)?
        } else {
            spec.to_string()
        };
        out.push_str(&format_value(&value, &spec)?);
    }
    out.push_str(rest);
    Ok(out)
}

fn positional_field(args: &CallArgs, index: usize) -> EvalResult<Value> {
    args.positional.get(index).cloned().ok_or_else(|| {
        PyException::new(
            ExceptionKind::IndexError,
            format!("Replacement index {index} out of range for positional args tuple"),
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(123456789012345.0), "123456789012345.0");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(-2.5e-7), "-2.5e-07");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
    }

    fn fmt(value: Value, spec: &str) -> String {
        format_value(&value, spec).unwrap()
    }

    #[test]
    fn test_format_spec() {
        assert_eq!(fmt(Value::Float(3.14159), ".2f"), "3.14");
        assert_eq!(fmt(Value::Float(1234567.891), ",.2f"), "1,234,567.89");
        assert_eq!(fmt(Value::Int(42), "05d"), "00042");
        assert_eq!(fmt(Value::Int(-42), "+>6"), "+++-42");
        assert_eq!(fmt(Value::Int(-42), "+6"), "   -42");
        assert_eq!(fmt(Value::Int(42), "+6"), "   +42");
        assert_eq!(fmt(Value::Int(42), "=+6"), "+   42");
        assert_eq!(fmt(Value::Int(255), "#x"), "0xff");
        assert_eq!(fmt(Value::Int(5), "b"), "101");
        assert_eq!(fmt(Value::from("ab"), "*^6"), "**ab**");
        assert_eq!(fmt(Value::from("abc"), "<5"), "abc  ");
        assert_eq!(fmt(Value::Float(0.25), ".0%"), "25%");
        assert_eq!(fmt(Value::Float(12345.678), "e"), "1.234568e+04");
        assert_eq!(fmt(Value::Float(0.0001234), "g"), "0.0001234");
        assert_eq!(fmt(Value::Float(1234567.0), "g"), "1.23457e+06");
        assert_eq!(fmt(Value::Float(2.0), ".3"), "2.0");
        assert_eq!(fmt(Value::Int(7), ".1f"), "7.0");
        assert_eq!(fmt(Value::Bool(true), ""), "True");
        assert!(format_value(&Value::from("x"), "d").is_err());
    }

    #[test]
    fn test_percent_format() {
        let pair = Value::tuple(vec![Value::from("Bob"), Value::Float(3.14159)]);
        assert_eq!(percent_format("%s has %.2f", &pair).unwrap(), "Bob has 3.14");
        assert_eq!(percent_format("%5d|%-5d|", &Value::tuple(vec![Value::Int(1), Value::Int(2)])).unwrap(), "    1|2    |");
        assert_eq!(percent_format("%r", &Value::from("x")).unwrap(), "'x'");
        assert_eq!(
            percent_format("%s %s", &Value::Int(1)).unwrap_err().to_string(),
            "TypeError: not enough arguments for format string"
        );
        assert_eq!(
            percent_format("%s", &Value::tuple(vec![Value::Int(1), Value::Int(2)]))
                .unwrap_err()
                .to_string(),
            "TypeError: not all arguments converted during string formatting"
        );
    }

    #[test]
    fn test_format_template() {
        let args = CallArgs {
            positional: vec![Value::from("a"), Value::Float(2.5)],
            keywords: vec![("name".to_string(), Value::from("Ann"))],
        };
        assert_eq!(format_template("{} and {:.1f}", &args).unwrap(), "a and 2.5");
        assert_eq!(format_template("{1}{0}{name!r}", &args).unwrap(), "2.5a'Ann'");
        assert_eq!(format_template("{{literal}}", &args).unwrap(), "{literal}");
        assert_eq!(
            format_template("{5}", &args).unwrap_err().to_string(),
            "IndexError: Replacement index 5 out of range for positional args tuple"
        );
        let nested = CallArgs {
            positional: vec![Value::list(vec![Value::Int(9)])],
            keywords: vec![("w".to_string(), Value::Int(4))],
        };
        assert_eq!(format_template("{0[0]:>{w}}", &nested).unwrap(), "   9");
    }
}
