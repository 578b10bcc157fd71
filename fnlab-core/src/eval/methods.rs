//! Attribute access and methods of the builtin types.

use std::rc::Rc;

use super::evaluator::{CallArgs, EvalResult, Evaluator, raise, type_error};
use super::exception::{ExceptionKind, PyException};
use super::format::format_template;
use super::value::{BoundMethod, DictRef, HashKey, ListRef, SetRef, Value};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "title", "capitalize", "swapcase", "casefold", "strip", "lstrip", "rstrip",
    "split", "rsplit", "splitlines", "join", "replace", "startswith", "endswith", "find", "rfind",
    "index", "rindex", "count", "isdigit", "isalpha", "isalnum", "isspace", "isupper", "islower",
    "isnumeric", "isdecimal", "center", "ljust", "rjust", "zfill", "format", "partition",
    "rpartition", "removeprefix", "removesuffix",
];
const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "sort", "reverse", "clear",
    "copy",
];
const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "popitem", "setdefault", "update", "clear", "copy",
];
const SET_METHODS: &[&str] = &[
    "add", "remove", "discard", "pop", "clear", "copy", "union", "intersection", "difference",
    "symmetric_difference", "issubset", "issuperset", "isdisjoint", "update",
];
const TUPLE_METHODS: &[&str] = &["index", "count"];
const INT_METHODS: &[&str] = &["bit_length"];
const FLOAT_METHODS: &[&str] = &["is_integer"];

fn methods_of(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Int(_) | Value::Bool(_) => INT_METHODS,
        Value::Float(_) => FLOAT_METHODS,
        _ => &[],
    }
}

fn no_attribute<T>(value: &Value, name: &str) -> EvalResult<T> {
    raise(
        ExceptionKind::AttributeError,
        format!("'{}' object has no attribute '{}'", value.type_name(), name),
    )
}

/// Index of a character offset for methods that report positions.
fn char_index(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn str_arg<'a>(method: &str, value: &'a Value) -> EvalResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => type_error(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        )),
    }
}

fn int_arg(value: &Value) -> EvalResult<i64> {
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

/// Characters for strip-like methods; `None` means whitespace.
fn strip_chars(method: &str, args: &CallArgs) -> EvalResult<Option<Vec<char>>> {
    args.expect_positional(method, 0, 1)?;
    match args.positional.first() {
        None | Some(Value::None) => Ok(None),
        Some(value) => Ok(Some(str_arg(method, value)?.chars().collect())),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn split_whitespace(s: &str, maxsplit: i64, from_right: bool) -> Vec<Value> {
    if maxsplit < 0 {
        return s.split_whitespace().map(Value::from).collect();
    }
    let mut parts = Vec::new();
    let mut rest = if from_right { s.trim_end() } else { s.trim_start() };
    while !rest.is_empty() && (parts.len() as i64) < maxsplit {
        if from_right {
            match rest.rfind(char::is_whitespace) {
                Some(at) => {
                    let ws_len = rest[at..].chars().next().map_or(1, char::len_utf8);
                    parts.push(Value::from(&rest[at + ws_len..]));
                    rest = rest[..at].trim_end();
                }
                None => break,
            }
        } else {
            match rest.find(char::is_whitespace) {
                Some(at) => {
                    parts.push(Value::from(&rest[..at]));
                    rest = rest[at..].trim_start();
                }
                None => break,
            }
        }
    }
    if !rest.is_empty() {
        parts.push(Value::from(rest));
    }
    if from_right {
        parts.reverse();
    }
    parts
}

impl Evaluator {
    pub fn get_attribute(&self, value: &Value, name: &str) -> EvalResult<Value> {
        match value {
            Value::Module(module) => module.members.get(name).cloned().ok_or_else(|| {
                PyException::new(
                    ExceptionKind::AttributeError,
                    format!("module '{}' has no attribute '{}'", module.name, name),
                )
                .into()
            }),
            Value::Exception(exception) if name == "args" => {
                Ok(Value::tuple(exception.args.clone()))
            }
            Value::Function(function) if name == "__name__" => {
                Ok(Value::from(function.name.as_str()))
            }
            Value::Builtin(builtin) if name == "__name__" => Ok(Value::from(builtin.name())),
            Value::ExceptionClass(kind) if name == "__name__" => Ok(Value::from(kind.name())),
            other if methods_of(other).contains(&name) => {
                Ok(Value::BoundMethod(Rc::new(BoundMethod {
                    receiver: other.clone(),
                    name: name.to_string(),
                })))
            }
            other => no_attribute(other, name),
        }
    }

    pub fn call_method(&mut self, receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
        match receiver {
            Value::Str(s) => self.str_method(s, name, args),
            Value::List(items) => self.list_method(items, name, args),
            Value::Dict(entries) => self.dict_method(entries, name, args),
            Value::Set(items) => self.set_method(items, name, args),
            Value::Tuple(items) => {
                let list = Value::list(items.to_vec());
                match (name, &list) {
                    ("index" | "count", Value::List(items)) => self.list_method(items, name, args),
                    _ => no_attribute(receiver, name),
                }
            }
            Value::Int(_) | Value::Bool(_) if name == "bit_length" => {
                args.expect_positional(name, 0, 0)?;
                let i = receiver.as_int().unwrap_or(0);
                Ok(Value::Int(64 - i.unsigned_abs().leading_zeros() as i64))
            }
            Value::Float(f) if name == "is_integer" => {
                args.expect_positional(name, 0, 0)?;
                Ok(Value::Bool(f.is_finite() && f.fract() == 0.0))
            }
            other => no_attribute(other, name),
        }
    }

    fn str_method(&mut self, s: &Rc<str>, name: &str, args: CallArgs) -> EvalResult<Value> {
        let s: &str = s;
        match name {
            "upper" | "lower" | "title" | "capitalize" | "swapcase" | "casefold" => {
                args.expect_positional(name, 0, 0)?;
                let converted = match name {
                    "upper" => s.to_uppercase(),
                    "lower" | "casefold" => s.to_lowercase(),
                    "swapcase" => s
                        .chars()
                        .flat_map(|c| {
                            if c.is_uppercase() {
                                c.to_lowercase().collect::<Vec<_>>()
                            } else {
                                c.to_uppercase().collect::<Vec<_>>()
                            }
                        })
                        .collect(),
                    "capitalize" => {
                        let mut chars = s.chars();
                        match chars.next() {
                            Some(first) => first
                                .to_uppercase()
                                .chain(chars.as_str().to_lowercase().chars())
                                .collect(),
                            None => String::new(),
                        }
                    }
                    _ => {
                        let mut title = String::with_capacity(s.len());
                        let mut previous_cased = false;
                        for c in s.chars() {
                            if previous_cased {
                                title.extend(c.to_lowercase());
                            } else {
                                title.extend(c.to_uppercase());
                            }
                            previous_cased = c.is_alphabetic();
                        }
                        title
                    }
                };
                Ok(Value::from(converted))
            }
            "strip" | "lstrip" | "rstrip" => {
                let chars = strip_chars(name, &args)?;
                let matches = |c: char| match &chars {
                    Some(set) => set.contains(&c),
                    None => c.is_whitespace(),
                };
                let stripped = match name {
                    "strip" => s.trim_matches(matches),
                    "lstrip" => s.trim_start_matches(matches),
                    _ => s.trim_end_matches(matches),
                };
                Ok(Value::from(stripped))
            }
            "split" | "rsplit" => {
                args.expect_keywords(name, &["sep", "maxsplit"])?;
                args.expect_positional(name, 0, 2)?;
                let sep = args.positional.first().or(args.keyword("sep"));
                let maxsplit = match args.positional.get(1).or(args.keyword("maxsplit")) {
                    Some(value) => int_arg(value)?,
                    None => -1,
                };
                let from_right = name == "rsplit";
                let parts: Vec<Value> = match sep {
                    None | Some(Value::None) => split_whitespace(s, maxsplit, from_right),
                    Some(sep) => {
                        let sep = str_arg(name, sep)?;
                        if sep.is_empty() {
                            return raise(ExceptionKind::ValueError, "empty separator");
                        }
                        match (maxsplit < 0, from_right) {
                            (true, _) => s.split(sep).map(Value::from).collect(),
                            (false, false) => {
                                s.splitn(maxsplit as usize + 1, sep).map(Value::from).collect()
                            }
                            (false, true) => {
                                let mut parts: Vec<Value> =
                                    s.rsplitn(maxsplit as usize + 1, sep).map(Value::from).collect();
                                parts.reverse();
                                parts
                            }
                        }
                    }
                };
                self.ctx.check_len(parts.len())?;
                self.ctx.charge(parts.len() as u64)?;
                Ok(Value::list(parts))
            }
            "splitlines" => {
                args.expect_positional(name, 0, 0)?;
                Ok(Value::list(s.lines().map(Value::from).collect()))
            }
            "join" => {
                args.expect_positional(name, 1, 1)?;
                let items = self.collect(&args.positional[0])?;
                let mut parts = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::Str(part) => parts.push(part.clone()),
                        other => {
                            return type_error(format!(
                                "sequence item {index}: expected str instance, {} found",
                                other.type_name()
                            ));
                        }
                    }
                }
                let total: usize =
                    parts.iter().map(|p| p.len()).sum::<usize>() + s.len() * parts.len();
                self.ctx.check_len(total)?;
                Ok(Value::from(
                    parts.iter().map(|p| p.as_ref()).collect::<Vec<&str>>().join(s),
                ))
            }
            "replace" => {
                args.expect_positional(name, 2, 3)?;
                let old = str_arg(name, &args.positional[0])?;
                let new = str_arg(name, &args.positional[1])?;
                let count = match args.positional.get(2) {
                    Some(value) => int_arg(value)?,
                    None => -1,
                };
                let occurrences = if old.is_empty() {
                    s.chars().count() + 1
                } else {
                    s.matches(old).count()
                };
                let replaced = occurrences.min(if count < 0 { usize::MAX } else { count as usize });
                let estimate = s.len() + replaced.saturating_mul(new.len());
                self.ctx.check_len(estimate)?;
                let result = if count < 0 {
                    s.replace(old, new)
                } else {
                    s.replacen(old, new, count as usize)
                };
                Ok(Value::from(result))
            }
            "startswith" | "endswith" => {
                args.expect_positional(name, 1, 1)?;
                let candidates: Vec<Value> = match &args.positional[0] {
                    Value::Tuple(items) => items.to_vec(),
                    other => vec![other.clone()],
                };
                for candidate in &candidates {
                    let candidate = match candidate {
                        Value::Str(c) => c,
                        other => {
                            return type_error(format!(
                                "{name} first arg must be str or a tuple of str, not {}",
                                other.type_name()
                            ));
                        }
                    };
                    let hit = if name == "startswith" {
                        s.starts_with(candidate.as_ref())
                    } else {
                        s.ends_with(candidate.as_ref())
                    };
                    if hit {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "find" | "rfind" | "index" | "rindex" => {
                args.expect_positional(name, 1, 1)?;
                let needle = str_arg(name, &args.positional[0])?;
                let found = if name.starts_with('r') {
                    s.rfind(needle)
                } else {
                    s.find(needle)
                };
                match found {
                    Some(byte) => Ok(Value::Int(char_index(s, byte))),
                    None if name.ends_with("find") => Ok(Value::Int(-1)),
                    None => raise(ExceptionKind::ValueError, "substring not found"),
                }
            }
            "count" => {
                args.expect_positional(name, 1, 1)?;
                let needle = str_arg(name, &args.positional[0])?;
                let count = if needle.is_empty() {
                    s.chars().count() + 1
                } else {
                    s.matches(needle).count()
                };
                Ok(Value::Int(count as i64))
            }
            "isdigit" | "isalpha" | "isalnum" | "isspace" | "isupper" | "islower" | "isnumeric"
            | "isdecimal" => {
                args.expect_positional(name, 0, 0)?;
                let result = match name {
                    "isdigit" | "isdecimal" => !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()),
                    "isnumeric" => !s.is_empty() && s.chars().all(char::is_numeric),
                    "isalpha" => !s.is_empty() && s.chars().all(char::is_alphabetic),
                    "isalnum" => !s.is_empty() && s.chars().all(char::is_alphanumeric),
                    "isspace" => !s.is_empty() && s.chars().all(char::is_whitespace),
                    "isupper" => {
                        s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
                    }
                    _ => s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
                };
                Ok(Value::Bool(result))
            }
            "center" | "ljust" | "rjust" | "zfill" => {
                let max = if name == "zfill" { 1 } else { 2 };
                args.expect_positional(name, 1, max)?;
                let width = int_arg(&args.positional[0])?.max(0) as usize;
                self.ctx.check_len(width)?;
                let fill = match args.positional.get(1) {
                    Some(value) => {
                        let fill = str_arg(name, value)?;
                        let mut chars = fill.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => c,
                            _ => {
                                return type_error(
                                    "The fill character must be exactly one character long",
                                );
                            }
                        }
                    }
                    None => ' ',
                };
                let len = s.chars().count();
                if len >= width {
                    return Ok(Value::from(s));
                }
                let padding = width - len;
                let fill_str = |n: usize| fill.to_string().repeat(n);
                let result = match name {
                    "ljust" => format!("{s}{}", fill_str(padding)),
                    "rjust" => format!("{}{s}", fill_str(padding)),
                    "center" => {
                        // extra padding goes right unless the width is odd
                        let left = padding / 2 + (padding & width & 1);
                        format!("{}{s}{}", fill_str(left), fill_str(padding - left))
                    }
                    _ => {
                        let (sign, digits) = match s.strip_prefix(['-', '+']) {
                            Some(rest) => (&s[..1], rest),
                            None => ("", s),
                        };
                        format!("{sign}{}{digits}", "0".repeat(padding))
                    }
                };
                Ok(Value::from(result))
            }
            "format" => {
                let text = format_template(s, &args)?;
                self.ctx.check_len(text.len())?;
                self.ctx.charge_text(&text)?;
                Ok(Value::from(text))
            }
            "partition" | "rpartition" => {
                args.expect_positional(name, 1, 1)?;
                let sep = str_arg(name, &args.positional[0])?;
                if sep.is_empty() {
                    return raise(ExceptionKind::ValueError, "empty separator");
                }
                let split = if name == "partition" {
                    s.split_once(sep)
                } else {
                    s.rsplit_once(sep)
                };
                let parts = match (split, name) {
                    (Some((head, tail)), _) => [head, sep, tail],
                    (None, "partition") => [s, "", ""],
                    (None, _) => ["", "", s],
                };
                Ok(Value::tuple(parts.into_iter().map(Value::from).collect()))
            }
            "removeprefix" | "removesuffix" => {
                args.expect_positional(name, 1, 1)?;
                let affix = str_arg(name, &args.positional[0])?;
                let result = if name == "removeprefix" {
                    s.strip_prefix(affix)
                } else {
                    s.strip_suffix(affix)
                };
                Ok(Value::from(result.unwrap_or(s)))
            }
            _ => no_attribute(&Value::from(s), name),
        }
    }

    fn list_method(&mut self, items: &ListRef, name: &str, args: CallArgs) -> EvalResult<Value> {
        match name {
            "append" => {
                args.expect_positional(name, 1, 1)?;
                let len = items.borrow().len();
                self.ctx.check_len(len + 1)?;
                items.borrow_mut().push(args.positional[0].clone());
                Ok(Value::None)
            }
            "extend" => {
                args.expect_positional(name, 1, 1)?;
                let extra = self.collect(&args.positional[0])?;
                let len = items.borrow().len();
                self.ctx.check_len(len + extra.len())?;
                items.borrow_mut().extend(extra);
                Ok(Value::None)
            }
            "insert" => {
                args.expect_positional(name, 2, 2)?;
                let index = int_arg(&args.positional[0])?;
                let len = items.borrow().len();
                self.ctx.check_len(len + 1)?;
                let len = len as i64;
                let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
                items
                    .borrow_mut()
                    .insert(position as usize, args.positional[1].clone());
                Ok(Value::None)
            }
            "pop" => {
                args.expect_positional(name, 0, 1)?;
                let len = items.borrow().len();
                if len == 0 {
                    return raise(ExceptionKind::IndexError, "pop from empty list");
                }
                let index = match args.positional.first() {
                    Some(value) => int_arg(value)?,
                    None => -1,
                };
                match normalize_index(index, len) {
                    Some(index) => Ok(items.borrow_mut().remove(index)),
                    None => raise(ExceptionKind::IndexError, "pop index out of range"),
                }
            }
            "remove" => {
                args.expect_positional(name, 1, 1)?;
                let target = &args.positional[0];
                let position = items.borrow().iter().position(|item| item.py_eq(target));
                match position {
                    Some(index) => {
                        items.borrow_mut().remove(index);
                        Ok(Value::None)
                    }
                    None => raise(ExceptionKind::ValueError, "list.remove(x): x not in list"),
                }
            }
            "index" => {
                args.expect_positional(name, 1, 3)?;
                let target = &args.positional[0];
                let len = items.borrow().len() as i64;
                let bound = |value: Option<&Value>, default: i64| -> EvalResult<usize> {
                    let index = match value {
                        Some(value) => int_arg(value)?,
                        None => default,
                    };
                    let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
                    Ok(index as usize)
                };
                let start = bound(args.positional.get(1), 0)?;
                let end = bound(args.positional.get(2), len)?;
                let position = items
                    .borrow()
                    .iter()
                    .enumerate()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .find(|(_, item)| item.py_eq(target))
                    .map(|(index, _)| index);
                match position {
                    Some(index) => Ok(Value::Int(index as i64)),
                    None => raise(
                        ExceptionKind::ValueError,
                        format!("{} is not in list", target.repr()),
                    ),
                }
            }
            "count" => {
                args.expect_positional(name, 1, 1)?;
                let target = &args.positional[0];
                let count = items.borrow().iter().filter(|item| item.py_eq(target)).count();
                Ok(Value::Int(count as i64))
            }
            "sort" => {
                args.expect_keywords(name, &["key", "reverse"])?;
                args.expect_positional(name, 0, 0)?;
                let taken = std::mem::take(&mut *items.borrow_mut());
                let reverse = args.keyword("reverse").is_some_and(Value::truthy);
                match self.sort_values(taken.clone(), args.keyword("key"), reverse) {
                    Ok(sorted) => {
                        *items.borrow_mut() = sorted;
                        Ok(Value::None)
                    }
                    Err(error) => {
                        *items.borrow_mut() = taken;
                        Err(error)
                    }
                }
            }
            "reverse" => {
                args.expect_positional(name, 0, 0)?;
                items.borrow_mut().reverse();
                Ok(Value::None)
            }
            "clear" => {
                args.expect_positional(name, 0, 0)?;
                items.borrow_mut().clear();
                Ok(Value::None)
            }
            "copy" => {
                args.expect_positional(name, 0, 0)?;
                let copy = items.borrow().clone();
                Ok(Value::list(copy))
            }
            _ => no_attribute(&Value::List(items.clone()), name),
        }
    }

    fn dict_method(&mut self, entries: &DictRef, name: &str, args: CallArgs) -> EvalResult<Value> {
        match name {
            "get" => {
                args.expect_positional(name, 1, 2)?;
                let key = args.positional[0].hash_key()?;
                let found = entries.borrow().get(&key).map(|(_, value)| value.clone());
                Ok(found.unwrap_or_else(|| args.positional.get(1).cloned().unwrap_or_default()))
            }
            "keys" | "values" | "items" => {
                args.expect_positional(name, 0, 0)?;
                let entries = entries.borrow();
                let listed = entries
                    .values()
                    .map(|(key, value)| match name {
                        "keys" => key.clone(),
                        "values" => value.clone(),
                        _ => Value::tuple(vec![key.clone(), value.clone()]),
                    })
                    .collect();
                Ok(Value::list(listed))
            }
            "pop" => {
                args.expect_positional(name, 1, 2)?;
                let key = args.positional[0].hash_key()?;
                let removed = entries.borrow_mut().shift_remove(&key);
                match (removed, args.positional.get(1)) {
                    (Some((_, value)), _) => Ok(value),
                    (None, Some(default)) => Ok(default.clone()),
                    (None, None) => Err(PyException::with_args(
                        ExceptionKind::KeyError,
                        vec![args.positional[0].clone()],
                    )
                    .into()),
                }
            }
            "popitem" => {
                args.expect_positional(name, 0, 0)?;
                match entries.borrow_mut().pop() {
                    Some((_, (key, value))) => Ok(Value::tuple(vec![key, value])),
                    None => raise(ExceptionKind::KeyError, "popitem(): dictionary is empty"),
                }
            }
            "setdefault" => {
                args.expect_positional(name, 1, 2)?;
                let key = args.positional[0].hash_key()?;
                let default = args.positional.get(1).cloned().unwrap_or_default();
                let existing = entries.borrow().get(&key).map(|(_, value)| value.clone());
                match existing {
                    Some(value) => Ok(value),
                    None => {
                        let len = entries.borrow().len();
                        self.ctx.check_len(len + 1)?;
                        entries
                            .borrow_mut()
                            .insert(key, (args.positional[0].clone(), default.clone()));
                        Ok(default)
                    }
                }
            }
            "update" => {
                args.expect_positional(name, 0, 1)?;
                let mut updated = entries.borrow().clone();
                if let Some(source) = args.positional.first() {
                    self.update_dict(&mut updated, source)?;
                }
                for (key, value) in &args.keywords {
                    updated.insert(
                        HashKey::Str(Rc::from(key.as_str())),
                        (Value::from(key.as_str()), value.clone()),
                    );
                }
                self.ctx.check_len(updated.len())?;
                *entries.borrow_mut() = updated;
                Ok(Value::None)
            }
            "clear" => {
                args.expect_positional(name, 0, 0)?;
                entries.borrow_mut().clear();
                Ok(Value::None)
            }
            "copy" => {
                args.expect_positional(name, 0, 0)?;
                let copy = entries.borrow().clone();
                Ok(Value::dict(copy))
            }
            _ => no_attribute(&Value::Dict(entries.clone()), name),
        }
    }

    fn set_method(&mut self, items: &SetRef, name: &str, args: CallArgs) -> EvalResult<Value> {
        match name {
            "add" => {
                args.expect_positional(name, 1, 1)?;
                let key = args.positional[0].hash_key()?;
                let len = items.borrow().len();
                self.ctx.check_len(len + 1)?;
                items
                    .borrow_mut()
                    .entry(key)
                    .or_insert_with(|| args.positional[0].clone());
                Ok(Value::None)
            }
            "remove" | "discard" => {
                args.expect_positional(name, 1, 1)?;
                let key = args.positional[0].hash_key()?;
                let removed = items.borrow_mut().shift_remove(&key);
                if removed.is_none() && name == "remove" {
                    return Err(PyException::with_args(
                        ExceptionKind::KeyError,
                        vec![args.positional[0].clone()],
                    )
                    .into());
                }
                Ok(Value::None)
            }
            "pop" => {
                args.expect_positional(name, 0, 0)?;
                let first = items.borrow_mut().shift_remove_index(0);
                match first {
                    Some((_, value)) => Ok(value),
                    None => raise(ExceptionKind::KeyError, "pop from an empty set"),
                }
            }
            "clear" => {
                args.expect_positional(name, 0, 0)?;
                items.borrow_mut().clear();
                Ok(Value::None)
            }
            "copy" => {
                args.expect_positional(name, 0, 0)?;
                let copy = items.borrow().clone();
                Ok(Value::set(copy))
            }
            "union" | "intersection" | "difference" | "symmetric_difference" | "update" => {
                let mut result = items.borrow().clone();
                for other in &args.positional {
                    let other_items = self.collect(other)?;
                    let mut other_set = super::value::Set::with_capacity(other_items.len());
                    for item in other_items {
                        other_set.entry(item.hash_key()?).or_insert(item);
                    }
                    match name {
                        "union" | "update" => {
                            for (key, value) in other_set {
                                result.entry(key).or_insert(value);
                            }
                        }
                        "intersection" => result.retain(|key, _| other_set.contains_key(key)),
                        "difference" => result.retain(|key, _| !other_set.contains_key(key)),
                        _ => {
                            for (key, value) in other_set {
                                if result.shift_remove(&key).is_none() {
                                    result.insert(key, value);
                                }
                            }
                        }
                    }
                    self.ctx.check_len(result.len())?;
                }
                if name == "update" {
                    *items.borrow_mut() = result;
                    return Ok(Value::None);
                }
                Ok(Value::set(result))
            }
            "issubset" | "issuperset" | "isdisjoint" => {
                args.expect_positional(name, 1, 1)?;
                let mut other = super::value::Set::new();
                for item in self.collect(&args.positional[0])? {
                    other.entry(item.hash_key()?).or_insert(item);
                }
                let mine = items.borrow();
                let result = match name {
                    "issubset" => mine.keys().all(|key| other.contains_key(key)),
                    "issuperset" => other.keys().all(|key| mine.contains_key(key)),
                    _ => !mine.keys().any(|key| other.contains_key(key)),
                };
                Ok(Value::Bool(result))
            }
            _ => no_attribute(&Value::Set(items.clone()), name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxLimits;
    use pretty_assertions::assert_eq;

    fn call(receiver: Value, name: &str, args: Vec<Value>) -> String {
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        match evaluator.call_method(&receiver, name, CallArgs::positional(args)) {
            Ok(value) => value.repr(),
            Err(error) => error.to_string(),
        }
    }

    #[test]
    fn test_str_methods() {
        assert_eq!(call(Value::from("  a b  c "), "split", vec![]), "['a', 'b', 'c']");
        assert_eq!(
            call(Value::from("a,b,,c"), "split", vec![Value::from(",")]),
            "['a', 'b', '', 'c']"
        );
        assert_eq!(
            call(Value::from("a b c"), "rsplit", vec![Value::None, Value::Int(1)]),
            "['a b', 'c']"
        );
        assert_eq!(
            call(Value::from("-"), "join", vec![Value::list(vec![Value::from("x"), Value::from("y")])]),
            "'x-y'"
        );
        assert_eq!(call(Value::from("héllo"), "find", vec![Value::from("l")]), "2");
        assert_eq!(call(Value::from("hello world"), "title", vec![]), "'Hello World'");
        assert_eq!(call(Value::from("42"), "zfill", vec![Value::Int(5)]), "'00042'");
        assert_eq!(call(Value::from("ab"), "center", vec![Value::Int(5), Value::from("*")]), "'**ab*'");
        assert_eq!(
            call(Value::from("k=v"), "partition", vec![Value::from("=")]),
            "('k', '=', 'v')"
        );
        assert_eq!(
            call(Value::from("abc"), "index", vec![Value::from("z")]),
            "ValueError: substring not found"
        );
        assert_eq!(
            call(Value::from("-"), "join", vec![Value::list(vec![Value::Int(1)])]),
            "TypeError: sequence item 0: expected str instance, int found"
        );
    }

    #[test]
    fn test_list_methods_mutate_in_place() {
        let list = Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        call(list.clone(), "append", vec![Value::Int(0)]);
        call(list.clone(), "sort", vec![]);
        assert_eq!(list.repr(), "[0, 1, 2, 3]");
        assert_eq!(call(list.clone(), "pop", vec![]), "3");
        assert_eq!(call(list.clone(), "index", vec![Value::Int(2)]), "2");
        call(list.clone(), "insert", vec![Value::Int(-100), Value::from("x")]);
        assert_eq!(list.repr(), "['x', 0, 1, 2]");
        assert_eq!(
            call(list.clone(), "remove", vec![Value::Int(9)]),
            "ValueError: list.remove(x): x not in list"
        );
        assert_eq!(
            call(Value::list(vec![]), "pop", vec![]),
            "IndexError: pop from empty list"
        );
    }

    #[test]
    fn test_sort_failure_keeps_items() {
        let list = Value::list(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(
            call(list.clone(), "sort", vec![]),
            "TypeError: '<' not supported between instances of 'str' and 'int'"
        );
        assert_eq!(list.repr(), "[1, 'a']");
    }

    #[test]
    fn test_dict_methods() {
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        let dict = evaluator
            .call_builtin(
                super::super::builtins::Builtin::Dict,
                CallArgs::keywords(vec![("a".to_string(), Value::Int(1))]),
            )
            .unwrap();
        assert_eq!(call(dict.clone(), "get", vec![Value::from("b"), Value::Int(0)]), "0");
        assert_eq!(call(dict.clone(), "items", vec![]), "[('a', 1)]");
        assert_eq!(call(dict.clone(), "setdefault", vec![Value::from("b"), Value::Int(2)]), "2");
        assert_eq!(call(dict.clone(), "keys", vec![]), "['a', 'b']");
        assert_eq!(call(dict.clone(), "pop", vec![Value::from("z")]), "KeyError: 'z'");
    }

    #[test]
    fn test_set_methods() {
        let mut evaluator = Evaluator::new(SandboxLimits::default());
        let set = evaluator.make_set(vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(
            call(set.clone(), "union", vec![Value::list(vec![Value::Int(3)])]),
            "{1, 2, 3}"
        );
        assert_eq!(
            call(set.clone(), "issubset", vec![Value::Range(super::super::value::RangeValue { start: 0, stop: 5, step: 1 })]),
            "True"
        );
        assert_eq!(call(set.clone(), "remove", vec![Value::Int(7)]), "KeyError: 7");
    }

    #[test]
    fn test_attribute_errors() {
        let evaluator = Evaluator::new(SandboxLimits::default());
        assert_eq!(
            evaluator
                .get_attribute(&Value::Int(1), "append")
                .unwrap_err()
                .to_string(),
            "AttributeError: 'int' object has no attribute 'append'"
        );
        assert!(evaluator.get_attribute(&Value::from("x"), "upper").is_ok());
        let math = super::super::math::module();
        assert!(evaluator.get_attribute(&math, "sqrt").is_ok());
        assert_eq!(
            evaluator.get_attribute(&math, "nope").unwrap_err().to_string(),
            "AttributeError: module 'math' has no attribute 'nope'"
        );
    }
}
