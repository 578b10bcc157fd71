//! Built-in exception hierarchy and raised exception values.

use std::fmt;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use super::value::Value;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, EnumString, EnumIter,
)]
pub enum ExceptionKind {
    BaseException,
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    LookupError,
    KeyError,
    IndexError,
    ValueError,
    TypeError,
    NameError,
    UnboundLocalError,
    AttributeError,
    AssertionError,
    ImportError,
    ModuleNotFoundError,
    RuntimeError,
    RecursionError,
    NotImplementedError,
    StopIteration,
    EOFError,
    SyntaxError,
}

impl ExceptionKind {
    pub fn name(&self) -> &'static str {
        (*self).into()
    }

    pub fn parent(&self) -> Option<ExceptionKind> {
        use ExceptionKind::*;
        match self {
            BaseException => None,
            Exception => Some(BaseException),
            ZeroDivisionError | OverflowError => Some(ArithmeticError),
            KeyError | IndexError => Some(LookupError),
            UnboundLocalError => Some(NameError),
            ModuleNotFoundError => Some(ImportError),
            RecursionError | NotImplementedError => Some(RuntimeError),
            _ => Some(Exception),
        }
    }

    pub fn is_subclass_of(&self, other: ExceptionKind) -> bool {
        let mut current = Some(*self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Every class bound in the builtin namespace.
    pub fn all() -> impl Iterator<Item = ExceptionKind> {
        ExceptionKind::iter()
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception instance: its class and the constructor arguments.
#[derive(Debug, Clone)]
pub struct PyException {
    pub kind: ExceptionKind,
    pub args: Vec<Value>,
}

impl PyException {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let args = if message.is_empty() {
            vec![]
        } else {
            vec![Value::from(message)]
        };
        Self { kind, args }
    }

    pub fn with_args(kind: ExceptionKind, args: Vec<Value>) -> Self {
        Self { kind, args }
    }

    /// `str(exc)`
    pub fn message(&self) -> String {
        match self.args.as_slice() {
            [] => String::new(),
            // KeyError shows its key quoted
            [key] if self.kind == ExceptionKind::KeyError => key.repr(),
            [single] => single.str(),
            many => Value::tuple(many.to_vec()).repr(),
        }
    }

    pub fn repr(&self) -> String {
        let args = self
            .args
            .iter()
            .map(Value::repr)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.kind, args)
    }
}

impl fmt::Display for PyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_hierarchy() {
        assert!(ExceptionKind::ZeroDivisionError.is_subclass_of(ExceptionKind::ArithmeticError));
        assert!(ExceptionKind::KeyError.is_subclass_of(ExceptionKind::LookupError));
        assert!(ExceptionKind::KeyError.is_subclass_of(ExceptionKind::Exception));
        assert!(!ExceptionKind::KeyError.is_subclass_of(ExceptionKind::IndexError));
        assert!(!ExceptionKind::Exception.is_subclass_of(ExceptionKind::ValueError));
    }

    #[test]
    fn test_names_round_trip_through_strum() {
        assert_eq!(
            ExceptionKind::from_str("ValueError"),
            Ok(ExceptionKind::ValueError)
        );
        assert!(ExceptionKind::all().any(|k| k == ExceptionKind::StopIteration));
    }

    #[test]
    fn test_display() {
        let error = PyException::new(ExceptionKind::ValueError, "bad value");
        assert_eq!(error.to_string(), "ValueError: bad value");
        assert_eq!(error.repr(), "ValueError('bad value')");

        let key = PyException::with_args(ExceptionKind::KeyError, vec![Value::from("k")]);
        assert_eq!(key.to_string(), "KeyError: 'k'");

        let bare = PyException::new(ExceptionKind::StopIteration, "");
        assert_eq!(bare.to_string(), "StopIteration");
    }
}
