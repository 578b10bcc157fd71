use std::cell::{Cell, RefCell};

use thiserror::Error;

// パーサートレイト
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), ParseError>;

impl<I, O> Parser<I, O> for Box<dyn Parser<I, O>> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.as_ref().parse(input, pos)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at token {position}")]
    Unexpected {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("unexpected end of input")]
    EOF,
    #[error("no alternative matched at token {position}")]
    NoAlternative { position: usize },
    #[error("{0}")]
    Fail(String),
    #[error("{message}: {inner}")]
    WithContext {
        message: String,
        inner: Box<ParseError>,
    },
}

thread_local! {
    static FURTHEST_FAILURE: Cell<Option<usize>> = const { Cell::new(None) };
    static FURTHEST_REJECTION: RefCell<Option<Rejection>> = const { RefCell::new(None) };
}

/// A construct that parsed but was refused by a semantic check, such as an
/// assignment to a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub start: usize,
    pub end: usize,
    pub message: String,
}

/// Records a failed token match. Alternatives swallow their errors, so the
/// furthest failing position is kept aside to point syntax errors at the
/// offending token rather than the start of the enclosing statement.
pub fn record_failure(pos: usize) {
    FURTHEST_FAILURE.with(|cell| {
        if cell.get().is_none_or(|furthest| pos > furthest) {
            cell.set(Some(pos));
        }
    });
}

pub fn record_rejection(start: usize, end: usize, message: &str) {
    FURTHEST_REJECTION.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.as_ref().is_none_or(|furthest| end >= furthest.end) {
            *slot = Some(Rejection {
                start,
                end,
                message: message.to_string(),
            });
        }
    });
}

pub fn reset_furthest_failure() {
    FURTHEST_FAILURE.with(|cell| cell.set(None));
    FURTHEST_REJECTION.with(|cell| cell.replace(None));
}

pub fn furthest_failure() -> Option<usize> {
    FURTHEST_FAILURE.with(|cell| cell.get())
}

pub fn furthest_rejection() -> Option<Rejection> {
    FURTHEST_REJECTION.with(|cell| cell.borrow().clone())
}

/// Runs a nested parse (an f-string field) without disturbing the failure
/// positions of the enclosing one.
pub fn isolated<T>(f: impl FnOnce() -> T) -> T {
    let failure = FURTHEST_FAILURE.with(|cell| cell.take());
    let rejection = FURTHEST_REJECTION.with(|cell| cell.take());
    let result = f();
    FURTHEST_FAILURE.with(|cell| cell.set(failure));
    FURTHEST_REJECTION.with(|cell| cell.replace(rejection));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_furthest_failure_only_moves_forward() {
        reset_furthest_failure();
        assert_eq!(furthest_failure(), None);
        record_failure(4);
        record_failure(2);
        assert_eq!(furthest_failure(), Some(4));
        record_failure(9);
        assert_eq!(furthest_failure(), Some(9));
        reset_furthest_failure();
        assert_eq!(furthest_failure(), None);
    }

    #[test]
    fn test_isolated_restores_outer_state() {
        reset_furthest_failure();
        record_failure(3);
        record_rejection(1, 3, "outer");
        let inner = isolated(|| {
            record_failure(7);
            furthest_failure()
        });
        assert_eq!(inner, Some(7));
        assert_eq!(furthest_failure(), Some(3));
        assert_eq!(furthest_rejection().map(|r| r.message), Some("outer".to_string()));
        reset_furthest_failure();
    }
}
