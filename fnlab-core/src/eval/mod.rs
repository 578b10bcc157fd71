//! fnlab Evaluation System
//!
//! A tree-walking interpreter for the Python subset accepted by the
//! [`crate::analyzer`]. It runs untrusted, user-submitted code, so everything
//! it can reach is listed here: there is no filesystem, network, process or
//! interactive input access, and `math` is the only importable module.
//!
//! # Core Components
//!
//! ## Evaluator
//! Owns the [`context::ExecutionContext`] and dispatches calls to user
//! functions, builtins, bound methods and `math` functions.
//!
//! ## Statement Evaluator
//! Executes statements and blocks, propagating `break`/`continue`/`return`
//! as [`statement::ControlFlow`].
//!
//! ## Expression Evaluator
//! Evaluates expressions, comprehensions, f-strings, subscripts and slices.
//!
//! ## Execution Context
//! Scope arena, global namespace, captured stdout and the sandbox quotas
//! (steps, wall clock, call depth, nesting, collection size).
//!
//! # Errors
//!
//! Python exceptions travel as [`EvalError::Exception`] and can be handled by
//! `try`/`except`. A quota violation is [`EvalError::LimitExceeded`], which no
//! handler catches.

pub mod builtins;
pub mod context;
pub mod evaluator;
pub mod exception;
pub mod expression;
pub mod format;
pub mod math;
pub mod methods;
pub mod operators;
pub mod statement;
pub mod value;

pub use evaluator::{CallArgs, EvalError, EvalResult, Evaluator};
pub use exception::{ExceptionKind, PyException};
pub use value::Value;
