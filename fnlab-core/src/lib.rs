//! # fnlab: turn interactive Python functions into callable ones
//!
//! A user pastes Python source; fnlab splits it into top-level elements, asks
//! a language model to rewrite one function so that its `input()` calls
//! become parameters and its `print` becomes a `return`, and then runs the
//! rewritten function with form-submitted values inside a sandboxed
//! interpreter.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Decomposer → Session Store → Transformer → Normalizer → Input Detector
//!                                                                      ↓
//!                         Result ← Executor ← Coercer ← submitted values
//! ```
//!
//! ### Stage 1: Parsing
//!
//! The [`tokenizer`] produces spanned tokens plus `Indent`/`Dedent` layout
//! tokens; the [`analyzer`] builds the [`ast`] with parser combinators.
//!
//! ### Stage 2: Decomposition
//!
//! [`decomposer`] classifies top-level statements into imports, globals,
//! functions and everything else. [`session`] keeps the result in a bounded
//! cache keyed by a UUID.
//!
//! ### Stage 3: Transformation
//!
//! [`transformer`] sends one function with its context to the model;
//! [`transformer::normalizer`] repairs the answer or falls back to a fixed
//! result; [`detector`] corrects the declared value types by parameter name.
//!
//! ### Stage 4: Execution
//!
//! [`coercer`] converts submitted strings according to [`schema::InputSpec`];
//! [`executor`] runs the code in the [`eval`] interpreter under the quotas of
//! [`config::SandboxLimits`]. Uploaded files go to [`scratch`].
//!
//! [`workbench::Workbench`] ties the stages together.

pub mod analyzer;
pub mod ast;
pub mod coercer;
pub mod config;
pub mod decomposer;
pub mod detector;
pub mod error;
pub mod eval;
pub mod executor;
pub mod scratch;
pub mod schema;
pub mod session;
pub mod stack;
pub mod tokenizer;
pub mod transformer;
pub mod workbench;

// Re-exports
pub use config::{SecretConfig, SystemConfig};
pub use error::*;
pub use schema::*;
pub use workbench::Workbench;

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        // テスト開始前に一度だけ tracing を初期化
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
