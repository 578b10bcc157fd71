//! Token-level parser for the Python subset.
//!
//! [`Program::parse`] tokenizes and parses a whole source text, keeping the
//! token stream so statements can be mapped back to their source lines.

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::ast::{Expression, Module, Statement};
use crate::stack::run_with_stack;
use crate::tokenizer::{
    self,
    token::{Token, TokenSpan, TokenizerError},
};

/// Deeply nested sources recurse deeply; parsing runs on its own stack.
pub const PARSER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    fn at(message: impl Into<String>, token: Option<&TokenSpan>) -> Self {
        let (line, column) = token.map(|t| (t.line, t.column)).unwrap_or((1, 1));
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl From<TokenizerError> for SyntaxError {
    fn from(error: TokenizerError) -> Self {
        let message = match &error {
            TokenizerError::InvalidToken { message, found, .. } => {
                let found = found.lines().next().unwrap_or_default();
                format!("{message} near '{found}'")
            }
            TokenizerError::InconsistentDedent { .. } => {
                "unindent does not match any outer indentation level".to_string()
            }
            TokenizerError::UnexpectedIndent { .. } => "unexpected indent".to_string(),
            TokenizerError::NestingTooDeep { .. } => "too many nested levels".to_string(),
        };
        let span = error.span();
        Self {
            message,
            line: span.line,
            column: span.column,
        }
    }
}

/// A parsed source text together with its tokens.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    tokens: Vec<TokenSpan>,
    module: Module,
}

impl Program {
    pub fn parse(source: &str) -> Result<Program, SyntaxError> {
        let owned = source.to_string();
        run_with_stack(PARSER_STACK_SIZE, move || Program::parse_on_current_stack(owned))
            .map_err(|e| SyntaxError::at(format!("parser failed: {e}"), None))?
    }

    fn parse_on_current_stack(source: String) -> Result<Program, SyntaxError> {
        let tokens = tokenizer::tokenize(&source)?;
        let plain: Vec<Token> = tokens.iter().map(|t| t.token.clone()).collect();
        let module = run_parser(&parsers::statement::parse_module(), &plain, &tokens)?;
        Ok(Program {
            source,
            tokens,
            module,
        })
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// First and last source line (1-based, inclusive) of a statement.
    pub fn line_range(&self, statement: &Statement) -> (usize, usize) {
        let tokens = self
            .tokens
            .get(statement.tokens.clone())
            .unwrap_or_default();
        let mut content = tokens
            .iter()
            .filter(|t| !matches!(t.token, Token::Indent | Token::Dedent | Token::Newline));
        let first = content.next().map(|t| t.line).unwrap_or(1);
        let last = content.last().map(|t| t.line).unwrap_or(first);
        (first, last)
    }

    /// Full source lines of a statement, decorators included.
    pub fn statement_source(&self, statement: &Statement) -> String {
        let (first, last) = self.line_range(statement);
        self.source
            .lines()
            .skip(first.saturating_sub(1))
            .take(last + 1 - first)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn run_parser<O>(
    parser: &impl Parser<Token, O>,
    plain: &[Token],
    tokens: &[TokenSpan],
) -> Result<O, SyntaxError> {
    core::reset_furthest_failure();
    let result = parser.parse(plain, 0);
    let stopped_at = match result {
        Ok((pos, value)) if pos == plain.len() => return Ok(value),
        Ok((pos, _)) => pos,
        Err(_) => 0,
    };
    let failure = core::furthest_failure().unwrap_or(stopped_at).max(stopped_at);

    if let Some(rejection) = core::furthest_rejection().filter(|r| r.end >= failure) {
        return Err(SyntaxError::at(
            rejection.message,
            tokens.get(rejection.start).or_else(|| tokens.last()),
        ));
    }

    let message = match plain.get(failure) {
        None => "unexpected end of input".to_string(),
        Some(Token::Indent) => "unexpected indent".to_string(),
        Some(Token::Newline) => "invalid syntax".to_string(),
        Some(token) => format!("invalid syntax near '{token}'"),
    };
    Err(SyntaxError::at(
        message,
        tokens.get(failure).or_else(|| tokens.last()),
    ))
}

/// Parses a standalone expression, such as an f-string replacement field.
pub fn parse_expression_source(source: &str) -> Result<Expression, SyntaxError> {
    core::isolated(|| {
        let tokens = tokenizer::tokenize(source.trim())?;
        let plain: Vec<Token> = tokens.iter().map(|t| t.token.clone()).collect();
        run_parser(
            &prelude::terminated(
                parsers::expression::parse_expression_list(),
                prelude::as_unit(prelude::optional(parsers::parse_newline())),
            ),
            &plain,
            &tokens,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_syntax_error_position() {
        let err = Program::parse("def f(:\n    return 1\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.to_string().contains("(line 1, column"));
    }

    #[test]
    fn test_rejection_message_is_reported() {
        let err = Program::parse("x = 1\n1 = x\n").unwrap_err();
        assert_eq!(err.message, "cannot assign to literal");
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_tokenizer_errors_become_syntax_errors() {
        let err = Program::parse("if x:\n        a = 1\n    b = 2\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn test_missing_block() {
        let err = Program::parse("def f():\nreturn 1\n").unwrap_err();
        assert_eq!(err.message, "expected an indented block");
    }

    #[test]
    fn test_statement_source_includes_decorators() {
        let source = "import math\n\n@cache\ndef f(x):\n    # square\n    return x * x\n\ny = f(2)\n";
        let program = Program::parse(source).unwrap();
        let def = &program.module().body[1];
        assert_eq!(program.line_range(def), (3, 6));
        assert_eq!(
            program.statement_source(def),
            "@cache\ndef f(x):\n    # square\n    return x * x"
        );
    }

    #[test]
    fn test_empty_source() {
        let program = Program::parse("").unwrap();
        assert!(program.module().body.is_empty());
        let program = Program::parse("# only a comment\n").unwrap();
        assert!(program.module().body.is_empty());
    }
}
