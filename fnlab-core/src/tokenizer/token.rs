use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    error::{VerboseError, context},
    sequence::pair,
};
use thiserror::Error;

use super::{
    keyword::Keyword,
    literal::{Literal, parse_literal},
    symbol::{Delimiter, Operator, parse_symbol},
    whitespace::{parse_comment, parse_line_continuation, parse_newline, parse_whitespace},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Identifier(String),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
    // Trivia, dropped by the layout pass
    Whitespace(String),
    Comment(String),
    LineContinuation,
    // Layout
    Newline,
    Indent,
    Dedent,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Token::Whitespace(_) | Token::Comment(_) | Token::LineContinuation
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(k) => write!(f, "{}", k),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(d) => write!(f, "{}", d),
            Token::Literal(lit) => write!(f, "{}", lit),
            Token::Whitespace(_) => write!(f, "whitespace"),
            Token::Comment(_) => write!(f, "comment"),
            Token::LineContinuation => write!(f, "\\"),
            Token::Newline => write!(f, "newline"),
            Token::Indent => write!(f, "indent"),
            Token::Dedent => write!(f, "dedent"),
        }
    }
}

/// Raw lexer. Produces every token including trivia; see
/// [`super::layout::apply_layout`] for the logical-line pass.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,   // 1-based
            current_column: 1, // 1-based
        }
    }

    #[tracing::instrument(level = "debug", skip(self, input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            let start_position = self.current_position;
            let start_line = self.current_line;
            let start_column = self.current_column;

            let result = alt((
                parse_whitespace,
                parse_newline,
                parse_line_continuation,
                parse_comment,
                // string prefixes look like identifiers, so literals go first
                parse_literal,
                parse_symbol,
                parse_word,
            ))(remaining);

            match result {
                Ok((new_remaining, token)) => {
                    let consumed = &remaining[..(remaining.len() - new_remaining.len())];
                    self.update_position(consumed);

                    tokens.push(TokenSpan {
                        token,
                        start: start_position,
                        end: self.current_position,
                        line: start_line,
                        column: start_column,
                    });

                    remaining = new_remaining;
                }
                Err(e) => {
                    let found = remaining.chars().take(20).collect::<String>();
                    let span = Span {
                        start: self.current_position,
                        end: self.current_position + 1,
                        line: self.current_line,
                        column: self.current_column,
                    };
                    let message = match e {
                        nom::Err::Incomplete(_) => "incomplete input".to_string(),
                        nom::Err::Error(e) | nom::Err::Failure(e) => describe_error(&e),
                    };
                    let error = TokenizerError::InvalidToken {
                        message,
                        found,
                        span,
                    };
                    tracing::debug!("{}", error);
                    return Err(error);
                }
            }
        }

        Ok(tokens)
    }

    pub fn position(&self) -> Span {
        Span {
            start: self.current_position,
            end: self.current_position,
            line: self.current_line,
            column: self.current_column,
        }
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

/// Picks the innermost context label, falling back to a generic message.
fn describe_error(error: &VerboseError<&str>) -> String {
    error
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            nom::error::VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "invalid character".to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl TokenSpan {
    pub fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Identifiers and keywords.
fn parse_word(input: &str) -> ParserResult<Token> {
    let (input, word) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)?;

    if let Ok(kw) = Keyword::try_from(word) {
        return Ok((input, Token::Keyword(kw)));
    }
    Ok((input, Token::Identifier(word.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("{message} at {span}")]
    InvalidToken {
        message: String,
        found: String,
        span: Span,
    },
    #[error("unindent does not match any outer indentation level at {span}")]
    InconsistentDedent { span: Span },
    #[error("unexpected indent at {span}")]
    UnexpectedIndent { span: Span },
    #[error("too many nested brackets at {span}")]
    NestingTooDeep { span: Span },
}

impl TokenizerError {
    pub fn span(&self) -> &Span {
        match self {
            TokenizerError::InvalidToken { span, .. }
            | TokenizerError::InconsistentDedent { span }
            | TokenizerError::UnexpectedIndent { span }
            | TokenizerError::NestingTooDeep { span } => span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_for_keyword() {
        let (rest, token) = parse_word("def add").unwrap();
        assert_eq!(token, Token::Keyword(Keyword::Def));
        assert_eq!(rest, " add");
    }

    #[test]
    fn test_identifier() {
        let (rest, token) = parse_word("my_var123 other").unwrap();
        assert_eq!(token, Token::Identifier("my_var123".to_string()));
        assert_eq!(rest, " other");

        let (_, token) = parse_word("définir").unwrap();
        assert_eq!(token, Token::Identifier("définir".to_string()));
    }

    #[test]
    fn test_tokenizer_with_position() {
        let mut tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("x = 1\nprint(x)").unwrap();

        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[0].token, Token::Identifier("x".to_string()));

        let print_token = tokens
            .iter()
            .find(|t| t.token == Token::Identifier("print".to_string()))
            .unwrap();
        assert_eq!(print_token.line, 2);
        assert_eq!(print_token.column, 1);
        assert_eq!(print_token.start, 6);
    }

    #[test]
    fn test_invalid_character() {
        let mut tokenizer = Tokenizer::new();
        let err = tokenizer.tokenize("x = 1\ny = $").unwrap_err();
        assert_eq!(err.span().line, 2);
        assert_eq!(err.span().column, 5);
    }
}
