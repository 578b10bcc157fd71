//! # Trivia Tokens
//!
//! Whitespace, line breaks, backslash continuations and `#` comments.
//!
//! The raw tokenizer keeps all of them with their spans: indentation is
//! measured from the [`Token::Whitespace`] that opens a line, and the
//! decomposer relies on exact byte offsets. The layout pass drops them
//! afterwards.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    combinator::{map, recognize, value},
    error::context,
    sequence::{pair, preceded},
};

use super::token::{ParserResult, Token};

/// Parses spaces, tabs and form feeds.
///
/// ```
/// # use fnlab_core::tokenizer::whitespace::parse_whitespace;
/// # use fnlab_core::tokenizer::token::Token;
/// let (rest, token) = parse_whitespace("  \tx").unwrap();
/// assert_eq!(token, Token::Whitespace("  \t".to_string()));
/// assert_eq!(rest, "x");
/// ```
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace",
        map(
            take_while1(|c| c == ' ' || c == '\t' || c == '\x0c'),
            |ws: &str| Token::Whitespace(ws.to_string()),
        ),
    )(input)
}

/// Parses `\n`, `\r\n` or a lone `\r`.
pub fn parse_newline(input: &str) -> ParserResult<Token> {
    context(
        "newline",
        value(Token::Newline, alt((tag("\r\n"), tag("\n"), tag("\r")))),
    )(input)
}

/// A backslash immediately followed by a line break joins two physical lines.
pub fn parse_line_continuation(input: &str) -> ParserResult<Token> {
    context(
        "line continuation",
        value(
            Token::LineContinuation,
            recognize(pair(tag("\\"), alt((tag("\r\n"), tag("\n"))))),
        ),
    )(input)
}

/// Parses a `#` comment up to, not including, the line break.
pub fn parse_comment(input: &str) -> ParserResult<Token> {
    context(
        "comment",
        map(
            preceded(tag("#"), take_till(|c| c == '\n' || c == '\r')),
            |content: &str| Token::Comment(content.to_string()),
        ),
    )(input)
}

/// Indentation width of a leading whitespace run. Tabs advance to the next
/// multiple of eight.
pub fn indentation_width(ws: &str) -> usize {
    ws.chars().fold(0, |width, c| match c {
        '\t' => (width / 8 + 1) * 8,
        '\x0c' => 0,
        _ => width + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newline() {
        let (rest, token) = parse_newline("\r\nworld").unwrap();
        assert_eq!(token, Token::Newline);
        assert_eq!(rest, "world");
    }

    #[test]
    fn test_comment_stops_at_line_break() {
        let (rest, token) = parse_comment("# total price\nx").unwrap();
        assert_eq!(token, Token::Comment(" total price".to_string()));
        assert_eq!(rest, "\nx");
    }

    #[test]
    fn test_line_continuation() {
        let (rest, token) = parse_line_continuation("\\\n    + 1").unwrap();
        assert_eq!(token, Token::LineContinuation);
        assert_eq!(rest, "    + 1");
        assert!(parse_line_continuation("\\n").is_err());
    }

    #[test]
    fn test_indentation_width() {
        assert_eq!(indentation_width("    "), 4);
        assert_eq!(indentation_width("\t"), 8);
        assert_eq!(indentation_width("  \t"), 8);
        assert_eq!(indentation_width("\t  "), 10);
    }
}
