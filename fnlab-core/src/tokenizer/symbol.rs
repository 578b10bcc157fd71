//! # Symbol Tokens
//!
//! Operators and delimiters of the Python subset.
//!
//! Symbols are matched longest-first so that `**=` is never split into `**`
//! and `=`, and `//` never into two `/`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};
use strum::{AsRefStr, Display, EnumString};

use super::token::{ParserResult, Token};

/// Operators appearing inside expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
pub enum Operator {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Star,
    /// Power (`**`), also the keyword-unpacking marker in calls.
    #[strum(serialize = "**")]
    DoubleStar,
    #[strum(serialize = "/")]
    Slash,
    /// Floor division (`//`)
    #[strum(serialize = "//")]
    DoubleSlash,
    #[strum(serialize = "%")]
    Percent,
    /// Matrix multiplication or decorator marker (`@`)
    #[strum(serialize = "@")]
    At,
    #[strum(serialize = "<<")]
    LeftShift,
    #[strum(serialize = ">>")]
    RightShift,
    #[strum(serialize = "&")]
    Ampersand,
    #[strum(serialize = "|")]
    Pipe,
    #[strum(serialize = "^")]
    Caret,
    #[strum(serialize = "~")]
    Tilde,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    /// Assignment expression (`:=`)
    #[strum(serialize = ":=")]
    Walrus,
}

/// Structural punctuation, plain and augmented assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr)]
pub enum Delimiter {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = "[")]
    OpenBracket,
    #[strum(serialize = "]")]
    CloseBracket,
    #[strum(serialize = "{")]
    OpenBrace,
    #[strum(serialize = "}")]
    CloseBrace,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ":")]
    Colon,
    #[strum(serialize = ".")]
    Dot,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "->")]
    Arrow,
    #[strum(serialize = "...")]
    Ellipsis,
    #[strum(serialize = "+=")]
    PlusAssign,
    #[strum(serialize = "-=")]
    MinusAssign,
    #[strum(serialize = "*=")]
    StarAssign,
    #[strum(serialize = "/=")]
    SlashAssign,
    #[strum(serialize = "//=")]
    DoubleSlashAssign,
    #[strum(serialize = "%=")]
    PercentAssign,
    #[strum(serialize = "**=")]
    DoubleStarAssign,
    #[strum(serialize = "@=")]
    AtAssign,
    #[strum(serialize = "&=")]
    AmpersandAssign,
    #[strum(serialize = "|=")]
    PipeAssign,
    #[strum(serialize = "^=")]
    CaretAssign,
    #[strum(serialize = "<<=")]
    LeftShiftAssign,
    #[strum(serialize = ">>=")]
    RightShiftAssign,
}

// `{` と `}` は strum の Display では書式文字列として解釈されるため手書き
impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl Delimiter {
    pub fn is_opening(&self) -> bool {
        matches!(
            self,
            Delimiter::OpenParen | Delimiter::OpenBracket | Delimiter::OpenBrace
        )
    }

    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            Delimiter::CloseParen | Delimiter::CloseBracket | Delimiter::CloseBrace
        )
    }
}

fn parse_three_char(input: &str) -> ParserResult<Token> {
    alt((
        value(Token::Delimiter(Delimiter::DoubleStarAssign), tag("**=")),
        value(Token::Delimiter(Delimiter::DoubleSlashAssign), tag("//=")),
        value(Token::Delimiter(Delimiter::LeftShiftAssign), tag("<<=")),
        value(Token::Delimiter(Delimiter::RightShiftAssign), tag(">>=")),
        value(Token::Delimiter(Delimiter::Ellipsis), tag("...")),
    ))(input)
}

fn parse_two_char(input: &str) -> ParserResult<Token> {
    alt((
        alt((
            value(Token::Operator(Operator::DoubleStar), tag("**")),
            value(Token::Operator(Operator::DoubleSlash), tag("//")),
            value(Token::Operator(Operator::LeftShift), tag("<<")),
            value(Token::Operator(Operator::RightShift), tag(">>")),
            value(Token::Operator(Operator::LessEqual), tag("<=")),
            value(Token::Operator(Operator::GreaterEqual), tag(">=")),
            value(Token::Operator(Operator::EqualEqual), tag("==")),
            value(Token::Operator(Operator::NotEqual), tag("!=")),
            value(Token::Operator(Operator::Walrus), tag(":=")),
            value(Token::Delimiter(Delimiter::Arrow), tag("->")),
        )),
        alt((
            value(Token::Delimiter(Delimiter::PlusAssign), tag("+=")),
            value(Token::Delimiter(Delimiter::MinusAssign), tag("-=")),
            value(Token::Delimiter(Delimiter::StarAssign), tag("*=")),
            value(Token::Delimiter(Delimiter::SlashAssign), tag("/=")),
            value(Token::Delimiter(Delimiter::PercentAssign), tag("%=")),
            value(Token::Delimiter(Delimiter::AtAssign), tag("@=")),
            value(Token::Delimiter(Delimiter::AmpersandAssign), tag("&=")),
            value(Token::Delimiter(Delimiter::PipeAssign), tag("|=")),
            value(Token::Delimiter(Delimiter::CaretAssign), tag("^=")),
        )),
    ))(input)
}

fn parse_operator_char(input: &str) -> ParserResult<Token> {
    map(
        alt((
            value(Operator::Plus, tag("+")),
            value(Operator::Minus, tag("-")),
            value(Operator::Star, tag("*")),
            value(Operator::Slash, tag("/")),
            value(Operator::Percent, tag("%")),
            value(Operator::At, tag("@")),
            value(Operator::Ampersand, tag("&")),
            value(Operator::Pipe, tag("|")),
            value(Operator::Caret, tag("^")),
            value(Operator::Tilde, tag("~")),
            value(Operator::Less, tag("<")),
            value(Operator::Greater, tag(">")),
        )),
        Token::Operator,
    )(input)
}

fn parse_delimiter_char(input: &str) -> ParserResult<Token> {
    map(
        alt((
            value(Delimiter::OpenParen, tag("(")),
            value(Delimiter::CloseParen, tag(")")),
            value(Delimiter::OpenBracket, tag("[")),
            value(Delimiter::CloseBracket, tag("]")),
            value(Delimiter::OpenBrace, tag("{")),
            value(Delimiter::CloseBrace, tag("}")),
            value(Delimiter::Comma, tag(",")),
            value(Delimiter::Colon, tag(":")),
            value(Delimiter::Dot, tag(".")),
            value(Delimiter::Semicolon, tag(";")),
            value(Delimiter::Assign, tag("=")),
        )),
        Token::Delimiter,
    )(input)
}

/// Parses one operator or delimiter, longest match first.
pub fn parse_symbol(input: &str) -> ParserResult<Token> {
    context(
        "symbol",
        alt((
            parse_three_char,
            parse_two_char,
            parse_operator_char,
            parse_delimiter_char,
        )),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_match() {
        let (rest, token) = parse_symbol("**=2").unwrap();
        assert_eq!(token, Token::Delimiter(Delimiter::DoubleStarAssign));
        assert_eq!(rest, "2");

        let (rest, token) = parse_symbol("// 2").unwrap();
        assert_eq!(token, Token::Operator(Operator::DoubleSlash));
        assert_eq!(rest, " 2");

        let (_, token) = parse_symbol("->int").unwrap();
        assert_eq!(token, Token::Delimiter(Delimiter::Arrow));

        let (_, token) = parse_symbol("==").unwrap();
        assert_eq!(token, Token::Operator(Operator::EqualEqual));

        let (_, token) = parse_symbol("= =").unwrap();
        assert_eq!(token, Token::Delimiter(Delimiter::Assign));
    }

    #[test]
    fn test_symbol_display_matches_source() {
        assert_eq!(Operator::DoubleSlash.to_string(), "//");
        assert_eq!(Delimiter::RightShiftAssign.to_string(), ">>=");
        assert_eq!(Delimiter::OpenBrace.to_string(), "{");
        assert_eq!(format!("{}{}", Delimiter::OpenBrace, Delimiter::CloseBrace), "{}");
    }

    #[test]
    fn test_not_a_symbol() {
        assert!(parse_symbol("$").is_err());
        assert!(parse_symbol("!").is_err());
    }
}
