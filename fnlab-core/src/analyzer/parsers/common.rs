use super::super::{core::*, prelude::*};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

// 基本的なパーサー
pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        }),
        "identifier",
    )
}

/// `a.b.c` as a single string.
pub fn parse_dotted_name() -> impl Parser<Token, String> {
    with_context(
        try_map(
            separated_list(parse_identifier(), delimiter(Delimiter::Dot)),
            |parts: Vec<String>| {
                if parts.is_empty() {
                    Err("expected a module name".to_string())
                } else {
                    Ok(parts.join("."))
                }
            },
        ),
        "dotted name",
    )
}

pub fn delimiter(d: Delimiter) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Delimiter(d)))
}

pub fn operator(op: Operator) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Operator(op)))
}

pub fn keyword(kw: Keyword) -> impl Parser<Token, ()> {
    as_unit(equal(Token::Keyword(kw)))
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    delimiter(Delimiter::Comma)
}

pub fn parse_colon() -> impl Parser<Token, ()> {
    delimiter(Delimiter::Colon)
}

pub fn parse_assign() -> impl Parser<Token, ()> {
    delimiter(Delimiter::Assign)
}

pub fn parse_open_paren() -> impl Parser<Token, ()> {
    delimiter(Delimiter::OpenParen)
}

pub fn parse_close_paren() -> impl Parser<Token, ()> {
    delimiter(Delimiter::CloseParen)
}

pub fn parse_open_bracket() -> impl Parser<Token, ()> {
    delimiter(Delimiter::OpenBracket)
}

pub fn parse_close_bracket() -> impl Parser<Token, ()> {
    delimiter(Delimiter::CloseBracket)
}

pub fn parse_open_brace() -> impl Parser<Token, ()> {
    delimiter(Delimiter::OpenBrace)
}

pub fn parse_close_brace() -> impl Parser<Token, ()> {
    delimiter(Delimiter::CloseBrace)
}

// レイアウトトークン
pub fn parse_newline() -> impl Parser<Token, ()> {
    with_context(as_unit(equal(Token::Newline)), "end of line")
}

pub fn parse_indent() -> impl Parser<Token, ()> {
    with_context(as_unit(equal(Token::Indent)), "indented block")
}

pub fn parse_dedent() -> impl Parser<Token, ()> {
    as_unit(equal(Token::Dedent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_name() {
        let input = vec![
            Token::Identifier("os".to_string()),
            Token::Delimiter(Delimiter::Dot),
            Token::Identifier("path".to_string()),
            Token::Delimiter(Delimiter::Dot),
        ];
        // the dangling dot is not consumed
        assert_eq!(
            parse_dotted_name().parse(&input, 0),
            Ok((3, "os.path".to_string()))
        );
    }

    #[test]
    fn test_keyword_is_not_identifier() {
        let input = vec![Token::Keyword(Keyword::Def)];
        assert!(parse_identifier().parse(&input, 0).is_err());
        assert_eq!(keyword(Keyword::Def).parse(&input, 0), Ok((1, ())));
    }
}
