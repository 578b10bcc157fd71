//! # Literal Tokens
//!
//! Numbers and strings, including prefixed (`r`, `b`, `u`, `f`) and
//! triple-quoted forms. F-strings are split into literal text and
//! replacement fields here; the fields are parsed later as expressions.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize},
    error::{VerboseError, VerboseErrorKind, context},
    sequence::{pair, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    FString(Vec<FStringPart>),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::FString(_) => write!(f, "f-string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Text(String),
    Field(FStringField),
}

/// A `{expression!conversion:format_spec}` replacement field.
#[derive(Debug, Clone, PartialEq)]
pub struct FStringField {
    pub expression: String,
    pub conversion: Option<char>,
    pub format_spec: Option<String>,
}

fn failure<'a>(input: &'a str, message: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    })
}

fn recoverable<'a>(input: &'a str, message: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Error(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct StringPrefix {
    raw: bool,
    format: bool,
}

fn parse_prefix(input: &str) -> ParserResult<StringPrefix> {
    let (rest, letters) = take_while(|c: char| "rRbBuUfF".contains(c))(input)?;
    if letters.len() > 2 || !(rest.starts_with('"') || rest.starts_with('\'')) {
        return Err(recoverable(input, "string prefix"));
    }
    let lower = letters.to_ascii_lowercase();
    let prefix = match lower.as_str() {
        "" | "u" | "b" => StringPrefix::default(),
        "r" | "br" | "rb" => StringPrefix {
            raw: true,
            format: false,
        },
        "f" => StringPrefix {
            raw: false,
            format: true,
        },
        "rf" | "fr" => StringPrefix {
            raw: true,
            format: true,
        },
        _ => return Err(recoverable(input, "string prefix")),
    };
    Ok((rest, prefix))
}

/// Returns the raw body between the quotes and the remaining input.
fn scan_quoted(input: &str) -> ParserResult<&str> {
    let (quote, triple) = if input.starts_with("\"\"\"") {
        ("\"\"\"", true)
    } else if input.starts_with("'''") {
        ("'''", true)
    } else if input.starts_with('"') {
        ("\"", false)
    } else if input.starts_with('\'') {
        ("'", false)
    } else {
        return Err(recoverable(input, "string literal"));
    };

    let body = &input[quote.len()..];
    let mut chars = body.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                // the escaped character never terminates the literal
                if chars.next().is_none() {
                    break;
                }
            }
            '\n' if !triple => return Err(failure(input, "unterminated string literal")),
            _ if body[idx..].starts_with(quote) => {
                let rest = &body[idx + quote.len()..];
                return Ok((rest, &body[..idx]));
            }
            _ => {}
        }
    }
    if triple {
        Err(failure(input, "unterminated triple-quoted string literal"))
    } else {
        Err(failure(input, "unterminated string literal"))
    }
}

fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    let (after_prefix, prefix) = parse_prefix(input)?;
    let (rest, body) = scan_quoted(after_prefix)?;
    if prefix.format {
        let parts = split_fstring(body, prefix.raw).map_err(|msg| failure(input, msg))?;
        Ok((rest, Literal::FString(parts)))
    } else if prefix.raw {
        Ok((rest, Literal::String(body.to_string())))
    } else {
        Ok((rest, Literal::String(unescape(body))))
    }
}

/// Processes backslash escapes. Unknown escapes are kept verbatim.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    _ => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// Splits an f-string body into text and `{...}` fields.
fn split_fstring(body: &str, raw: bool) -> Result<Vec<FStringPart>, &'static str> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut text = String::new();
    let flush = |text: &mut String, parts: &mut Vec<FStringPart>| {
        if !text.is_empty() {
            let decoded = if raw { text.clone() } else { unescape(text) };
            parts.push(FStringPart::Text(decoded));
            text.clear();
        }
    };

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                text.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                text.push('}');
                i += 2;
            }
            '}' => return Err("f-string: single '}' is not allowed"),
            '{' => {
                let end = find_field_end(&chars, i + 1).ok_or("f-string: expecting '}'")?;
                let source: String = chars[i + 1..end].iter().collect();
                let (field, echo) = parse_field(&source)?;
                flush(&mut text, &mut parts);
                if let Some(echo) = echo {
                    parts.push(FStringPart::Text(echo));
                }
                parts.push(FStringPart::Field(field));
                i = end + 1;
            }
            '\\' if !raw && i + 1 < chars.len() => {
                text.push('\\');
                text.push(chars[i + 1]);
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    flush(&mut text, &mut parts);
    Ok(parts)
}

fn find_field_end(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (idx, &c) in chars.iter().enumerate().skip(from) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Splits `expr!c:spec`. The second value is the `expr=` echo text, if any.
fn parse_field(source: &str) -> Result<(FStringField, Option<String>), &'static str> {
    let chars: Vec<char> = source.chars().collect();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut expr_end = chars.len();
    let mut conversion = None;
    let mut format_spec = None;

    let mut idx = 0;
    while idx < chars.len() {
        let c = chars[idx];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            idx += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '!' if depth == 0 && chars.get(idx + 1) != Some(&'=') => {
                expr_end = expr_end.min(idx);
                let conv = chars.get(idx + 1).copied();
                match conv {
                    Some('s' | 'r' | 'a') => conversion = conv,
                    _ => return Err("f-string: invalid conversion character"),
                }
                match chars.get(idx + 2) {
                    None => {}
                    Some(':') => {
                        format_spec = Some(chars[idx + 3..].iter().collect());
                    }
                    Some(_) => return Err("f-string: expecting '}'"),
                }
                break;
            }
            ':' if depth == 0 => {
                expr_end = expr_end.min(idx);
                format_spec = Some(chars[idx + 1..].iter().collect());
                break;
            }
            _ => {}
        }
        idx += 1;
    }

    let raw_expr: String = chars[..expr_end].iter().collect();
    let trimmed = raw_expr.trim_end();
    let mut echo = None;
    let mut expression = trimmed.to_string();
    if let Some(stripped) = trimmed.strip_suffix('=') {
        let is_comparison = stripped.ends_with(['=', '!', '<', '>']);
        if !is_comparison {
            echo = Some(raw_expr.clone());
            expression = stripped.to_string();
            if conversion.is_none() && format_spec.is_none() {
                conversion = Some('r');
            }
        }
    }
    if expression.trim().is_empty() {
        return Err("f-string: empty expression not allowed");
    }

    Ok((
        FStringField {
            expression: expression.trim().to_string(),
            conversion,
            format_spec,
        },
        echo,
    ))
}

fn digits(input: &str) -> ParserResult<&str> {
    recognize(pair(
        digit1,
        take_while(|c: char| c.is_ascii_digit() || c == '_'),
    ))(input)
}

fn exponent(input: &str) -> ParserResult<&str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    let (rest, text) = context(
        "float literal",
        recognize(alt((
            recognize(tuple((digits, char('.'), opt(digits), opt(exponent)))),
            recognize(tuple((char('.'), digits, opt(exponent)))),
            recognize(pair(digits, exponent)),
        ))),
    )(input)?;
    let cleaned = text.replace('_', "");
    cleaned
        .parse::<f64>()
        .map(|value| (rest, Literal::Float(value)))
        .map_err(|_| failure(input, "invalid float literal"))
}

fn parse_radix_integer(input: &str) -> ParserResult<Literal> {
    let (rest, (radix_tag, body)) = pair(
        alt((tag_no_case("0x"), tag_no_case("0o"), tag_no_case("0b"))),
        take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'),
    )(input)?;
    let radix = match radix_tag.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        _ => 2,
    };
    let cleaned = body.replace('_', "");
    i64::from_str_radix(&cleaned, radix)
        .map(|value| (rest, Literal::Integer(value)))
        .map_err(|_| failure(input, "invalid integer literal"))
}

fn parse_decimal_integer(input: &str) -> ParserResult<Literal> {
    let (rest, text) = context("integer literal", digits)(input)?;
    let cleaned = text.replace('_', "");
    cleaned
        .parse::<i64>()
        .map(|value| (rest, Literal::Integer(value)))
        .map_err(|_| failure(input, "integer literal too large"))
}

pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_radix_integer,
                parse_float_literal,
                parse_decimal_integer,
            )),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(input: &str) -> Literal {
        match parse_literal(input).unwrap().1 {
            Token::Literal(lit) => lit,
            other => panic!("not a literal: {:?}", other),
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(literal("42"), Literal::Integer(42));
        assert_eq!(literal("1_000"), Literal::Integer(1000));
        assert_eq!(literal("0xff"), Literal::Integer(255));
        assert_eq!(literal("0b101"), Literal::Integer(5));
        assert_eq!(literal("3.14"), Literal::Float(3.14));
        assert_eq!(literal(".5"), Literal::Float(0.5));
        assert_eq!(literal("2."), Literal::Float(2.0));
        assert_eq!(literal("1e3"), Literal::Float(1000.0));
        assert!(matches!(
            parse_literal("99999999999999999999"),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn test_strings() {
        assert_eq!(literal("'hi'"), Literal::String("hi".to_string()));
        assert_eq!(literal(r#""a\tb""#), Literal::String("a\tb".to_string()));
        assert_eq!(literal(r#"r"a\tb""#), Literal::String("a\\tb".to_string()));
        assert_eq!(literal(r#"'it\'s'"#), Literal::String("it's".to_string()));
        assert_eq!(
            literal("\"\"\"two\nlines\"\"\""),
            Literal::String("two\nlines".to_string())
        );
        assert_eq!(literal(r#""\x41é""#), Literal::String("Aé".to_string()));
    }

    #[test]
    fn test_prefix_only_applies_before_quote() {
        assert!(parse_literal("rb").is_err());
        assert!(parse_literal("format").is_err());
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        assert!(matches!(
            parse_literal("'abc\n'"),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn test_fstring_fields() {
        let lit = literal(r#"f"Total: {price * qty:.2f} ({name!r}) {{x}}""#);
        assert_eq!(
            lit,
            Literal::FString(vec![
                FStringPart::Text("Total: ".to_string()),
                FStringPart::Field(FStringField {
                    expression: "price * qty".to_string(),
                    conversion: None,
                    format_spec: Some(".2f".to_string()),
                }),
                FStringPart::Text(" (".to_string()),
                FStringPart::Field(FStringField {
                    expression: "name".to_string(),
                    conversion: Some('r'),
                    format_spec: None,
                }),
                FStringPart::Text(") {x}".to_string()),
            ])
        );
    }

    #[test]
    fn test_fstring_nested_brackets_and_comparison() {
        let lit = literal(r#"f"{d['k']} {a != b}""#);
        let Literal::FString(parts) = lit else {
            panic!("expected f-string");
        };
        assert_eq!(
            parts[0],
            FStringPart::Field(FStringField {
                expression: "d['k']".to_string(),
                conversion: None,
                format_spec: None,
            })
        );
        assert_eq!(
            parts[2],
            FStringPart::Field(FStringField {
                expression: "a != b".to_string(),
                conversion: None,
                format_spec: None,
            })
        );
    }

    #[test]
    fn test_fstring_self_documenting() {
        let Literal::FString(parts) = literal(r#"f"{x=}""#) else {
            panic!("expected f-string");
        };
        assert_eq!(parts[0], FStringPart::Text("x=".to_string()));
        assert_eq!(
            parts[1],
            FStringPart::Field(FStringField {
                expression: "x".to_string(),
                conversion: Some('r'),
                format_spec: None,
            })
        );
    }

    #[test]
    fn test_fstring_errors() {
        assert!(parse_literal(r#"f"{}""#).is_err());
        assert!(parse_literal(r#"f"a } b""#).is_err());
        assert!(parse_literal(r#"f"{x""#).is_err());
    }
}
