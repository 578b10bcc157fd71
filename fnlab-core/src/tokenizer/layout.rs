//! Logical-line pass over the raw token stream.
//!
//! Emits `Newline` at the end of every logical line, `Indent`/`Dedent`
//! around blocks, joins lines inside brackets and drops trivia. Blank and
//! comment-only lines never affect indentation.

use super::keyword::Keyword;
use super::token::{Span, Token, TokenSpan, TokenizerError, TokenizerResult};
use super::whitespace::indentation_width;

pub const MAX_BRACKET_DEPTH: usize = 100;
pub const MAX_INDENT_DEPTH: usize = 100;
/// `lambda: lambda: ...` nests without brackets.
pub const MAX_LAMBDAS_PER_LINE: usize = 100;
/// Operator chains build trees as deep as they are long.
pub const MAX_OPERATORS_PER_LINE: usize = 2_000;

fn synthetic(token: Token, span: &Span) -> TokenSpan {
    TokenSpan {
        token,
        start: span.start,
        end: span.start,
        line: span.line,
        column: span.column,
    }
}

fn is_operator(token: &Token) -> bool {
    matches!(
        token,
        Token::Operator(_) | Token::Keyword(Keyword::And | Keyword::Or | Keyword::Not)
    )
}

pub fn apply_layout(raw: Vec<TokenSpan>, end_of_input: Span) -> TokenizerResult<Vec<TokenSpan>> {
    let mut out: Vec<TokenSpan> = Vec::with_capacity(raw.len());
    let mut indents: Vec<usize> = vec![0];
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut lambdas = 0usize;
    let mut operators = 0usize;

    let mut idx = 0;
    while idx < raw.len() {
        if at_line_start && depth == 0 {
            // measure the leading whitespace and find the first real token
            let (width, content) = match &raw[idx].token {
                Token::Whitespace(ws) => (indentation_width(ws), idx + 1),
                _ => (0, idx),
            };
            let Some(first) = raw.get(content) else {
                break;
            };
            match first.token {
                Token::Newline | Token::Comment(_) | Token::LineContinuation => {
                    // blank line: skip through its line break
                    idx = content;
                    while idx < raw.len() && raw[idx].token != Token::Newline {
                        idx += 1;
                    }
                    idx += 1;
                    continue;
                }
                _ => {}
            }

            let current = indents.last().copied().unwrap_or(0);
            let span = first.span();
            if width > current {
                if out.is_empty() {
                    return Err(TokenizerError::UnexpectedIndent { span });
                }
                if indents.len() > MAX_INDENT_DEPTH {
                    return Err(TokenizerError::NestingTooDeep { span });
                }
                indents.push(width);
                out.push(synthetic(Token::Indent, &span));
            } else if width < current {
                while indents.last().is_some_and(|&top| top > width) {
                    indents.pop();
                    out.push(synthetic(Token::Dedent, &span));
                }
                if indents.last().copied().unwrap_or(0) != width {
                    return Err(TokenizerError::InconsistentDedent { span });
                }
            }
            at_line_start = false;
            idx = content;
            continue;
        }

        let token_span = &raw[idx];
        if is_operator(&token_span.token) {
            operators += 1;
            if operators > MAX_OPERATORS_PER_LINE {
                return Err(TokenizerError::NestingTooDeep {
                    span: token_span.span(),
                });
            }
        }
        match &token_span.token {
            token if token.is_trivia() => {}
            Token::Newline => {
                if depth == 0 {
                    out.push(token_span.clone());
                    at_line_start = true;
                    lambdas = 0;
                    operators = 0;
                }
            }
            Token::Delimiter(d) if d.is_opening() => {
                depth += 1;
                if depth > MAX_BRACKET_DEPTH {
                    return Err(TokenizerError::NestingTooDeep {
                        span: token_span.span(),
                    });
                }
                out.push(token_span.clone());
            }
            Token::Keyword(Keyword::Lambda) => {
                lambdas += 1;
                if lambdas > MAX_LAMBDAS_PER_LINE {
                    return Err(TokenizerError::NestingTooDeep {
                        span: token_span.span(),
                    });
                }
                out.push(token_span.clone());
            }
            Token::Delimiter(d) if d.is_closing() => {
                depth = depth.saturating_sub(1);
                out.push(token_span.clone());
            }
            _ => out.push(token_span.clone()),
        }
        idx += 1;
    }

    if !at_line_start {
        out.push(synthetic(Token::Newline, &end_of_input));
    }
    while indents.len() > 1 {
        indents.pop();
        out.push(synthetic(Token::Dedent, &end_of_input));
    }
    Ok(out)
}
