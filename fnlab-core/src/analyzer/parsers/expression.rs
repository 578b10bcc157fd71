//! Expression grammar, lowest precedence first.
//!
//! Every binary level is parsed as `operand (op operand)*` and folded, so
//! nothing re-parses an operand on failure. Prefix chains (`not`, unary
//! minus) and right-associative chains (`**`, conditional expressions) are
//! collected iteratively and folded afterwards.

use std::sync::Arc;

use super::super::{core::*, prelude::*};
use super::common::*;
use crate::ast::{
    Argument, BinaryOperator, BoolOperator, CompareOperator, Comprehension, Constant, DictEntry,
    Expression, FStringElement, Lambda, Parameter, ParameterKind, UnaryOperator,
};
use crate::tokenizer::{
    keyword::Keyword,
    literal::{FStringPart, Literal},
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_expression() -> impl Parser<Token, Expression> {
    with_context(lazy(parse_named_expression), "expression")
}

/// `name := value` or a plain test.
fn parse_named_expression() -> impl Parser<Token, Expression> {
    choice(vec![
        Box::new(map(
            tuple3(
                parse_identifier(),
                operator(Operator::Walrus),
                lazy(parse_test),
            ),
            |(name, _, value)| Expression::NamedExpr {
                name,
                value: Box::new(value),
            },
        )),
        Box::new(parse_test()),
    ])
}

/// A single expression without a top-level comma.
pub fn parse_test() -> impl Parser<Token, Expression> {
    choice(vec![Box::new(parse_lambda()), Box::new(parse_conditional())])
}

/// Comma-separated expressions; more than one item (or a trailing comma)
/// yields a tuple.
pub fn parse_expression_list() -> impl Parser<Token, Expression> {
    with_context(
        try_map(
            tuple2(
                separated_list(parse_star_or_expression(), parse_comma()),
                optional(parse_comma()),
            ),
            |(items, trailing)| build_sequence(items, trailing.is_some()),
        ),
        "expression list",
    )
}

fn build_sequence(mut items: Vec<Expression>, trailing: bool) -> Result<Expression, String> {
    if items.is_empty() {
        return Err("expected an expression".to_string());
    }
    if items.len() == 1 && !trailing {
        let item = items.remove(0);
        if matches!(item, Expression::Starred(_)) {
            return Err("can't use starred expression here".to_string());
        }
        return Ok(item);
    }
    Ok(Expression::Tuple(items))
}

pub fn parse_star_or_expression() -> impl Parser<Token, Expression> {
    choice(vec![
        Box::new(map(
            preceded(operator(Operator::Star), lazy(parse_bitwise_or)),
            |inner| Expression::Starred(Box::new(inner)),
        )),
        Box::new(parse_expression()),
    ])
}

/// Assignment targets of `for` loops and comprehensions. Parsed at the
/// bitwise-or level so the following `in` is not taken as a comparison.
pub fn parse_target_list() -> impl Parser<Token, Expression> {
    with_context(
        try_map(
            tuple2(
                separated_list(
                    choice(vec![
                        Box::new(map(
                            preceded(operator(Operator::Star), lazy(parse_bitwise_or)),
                            |inner| Expression::Starred(Box::new(inner)),
                        )),
                        Box::new(lazy(parse_bitwise_or)),
                    ]),
                    parse_comma(),
                ),
                optional(parse_comma()),
            ),
            |(items, trailing)| {
                let target = build_sequence(items, trailing.is_some())?;
                if target.is_assignable() {
                    Ok(target)
                } else {
                    Err("cannot assign to expression".to_string())
                }
            },
        ),
        "target list",
    )
}

pub fn parse_yield_expression() -> impl Parser<Token, Expression> {
    preceded(
        keyword(Keyword::Yield),
        choice(vec![
            Box::new(map(
                preceded(keyword(Keyword::From), lazy(parse_test)),
                |source| Expression::YieldFrom(Box::new(source)),
            )),
            Box::new(map(optional(lazy(parse_expression_list)), |value| {
                Expression::Yield(value.map(Box::new))
            })),
        ]),
    )
}

fn parse_lambda() -> impl Parser<Token, Expression> {
    with_context(
        map(
            tuple4(
                keyword(Keyword::Lambda),
                parse_parameter_list(false),
                parse_colon(),
                lazy(parse_test),
            ),
            |(_, params, _, body)| Expression::Lambda(Arc::new(Lambda { params, body })),
        ),
        "lambda",
    )
}

fn parse_conditional() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_or_test),
            many(tuple4(
                keyword(Keyword::If),
                lazy(parse_or_test),
                keyword(Keyword::Else),
                lazy(parse_or_test),
            )),
        ),
        |(first, rest)| {
            let mut pairs: Vec<(Expression, Expression)> = rest
                .into_iter()
                .map(|(_, condition, _, orelse)| (condition, orelse))
                .collect();
            // a if b else c if d else e == a if b else (c if d else e)
            let Some((mut condition, mut orelse)) = pairs.pop() else {
                return first;
            };
            while let Some((previous_condition, body)) = pairs.pop() {
                orelse = Expression::IfExp {
                    condition: Box::new(condition),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                };
                condition = previous_condition;
            }
            Expression::IfExp {
                condition: Box::new(condition),
                body: Box::new(first),
                orelse: Box::new(orelse),
            }
        },
    )
}

fn fold_bool(op: BoolOperator) -> impl Fn((Expression, Vec<Expression>)) -> Expression {
    move |(first, rest)| {
        rest.into_iter()
            .fold(first, |left, right| Expression::BoolOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })
    }
}

fn parse_or_test() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_and_test),
            many(preceded(keyword(Keyword::Or), lazy(parse_and_test))),
        ),
        fold_bool(BoolOperator::Or),
    )
}

fn parse_and_test() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_not_test),
            many(preceded(keyword(Keyword::And), lazy(parse_not_test))),
        ),
        fold_bool(BoolOperator::And),
    )
}

fn parse_not_test() -> impl Parser<Token, Expression> {
    map(
        tuple2(many(keyword(Keyword::Not)), lazy(parse_comparison)),
        |(nots, operand)| {
            nots.into_iter().fold(operand, |inner, _| Expression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(inner),
            })
        },
    )
}

fn parse_comparison() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_bitwise_or),
            many(tuple2(parse_comparison_operator(), lazy(parse_bitwise_or))),
        ),
        |(left, comparisons)| {
            if comparisons.is_empty() {
                left
            } else {
                Expression::Compare {
                    left: Box::new(left),
                    comparisons,
                }
            }
        },
    )
}

fn parse_comparison_operator() -> impl Parser<Token, CompareOperator> {
    with_context(
        choice(vec![
            Box::new(map(operator(Operator::EqualEqual), |_| CompareOperator::Eq)),
            Box::new(map(operator(Operator::NotEqual), |_| CompareOperator::NotEq)),
            Box::new(map(operator(Operator::Less), |_| CompareOperator::Lt)),
            Box::new(map(operator(Operator::LessEqual), |_| CompareOperator::LtE)),
            Box::new(map(operator(Operator::Greater), |_| CompareOperator::Gt)),
            Box::new(map(operator(Operator::GreaterEqual), |_| CompareOperator::GtE)),
            Box::new(map(keyword(Keyword::In), |_| CompareOperator::In)),
            Box::new(map(
                tuple2(keyword(Keyword::Not), keyword(Keyword::In)),
                |_| CompareOperator::NotIn,
            )),
            Box::new(map(
                tuple2(keyword(Keyword::Is), keyword(Keyword::Not)),
                |_| CompareOperator::IsNot,
            )),
            Box::new(map(keyword(Keyword::Is), |_| CompareOperator::Is)),
        ]),
        "comparison operator",
    )
}

fn fold_binary((first, rest): (Expression, Vec<(BinaryOperator, Expression)>)) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn binary_operator(token: Operator, op: BinaryOperator) -> impl Parser<Token, BinaryOperator> {
    map(operator(token), move |_| op)
}

pub fn parse_bitwise_or() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_bitwise_xor),
            many(tuple2(
                binary_operator(Operator::Pipe, BinaryOperator::BitOr),
                lazy(parse_bitwise_xor),
            )),
        ),
        fold_binary,
    )
}

fn parse_bitwise_xor() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_bitwise_and),
            many(tuple2(
                binary_operator(Operator::Caret, BinaryOperator::BitXor),
                lazy(parse_bitwise_and),
            )),
        ),
        fold_binary,
    )
}

fn parse_bitwise_and() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_shift),
            many(tuple2(
                binary_operator(Operator::Ampersand, BinaryOperator::BitAnd),
                lazy(parse_shift),
            )),
        ),
        fold_binary,
    )
}

fn parse_shift() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_arithmetic),
            many(tuple2(
                choice(vec![
                    Box::new(binary_operator(Operator::LeftShift, BinaryOperator::LShift)),
                    Box::new(binary_operator(Operator::RightShift, BinaryOperator::RShift)),
                ]),
                lazy(parse_arithmetic),
            )),
        ),
        fold_binary,
    )
}

fn parse_arithmetic() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_term),
            many(tuple2(
                choice(vec![
                    Box::new(binary_operator(Operator::Plus, BinaryOperator::Add)),
                    Box::new(binary_operator(Operator::Minus, BinaryOperator::Sub)),
                ]),
                lazy(parse_term),
            )),
        ),
        fold_binary,
    )
}

fn parse_term() -> impl Parser<Token, Expression> {
    map(
        tuple2(
            lazy(parse_factor),
            many(tuple2(
                choice(vec![
                    Box::new(binary_operator(Operator::Star, BinaryOperator::Mul)),
                    Box::new(binary_operator(Operator::Slash, BinaryOperator::Div)),
                    Box::new(binary_operator(
                        Operator::DoubleSlash,
                        BinaryOperator::FloorDiv,
                    )),
                    Box::new(binary_operator(Operator::Percent, BinaryOperator::Mod)),
                    Box::new(binary_operator(Operator::At, BinaryOperator::MatMul)),
                ]),
                lazy(parse_factor),
            )),
        ),
        fold_binary,
    )
}

fn parse_unary_operator() -> impl Parser<Token, UnaryOperator> {
    choice(vec![
        Box::new(map(operator(Operator::Minus), |_| UnaryOperator::Minus)),
        Box::new(map(operator(Operator::Plus), |_| UnaryOperator::Plus)),
        Box::new(map(operator(Operator::Tilde), |_| UnaryOperator::Invert)),
    ])
}

fn apply_unary(ops: Vec<UnaryOperator>, operand: Expression) -> Expression {
    ops.into_iter().rev().fold(operand, |inner, op| Expression::Unary {
        op,
        operand: Box::new(inner),
    })
}

fn pow(base: Expression, exponent: Expression) -> Expression {
    Expression::Binary {
        op: BinaryOperator::Pow,
        left: Box::new(base),
        right: Box::new(exponent),
    }
}

/// Unary prefixes bind looser than `**`: `-2 ** 2` is `-(2 ** 2)`.
fn parse_factor() -> impl Parser<Token, Expression> {
    map(
        tuple3(
            many(parse_unary_operator()),
            lazy(parse_primary),
            many(preceded(
                operator(Operator::DoubleStar),
                tuple2(many(parse_unary_operator()), lazy(parse_primary)),
            )),
        ),
        |(ops, base, mut exponents)| {
            let Some((last_ops, last)) = exponents.pop() else {
                return apply_unary(ops, base);
            };
            let mut exponent = apply_unary(last_ops, last);
            while let Some((operand_ops, operand)) = exponents.pop() {
                exponent = apply_unary(operand_ops, pow(operand, exponent));
            }
            apply_unary(ops, pow(base, exponent))
        },
    )
}

enum Trailer {
    Call(Vec<Argument>),
    Subscript(Expression),
    Attribute(String),
}

fn parse_primary() -> impl Parser<Token, Expression> {
    map(
        tuple2(parse_atom(), many(parse_trailer())),
        |(atom, trailers)| {
            trailers
                .into_iter()
                .fold(atom, |value, trailer| match trailer {
                    Trailer::Call(args) => Expression::Call {
                        func: Box::new(value),
                        args,
                    },
                    Trailer::Subscript(index) => Expression::Subscript {
                        value: Box::new(value),
                        index: Box::new(index),
                    },
                    Trailer::Attribute(attr) => Expression::Attribute {
                        value: Box::new(value),
                        attr,
                    },
                })
        },
    )
}

fn parse_trailer() -> impl Parser<Token, Trailer> {
    choice(vec![
        Box::new(map(
            delimited(
                parse_open_paren(),
                parse_call_arguments(),
                parse_close_paren(),
            ),
            Trailer::Call,
        )),
        Box::new(map(
            delimited(
                parse_open_bracket(),
                parse_subscript(),
                parse_close_bracket(),
            ),
            Trailer::Subscript,
        )),
        Box::new(map(
            preceded(delimiter(Delimiter::Dot), parse_identifier()),
            Trailer::Attribute,
        )),
    ])
}

fn parse_call_arguments() -> impl Parser<Token, Vec<Argument>> {
    with_context(
        try_map(
            tuple2(
                separated_list(parse_argument(), parse_comma()),
                optional(parse_comma()),
            ),
            |(args, _)| {
                let mut seen_keyword = false;
                for arg in &args {
                    match arg {
                        Argument::Keyword { .. } | Argument::UnpackKeywords(_) => {
                            seen_keyword = true
                        }
                        Argument::Positional(_) if seen_keyword => {
                            return Err(
                                "positional argument follows keyword argument".to_string()
                            );
                        }
                        _ => {}
                    }
                }
                Ok(args)
            },
        ),
        "call arguments",
    )
}

fn parse_argument() -> impl Parser<Token, Argument> {
    choice(vec![
        Box::new(map(
            tuple3(parse_identifier(), parse_assign(), lazy(parse_test)),
            |(name, _, value)| Argument::Keyword { name, value },
        )),
        Box::new(map(
            preceded(operator(Operator::DoubleStar), lazy(parse_test)),
            Argument::UnpackKeywords,
        )),
        Box::new(map(
            preceded(operator(Operator::Star), lazy(parse_test)),
            Argument::Unpack,
        )),
        // f(x for x in xs)
        Box::new(map(
            tuple2(
                lazy(parse_named_expression),
                optional(lazy(parse_comprehension_clauses)),
            ),
            |(element, generators)| match generators {
                Some(generators) => Argument::Positional(Expression::ListComp {
                    element: Box::new(element),
                    generators,
                }),
                None => Argument::Positional(element),
            },
        )),
    ])
}

fn parse_subscript() -> impl Parser<Token, Expression> {
    with_context(
        try_map(
            tuple2(
                separated_list(parse_slice_item(), parse_comma()),
                optional(parse_comma()),
            ),
            |(items, trailing)| build_sequence(items, trailing.is_some()),
        ),
        "subscript",
    )
}

type SliceTail = (Option<Expression>, Option<Option<Expression>>);

fn parse_slice_item() -> impl Parser<Token, Expression> {
    try_map(
        tuple2(
            optional(lazy(parse_named_expression)),
            optional(preceded(
                parse_colon(),
                tuple2(
                    optional(lazy(parse_test)),
                    optional(preceded(parse_colon(), optional(lazy(parse_test)))),
                ),
            )),
        ),
        |(lower, tail): (Option<Expression>, Option<SliceTail>)| match (lower, tail) {
            (Some(index), None) => Ok(index),
            (None, None) => Err("expected an index".to_string()),
            (lower, Some((upper, step))) => Ok(Expression::Slice {
                lower: lower.map(Box::new),
                upper: upper.map(Box::new),
                step: step.flatten().map(Box::new),
            }),
        },
    )
}

/// `for target in iter [if cond]*`, one or more times.
pub fn parse_comprehension_clauses() -> impl Parser<Token, Vec<Comprehension>> {
    with_context(
        many1(map(
            tuple4(
                keyword(Keyword::For),
                parse_target_list(),
                keyword(Keyword::In),
                tuple2(
                    lazy(parse_or_test),
                    many(preceded(keyword(Keyword::If), lazy(parse_or_test))),
                ),
            ),
            |(_, target, _, (iter, conditions))| Comprehension {
                target,
                iter,
                conditions,
            },
        )),
        "comprehension",
    )
}

enum SequenceTail {
    Comprehension(Vec<Comprehension>),
    Items(Vec<Expression>, bool),
}

fn parse_sequence_tail() -> impl Parser<Token, SequenceTail> {
    choice(vec![
        Box::new(map(
            lazy(parse_comprehension_clauses),
            SequenceTail::Comprehension,
        )),
        Box::new(map(
            tuple2(
                many(preceded(parse_comma(), parse_star_or_expression())),
                optional(parse_comma()),
            ),
            |(rest, trailing)| SequenceTail::Items(rest, trailing.is_some()),
        )),
    ])
}

fn parse_sequence_body() -> impl Parser<Token, Option<(Expression, SequenceTail)>> {
    optional(tuple2(parse_star_or_expression(), parse_sequence_tail()))
}

fn parse_parenthesized() -> impl Parser<Token, Expression> {
    try_map(
        delimited(
            parse_open_paren(),
            choice(vec![
                Box::new(map(parse_yield_expression(), |y| {
                    Some((y, SequenceTail::Items(vec![], false)))
                })),
                Box::new(parse_sequence_body()),
            ]),
            parse_close_paren(),
        ),
        |body| match body {
            None => Ok(Expression::Tuple(vec![])),
            Some((element, SequenceTail::Comprehension(generators))) => {
                Ok(Expression::ListComp {
                    element: Box::new(element),
                    generators,
                })
            }
            Some((first, SequenceTail::Items(rest, trailing))) => {
                let mut items = vec![first];
                items.extend(rest);
                build_sequence(items, trailing)
            }
        },
    )
}

fn parse_list_display() -> impl Parser<Token, Expression> {
    map(
        delimited(
            parse_open_bracket(),
            parse_sequence_body(),
            parse_close_bracket(),
        ),
        |body| match body {
            None => Expression::List(vec![]),
            Some((element, SequenceTail::Comprehension(generators))) => Expression::ListComp {
                element: Box::new(element),
                generators,
            },
            Some((first, SequenceTail::Items(rest, _))) => {
                let mut items = vec![first];
                items.extend(rest);
                Expression::List(items)
            }
        },
    )
}

/// One item of a `{...}` display; whether it is a dict or a set is settled
/// once all items are in.
enum BraceItem {
    Pair(Expression, Expression),
    Unpack(Expression),
    Element(Expression),
}

fn parse_brace_item() -> impl Parser<Token, BraceItem> {
    choice(vec![
        Box::new(map(
            preceded(operator(Operator::DoubleStar), lazy(parse_bitwise_or)),
            BraceItem::Unpack,
        )),
        Box::new(map(
            tuple2(
                parse_star_or_expression(),
                optional(preceded(parse_colon(), lazy(parse_test))),
            ),
            |(key, value)| match value {
                Some(value) => BraceItem::Pair(key, value),
                None => BraceItem::Element(key),
            },
        )),
    ])
}

enum BraceTail {
    Comprehension(Vec<Comprehension>),
    Items(Vec<BraceItem>),
}

fn parse_brace_display() -> impl Parser<Token, Expression> {
    try_map(
        delimited(
            parse_open_brace(),
            optional(tuple2(
                parse_brace_item(),
                choice(vec![
                    Box::new(map(
                        lazy(parse_comprehension_clauses),
                        BraceTail::Comprehension,
                    )),
                    Box::new(map(
                        terminated(
                            many(preceded(parse_comma(), parse_brace_item())),
                            as_unit(optional(parse_comma())),
                        ),
                        BraceTail::Items,
                    )),
                ]),
            )),
            parse_close_brace(),
        ),
        build_brace_display,
    )
}

fn build_brace_display(body: Option<(BraceItem, BraceTail)>) -> Result<Expression, String> {
    let Some((first, tail)) = body else {
        return Ok(Expression::Dict(vec![]));
    };
    match (first, tail) {
        (BraceItem::Pair(key, value), BraceTail::Comprehension(generators)) => {
            Ok(Expression::DictComp {
                key: Box::new(key),
                value: Box::new(value),
                generators,
            })
        }
        (BraceItem::Element(element), BraceTail::Comprehension(generators)) => {
            Ok(Expression::SetComp {
                element: Box::new(element),
                generators,
            })
        }
        (BraceItem::Unpack(_), BraceTail::Comprehension(_)) => {
            Err("dict unpacking cannot be used in dict comprehension".to_string())
        }
        (BraceItem::Element(first), BraceTail::Items(rest)) => {
            let mut elements = vec![first];
            for item in rest {
                match item {
                    BraceItem::Element(element) => elements.push(element),
                    _ => return Err("cannot mix set elements and dict entries".to_string()),
                }
            }
            Ok(Expression::Set(elements))
        }
        (first, BraceTail::Items(rest)) => {
            let mut entries = Vec::with_capacity(rest.len() + 1);
            for item in std::iter::once(first).chain(rest) {
                match item {
                    BraceItem::Pair(key, value) => entries.push(DictEntry::Pair(key, value)),
                    BraceItem::Unpack(mapping) => entries.push(DictEntry::Unpack(mapping)),
                    BraceItem::Element(_) => {
                        return Err("cannot mix set elements and dict entries".to_string());
                    }
                }
            }
            Ok(Expression::Dict(entries))
        }
    }
}

enum StringPiece {
    Plain(String),
    Formatted(Vec<FStringPart>),
}

fn parse_strings() -> impl Parser<Token, Expression> {
    with_context(
        try_map(
            many1(satisfy(|token: &Token| match token {
                Token::Literal(Literal::String(s)) => Some(StringPiece::Plain(s.clone())),
                Token::Literal(Literal::FString(parts)) => {
                    Some(StringPiece::Formatted(parts.clone()))
                }
                _ => None,
            })),
            build_string,
        ),
        "string",
    )
}

/// Joins adjacent literals (`"a" f"{b}"`) into one constant or f-string.
fn build_string(pieces: Vec<StringPiece>) -> Result<Expression, String> {
    if pieces.iter().all(|p| matches!(p, StringPiece::Plain(_))) {
        let joined = pieces
            .into_iter()
            .map(|p| match p {
                StringPiece::Plain(s) => s,
                StringPiece::Formatted(_) => String::new(),
            })
            .collect::<String>();
        return Ok(Expression::Constant(Constant::Str(joined)));
    }

    let mut elements: Vec<FStringElement> = Vec::new();
    let mut push_text = |elements: &mut Vec<FStringElement>, text: String| {
        if let Some(FStringElement::Text(previous)) = elements.last_mut() {
            previous.push_str(&text);
        } else {
            elements.push(FStringElement::Text(text));
        }
    };
    for piece in pieces {
        match piece {
            StringPiece::Plain(text) => push_text(&mut elements, text),
            StringPiece::Formatted(parts) => {
                for part in parts {
                    match part {
                        FStringPart::Text(text) => push_text(&mut elements, text),
                        FStringPart::Field(field) => {
                            let value = super::super::parse_expression_source(&field.expression)
                                .map_err(|e| format!("f-string: {}", e.message))?;
                            elements.push(FStringElement::Field {
                                value: Box::new(value),
                                conversion: field.conversion,
                                format_spec: field.format_spec,
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(Expression::FString(elements))
}

fn parse_atom() -> impl Parser<Token, Expression> {
    with_context(
        choice(vec![
            Box::new(map(parse_identifier(), Expression::Name)),
            Box::new(satisfy(|token: &Token| match token {
                Token::Literal(Literal::Integer(i)) => Some(Expression::Constant(Constant::Int(*i))),
                Token::Literal(Literal::Float(f)) => {
                    Some(Expression::Constant(Constant::Float(*f)))
                }
                Token::Keyword(Keyword::None) => Some(Expression::Constant(Constant::None)),
                Token::Keyword(Keyword::True) => Some(Expression::Constant(Constant::Bool(true))),
                Token::Keyword(Keyword::False) => {
                    Some(Expression::Constant(Constant::Bool(false)))
                }
                Token::Delimiter(Delimiter::Ellipsis) => {
                    Some(Expression::Constant(Constant::Ellipsis))
                }
                _ => None,
            })),
            Box::new(parse_strings()),
            Box::new(parse_parenthesized()),
            Box::new(parse_list_display()),
            Box::new(parse_brace_display()),
        ]),
        "atom",
    )
}

enum ParameterItem {
    Named {
        name: String,
        annotation: Option<Expression>,
        default: Option<Expression>,
    },
    /// `*` or `*args`
    Star(Option<(String, Option<Expression>)>),
    DoubleStar(String, Option<Expression>),
    /// positional-only marker `/`
    Slash,
}

fn parse_annotation(enabled: bool) -> Box<dyn Parser<Token, Option<Expression>>> {
    if enabled {
        Box::new(optional(preceded(parse_colon(), lazy(parse_test))))
    } else {
        Box::new(zero(None))
    }
}

fn parse_parameter_item(annotations: bool) -> impl Parser<Token, ParameterItem> {
    choice(vec![
        Box::new(map(
            preceded(
                operator(Operator::DoubleStar),
                tuple2(parse_identifier(), parse_annotation(annotations)),
            ),
            |(name, annotation)| ParameterItem::DoubleStar(name, annotation),
        )),
        Box::new(map(
            preceded(
                operator(Operator::Star),
                optional(tuple2(parse_identifier(), parse_annotation(annotations))),
            ),
            ParameterItem::Star,
        )),
        Box::new(map(operator(Operator::Slash), |_| ParameterItem::Slash)),
        Box::new(map(
            tuple3(
                parse_identifier(),
                parse_annotation(annotations),
                optional(preceded(parse_assign(), lazy(parse_test))),
            ),
            |(name, annotation, default)| ParameterItem::Named {
                name,
                annotation,
                default,
            },
        )),
    ])
}

/// Parameters of a `def` (with annotations) or a `lambda` (without).
pub fn parse_parameter_list(annotations: bool) -> impl Parser<Token, Vec<Parameter>> {
    with_context(
        try_map(
            tuple2(
                separated_list(parse_parameter_item(annotations), parse_comma()),
                optional(parse_comma()),
            ),
            |(items, _)| build_parameters(items),
        ),
        "parameters",
    )
}

fn build_parameters(items: Vec<ParameterItem>) -> Result<Vec<Parameter>, String> {
    let mut params: Vec<Parameter> = Vec::new();
    let mut keyword_only = false;
    let mut seen_default = false;
    let mut seen_var_keyword = false;

    for item in items {
        if seen_var_keyword {
            return Err("arguments cannot follow var-keyword argument".to_string());
        }
        let param = match item {
            ParameterItem::Slash => continue,
            ParameterItem::Star(None) => {
                keyword_only = true;
                continue;
            }
            ParameterItem::Star(Some((name, annotation))) => {
                keyword_only = true;
                Parameter {
                    name,
                    kind: ParameterKind::VarPositional,
                    default: None,
                    annotation,
                }
            }
            ParameterItem::DoubleStar(name, annotation) => {
                seen_var_keyword = true;
                Parameter {
                    name,
                    kind: ParameterKind::VarKeyword,
                    default: None,
                    annotation,
                }
            }
            ParameterItem::Named {
                name,
                annotation,
                default,
            } => {
                if !keyword_only {
                    if default.is_some() {
                        seen_default = true;
                    } else if seen_default {
                        return Err("non-default argument follows default argument".to_string());
                    }
                }
                Parameter {
                    name,
                    kind: if keyword_only {
                        ParameterKind::KeywordOnly
                    } else {
                        ParameterKind::Positional
                    },
                    default,
                    annotation,
                }
            }
        };
        if params.iter().any(|p| p.name == param.name) {
            return Err(format!(
                "duplicate argument '{}' in function definition",
                param.name
            ));
        }
        params.push(param);
    }
    Ok(params)
}
