//! Statement grammar.
//!
//! A logical line may carry several `;`-separated simple statements, so the
//! line parsers yield `Vec<Statement>` and blocks flatten them.

use std::sync::Arc;

use super::super::{core::*, prelude::*};
use super::common::*;
use super::expression::*;
use crate::ast::{
    Alias, Argument, BinaryOperator, Block, ClassDef, ExceptHandler, Expression, FunctionDef,
    Module, Statement, StatementKind,
};
use crate::tokenizer::{
    keyword::Keyword,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_module() -> impl Parser<Token, Module> {
    map(many(parse_statement()), |lines| Module {
        body: lines.into_iter().flatten().collect(),
    })
}

pub fn parse_statement() -> impl Parser<Token, Vec<Statement>> {
    choice(vec![
        Box::new(map(parse_compound_statement(), |statement| vec![statement])),
        Box::new(parse_simple_line()),
    ])
}

fn statement(parser: impl Parser<Token, StatementKind>) -> impl Parser<Token, Statement> {
    map(spanned(parser), |(kind, tokens)| Statement { kind, tokens })
}

/// `stmt (; stmt)* [;] NEWLINE`
fn parse_simple_line() -> impl Parser<Token, Vec<Statement>> {
    with_context(
        try_map(
            tuple3(
                separated_list(
                    statement(parse_simple_statement()),
                    delimiter(Delimiter::Semicolon),
                ),
                optional(delimiter(Delimiter::Semicolon)),
                parse_newline(),
            ),
            |(statements, _, _)| {
                if statements.is_empty() {
                    Err("invalid syntax".to_string())
                } else {
                    Ok(statements)
                }
            },
        ),
        "statement",
    )
}

fn parse_simple_statement() -> impl Parser<Token, StatementKind> {
    choice(vec![
        Box::new(map(keyword(Keyword::Pass), |_| StatementKind::Pass)),
        Box::new(map(keyword(Keyword::Break), |_| StatementKind::Break)),
        Box::new(map(keyword(Keyword::Continue), |_| StatementKind::Continue)),
        Box::new(parse_return()),
        Box::new(parse_raise()),
        Box::new(parse_assert()),
        Box::new(parse_delete()),
        Box::new(parse_import()),
        Box::new(parse_import_from()),
        Box::new(parse_name_declaration(Keyword::Global)),
        Box::new(parse_name_declaration(Keyword::Nonlocal)),
        Box::new(parse_expression_statement()),
    ])
}

fn parse_return() -> impl Parser<Token, StatementKind> {
    map(
        preceded(keyword(Keyword::Return), optional(parse_expression_list())),
        StatementKind::Return,
    )
}

fn parse_raise() -> impl Parser<Token, StatementKind> {
    map(
        preceded(
            keyword(Keyword::Raise),
            optional(tuple2(
                parse_test(),
                optional(preceded(keyword(Keyword::From), parse_test())),
            )),
        ),
        |raised| match raised {
            Some((exception, cause)) => StatementKind::Raise {
                exception: Some(exception),
                cause,
            },
            None => StatementKind::Raise {
                exception: None,
                cause: None,
            },
        },
    )
}

fn parse_assert() -> impl Parser<Token, StatementKind> {
    map(
        preceded(
            keyword(Keyword::Assert),
            tuple2(parse_test(), optional(preceded(parse_comma(), parse_test()))),
        ),
        |(test, message)| StatementKind::Assert { test, message },
    )
}

fn parse_delete() -> impl Parser<Token, StatementKind> {
    try_map(
        preceded(
            keyword(Keyword::Del),
            terminated(
                separated_list(parse_bitwise_or(), parse_comma()),
                as_unit(optional(parse_comma())),
            ),
        ),
        |targets| {
            if targets.is_empty() {
                return Err("expected a target after 'del'".to_string());
            }
            if targets.iter().all(Expression::is_assignable) {
                Ok(StatementKind::Delete(targets))
            } else {
                Err("cannot delete expression".to_string())
            }
        },
    )
}

fn parse_alias(name: impl Parser<Token, String>) -> impl Parser<Token, Alias> {
    map(
        tuple2(name, optional(preceded(keyword(Keyword::As), parse_identifier()))),
        |(name, asname)| Alias { name, asname },
    )
}

fn parse_import() -> impl Parser<Token, StatementKind> {
    try_map(
        preceded(
            keyword(Keyword::Import),
            separated_list(parse_alias(parse_dotted_name()), parse_comma()),
        ),
        |names| {
            if names.is_empty() {
                Err("expected a module name".to_string())
            } else {
                Ok(StatementKind::Import(names))
            }
        },
    )
}

fn parse_import_names() -> impl Parser<Token, Vec<Alias>> {
    choice(vec![
        Box::new(map(operator(Operator::Star), |_| {
            vec![Alias {
                name: "*".to_string(),
                asname: None,
            }]
        })),
        Box::new(delimited(
            parse_open_paren(),
            terminated(
                separated_list(parse_alias(parse_identifier()), parse_comma()),
                as_unit(optional(parse_comma())),
            ),
            parse_close_paren(),
        )),
        Box::new(separated_list(parse_alias(parse_identifier()), parse_comma())),
    ])
}

fn parse_import_from() -> impl Parser<Token, StatementKind> {
    try_map(
        tuple4(
            keyword(Keyword::From),
            parse_dotted_name(),
            keyword(Keyword::Import),
            parse_import_names(),
        ),
        |(_, module, _, names)| {
            if names.is_empty() {
                Err("expected names to import".to_string())
            } else {
                Ok(StatementKind::ImportFrom { module, names })
            }
        },
    )
}

fn parse_name_declaration(kw: Keyword) -> impl Parser<Token, StatementKind> {
    try_map(
        preceded(
            keyword(kw),
            separated_list(parse_identifier(), parse_comma()),
        ),
        move |names| {
            if names.is_empty() {
                return Err(format!("expected a name after '{}'", kw.as_ref()));
            }
            Ok(match kw {
                Keyword::Nonlocal => StatementKind::Nonlocal(names),
                _ => StatementKind::Global(names),
            })
        },
    )
}

enum ExpressionTail {
    Assign(Vec<Expression>),
    Augmented(BinaryOperator, Expression),
    Annotated(Expression, Option<Expression>),
}

fn parse_assigned_value() -> impl Parser<Token, Expression> {
    choice(vec![
        Box::new(parse_yield_expression()),
        Box::new(parse_expression_list()),
    ])
}

fn augmented_operator() -> impl Parser<Token, BinaryOperator> {
    satisfy(|token: &Token| match token {
        Token::Delimiter(d) => Some(match d {
            Delimiter::PlusAssign => BinaryOperator::Add,
            Delimiter::MinusAssign => BinaryOperator::Sub,
            Delimiter::StarAssign => BinaryOperator::Mul,
            Delimiter::SlashAssign => BinaryOperator::Div,
            Delimiter::DoubleSlashAssign => BinaryOperator::FloorDiv,
            Delimiter::PercentAssign => BinaryOperator::Mod,
            Delimiter::DoubleStarAssign => BinaryOperator::Pow,
            Delimiter::AtAssign => BinaryOperator::MatMul,
            Delimiter::AmpersandAssign => BinaryOperator::BitAnd,
            Delimiter::PipeAssign => BinaryOperator::BitOr,
            Delimiter::CaretAssign => BinaryOperator::BitXor,
            Delimiter::LeftShiftAssign => BinaryOperator::LShift,
            Delimiter::RightShiftAssign => BinaryOperator::RShift,
            _ => return None,
        }),
        _ => None,
    })
}

fn parse_expression_tail() -> impl Parser<Token, ExpressionTail> {
    choice(vec![
        Box::new(map(
            many1(preceded(parse_assign(), parse_assigned_value())),
            ExpressionTail::Assign,
        )),
        Box::new(map(
            tuple2(augmented_operator(), parse_assigned_value()),
            |(op, value)| ExpressionTail::Augmented(op, value),
        )),
        Box::new(map(
            preceded(
                parse_colon(),
                tuple2(
                    parse_test(),
                    optional(preceded(parse_assign(), parse_assigned_value())),
                ),
            ),
            |(annotation, value)| ExpressionTail::Annotated(annotation, value),
        )),
    ])
}

fn parse_expression_statement() -> impl Parser<Token, StatementKind> {
    try_map(
        tuple2(parse_assigned_value(), optional(parse_expression_tail())),
        |(head, tail)| build_expression_statement(head, tail),
    )
}

fn build_expression_statement(
    head: Expression,
    tail: Option<ExpressionTail>,
) -> Result<StatementKind, String> {
    match tail {
        None => Ok(StatementKind::Expression(head)),
        Some(ExpressionTail::Assign(mut values)) => {
            // a = b = value: everything but the last is a target
            let value = values.pop().ok_or_else(|| "expected a value".to_string())?;
            let mut targets = vec![head];
            targets.extend(values);
            if let Some(bad) = targets.iter().find(|t| !t.is_assignable()) {
                return Err(format!("cannot assign to {}", describe_target(bad)));
            }
            Ok(StatementKind::Assign { targets, value })
        }
        Some(ExpressionTail::Augmented(op, value)) => match head {
            Expression::Name(_) | Expression::Attribute { .. } | Expression::Subscript { .. } => {
                Ok(StatementKind::AugAssign {
                    target: head,
                    op,
                    value,
                })
            }
            other => Err(format!(
                "'{}' is an illegal expression for augmented assignment",
                describe_target(&other)
            )),
        },
        Some(ExpressionTail::Annotated(annotation, value)) => match head {
            Expression::Name(_) | Expression::Attribute { .. } | Expression::Subscript { .. } => {
                Ok(StatementKind::AnnAssign {
                    target: head,
                    annotation,
                    value,
                })
            }
            _ => Err("only single target can be annotated".to_string()),
        },
    }
}

fn describe_target(expression: &Expression) -> &'static str {
    match expression {
        Expression::Constant(_) | Expression::FString(_) => "literal",
        Expression::Call { .. } => "function call",
        Expression::Lambda(_) => "lambda",
        Expression::Tuple(_) => "tuple",
        Expression::List(_) => "list",
        Expression::Compare { .. } => "comparison",
        _ => "expression",
    }
}

fn parse_compound_statement() -> impl Parser<Token, Statement> {
    statement(choice(vec![
        Box::new(parse_if()),
        Box::new(parse_while()),
        Box::new(parse_for()),
        Box::new(parse_try()),
        Box::new(parse_with()),
        Box::new(parse_decorated()),
    ]))
}

/// `NEWLINE INDENT stmt+ DEDENT` or a simple line after the colon.
pub fn parse_block() -> impl Parser<Token, Block> {
    with_context(
        choice(vec![
            Box::new(map(
                preceded(
                    parse_newline(),
                    delimited(
                        parse_indent(),
                        many1(lazy(parse_statement)),
                        parse_dedent(),
                    ),
                ),
                |lines| lines.into_iter().flatten().collect(),
            )),
            Box::new(lazy(parse_simple_line)),
            Box::new(preceded(
                parse_newline(),
                try_map(zero(()), |_| {
                    Err::<Block, String>("expected an indented block".to_string())
                }),
            )),
        ]),
        "block",
    )
}

fn parse_suite() -> impl Parser<Token, Block> {
    preceded(parse_colon(), parse_block())
}

fn parse_else() -> impl Parser<Token, Block> {
    map(
        optional(preceded(keyword(Keyword::Else), parse_suite())),
        Option::unwrap_or_default,
    )
}

fn parse_if() -> impl Parser<Token, StatementKind> {
    map(
        tuple4(
            preceded(keyword(Keyword::If), parse_named_test()),
            parse_suite(),
            many(tuple2(
                preceded(keyword(Keyword::Elif), parse_named_test()),
                parse_suite(),
            )),
            parse_else(),
        ),
        |(condition, body, elifs, orelse)| {
            let mut branches = vec![(condition, body)];
            branches.extend(elifs);
            StatementKind::If { branches, orelse }
        },
    )
}

/// Conditions accept `:=` at the top level.
fn parse_named_test() -> impl Parser<Token, Expression> {
    parse_expression()
}

fn parse_while() -> impl Parser<Token, StatementKind> {
    map(
        tuple3(
            preceded(keyword(Keyword::While), parse_named_test()),
            parse_suite(),
            parse_else(),
        ),
        |(condition, body, orelse)| StatementKind::While {
            condition,
            body,
            orelse,
        },
    )
}

fn parse_for() -> impl Parser<Token, StatementKind> {
    map(
        tuple4(
            preceded(keyword(Keyword::For), parse_target_list()),
            preceded(keyword(Keyword::In), parse_expression_list()),
            parse_suite(),
            parse_else(),
        ),
        |(target, iter, body, orelse)| StatementKind::For {
            target,
            iter,
            body,
            orelse,
        },
    )
}

fn parse_except_handler() -> impl Parser<Token, ExceptHandler> {
    map(
        tuple2(
            preceded(
                keyword(Keyword::Except),
                optional(tuple2(
                    parse_test(),
                    optional(preceded(keyword(Keyword::As), parse_identifier())),
                )),
            ),
            parse_suite(),
        ),
        |(clause, body)| match clause {
            Some((class, name)) => ExceptHandler {
                class: Some(class),
                name,
                body,
            },
            None => ExceptHandler {
                class: None,
                name: None,
                body,
            },
        },
    )
}

fn parse_try() -> impl Parser<Token, StatementKind> {
    try_map(
        tuple4(
            preceded(keyword(Keyword::Try), parse_suite()),
            many(parse_except_handler()),
            parse_else(),
            optional(preceded(keyword(Keyword::Finally), parse_suite())),
        ),
        |(body, handlers, orelse, finalbody)| {
            if handlers.is_empty() && finalbody.is_none() {
                return Err("expected 'except' or 'finally' block".to_string());
            }
            if handlers.is_empty() && !orelse.is_empty() {
                return Err("'else' requires an 'except' block".to_string());
            }
            let bare = handlers.iter().position(|h| h.class.is_none());
            if bare.is_some_and(|position| position + 1 != handlers.len()) {
                return Err("default 'except:' must be last".to_string());
            }
            Ok(StatementKind::Try {
                body,
                handlers,
                orelse,
                finalbody: finalbody.unwrap_or_default(),
            })
        },
    )
}

fn parse_with() -> impl Parser<Token, StatementKind> {
    try_map(
        tuple2(
            preceded(
                keyword(Keyword::With),
                separated_list(
                    tuple2(
                        parse_test(),
                        optional(preceded(keyword(Keyword::As), parse_target_list())),
                    ),
                    parse_comma(),
                ),
            ),
            parse_suite(),
        ),
        |(items, body)| {
            if items.is_empty() {
                Err("expected a context manager".to_string())
            } else {
                Ok(StatementKind::With { items, body })
            }
        },
    )
}

enum Definition {
    Function(String, Vec<crate::ast::Parameter>, Option<Expression>, Block),
    Class(String, Vec<Argument>, Block),
}

fn parse_decorated() -> impl Parser<Token, StatementKind> {
    map(
        tuple2(
            many(delimited(
                operator(Operator::At),
                parse_expression(),
                parse_newline(),
            )),
            choice(vec![Box::new(parse_function_def()), Box::new(parse_class_def())]),
        ),
        |(decorators, definition)| match definition {
            Definition::Function(name, params, returns, body) => {
                StatementKind::FunctionDef(Arc::new(FunctionDef {
                    name,
                    params,
                    body,
                    decorators,
                    returns,
                }))
            }
            Definition::Class(name, bases, body) => StatementKind::ClassDef(ClassDef {
                name,
                bases,
                body,
                decorators,
            }),
        },
    )
}

fn parse_function_def() -> impl Parser<Token, Definition> {
    with_context(
        map(
            tuple4(
                preceded(keyword(Keyword::Def), parse_identifier()),
                delimited(
                    parse_open_paren(),
                    parse_parameter_list(true),
                    parse_close_paren(),
                ),
                optional(preceded(delimiter(Delimiter::Arrow), parse_test())),
                parse_suite(),
            ),
            |(name, params, returns, body)| Definition::Function(name, params, returns, body),
        ),
        "function definition",
    )
}

fn parse_class_def() -> impl Parser<Token, Definition> {
    with_context(
        map(
            tuple3(
                preceded(keyword(Keyword::Class), parse_identifier()),
                optional(delimited(
                    parse_open_paren(),
                    terminated(
                        separated_list(
                            map(parse_test(), Argument::Positional),
                            parse_comma(),
                        ),
                        as_unit(optional(parse_comma())),
                    ),
                    parse_close_paren(),
                )),
                parse_suite(),
            ),
            |(name, bases, body)| Definition::Class(name, bases.unwrap_or_default(), body),
        ),
        "class definition",
    )
}

#[cfg(test)]
mod tests {
    use super::super::super::Program;
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(source: &str) -> Vec<StatementKind> {
        Program::parse(source)
            .unwrap()
            .module()
            .body
            .iter()
            .map(|s| s.kind.clone())
            .collect()
    }

    #[test]
    fn test_simple_statements_on_one_line() {
        let statements = body("x = 1; y = 2\npass\n");
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[2], StatementKind::Pass);
    }

    #[test]
    fn test_chained_and_augmented_assignment() {
        let statements = body("a = b = 0\ncount += 1\n");
        let StatementKind::Assign { targets, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        assert_eq!(targets.len(), 2);
        assert!(matches!(
            statements[1],
            StatementKind::AugAssign {
                op: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_targets_are_rejected() {
        assert!(Program::parse("1 = x\n").is_err());
        assert!(Program::parse("f() += 1\n").is_err());
        assert!(Program::parse("a, b += 1\n").is_err());
    }

    #[test]
    fn test_function_with_decorator_and_annotations() {
        let statements = body("@cache\ndef area(w: float, h: float = 1.0) -> float:\n    return w * h\n");
        let StatementKind::FunctionDef(def) = &statements[0] else {
            panic!("expected function");
        };
        assert_eq!(def.name, "area");
        assert_eq!(def.decorators, vec![Expression::name("cache")]);
        assert_eq!(def.params.len(), 2);
        assert!(def.params[0].annotation.is_some());
        assert!(def.returns.is_some());
    }

    #[test]
    fn test_if_elif_else() {
        let statements = body("if x > 0:\n    s = 1\nelif x < 0:\n    s = -1\nelse:\n    s = 0\n");
        let StatementKind::If { branches, orelse } = &statements[0] else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn test_try_structure() {
        let source = "try:\n    x = int(s)\nexcept ValueError as e:\n    x = 0\nelse:\n    pass\nfinally:\n    done = True\n";
        let StatementKind::Try {
            handlers,
            orelse,
            finalbody,
            ..
        } = &body(source)[0]
        else {
            panic!("expected try");
        };
        assert_eq!(handlers[0].name.as_deref(), Some("e"));
        assert_eq!(orelse.len(), 1);
        assert_eq!(finalbody.len(), 1);

        assert!(Program::parse("try:\n    pass\n").is_err());
        assert!(Program::parse("try:\n    pass\nexcept:\n    pass\nexcept ValueError:\n    pass\n").is_err());
    }

    #[test]
    fn test_for_with_tuple_target_and_else() {
        let statements = body("for i, v in enumerate(xs):\n    pass\nelse:\n    pass\n");
        let StatementKind::For { target, orelse, .. } = &statements[0] else {
            panic!("expected for");
        };
        assert!(matches!(target, Expression::Tuple(items) if items.len() == 2));
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn test_imports() {
        let statements = body("import math as m, os.path\nfrom math import (sqrt, pi,)\n");
        let StatementKind::Import(names) = &statements[0] else {
            panic!("expected import");
        };
        assert_eq!(names[0].binding(), "m");
        assert_eq!(names[1].binding(), "os");
        assert!(matches!(&statements[1], StatementKind::ImportFrom { names, .. } if names.len() == 2));
    }

    #[test]
    fn test_one_line_block() {
        let statements = body("while True: break\n");
        assert!(matches!(&statements[0], StatementKind::While { body, .. } if body == &vec![Statement { kind: StatementKind::Break, tokens: 3..4 }]));
    }
}
