//! Parser for FlowQL using chumsky.
//!
//! Transforms the lexer's token stream into a [`Statement`] AST. Expression
//! precedence, tightest first: call/paren, `* /`, `+ -`, comparison and
//! `IN`/`LIKE`, `NOT`, `AND`, `OR`.

use chumsky::input::ValueInput;
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::Token;

/// Right-hand side of a predicate: comparison or IN list.
enum PredTail {
    Cmp(BinaryOp, Expr),
    In(bool, Vec<Expr>),
}

/// Create the statement parser.
///
/// Generic over the input type, accepting any `ValueInput` that produces
/// `Token` values with `SimpleSpan` spans.
pub fn parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Statement, extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    let ident = select! {
        Token::Ident(s) => s.to_string(),
    }
    .labelled("identifier");

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Number(s) => Expr::Number(s.to_string()),
            Token::StringLit(s) => Expr::StringLit(s.to_string()),
        }
        .labelled("literal");

        let call = ident
            .clone()
            .then(
                expr.clone()
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map(|(name, args)| Expr::Call { name, args });

        let primary = choice((
            call,
            literal,
            ident.clone().map(Expr::Ident),
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let product = primary.clone().foldl(
            choice((
                just(Token::Star).to(BinaryOp::Mul),
                just(Token::Slash).to(BinaryOp::Div),
            ))
            .then(primary)
            .repeated(),
            |left, (op, right)| Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        );

        let sum = product.clone().foldl(
            choice((
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            ))
            .then(product)
            .repeated(),
            |left, (op, right)| Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        );

        let cmp_op = choice((
            just(Token::Eq).to(BinaryOp::Eq),
            just(Token::Ne).to(BinaryOp::Ne),
            just(Token::Lte).to(BinaryOp::Lte),
            just(Token::Lt).to(BinaryOp::Lt),
            just(Token::Gte).to(BinaryOp::Gte),
            just(Token::Gt).to(BinaryOp::Gt),
            just(Token::Like).to(BinaryOp::Like),
        ));

        let in_list = sum
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let predicate = sum
            .clone()
            .then(
                choice((
                    cmp_op
                        .then(sum.clone())
                        .map(|(op, right)| PredTail::Cmp(op, right)),
                    just(Token::Not)
                        .or_not()
                        .then_ignore(just(Token::In))
                        .then(in_list)
                        .map(|(neg, values)| PredTail::In(neg.is_some(), values)),
                ))
                .or_not(),
            )
            .map(|(left, tail)| match tail {
                None => left,
                Some(PredTail::Cmp(op, right)) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(PredTail::In(negated, values)) => Expr::In {
                    expr: Box::new(left),
                    values,
                    negated,
                },
            });

        let negation = just(Token::Not)
            .repeated()
            .foldr(predicate, |_, rhs| Expr::Not(Box::new(rhs)));

        let conjunction = negation.clone().foldl(
            just(Token::And).ignore_then(negation).repeated(),
            |left, right| Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            },
        );

        conjunction.clone().foldl(
            just(Token::Or).ignore_then(conjunction).repeated(),
            |left, right| Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    });

    let select_item = expr
        .clone()
        .then(just(Token::As).ignore_then(ident.clone()).or_not())
        .map(|(expr, alias)| SelectItem { expr, alias });

    // Table names may carry an explicit database prefix: db.table
    let table = ident
        .clone()
        .then(just(Token::Dot).ignore_then(ident.clone()).or_not())
        .map(|(first, second)| match second {
            Some(second) => format!("{first}.{second}"),
            None => first,
        });

    let count = select! {
        Token::Number(s) => s.to_string(),
    }
    .try_map(|s, span| {
        s.parse::<u64>()
            .map_err(|_| Rich::custom(span, format!("invalid count '{s}'")))
    });

    let order_dir = select! {
        Token::Asc => OrderDir::Asc,
        Token::Desc => OrderDir::Desc,
    };

    let order_item = ident
        .clone()
        .then(order_dir.or_not())
        .map(|(name, dir)| OrderItem { name, dir });

    just(Token::Select)
        .ignore_then(
            select_item
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::From))
        .then(table)
        .then(just(Token::Where).ignore_then(expr.clone()).or_not())
        .then(
            just(Token::Group)
                .then(just(Token::By))
                .ignore_then(
                    ident
                        .clone()
                        .separated_by(just(Token::Comma))
                        .at_least(1)
                        .collect::<Vec<_>>(),
                )
                .or_not(),
        )
        .then(just(Token::Having).ignore_then(expr).or_not())
        .then(
            just(Token::Order)
                .then(just(Token::By))
                .ignore_then(
                    order_item
                        .separated_by(just(Token::Comma))
                        .at_least(1)
                        .collect::<Vec<_>>(),
                )
                .or_not(),
        )
        .then(
            just(Token::Limit)
                .ignore_then(count.clone())
                .then(just(Token::Offset).ignore_then(count).or_not())
                .or_not(),
        )
        .then_ignore(end())
        .map(
            |((((((select, from), where_clause), group_by), having), order_by), limit)| {
                Statement {
                    select,
                    from,
                    where_clause,
                    group_by: group_by.unwrap_or_default(),
                    having,
                    order_by: order_by.unwrap_or_default(),
                    limit: limit.as_ref().map(|(n, _)| *n),
                    offset: limit.and_then(|(_, m)| m),
                }
            },
        )
}
