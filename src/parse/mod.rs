//! FlowQL parsing: lexer, token parser, and AST.
//!
//! The grammar is deliberately narrow:
//!
//! ```text
//! SELECT <projections> FROM <table>
//!   [WHERE <expr>] [GROUP BY <idents>] [HAVING <expr>]
//!   [ORDER BY <ident> [ASC|DESC], ...] [LIMIT n [OFFSET m]]
//! ```
//!
//! Keywords are case-insensitive. Identifiers stay unresolved here — the
//! engine resolves them against the description registry.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, OrderDir, OrderItem, SelectItem, Statement};

use crate::error::{QueryError, QueryResult};

/// Parse a FlowQL source string into a [`Statement`].
///
/// Any lexer or parser diagnostic fails the whole statement with
/// [`QueryError::Malformed`].
pub fn parse(source: &str) -> QueryResult<Statement> {
    use chumsky::error::Rich;
    use chumsky::input::Input;
    use chumsky::span::SimpleSpan;
    use chumsky::Parser as _;

    let (tokens, lex_errs) = lexer::lexer().parse(source).into_output_errors();
    if !lex_errs.is_empty() {
        let message = lex_errs
            .iter()
            .map(|e: &Rich<'_, char>| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(QueryError::Malformed(message));
    }
    let tokens: Vec<(lexer::Token<'_>, SimpleSpan)> = tokens.unwrap_or_default();

    let len = source.len();
    let eoi: SimpleSpan = (len..len).into();
    let token_stream = tokens
        .as_slice()
        .map(eoi, |(tok, span): &(lexer::Token<'_>, SimpleSpan)| {
            (tok, span)
        });

    let (statement, parse_errs) = parser::parser().parse(token_stream).into_output_errors();
    match statement {
        Some(statement) if parse_errs.is_empty() => Ok(statement),
        _ => {
            let message = if parse_errs.is_empty() {
                "empty statement".to_string()
            } else {
                parse_errs
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            Err(QueryError::Malformed(message))
        }
    }
}
