//! Lexer for the FlowQL dialect.
//!
//! Tokenizes input SQL into keywords, identifiers, literals and operators
//! with span information. Keywords are case-insensitive; identifiers are
//! bare or backtick-quoted; strings are single-quoted.

use chumsky::prelude::*;

/// A token in a FlowQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Keywords
    // ========================================================================
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Limit,
    Offset,
    As,
    And,
    Or,
    Not,
    In,
    Like,
    Asc,
    Desc,

    // ========================================================================
    // Literals
    // ========================================================================
    /// An identifier (not a keyword), bare or backtick-quoted.
    Ident(&'src str),
    /// An integer or decimal literal.
    Number(&'src str),
    /// A single-quoted string literal (contents without quotes).
    StringLit(&'src str),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Select => write!(f, "select"),
            Token::From => write!(f, "from"),
            Token::Where => write!(f, "where"),
            Token::Group => write!(f, "group"),
            Token::By => write!(f, "by"),
            Token::Having => write!(f, "having"),
            Token::Order => write!(f, "order"),
            Token::Limit => write!(f, "limit"),
            Token::Offset => write!(f, "offset"),
            Token::As => write!(f, "as"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::In => write!(f, "in"),
            Token::Like => write!(f, "like"),
            Token::Asc => write!(f, "asc"),
            Token::Desc => write!(f, "desc"),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Number(s) => write!(f, "{}", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
        }
    }
}

/// Map an identifier to a keyword token or return it as an identifier.
/// Keywords match case-insensitively.
fn keyword_or_ident(s: &str) -> Token<'_> {
    match s.to_ascii_lowercase().as_str() {
        "select" => Token::Select,
        "from" => Token::From,
        "where" => Token::Where,
        "group" => Token::Group,
        "by" => Token::By,
        "having" => Token::Having,
        "order" => Token::Order,
        "limit" => Token::Limit,
        "offset" => Token::Offset,
        "as" => Token::As,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "like" => Token::Like,
        "asc" => Token::Asc,
        "desc" => Token::Desc,
        _ => Token::Ident(s),
    }
}

/// Create a lexer for FlowQL.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    // Bare identifiers: letter or underscore, then alphanumerics/underscores.
    let ident = text::ident().map(keyword_or_ident);

    // Backtick-quoted identifiers: `...` (always an identifier).
    let quoted_ident = just('`')
        .ignore_then(none_of('`').repeated().to_slice())
        .then_ignore(just('`'))
        .map(Token::Ident);

    // String literals: '...'
    let string_lit = just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(Token::StringLit);

    // Numbers: integers and decimals.
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(Token::Number);

    // Symbols (multi-char first, then single-char).
    let symbol = choice((
        just("!=").to(Token::Ne),
        just("<=").to(Token::Lte),
        just(">=").to(Token::Gte),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('=').to(Token::Eq),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
    ));

    let token =
        choice((ident, quoted_ident, string_lit, number, symbol)).map_with(|tok, e| (tok, e.span()));

    token
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Lex a source string into tokens.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to extract just the tokens (without spans).
    fn tokens_only(tokens: Vec<(Token<'_>, SimpleSpan)>) -> Vec<Token<'_>> {
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_lex_keywords_case_insensitive() {
        let result = lex("SELECT from Group BY").expect("lexing should succeed");
        assert_eq!(
            tokens_only(result),
            vec![Token::Select, Token::From, Token::Group, Token::By]
        );
    }

    #[test]
    fn test_lex_simple_statement() {
        let result = lex("select byte from l4_flow_log").expect("lexing should succeed");
        assert_eq!(
            tokens_only(result),
            vec![
                Token::Select,
                Token::Ident("byte"),
                Token::From,
                Token::Ident("l4_flow_log"),
            ]
        );
    }

    #[test]
    fn test_lex_operators() {
        let result = lex("a>=1 and b!=2 or c<=3").expect("lexing should succeed");
        assert_eq!(
            tokens_only(result),
            vec![
                Token::Ident("a"),
                Token::Gte,
                Token::Number("1"),
                Token::And,
                Token::Ident("b"),
                Token::Ne,
                Token::Number("2"),
                Token::Or,
                Token::Ident("c"),
                Token::Lte,
                Token::Number("3"),
            ]
        );
    }

    #[test]
    fn test_lex_quoted_ident_and_string() {
        let result = lex("`time` = 'abc'").expect("lexing should succeed");
        assert_eq!(
            tokens_only(result),
            vec![Token::Ident("time"), Token::Eq, Token::StringLit("abc")]
        );
    }

    #[test]
    fn test_lex_call_with_arithmetic() {
        let result = lex("Sum(byte)/Time_interval").expect("lexing should succeed");
        assert_eq!(
            tokens_only(result),
            vec![
                Token::Ident("Sum"),
                Token::LParen,
                Token::Ident("byte"),
                Token::RParen,
                Token::Slash,
                Token::Ident("Time_interval"),
            ]
        );
    }

    #[test]
    fn test_lex_decimal() {
        let result = lex("0.95").expect("lexing should succeed");
        assert_eq!(tokens_only(result), vec![Token::Number("0.95")]);
    }

    #[test]
    fn test_lex_rejects_stray_char() {
        assert!(lex("select ; from t").is_err());
    }
}
