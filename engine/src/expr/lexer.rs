//! Lexer (tokenizer) for analysed expressions using logos.
//!
//! Numeric literals keep their source text so that they can be rounded
//! exactly into any target format later.

use logos::Logos;
use std::fmt;

use crate::error::ReadError;

/// Token types of the expression language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip comments
pub enum Token {
    // Keywords
    #[token("if")]
    If,

    #[token("then")]
    Then,

    #[token("else")]
    Else,

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("<")]
    Lt,

    #[token("<=")]
    Le,

    #[token(">")]
    Gt,

    #[token(">=")]
    Ge,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    // Delimiters
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Decimal or hexadecimal literal, e.g. 1.5e-3, .25, 0x1.8p3
    #[regex(r"[0-9]+\.?[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"0[xX][0-9a-fA-F]+(\.[0-9a-fA-F]*)?[pP][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Number(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::If => write!(f, "if"),
            Token::Then => write!(f, "then"),
            Token::Else => write!(f, "else"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Number(s) => write!(f, "{}", s),
        }
    }
}

/// Tokenize an expression; each token carries its byte span
pub fn tokenize(source: &str) -> Result<Vec<(Token, usize, usize)>, ReadError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span.start, span.end)),
            Err(_) => {
                return Err(ReadError::new(
                    &source[span.clone()],
                    format!("unexpected character at position {}", span.start),
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_and_operators() {
        let tokens = tokenize("if x >= 1 then y else -z").unwrap();
        let kinds: Vec<Token> = tokens.into_iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            vec![
                Token::If,
                Token::Ident("x".into()),
                Token::Ge,
                Token::Number("1".into()),
                Token::Then,
                Token::Ident("y".into()),
                Token::Else,
                Token::Minus,
                Token::Ident("z".into()),
            ]
        );
    }

    #[test]
    fn test_numbers_keep_their_text() {
        let tokens = tokenize("0.1 1e-3 .5 0x1.8p3 2.").unwrap();
        let texts: Vec<String> = tokens.iter().map(|t| t.0.to_string()).collect();
        assert_eq!(texts, vec!["0.1", "1e-3", ".5", "0x1.8p3", "2."]);
    }

    #[test]
    fn test_spans_and_comments() {
        let tokens = tokenize("a + b # comment").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!((tokens[2].1, tokens[2].2), (4, 5));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a $ b").unwrap_err();
        assert_eq!(err.input, "$");
        assert!(err.message.contains("position 2"));
    }
}
