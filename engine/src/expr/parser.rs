//! Expression parser (nom over the token stream).
//!
//! Grammar:
//!
//! ```text
//! expression := "if" condition "then" expression "else" expression
//!             | additive
//! condition  := additive ("<" | "<=" | ">" | ">=" | "==" | "!=") additive
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := "-" unary | primary
//! primary    := number | ident "(" arguments ")" | ident | "(" expression ")"
//! ```

use nom::{
    branch::alt,
    combinator::map,
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded},
    Err, IResult,
};

use super::lexer::{tokenize, Token};
use crate::domain::CompareOp;
use crate::error::ReadError;

/// Parser input is a slice of tokens
pub type TokenSlice<'a> = &'a [(Token, usize, usize)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// `lhs op rhs` guarding an `if`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Expr,
    pub op: CompareOp,
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal text, rounded when evaluated
    Number(String),
    Var(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    If {
        /// Byte offset of the `if` keyword
        offset: usize,
        condition: Box<Condition>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

/// Parse a complete expression
pub fn parse_expression(source: &str) -> Result<Expr, ReadError> {
    let tokens = tokenize(source)?;
    match expression(&tokens) {
        Ok(([], expr)) => Ok(expr),
        Ok((rest, _)) => Err(unexpected(source, rest)),
        Err(Err::Error(e)) | Err(Err::Failure(e)) => Err(unexpected(source, e.input)),
        Err(Err::Incomplete(_)) => Err(ReadError::new(source, "incomplete expression")),
    }
}

fn unexpected(source: &str, rest: TokenSlice) -> ReadError {
    match rest.first() {
        Some((token, start, _)) => {
            ReadError::new(source, format!("unexpected '{}' at position {}", token, start))
        }
        None => ReadError::new(source, "unexpected end of expression"),
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// Parse an expression
pub fn expression(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    alt((if_expression, additive))(input)
}

fn if_expression(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    let offset = match input.first() {
        Some((Token::If, start, _)) => *start,
        _ => return reject(input),
    };
    let (input, condition) = preceded(token(Token::If), condition)(input)?;
    let (input, then_branch) = preceded(token(Token::Then), expression)(input)?;
    let (input, else_branch) = preceded(token(Token::Else), expression)(input)?;
    Ok((
        input,
        Expr::If {
            offset,
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        },
    ))
}

fn condition(input: TokenSlice) -> IResult<TokenSlice, Condition> {
    let (input, lhs) = additive(input)?;
    let (input, op) = comparison_op(input)?;
    let (input, rhs) = additive(input)?;
    Ok((input, Condition { lhs, op, rhs }))
}

fn comparison_op(input: TokenSlice) -> IResult<TokenSlice, CompareOp> {
    alt((
        map(token(Token::Lt), |_| CompareOp::Lt),
        map(token(Token::Le), |_| CompareOp::Le),
        map(token(Token::Gt), |_| CompareOp::Gt),
        map(token(Token::Ge), |_| CompareOp::Ge),
        map(token(Token::EqEq), |_| CompareOp::Eq),
        map(token(Token::NotEq), |_| CompareOp::Ne),
    ))(input)
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn additive(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(
            alt((
                map(token(Token::Plus), |_| BinaryOp::Add),
                map(token(Token::Minus), |_| BinaryOp::Sub),
            )),
            term,
        ),
        move || first.clone(),
        |acc, (op, rhs)| binary(op, acc, rhs),
    )(input)
}

fn term(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(
            alt((
                map(token(Token::Star), |_| BinaryOp::Mul),
                map(token(Token::Slash), |_| BinaryOp::Div),
            )),
            unary,
        ),
        move || first.clone(),
        |acc, (op, rhs)| binary(op, acc, rhs),
    )(input)
}

fn unary(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    alt((
        map(preceded(token(Token::Minus), unary), |e| Expr::Neg(Box::new(e))),
        primary,
    ))(input)
}

fn primary(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    alt((
        map(number, Expr::Number),
        call,
        map(identifier, Expr::Var),
        delimited(token(Token::LParen), expression, token(Token::RParen)),
    ))(input)
}

fn call(input: TokenSlice) -> IResult<TokenSlice, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        token(Token::LParen),
        separated_list0(token(Token::Comma), expression),
        token(Token::RParen),
    )(input)?;
    Ok((input, Expr::Call { name, args }))
}

// ============================================================================
// Helper Parsers
// ============================================================================

fn reject<O>(input: TokenSlice) -> IResult<TokenSlice, O> {
    let kind = if input.is_empty() {
        nom::error::ErrorKind::Eof
    } else {
        nom::error::ErrorKind::Tag
    };
    Err(Err::Error(nom::error::Error::new(input, kind)))
}

/// Parse a specific token
fn token(tok: Token) -> impl Fn(TokenSlice) -> IResult<TokenSlice, &Token> {
    move |input: TokenSlice| match input.first() {
        Some(first) if first.0 == tok => Ok((&input[1..], &first.0)),
        _ => reject(input),
    }
}

/// Parse an identifier (Token::Ident)
fn identifier(input: TokenSlice) -> IResult<TokenSlice, String> {
    match input.first() {
        Some((Token::Ident(name), _, _)) => Ok((&input[1..], name.clone())),
        _ => reject(input),
    }
}

/// Parse a numeric literal (Token::Number), keeping its text
fn number(input: TokenSlice) -> IResult<TokenSlice, String> {
    match input.first() {
        Some((Token::Number(text), _, _)) => Ok((&input[1..], text.clone())),
        _ => reject(input),
    }
}
