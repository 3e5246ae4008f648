//! Expression front-end.
//!
//! A small arithmetic language used to drive the engine from the command
//! line and from tests: literals, named inputs, `+ - * /`, calls to the
//! elementary functions and `if ... then ... else ...`.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::evaluate;
pub use lexer::{tokenize, Token};
pub use parser::{parse_expression, BinaryOp, Condition, Expr};
