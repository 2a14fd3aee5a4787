//! Logical tag expressions.
//!
//! A query such as `(!7|6)&(6|9)` is parsed once into postfix form and then evaluated against
//! the tag list of every candidate file. The parsed form is immutable, so one instance can be
//! shared by concurrent scans.

mod evaluator;
mod parser;

pub use parser::parse;

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Reasons an expression is rejected. All of them surface to clients as bad syntax.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("invalid character {0:?} in expression")]
    InvalidCharacter(char),

    #[error("expression can't start or end with {0:?}")]
    DanglingOperator(char),

    #[error("invalid sequence {0:?}")]
    InvalidSequence(String),

    #[error("unbalanced parentheses")]
    UnbalancedParentheses,

    #[error("tag id {0} is too large")]
    TagIdOverflow(String),
}

/// One element of the postfix stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Tag(u64),
    Not,
    And,
    Or,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Token::Tag(id) => write!(f, "{}", id),
            Token::Not => f.write_str("!"),
            Token::And => f.write_str("&"),
            Token::Or => f.write_str("|"),
        }
    }
}

/// Expression in reverse Polish notation. Empty means "match every file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Postfix {
    tokens: Vec<Token>,
}

impl Postfix {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

/// Whitespace-separated postfix form, e.g. `7 ! 6 | 6 9 | &`.
impl Display for Postfix {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}
