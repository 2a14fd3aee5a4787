use super::{ExpressionError, Postfix, Token};

const INVALID_PAIRS: &[(char, char)] = &[
    ('(', ')'),
    ('(', '&'),
    ('(', '|'),
    (')', '('),
    ('&', '&'),
    ('&', '|'),
    ('|', '&'),
    ('|', '|'),
    ('!', '&'),
    ('!', '|'),
    ('!', '!'),
    ('!', ')'),
    ('&', ')'),
    ('|', ')'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Not,
    And,
    Or,
    Open,
}

impl Op {
    fn priority(self) -> u8 {
        match self {
            Op::Not => 3,
            Op::And => 2,
            Op::Or => 1,
            Op::Open => 0,
        }
    }

    fn token(self) -> Option<Token> {
        match self {
            Op::Not => Some(Token::Not),
            Op::And => Some(Token::And),
            Op::Or => Some(Token::Or),
            Op::Open => None,
        }
    }
}

fn is_valid_symbol(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '!' | '&' | '|' | '(' | ')')
}

/// Structural checks done before conversion. Order matters only for which error is reported.
fn check_syntax(expr: &[char]) -> Result<(), ExpressionError> {
    if let Some(&c) = expr.iter().find(|c| !is_valid_symbol(**c)) {
        return Err(ExpressionError::InvalidCharacter(c));
    }

    let first = expr[0];
    let last = expr[expr.len() - 1];
    if matches!(first, '&' | '|') {
        return Err(ExpressionError::DanglingOperator(first));
    }
    if matches!(last, '&' | '|' | '!') {
        return Err(ExpressionError::DanglingOperator(last));
    }

    for pair in expr.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let invalid = INVALID_PAIRS.contains(&(a, b))
            || (a.is_ascii_digit() && (b == '!' || b == '('))
            || (a == ')' && (b.is_ascii_digit() || b == '!'));
        if invalid {
            return Err(ExpressionError::InvalidSequence(format!("{}{}", a, b)));
        }
    }

    Ok(())
}

fn flush_number(number: &mut String, output: &mut Vec<Token>) -> Result<(), ExpressionError> {
    if number.is_empty() {
        return Ok(());
    }
    let id = number
        .parse::<u64>()
        .map_err(|_| ExpressionError::TagIdOverflow(number.clone()))?;
    output.push(Token::Tag(id));
    number.clear();
    Ok(())
}

/// Converts an infix tag expression into postfix form.
///
/// Spaces are ignored and an empty expression yields an empty postfix.
/// `!` binds tighter than `&`, which binds tighter than `|`.
///
/// ```
/// use tagdrive_core::expression::parse;
///
/// assert_eq!(parse("66&!8|7").unwrap().to_string(), "66 8 ! & 7 |");
/// ```
pub fn parse(expr: &str) -> Result<Postfix, ExpressionError> {
    let chars: Vec<char> = expr.chars().filter(|c| *c != ' ').collect();
    if chars.is_empty() {
        return Ok(Postfix::default());
    }

    check_syntax(&chars)?;

    let mut output = Vec::with_capacity(chars.len());
    let mut operators: Vec<Op> = Vec::new();
    let mut number = String::new();

    for c in chars {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        flush_number(&mut number, &mut output)?;

        match c {
            '!' => operators.push(Op::Not),
            '(' => operators.push(Op::Open),
            '&' | '|' => {
                let op = if c == '&' { Op::And } else { Op::Or };
                while let Some(&top) = operators.last() {
                    if top == Op::Open || top.priority() < op.priority() {
                        break;
                    }
                    operators.pop();
                    output.extend(top.token());
                }
                operators.push(op);
            }
            ')' => loop {
                match operators.pop() {
                    None => return Err(ExpressionError::UnbalancedParentheses),
                    Some(Op::Open) => break,
                    Some(op) => output.extend(op.token()),
                }
            },
            other => return Err(ExpressionError::InvalidCharacter(other)),
        }
    }
    flush_number(&mut number, &mut output)?;

    while let Some(op) = operators.pop() {
        match op.token() {
            Some(token) => output.push(token),
            None => return Err(ExpressionError::UnbalancedParentheses),
        }
    }

    Ok(Postfix::new(output))
}
