use super::{Postfix, Token};

impl Postfix {
    /// Evaluates the expression against a file's tags.
    ///
    /// An empty expression matches everything. A malformed stream (stack underflow or more
    /// than one value left at the end) never matches.
    pub fn matches(&self, tags: &[u64]) -> bool {
        if self.tokens().is_empty() {
            return true;
        }

        let mut stack: Vec<bool> = Vec::with_capacity(self.tokens().len());
        for token in self.tokens() {
            match *token {
                Token::Tag(id) => stack.push(tags.contains(&id)),
                Token::Not => match stack.pop() {
                    Some(value) => stack.push(!value),
                    None => return false,
                },
                Token::And | Token::Or => {
                    let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
                        return false;
                    };
                    stack.push(if *token == Token::And { a && b } else { a || b });
                }
            }
        }

        match stack.as_slice() {
            [result] => *result,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parse;

    #[test]
    fn test_complex_expression() {
        let expr = parse("(!7|6)&(6|9)").unwrap();
        assert!(expr.matches(&[7, 6]));
        assert!(!expr.matches(&[7, 3, 9]));
        assert!(expr.matches(&[6]));
        assert!(!expr.matches(&[7, 3, 2]));
    }

    #[test]
    fn test_empty_expression_matches_all() {
        let expr = parse("").unwrap();
        assert!(expr.matches(&[]));
        assert!(expr.matches(&[1, 2, 3]));
    }

    #[test]
    fn test_negation_and_precedence() {
        let expr = parse("1|!2&3").unwrap();
        // 1 | (!2 & 3)
        assert!(expr.matches(&[1, 2]));
        assert!(expr.matches(&[3]));
        assert!(!expr.matches(&[2, 3]));
        assert!(!expr.matches(&[]));
    }

    #[test]
    fn test_malformed_stream_never_matches() {
        let two_values = Postfix::new(vec![Token::Tag(1), Token::Tag(2)]);
        assert!(!two_values.matches(&[1, 2]));

        let underflow = Postfix::new(vec![Token::Tag(1), Token::And]);
        assert!(!underflow.matches(&[1]));

        let lone_not = Postfix::new(vec![Token::Not]);
        assert!(!lone_not.matches(&[]));
    }

    #[test]
    fn test_agrees_with_direct_evaluation() {
        let cases: &[(&str, fn(&[u64]) -> bool)] = &[
            ("1&2|3", |t| (t.contains(&1) && t.contains(&2)) || t.contains(&3)),
            ("1&(2|3)", |t| t.contains(&1) && (t.contains(&2) || t.contains(&3))),
            ("!1&!2", |t| !t.contains(&1) && !t.contains(&2)),
            ("!(1&2)|3", |t| !(t.contains(&1) && t.contains(&2)) || t.contains(&3)),
        ];
        let tag_sets: &[&[u64]] = &[&[], &[1], &[2], &[3], &[1, 2], &[1, 3], &[2, 3], &[1, 2, 3]];

        for (source, reference) in cases {
            let expr = parse(source).unwrap();
            for tags in tag_sets {
                assert_eq!(expr.matches(tags), reference(tags), "{source} on {tags:?}");
            }
        }
    }
}
