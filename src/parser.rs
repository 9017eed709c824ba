use crate::ast::{AbstractSyntaxTree, AndExpression, Expression, Operator};
use crate::lex::{Error as LexerError, Token, TokenType, Tokenizer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("lexical error: {0}")]
    Lexical(#[from] LexerError),
    #[error("invalid token `{value}` at {start}")]
    InvalidToken { value: String, start: usize },
    #[error("operator expected after `{ident}` at {start}")]
    OperatorExpected { ident: String, start: usize },
    #[error("unexpected token `{value}` at {start}, expected an operator")]
    UnexpectedToken { value: String, start: usize },
    #[error("ident expected, but found `{found}` at {start}")]
    IdentExpected { found: String, start: usize },
}

impl SyntaxError {
    fn invalid(token: Token) -> Self {
        Self::InvalidToken {
            value: token.value,
            start: token.start,
        }
    }

    fn ident_expected(token: Token) -> Self {
        Self::IdentExpected {
            found: token.value,
            start: token.start,
        }
    }
}

/// Recursive descent over:
///
/// ```text
/// AST     := AndExpr*
/// AndExpr := (',')* Expr (',' Expr)* (';')?
/// Expr    := IDENT OPERATOR IDENT?
/// ```
///
/// Every operator is accepted here, including the regex ones; deciding which
///  operators can be compiled is left to [crate::filter].
pub struct Parser<'input> {
    tokenizer: Tokenizer<'input>,
}

impl<'input> Parser<'input> {
    pub fn new(tokenizer: Tokenizer<'input>) -> Self {
        Self { tokenizer }
    }

    pub fn parse(mut self) -> Result<AbstractSyntaxTree, SyntaxError> {
        Ok(AbstractSyntaxTree {
            and_exprs: self.parse_and_expressions()?,
        })
    }

    fn parse_and_expressions(&mut self) -> Result<Vec<AndExpression>, SyntaxError> {
        let mut and_exprs = Vec::new();
        loop {
            let (and, more) = self.parse_and_expression()?;
            // `;;` and trailing separators leave empty groups behind
            if !and.or_exprs.is_empty() {
                and_exprs.push(and);
            }
            if !more {
                break;
            }
        }
        Ok(and_exprs)
    }

    /// Parses one group. The flag is true when a `;` closed the group, i.e.
    ///  when there may be more groups to come.
    fn parse_and_expression(&mut self) -> Result<(AndExpression, bool), SyntaxError> {
        let mut and = AndExpression::default();
        loop {
            let token = self.tokenizer.next_token()?;
            match token.ty {
                TokenType::Eof => return Ok((and, false)),
                TokenType::And => return Ok((and, true)),
                TokenType::Or => continue,
                _ => self.tokenizer.undo(token),
            }
            and.or_exprs.push(self.parse_expression()?);
        }
    }

    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let name = self.tokenizer.next_token()?;
        match name.ty {
            TokenType::Ident => {}
            TokenType::Invalid => return Err(SyntaxError::invalid(name)),
            _ => return Err(SyntaxError::ident_expected(name)),
        }

        let op = self.tokenizer.next_token()?;
        let operator = match op.ty {
            TokenType::Eof => {
                return Err(SyntaxError::OperatorExpected {
                    ident: name.value,
                    start: op.start,
                });
            }
            TokenType::Invalid => return Err(SyntaxError::invalid(op)),
            _ => Operator::try_from(&op).map_err(|()| SyntaxError::UnexpectedToken {
                value: op.value.clone(),
                start: op.start,
            })?,
        };

        // The value is optional at the very end of the input
        let value = self.tokenizer.next_token()?;
        let raw = match value.ty {
            TokenType::Ident => value.value,
            TokenType::Eof => String::new(),
            TokenType::Invalid => return Err(SyntaxError::invalid(value)),
            _ => return Err(SyntaxError::ident_expected(value)),
        };

        Ok(Expression::new(name.value, operator, raw))
    }
}

/// Tokenizes and parses [source] in one go.
pub fn parse(source: &str) -> Result<AbstractSyntaxTree, SyntaxError> {
    Parser::new(Tokenizer::new(source)).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ClauseValue;

    fn clauses(tree: &AbstractSyntaxTree) -> Vec<Vec<(&str, Operator, &ClauseValue)>> {
        tree.and_exprs
            .iter()
            .map(|and| {
                and.or_exprs
                    .iter()
                    .map(|e| (e.name.as_str(), e.operator, &e.value))
                    .collect()
            })
            .collect()
    }

    fn raw(s: &str) -> ClauseValue {
        ClauseValue::Raw(s.to_string())
    }

    #[test]
    fn basic() {
        let tree = parse("name=@tao;age>18,age<10").expect("a valid parse");
        assert_eq!(
            clauses(&tree),
            vec![
                vec![("name", Operator::Include, &raw("tao"))],
                vec![
                    ("age", Operator::GreaterThan, &raw("18")),
                    ("age", Operator::LessThan, &raw("10")),
                ],
            ]
        );
    }

    #[test]
    fn empty_input() {
        assert!(parse("").expect("a valid parse").is_empty());
        assert!(parse("   ").expect("a valid parse").is_empty());
        assert!(parse(",,;;").expect("a valid parse").is_empty());
    }

    #[test]
    fn separators_are_lenient() {
        let tree = parse(",,a==1,,b==2;;c==3;").expect("a valid parse");
        assert_eq!(
            clauses(&tree),
            vec![
                vec![
                    ("a", Operator::Equal, &raw("1")),
                    ("b", Operator::Equal, &raw("2")),
                ],
                vec![("c", Operator::Equal, &raw("3"))],
            ]
        );
    }

    #[test]
    fn value_defaults_to_empty_at_eof() {
        let tree = parse("a==1;b!=").expect("a valid parse");
        assert_eq!(clauses(&tree)[1], vec![("b", Operator::NotEqual, &raw(""))]);
    }

    #[test]
    fn regex_operators_parse() {
        let tree = parse("a=~x,b!~y").expect("a valid parse");
        let ops: Vec<_> = tree.and_exprs[0].or_exprs.iter().map(|e| e.operator).collect();
        assert_eq!(ops, [Operator::Match, Operator::NotMatch]);
    }

    #[test]
    fn operator_expected() {
        assert_eq!(
            parse("a==1;name"),
            Err(SyntaxError::OperatorExpected {
                ident: "name".into(),
                start: 9
            })
        );
        assert_eq!(
            parse("a,b==1"),
            Err(SyntaxError::UnexpectedToken {
                value: ",".into(),
                start: 1
            })
        );
    }

    #[test]
    fn invalid_tokens() {
        assert_eq!(
            parse("a=1"),
            Err(SyntaxError::InvalidToken {
                value: "1".into(),
                start: 2
            })
        );
        assert_eq!(
            parse("a==1;(b==2)"),
            Err(SyntaxError::InvalidToken {
                value: "(".into(),
                start: 5
            })
        );
        assert_eq!(
            parse("a==\"x\""),
            Err(SyntaxError::InvalidToken {
                value: "\"".into(),
                start: 3
            })
        );
    }

    #[test]
    fn ident_expected() {
        assert_eq!(
            parse("a==;b==1"),
            Err(SyntaxError::IdentExpected {
                found: ";".into(),
                start: 3
            })
        );
        assert_eq!(
            parse("==b"),
            Err(SyntaxError::IdentExpected {
                found: "==".into(),
                start: 0
            })
        );
    }

    #[test]
    fn empty_groups_do_not_end_parsing() {
        for source in ["a==1;;age>2", ";a==1;age>2", "a==1;,,;age>2;"] {
            let tree = parse(source).expect("a valid parse");
            assert_eq!(
                clauses(&tree),
                vec![
                    vec![("a", Operator::Equal, &raw("1"))],
                    vec![("age", Operator::GreaterThan, &raw("2"))],
                ],
                "{source}"
            );
        }
    }

    #[test]
    fn trailing_backslash_round_trips() {
        let tree = parse(r"a==x\ ,name==y").expect("a valid parse");
        assert_eq!(tree.and_exprs[0].or_exprs[0].value, raw(r"x\"));
        assert_eq!(tree.to_string(), r"a==x\ ,name==y");
        assert_eq!(parse(&tree.to_string()), Ok(tree));

        // an escaped separator after a literal backslash
        let tree = parse(r"a==\\,b;c==d").expect("a valid parse");
        assert_eq!(tree.and_exprs[0].or_exprs[0].value, raw(r"\,b"));
        assert_eq!(tree.to_string(), r"a==\\,b;c==d");
        assert_eq!(parse(&tree.to_string()), Ok(tree));
    }

    #[test]
    fn lexical_errors_propagate() {
        assert!(matches!(parse("a==1;b!x"), Err(SyntaxError::Lexical(_))));
    }

    #[test]
    fn display_normalizes() {
        let tree = parse(" a =@ x\\,y , b>1 ;; c==2 ").expect("a valid parse");
        assert_eq!(tree.to_string(), r"a=@x\,y,b>1;c==2");
        assert_eq!(parse(&tree.to_string()).unwrap(), tree);
    }
}
