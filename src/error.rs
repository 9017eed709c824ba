use crate::{
    ast::{Operator, ValueKind},
    parser::SyntaxError,
};

/// Everything [crate::filter] can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown mapper prototype for field `{field}`: {shape}")]
    UnknownMapper { field: String, shape: &'static str },

    #[error(r#"enum not found: {enum_name}["{key}"]"#)]
    EnumNotFound { enum_name: String, key: String },

    #[error("bad conversion: cannot convert value {value} from type {from} to type {to} for field {field}")]
    BadConversion {
        field: String,
        value: String,
        from: ValueKind,
        to: ValueKind,
    },

    #[error("not supported operator: {0}")]
    UnsupportedOperator(Operator),
}

impl Error {
    /// True when the error was caused by the filter text rather than by the
    ///  way the mapper table was put together.
    pub fn is_user_input(&self) -> bool {
        !matches!(self, Self::UnknownMapper { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = Error::EnumNotFound {
            enum_name: "status".into(),
            key: "archived".into(),
        };
        assert_eq!(err.to_string(), r#"enum not found: status["archived"]"#);

        let err = Error::BadConversion {
            field: "age".into(),
            value: "old".into(),
            from: ValueKind::Raw,
            to: ValueKind::Number,
        };
        assert_eq!(
            err.to_string(),
            "bad conversion: cannot convert value old from type raw to type number for field age"
        );

        assert_eq!(
            Error::UnsupportedOperator(Operator::Match).to_string(),
            "not supported operator: =~"
        );
    }

    #[test]
    fn syntax_from() {
        let err: Error = SyntaxError::OperatorExpected {
            ident: "a".into(),
            start: 1,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "syntax error: operator expected after `a` at 1"
        );
    }

    #[test]
    fn user_input_split() {
        assert!(Error::UnknownField("x".into()).is_user_input());
        assert!(Error::UnsupportedOperator(Operator::NotMatch).is_user_input());
        assert!(
            !Error::UnknownMapper {
                field: "x".into(),
                shape: "u8"
            }
            .is_user_input()
        );
    }
}
