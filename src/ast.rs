use std::fmt::{Display, Formatter};

use crate::{
    error::Error,
    lex::{Token, TokenType},
    value::Arg,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Include,
    NotInclude,
    StartsWith,
    EndsWith,
    Match,
    NotMatch,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Operator {
    /// `=@`, `!@`, `^=` and `$=` compare with LIKE.
    pub fn is_like(&self) -> bool {
        matches!(
            self,
            Self::Include | Self::NotInclude | Self::StartsWith | Self::EndsWith
        )
    }
}

impl TryFrom<&Token> for Operator {
    type Error = ();
    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        match value.ty {
            TokenType::Equal => Ok(Self::Equal),
            TokenType::NotEqual => Ok(Self::NotEqual),
            TokenType::Include => Ok(Self::Include),
            TokenType::NotInclude => Ok(Self::NotInclude),
            TokenType::StartsWith => Ok(Self::StartsWith),
            TokenType::EndsWith => Ok(Self::EndsWith),
            TokenType::Match => Ok(Self::Match),
            TokenType::NotMatch => Ok(Self::NotMatch),
            TokenType::GreaterThan => Ok(Self::GreaterThan),
            TokenType::LessThan => Ok(Self::LessThan),
            TokenType::GreaterThanOrEqual => Ok(Self::GreaterThanOrEqual),
            TokenType::LessThanOrEqual => Ok(Self::LessThanOrEqual),
            _ => Err(()),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Include => "=@",
            Self::NotInclude => "!@",
            Self::StartsWith => "^=",
            Self::EndsWith => "$=",
            Self::Match => "=~",
            Self::NotMatch => "!~",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
        })
    }
}

/// The declared kind of a column, as reported by a [crate::Fielder].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Boolean,
    Number,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Raw,
    Boolean,
    Number,
    String,
}

impl From<Kind> for ValueKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Boolean => Self::Boolean,
            Kind::Number => Self::Number,
            Kind::String => Self::String,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Boolean => "bool",
            Self::Number => "number",
            Self::String => "string",
        })
    }
}

/// A clause value. Everything starts out [ClauseValue::Raw]; mappers and
///  coercion give it a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseValue {
    Raw(String),
    Boolean(bool),
    Number(i64),
    String(String),
}

impl ClauseValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Raw(_) => ValueKind::Raw,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
        }
    }
}

impl Display for ClauseValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(s) | Self::String(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// SQL supplied by a mapper in place of the generated condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub query: String,
    pub args: Vec<Arg>,
}

/// One `name op value` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub name: String,
    pub operator: Operator,
    pub value: ClauseValue,
    name_overridden: bool,
    overrider: Option<Override>,
}

impl Expression {
    pub fn new(name: impl Into<String>, operator: Operator, raw: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator,
            value: ClauseValue::Raw(raw.into()),
            name_overridden: false,
            overrider: None,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Renames the clause; the new name is used verbatim as the column.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.name_overridden = true;
    }

    pub fn name_overridden(&self) -> bool {
        self.name_overridden
    }

    pub fn set_number(&mut self, n: i64) {
        self.value = ClauseValue::Number(n);
    }

    pub fn set_string(&mut self, s: impl Into<String>) {
        self.value = ClauseValue::String(s.into());
    }

    pub fn set_boolean(&mut self, b: bool) {
        self.value = ClauseValue::Boolean(b);
    }

    pub(crate) fn set_override(&mut self, query: String, args: Vec<Arg>) {
        self.overrider = Some(Override { query, args });
    }

    pub fn overrider(&self) -> Option<&Override> {
        self.overrider.as_ref()
    }

    /// Coerces a raw value to [to]. A value that already has [to]'s kind is
    ///  left alone; any other typed value can't be converted.
    pub fn convert_to(&mut self, to: Kind) -> Result<(), Error> {
        let converted = match (&self.value, to) {
            (ClauseValue::Boolean(_), Kind::Boolean)
            | (ClauseValue::Number(_), Kind::Number)
            | (ClauseValue::String(_), Kind::String) => return Ok(()),
            (ClauseValue::Raw(raw), Kind::Boolean) => match raw.as_str() {
                "1" | "true" => Some(ClauseValue::Boolean(true)),
                "0" | "false" => Some(ClauseValue::Boolean(false)),
                _ => None,
            },
            (ClauseValue::Raw(raw), Kind::Number) => raw.parse::<i64>().ok().map(ClauseValue::Number),
            (ClauseValue::Raw(raw), Kind::String) => Some(ClauseValue::String(raw.clone())),
            _ => None,
        };

        match converted {
            Some(value) => {
                self.value = value;
                Ok(())
            }
            None => Err(Error::BadConversion {
                field: self.name.clone(),
                value: self.value.to_string(),
                from: self.value.kind(),
                to: to.into(),
            }),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", escape(&self.name), self.operator)?;
        let value = escape(&self.value.to_string());
        // A trailing `\` would escape the separator written after it; the
        //  space keeps it literal and is trimmed when parsed back
        if value.ends_with('\\') {
            write!(f, "{value} ")
        } else {
            f.write_str(&value)
        }
    }
}

fn escape(s: &str) -> String {
    s.replace(',', r"\,").replace(';', r"\;")
}

/// Clauses joined by `,`; any one of them may match. (The name is historical:
///  it is the group found between `;` separators.)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AndExpression {
    pub or_exprs: Vec<Expression>,
}

/// Groups joined by `;`; all of them must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbstractSyntaxTree {
    pub and_exprs: Vec<AndExpression>,
}

impl AbstractSyntaxTree {
    pub fn is_empty(&self) -> bool {
        self.and_exprs.is_empty()
    }
}

/// Prints the tree back in filter syntax, e.g. `a=@x,b>1;c==2`.
impl Display for AbstractSyntaxTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, and) in self.and_exprs.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            for (j, expr) in and.or_exprs.iter().enumerate() {
                if j > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{expr}")?;
            }
        }
        Ok(())
    }
}
