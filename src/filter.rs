use std::collections::HashMap;

use crate::{
    ast::{AbstractSyntaxTree, AndExpression, ClauseValue, Expression, Kind, Operator},
    error::Error,
    mapper::{Mapper, Outcome},
    parser::parse,
    value::Arg,
};

/// Reports the declared kind of a column, or `None` when the column can't be
///  filtered on. Implemented for closures, so a lookup can be as simple as:
///
/// ```rust
/// # use sqlfilter::{Fielder, Kind};
/// let fielder = |name: &str| match name {
///     "age" => Some(Kind::Number),
///     "name" => Some(Kind::String),
///     _ => None,
/// };
/// assert_eq!(fielder.column_kind("age"), Some(Kind::Number));
/// ```
pub trait Fielder {
    fn column_kind(&self, name: &str) -> Option<Kind>;
}

impl<F> Fielder for F
where
    F: Fn(&str) -> Option<Kind>,
{
    fn column_kind(&self, name: &str) -> Option<Kind> {
        self(name)
    }
}

/// A fixed column list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns(HashMap<String, Kind>);

impl Columns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, kind: Kind) -> Self {
        self.0.insert(name.into(), kind);
        self
    }
}

impl<K: Into<String>> FromIterator<(K, Kind)> for Columns {
    fn from_iter<T: IntoIterator<Item = (K, Kind)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Fielder for Columns {
    fn column_kind(&self, name: &str) -> Option<Kind> {
        self.0.get(name).copied()
    }
}

/// Compiles filter text into a parameterized `WHERE` fragment.
///
/// Clauses inside a group are joined with `OR` and parenthesized, groups are
///  joined with `AND`. Every generated condition has exactly one `?`, and one
///  argument is produced for it; overridden clauses contribute whatever their
///  mapper returned.
pub struct Filter<'a, F: ?Sized> {
    fielder: &'a F,
    mapper: &'a Mapper,
}

impl<'a, F: Fielder + ?Sized> Filter<'a, F> {
    pub fn new(fielder: &'a F, mapper: &'a Mapper) -> Self {
        Self { fielder, mapper }
    }

    pub fn compile(&self, source: &str) -> Result<(String, Vec<Arg>), Error> {
        let tree = parse(source)?;
        let (query, args) = self.compile_tree(tree)?;
        tracing::debug!(filter = source, %query, args = args.len(), "compiled filter");
        Ok((query, args))
    }

    pub fn compile_tree(&self, tree: AbstractSyntaxTree) -> Result<(String, Vec<Arg>), Error> {
        let mut groups = Vec::with_capacity(tree.and_exprs.len());
        let mut args = Vec::new();

        for and in tree.and_exprs {
            // A group whose clauses were all skipped leaves nothing behind
            if let Some(query) = self.filter_and_expression(and, &mut args)? {
                groups.push(format!("({query})"));
            }
        }

        Ok((groups.join(" AND "), args))
    }

    fn filter_and_expression(
        &self,
        and: AndExpression,
        args: &mut Vec<Arg>,
    ) -> Result<Option<String>, Error> {
        let mut conditions = Vec::with_capacity(and.or_exprs.len());
        for expr in and.or_exprs {
            if let Some(condition) = self.filter_expression(expr, args)? {
                conditions.push(condition);
            }
        }

        if conditions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(conditions.join(" OR ")))
        }
    }

    fn filter_expression(
        &self,
        mut expr: Expression,
        args: &mut Vec<Arg>,
    ) -> Result<Option<String>, Error> {
        if self.mapper.apply(&mut expr)? == Outcome::Skip {
            tracing::trace!(field = %expr.name, "clause skipped by mapper");
            return Ok(None);
        }

        if let Some(overrider) = expr.overrider() {
            args.extend(overrider.args.iter().cloned());
            return Ok(Some(overrider.query.clone()));
        }

        if matches!(expr.operator, Operator::Match | Operator::NotMatch) {
            return Err(Error::UnsupportedOperator(expr.operator));
        }

        let kind = self
            .fielder
            .column_kind(&expr.name)
            .ok_or_else(|| Error::UnknownField(expr.name.clone()))?;
        expr.convert_to(kind)?;

        let comparator = comparator(expr.operator, &expr.value)?;
        args.push(bind(expr.operator, expr.value));
        Ok(Some(format!("{} {comparator} ?", expr.name)))
    }
}

fn comparator(op: Operator, value: &ClauseValue) -> Result<&'static str, Error> {
    // Booleans are one-byte integers: a pattern match against them can only
    //  mean equality.
    if let ClauseValue::Boolean(_) = value
        && op.is_like()
    {
        return Ok(if op == Operator::NotInclude { "<>" } else { "=" });
    }

    Ok(match op {
        Operator::Equal => "=",
        Operator::NotEqual => "<>",
        Operator::Include | Operator::StartsWith | Operator::EndsWith => "LIKE",
        Operator::NotInclude => "NOT LIKE",
        Operator::GreaterThan => ">",
        Operator::LessThan => "<",
        Operator::GreaterThanOrEqual => ">=",
        Operator::LessThanOrEqual => "<=",
        Operator::Match | Operator::NotMatch => return Err(Error::UnsupportedOperator(op)),
    })
}

fn bind(op: Operator, value: ClauseValue) -> Arg {
    match value {
        // by default, booleans are stored as tinyint(1)
        ClauseValue::Boolean(b) => Arg::from(b),
        value if op.is_like() => {
            let search = value.to_string().replace('%', "%%");
            Arg::Str(match op {
                Operator::StartsWith => format!("{search}%"),
                Operator::EndsWith => format!("%{search}"),
                _ => format!("%{search}%"),
            })
        }
        ClauseValue::Number(n) => Arg::Int(n),
        ClauseValue::Raw(s) | ClauseValue::String(s) => Arg::Str(s),
    }
}

/// Compiles [source] against [fielder] and [mapper]. Empty input yields an
///  empty query and no arguments.
pub fn filter<F: Fielder + ?Sized>(
    fielder: &F,
    source: &str,
    mapper: &Mapper,
) -> Result<(String, Vec<Arg>), Error> {
    Filter::new(fielder, mapper).compile(source)
}
