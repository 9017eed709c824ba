use crate::{
    error::Error as FilterError,
    filter::{Fielder, filter},
    mapper::Mapper,
    to_sql::to_sql_string,
    value::Arg,
};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no table to operate on")]
    NoTable,
    #[error("no fields to update")]
    NoFields,
    #[error("refusing to touch every row without a where clause")]
    NoWhere,
    #[error("invalid order_by: {0}")]
    InvalidOrderBy(String),
    #[error("raw statements can only be used for select")]
    RawNotAllowed,
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// A query fragment and the arguments for its placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Where {
    query: String,
    args: Vec<Arg>,
}

/// The right-hand side of an `UPDATE ... SET column = <expr>`.
pub type Expr = Where;

/// Shorthand for [Expr::new], e.g. `expr("hits+?", args![1])`.
pub fn expr(query: impl Into<String>, args: Vec<Arg>) -> Expr {
    Expr::new(query, args)
}

impl Where {
    pub fn new(query: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            query: query.into(),
            args,
        }
    }

    /// Expands list arguments into one placeholder per element.
    ///
    /// An empty list becomes `NULL`, so `IN (?)` stays valid SQL. Byte
    ///  strings are a single value and are never expanded.
    ///
    /// # Panics
    ///
    /// When the number of `?` differs from the number of arguments.
    pub fn build(&self) -> (String, Vec<Arg>) {
        let mut query = String::with_capacity(self.query.len());
        let mut args = Vec::with_capacity(self.args.len());
        let mut i = 0;
        for c in self.query.chars() {
            if c != '?' {
                query.push(c);
                continue;
            }
            let Some(arg) = self.args.get(i) else {
                self.count_mismatch();
            };
            match arg {
                Arg::List(items) if items.is_empty() => query.push_str("NULL"),
                Arg::List(items) => {
                    query.push_str(&create_sql_in_marks(items.len()));
                    args.extend(items.iter().cloned());
                }
                arg => {
                    query.push('?');
                    args.push(arg.clone());
                }
            }
            i += 1;
        }
        if i != self.args.len() {
            self.count_mismatch();
        }
        (query, args)
    }

    fn count_mismatch(&self) -> ! {
        panic!(
            "where args count mismatch: `{}` has {} placeholders but {} args were given",
            self.query,
            self.query.matches('?').count(),
            self.args.len()
        )
    }
}

/// `?,?,?` for `n` = 3.
pub fn create_sql_in_marks(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: Where,
}

#[derive(Debug, Clone, PartialEq)]
enum Assignment {
    Value(Arg),
    Expr(Expr),
}

fn order_by_regex() -> &'static regex::Regex {
    static RE_ORDER_BY: OnceLock<regex::Regex> = OnceLock::new();
    RE_ORDER_BY
        .get_or_init(|| regex::Regex::new(r"^ *((\w+\.)?(\w+)) *(\w+)? *$").expect("Invalid regex"))
}

/// An SQL statement under construction. Nothing is executed: the `*_sql`
///  methods produce a query and its arguments for whatever driver is in use.
///
/// ```
/// use sqlfilter::{args, stmt::Stmt};
///
/// let (query, args) = Stmt::new()
///     .from("users")
///     .where_("name IN (?)", args![vec!["tao", "yang"]])
///     .limit(10)
///     .select_sql()
///     .unwrap();
/// assert_eq!(query, "SELECT * FROM users WHERE (name IN (?,?)) LIMIT 10 OFFSET 0");
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Stmt {
    raw: Option<Where>,
    tables: Vec<String>,
    joins: Vec<Join>,
    fields: Vec<String>,
    ands: Vec<Where>,
    updates: Vec<(String, Assignment)>,
    group_by: String,
    having: String,
    order_by: String,
    limit: i64,
    offset: i64,
}

impl Stmt {
    pub fn new() -> Self {
        Self::default()
    }

    /// A statement that is used verbatim by [Stmt::select_sql].
    pub fn raw(query: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            raw: Some(Where::new(query, args)),
            ..Self::default()
        }
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    /// Comma separated field list; may be called more than once.
    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.fields.push(fields.into());
        self
    }

    pub fn inner_join(self, table: impl Into<String>, on: impl Into<String>, args: Vec<Arg>) -> Self {
        self.join(JoinKind::Inner, table, on, args)
    }

    pub fn left_join(self, table: impl Into<String>, on: impl Into<String>, args: Vec<Arg>) -> Self {
        self.join(JoinKind::Left, table, on, args)
    }

    pub fn right_join(self, table: impl Into<String>, on: impl Into<String>, args: Vec<Arg>) -> Self {
        self.join(JoinKind::Right, table, on, args)
    }

    fn join(
        mut self,
        kind: JoinKind,
        table: impl Into<String>,
        on: impl Into<String>,
        args: Vec<Arg>,
    ) -> Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on: Where::new(on, args),
        });
        self
    }

    pub fn where_(mut self, query: impl Into<String>, args: Vec<Arg>) -> Self {
        self.ands.push(Where::new(query, args));
        self
    }

    pub fn where_if(self, cond: bool, query: impl Into<String>, args: Vec<Arg>) -> Self {
        if cond { self.where_(query, args) } else { self }
    }

    /// Compiles a filter string and adds it as a where clause. A filter that
    ///  compiles to nothing adds nothing.
    pub fn filter<F: Fielder + ?Sized>(
        self,
        fielder: &F,
        source: &str,
        mapper: &Mapper,
    ) -> Result<Self, Error> {
        let (query, args) = filter(fielder, source, mapper)?;
        Ok(self.where_if(!query.is_empty(), query, args))
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = group_by.into();
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = having.into();
        self
    }

    /// Validated when the statement is built.
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// `SET column = ?` for [Stmt::update_sql].
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.updates.push((column.into(), Assignment::Value(value.into())));
        self
    }

    /// `SET column = <expr>` for [Stmt::update_sql].
    pub fn set_expr(mut self, column: impl Into<String>, expr: Expr) -> Self {
        self.updates.push((column.into(), Assignment::Expr(expr)));
        self
    }

    pub fn select_sql(&self) -> Result<(String, Vec<Arg>), Error> {
        self.build_select(false)
    }

    pub fn count_sql(&self) -> Result<(String, Vec<Arg>), Error> {
        self.build_select(true)
    }

    /// Refuses to update every row unless [anyway] is set.
    pub fn update_sql(&self, anyway: bool) -> Result<(String, Vec<Arg>), Error> {
        self.check_writable(anyway)?;
        if self.updates.is_empty() {
            return Err(Error::NoFields);
        }

        let mut args = Vec::new();
        let sets: Vec<String> = self
            .updates
            .iter()
            .map(|(column, value)| match value {
                Assignment::Value(v) => {
                    args.push(v.clone());
                    format!("{column}=?")
                }
                Assignment::Expr(e) => {
                    let (q, a) = e.build();
                    args.extend(a);
                    format!("{column}={q}")
                }
            })
            .collect();

        let mut query = format!("UPDATE {} SET {}", self.tables.join(","), sets.join(","));
        self.push_wheres(&mut query, &mut args);
        self.push_limit(&mut query);
        Ok(logged(query, args))
    }

    /// Refuses to delete every row unless [anyway] is set.
    pub fn delete_sql(&self, anyway: bool) -> Result<(String, Vec<Arg>), Error> {
        self.check_writable(anyway)?;
        let mut args = Vec::new();
        let mut query = format!("DELETE FROM {}", self.tables.join(","));
        self.push_wheres(&mut query, &mut args);
        self.push_limit(&mut query);
        Ok(logged(query, args))
    }

    fn check_writable(&self, anyway: bool) -> Result<(), Error> {
        if self.raw.is_some() {
            return Err(Error::RawNotAllowed);
        }
        if self.tables.is_empty() {
            return Err(Error::NoTable);
        }
        if self.ands.is_empty() && !anyway {
            return Err(Error::NoWhere);
        }
        Ok(())
    }

    fn build_select(&self, count: bool) -> Result<(String, Vec<Arg>), Error> {
        if let Some(raw) = &self.raw {
            let (query, args) = raw.build();
            return Ok(logged(query, args));
        }
        let Some(first) = self.tables.first() else {
            return Err(Error::NoTable);
        };

        let fields = if count {
            "COUNT(1)".to_string()
        } else if self.fields.is_empty() {
            if self.joins.is_empty() {
                "*".to_string()
            } else {
                format!("{first}.*")
            }
        } else if self.joins.is_empty() || self.fields == ["*"] {
            self.fields.join(",")
        } else {
            self.fields
                .iter()
                .flat_map(|list| list.split(','))
                .map(|field| {
                    if field.contains('.') {
                        field.to_string()
                    } else {
                        format!("{first}.{field}")
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        };

        let mut args = Vec::new();
        let mut query = format!("SELECT {fields} FROM {}", self.tables.join(","));
        for join in &self.joins {
            let (on, a) = join.on.build();
            query.push_str(&format!(" {} {} ON {on}", join.kind.keyword(), join.table));
            args.extend(a);
        }
        self.push_wheres(&mut query, &mut args);
        if !self.group_by.is_empty() {
            query.push_str(&format!(" GROUP BY {}", self.group_by));
        }
        if !self.having.is_empty() {
            query.push_str(&format!(" HAVING {}", self.having));
        }
        if !self.order_by.is_empty() {
            for part in self.order_by.split(',') {
                if !order_by_regex().is_match(part) {
                    return Err(Error::InvalidOrderBy(part.to_string()));
                }
            }
            query.push_str(&format!(" ORDER BY {}", self.order_by));
        }
        self.push_limit(&mut query);
        Ok(logged(query, args))
    }

    fn push_wheres(&self, query: &mut String, args: &mut Vec<Arg>) {
        for (i, w) in self.ands.iter().enumerate() {
            let (q, a) = w.build();
            query.push_str(if i == 0 { " WHERE (" } else { " AND (" });
            query.push_str(&q);
            query.push(')');
            args.extend(a);
        }
    }

    fn push_limit(&self, query: &mut String) {
        if self.limit > 0 {
            query.push_str(&format!(" LIMIT {}", self.limit));
            if self.offset >= 0 {
                query.push_str(&format!(" OFFSET {}", self.offset));
            }
        }
    }
}

fn logged(query: String, args: Vec<Arg>) -> (String, Vec<Arg>) {
    tracing::debug!(sql = %to_sql_string(&query, &args), "built statement");
    (query, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{args, ast::Kind, filter::Columns};

    fn users() -> Stmt {
        Stmt::new().from("users")
    }

    #[test]
    fn expansion() {
        let w = Where::new("name IN (?) AND id=?", args![vec!["a", "b", "c"], 7]);
        let (query, args) = w.build();
        assert_eq!(query, "name IN (?,?,?) AND id=?");
        assert_eq!(args, args!["a", "b", "c", 7]);
    }

    #[test]
    fn empty_list_expands_to_null() {
        let (query, args) = Where::new("id IN (?)", args![Vec::<i32>::new()]).build();
        assert_eq!(query, "id IN (NULL)");
        assert!(args.is_empty());
    }

    #[test]
    fn bytes_are_not_expanded() {
        let (query, args) = Where::new("data=?", args![&b"abc"[..]]).build();
        assert_eq!(query, "data=?");
        assert_eq!(args, vec![Arg::Bytes(b"abc".to_vec())]);
    }

    #[test]
    fn byte_vectors_are_not_expanded() {
        let (query, args) = Where::new("data=? AND id IN (?)", args![vec![1u8, 2, 3], vec![4, 5]]).build();
        assert_eq!(query, "data=? AND id IN (?,?)");
        assert_eq!(args, vec![Arg::Bytes(vec![1, 2, 3]), Arg::Int(4), Arg::Int(5)]);
    }

    #[test]
    #[should_panic(expected = "where args count mismatch")]
    fn too_few_args() {
        Where::new("a=? AND b=?", args![1]).build();
    }

    #[test]
    #[should_panic(expected = "where args count mismatch")]
    fn too_many_args() {
        Where::new("a=?", args![1, 2]).build();
    }

    #[test]
    fn marks() {
        assert_eq!(create_sql_in_marks(1), "?");
        assert_eq!(create_sql_in_marks(3), "?,?,?");
    }

    #[test]
    fn select() {
        let (query, args) = users()
            .select("id,name")
            .where_("id=?", args![1])
            .where_("age>?", args![18])
            .group_by("name")
            .having("COUNT(1)>1")
            .order_by("id desc, name")
            .limit(10)
            .offset(20)
            .select_sql()
            .unwrap();
        assert_eq!(
            query,
            "SELECT id,name FROM users WHERE (id=?) AND (age>?) GROUP BY name HAVING COUNT(1)>1 ORDER BY id desc, name LIMIT 10 OFFSET 20"
        );
        assert_eq!(args, args![1, 18]);
    }

    #[test]
    fn select_in() {
        let stmt = users().where_("name IN (?)", args![vec!["tao", "yang"]]);
        assert_eq!(
            stmt.select_sql().unwrap().0,
            "SELECT * FROM users WHERE (name IN (?,?))"
        );
        let (query, args) = stmt.select_sql().unwrap();
        assert_eq!(
            to_sql_string(&query, &args),
            "SELECT * FROM users WHERE (name IN ('tao','yang'))"
        );
    }

    #[test]
    fn count() {
        let (query, _) = users().where_("age>?", args![1]).count_sql().unwrap();
        assert_eq!(query, "SELECT COUNT(1) FROM users WHERE (age>?)");
    }

    #[test]
    fn joins_qualify_fields() {
        let stmt = users().inner_join("posts", "posts.user_id=users.id AND posts.kind=?", args![2]);
        assert_eq!(
            stmt.select_sql().unwrap(),
            (
                "SELECT users.* FROM users INNER JOIN posts ON posts.user_id=users.id AND posts.kind=?".into(),
                args![2]
            )
        );
        let (query, _) = stmt.clone().select("id,posts.title").select_sql().unwrap();
        assert_eq!(
            query,
            "SELECT users.id,posts.title FROM users INNER JOIN posts ON posts.user_id=users.id AND posts.kind=?"
        );
        let (query, _) = stmt.select("*").left_join("tags", "tags.id=posts.tag_id", vec![]).select_sql().unwrap();
        assert_eq!(
            query,
            "SELECT * FROM users INNER JOIN posts ON posts.user_id=users.id AND posts.kind=? LEFT JOIN tags ON tags.id=posts.tag_id"
        );
    }

    #[test]
    fn where_if() {
        let (query, _) = users()
            .where_if(false, "a=?", args![1])
            .where_if(true, "b=?", args![2])
            .select_sql()
            .unwrap();
        assert_eq!(query, "SELECT * FROM users WHERE (b=?)");
    }

    #[test]
    fn invalid_order_by() {
        assert_eq!(
            users().order_by("id; DROP TABLE users").select_sql(),
            Err(Error::InvalidOrderBy("id; DROP TABLE users".into()))
        );
        assert!(users().order_by("users.id DESC").select_sql().is_ok());
    }

    #[test]
    fn raw() {
        let stmt = Stmt::raw("SELECT * FROM users WHERE id IN (?)", args![vec![1, 2]]);
        assert_eq!(
            stmt.select_sql().unwrap().0,
            "SELECT * FROM users WHERE id IN (?,?)"
        );
        assert_eq!(stmt.delete_sql(true), Err(Error::RawNotAllowed));
        assert_eq!(stmt.update_sql(true), Err(Error::RawNotAllowed));
    }

    #[test]
    fn no_table() {
        assert_eq!(Stmt::new().select_sql(), Err(Error::NoTable));
        assert_eq!(Stmt::new().delete_sql(true), Err(Error::NoTable));
    }

    #[test]
    fn update() {
        let (query, args) = users()
            .set("name", "tao")
            .set_expr("hits", expr("hits+?", args![1]))
            .where_("id=?", args![3])
            .update_sql(false)
            .unwrap();
        assert_eq!(query, "UPDATE users SET name=?,hits=hits+? WHERE (id=?)");
        assert_eq!(args, args!["tao", 1, 3]);

        assert_eq!(users().set("a", 1).update_sql(false), Err(Error::NoWhere));
        assert_eq!(
            users().set("a", 1).limit(5).update_sql(true).unwrap().0,
            "UPDATE users SET a=? LIMIT 5 OFFSET 0"
        );
        assert_eq!(users().update_sql(true), Err(Error::NoFields));
    }

    #[test]
    fn delete() {
        assert_eq!(users().delete_sql(false), Err(Error::NoWhere));
        assert_eq!(users().delete_sql(true).unwrap().0, "DELETE FROM users");
        assert_eq!(
            users().where_("id=?", args![1]).delete_sql(false).unwrap(),
            ("DELETE FROM users WHERE (id=?)".into(), args![1])
        );
    }

    #[test]
    fn with_filter() {
        let columns = Columns::new().with("name", Kind::String).with("age", Kind::Number);
        let mapper = Mapper::new();
        let (query, args) = users()
            .where_("deleted=?", args![false])
            .filter(&columns, "name=@tao;age>18,age<10", &mapper)
            .unwrap()
            .select_sql()
            .unwrap();
        assert_eq!(
            query,
            "SELECT * FROM users WHERE (deleted=?) AND ((name LIKE ?) AND (age > ? OR age < ?))"
        );
        assert_eq!(args, args![0, "%tao%", 18, 10]);

        let (query, _) = users().filter(&columns, "", &mapper).unwrap().select_sql().unwrap();
        assert_eq!(query, "SELECT * FROM users");

        assert!(matches!(
            users().filter(&columns, "color==red", &mapper),
            Err(Error::Filter(FilterError::UnknownField(_)))
        ));
    }
}
