use crate::value::Arg;
use std::fmt::{Display, Formatter, Result};

/// Dialect-specific pieces of literal rendering.
pub trait PrinterContext: std::fmt::Debug {
    fn write_string(&self, out: &mut Formatter<'_>, s: &str) -> Result;
    fn box_clone(&self) -> Box<dyn PrinterContext>;
}

impl Clone for Box<dyn PrinterContext> {
    fn clone(&self) -> Box<dyn PrinterContext> {
        self.box_clone()
    }
}

/// Escapes quotes and backslashes with a backslash, as MySQL does by default.
#[derive(Debug, Clone, Copy)]
pub struct MysqlPrinterContext;

impl PrinterContext for MysqlPrinterContext {
    fn write_string(&self, out: &mut Formatter<'_>, s: &str) -> Result {
        out.write_str("'")?;
        for c in s.chars() {
            match c {
                '\'' => out.write_str("\\'")?,
                '\\' => out.write_str("\\\\")?,
                c => write!(out, "{c}")?,
            }
        }
        out.write_str("'")
    }
    fn box_clone(&self) -> Box<dyn PrinterContext> {
        Box::new(*self)
    }
}

/// Doubles single quotes.
#[derive(Debug, Clone, Copy)]
pub struct StandardPrinterContext;

impl PrinterContext for StandardPrinterContext {
    fn write_string(&self, out: &mut Formatter<'_>, s: &str) -> Result {
        write!(out, "'{}'", s.replace('\'', "''"))
    }
    fn box_clone(&self) -> Box<dyn PrinterContext> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub context: Box<dyn PrinterContext>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            context: Box::new(MysqlPrinterContext),
        }
    }
}

/// Renders a statement with its arguments substituted in place of the
///  placeholders. Meant for logs and tests, never for execution.
pub struct Printer<T> {
    stmt: T,
    config: PrinterConfig,
}

impl<T> Printer<T> {
    pub fn new(stmt: T, config: PrinterConfig) -> Self {
        Self { stmt, config }
    }
}

pub trait ToSQL {
    fn to_sql(&self, out: &mut Formatter, conf: &PrinterConfig) -> Result;
}

impl<T> Display for Printer<T>
where
    T: ToSQL,
{
    fn fmt(&self, f: &mut Formatter) -> Result {
        self.stmt.to_sql(f, &self.config)
    }
}

impl ToSQL for Arg {
    fn to_sql(&self, out: &mut Formatter, conf: &PrinterConfig) -> Result {
        match self {
            Arg::Int(v) => write!(out, "{v}"),
            Arg::Float(v) => write!(out, "{v}"),
            Arg::Str(v) => conf.context.write_string(out, v),
            Arg::Bytes(v) => {
                out.write_str("X'")?;
                for b in v {
                    write!(out, "{b:02X}")?;
                }
                out.write_str("'")
            }
            Arg::DateTime(v) => write!(out, "'{}'", v.format("%Y-%m-%d %H:%M:%S")),
            Arg::Null => out.write_str("NULL"),
            Arg::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.write_str(",")?;
                    }
                    item.to_sql(out, conf)?;
                }
                Ok(())
            }
        }
    }
}

/// A query together with its arguments.
impl<Q, A> ToSQL for (Q, A)
where
    Q: AsRef<str>,
    A: AsRef<[Arg]>,
{
    fn to_sql(&self, out: &mut Formatter, conf: &PrinterConfig) -> Result {
        let mut args = self.1.as_ref().iter();
        for c in self.0.as_ref().chars() {
            match c {
                // Surplus placeholders are printed as is
                '?' => match args.next() {
                    Some(arg) => arg.to_sql(out, conf)?,
                    None => out.write_str("?")?,
                },
                c => write!(out, "{c}")?,
            }
        }
        Ok(())
    }
}

/// Shorthand for printing with the default (MySQL) config.
pub fn to_sql_string(query: &str, args: &[Arg]) -> String {
    Printer::new((query, args), PrinterConfig::default()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn literals() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        let args = vec![
            Arg::Int(-3),
            Arg::Float(1.5),
            Arg::Null,
            Arg::Bytes(vec![0x0a, 0xff]),
            Arg::DateTime(at),
        ];
        assert_eq!(
            to_sql_string("a=? AND b=? AND c IS ? AND d=? AND e=?", &args),
            "a=-3 AND b=1.5 AND c IS NULL AND d=X'0AFF' AND e='2024-03-09 08:05:00'"
        );
    }

    #[test]
    fn string_quoting_per_dialect() {
        let args = [Arg::from(r"it's a\b")];
        assert_eq!(to_sql_string("name=?", &args), r"name='it\'s a\\b'");

        let conf = PrinterConfig {
            context: Box::new(StandardPrinterContext),
        };
        assert_eq!(
            Printer::new(("name=?", &args[..]), conf).to_string(),
            r"name='it''s a\b'"
        );
    }

    #[test]
    fn lists_and_surplus_placeholders() {
        let args = [Arg::from(vec!["tao", "yang"])];
        assert_eq!(
            to_sql_string("name IN (?) AND id=?", &args),
            "name IN ('tao','yang') AND id=?"
        );
    }
}
