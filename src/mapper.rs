use std::{any::Any, collections::HashMap, fmt::Debug};

use crate::{
    ast::{ClauseValue, Expression, Operator, ValueKind},
    error::Error,
    value::Arg,
};

/// Enum name to enum value, e.g. `{"draft": 0, "published": 1}`.
pub type EnumTable = HashMap<String, i32>;

pub type StrFn<T> = Box<dyn Fn(&str) -> T + Send + Sync>;
pub type IntFn<T> = Box<dyn Fn(i64) -> T + Send + Sync>;
pub type TableFn<T> = Box<dyn Fn() -> T + Send + Sync>;
pub type OperatorFn<T> = Box<dyn Fn(Operator, &str) -> T + Send + Sync>;

/// A per-field customization. The variant decides what the clause's raw
///  value is handed to and what comes back; variants returning a `String`
///  first rename the clause to that column.
pub enum MapperKind {
    /// (strval) => (strval)
    StrToStr(StrFn<String>),
    /// (strval) => (key, strval)
    StrToNamedStr(StrFn<(String, String)>),
    /// (strval) => (intval)
    StrToInt(StrFn<i64>),
    /// (strval) => (key, intval)
    StrToNamedInt(StrFn<(String, i64)>),
    /// (strval) => (boolval)
    StrToBool(StrFn<bool>),
    /// (strval) => (key, boolval)
    StrToNamedBool(StrFn<(String, bool)>),
    /// (intval) => (intval)
    IntToInt(IntFn<i64>),
    /// (intval) => (key, intval)
    IntToNamedInt(IntFn<(String, i64)>),
    /// The raw value is looked up in the table.
    Enum(EnumTable),
    /// () => (enum)
    EnumFn(TableFn<EnumTable>),
    /// () => (key, enum)
    NamedEnumFn(TableFn<(String, EnumTable)>),
    /// (enumItem) => (enumItem, enum)
    EnumItem(StrFn<(String, EnumTable)>),
    /// (enumItem) => (key, enumItem, enum)
    NamedEnumItem(StrFn<(String, String, EnumTable)>),
    /// (operator, strval) => (query, args): replaces the clause's SQL.
    Override(OperatorFn<(String, Vec<Arg>)>),
    /// (operator, strval) => (): drops the clause.
    Skip(OperatorFn<()>),
}

/// What happened to a clause after its mapper ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The clause still needs to be rendered (it may have been overridden).
    Keep,
    Skip,
}

impl MapperKind {
    pub fn str_to_str(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::StrToStr(Box::new(f))
    }
    pub fn str_to_named_str(f: impl Fn(&str) -> (String, String) + Send + Sync + 'static) -> Self {
        Self::StrToNamedStr(Box::new(f))
    }
    pub fn str_to_int(f: impl Fn(&str) -> i64 + Send + Sync + 'static) -> Self {
        Self::StrToInt(Box::new(f))
    }
    pub fn str_to_named_int(f: impl Fn(&str) -> (String, i64) + Send + Sync + 'static) -> Self {
        Self::StrToNamedInt(Box::new(f))
    }
    pub fn str_to_bool(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::StrToBool(Box::new(f))
    }
    pub fn str_to_named_bool(f: impl Fn(&str) -> (String, bool) + Send + Sync + 'static) -> Self {
        Self::StrToNamedBool(Box::new(f))
    }
    pub fn int_to_int(f: impl Fn(i64) -> i64 + Send + Sync + 'static) -> Self {
        Self::IntToInt(Box::new(f))
    }
    pub fn int_to_named_int(f: impl Fn(i64) -> (String, i64) + Send + Sync + 'static) -> Self {
        Self::IntToNamedInt(Box::new(f))
    }
    pub fn enum_table<K: Into<String>>(entries: impl IntoIterator<Item = (K, i32)>) -> Self {
        Self::Enum(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
    pub fn enum_fn(f: impl Fn() -> EnumTable + Send + Sync + 'static) -> Self {
        Self::EnumFn(Box::new(f))
    }
    pub fn named_enum_fn(f: impl Fn() -> (String, EnumTable) + Send + Sync + 'static) -> Self {
        Self::NamedEnumFn(Box::new(f))
    }
    pub fn enum_item(f: impl Fn(&str) -> (String, EnumTable) + Send + Sync + 'static) -> Self {
        Self::EnumItem(Box::new(f))
    }
    pub fn named_enum_item(
        f: impl Fn(&str) -> (String, String, EnumTable) + Send + Sync + 'static,
    ) -> Self {
        Self::NamedEnumItem(Box::new(f))
    }
    pub fn override_with(
        f: impl Fn(Operator, &str) -> (String, Vec<Arg>) + Send + Sync + 'static,
    ) -> Self {
        Self::Override(Box::new(f))
    }
    pub fn skip(f: impl Fn(Operator, &str) + Send + Sync + 'static) -> Self {
        Self::Skip(Box::new(f))
    }

    /// Recovers a mapper from a type-erased value. Only the boxed callable
    ///  aliases of this module ([StrFn], [IntFn], [TableFn], [OperatorFn]
    ///  with the return types of the variants) and [EnumTable] are recognized;
    ///  anything else is handed back.
    pub fn from_any(
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<Self, Box<dyn Any + Send + Sync>> {
        macro_rules! try_shapes {
            ($value:ident, $($ty:ty => $variant:ident),* $(,)?) => {
                $(
                    let $value = match $value.downcast::<$ty>() {
                        Ok(f) => return Ok(Self::$variant(*f)),
                        Err(v) => v,
                    };
                )*
            };
        }
        try_shapes!(
            value,
            StrFn<String> => StrToStr,
            StrFn<(String, String)> => StrToNamedStr,
            StrFn<i64> => StrToInt,
            StrFn<(String, i64)> => StrToNamedInt,
            StrFn<bool> => StrToBool,
            StrFn<(String, bool)> => StrToNamedBool,
            IntFn<i64> => IntToInt,
            IntFn<(String, i64)> => IntToNamedInt,
            EnumTable => Enum,
            TableFn<EnumTable> => EnumFn,
            TableFn<(String, EnumTable)> => NamedEnumFn,
            StrFn<(String, EnumTable)> => EnumItem,
            StrFn<(String, String, EnumTable)> => NamedEnumItem,
            OperatorFn<(String, Vec<Arg>)> => Override,
            OperatorFn<()> => Skip,
        );
        Err(value)
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Self::StrToStr(_) => "(strval) => (strval)",
            Self::StrToNamedStr(_) => "(strval) => (key, strval)",
            Self::StrToInt(_) => "(strval) => (intval)",
            Self::StrToNamedInt(_) => "(strval) => (key, intval)",
            Self::StrToBool(_) => "(strval) => (boolval)",
            Self::StrToNamedBool(_) => "(strval) => (key, boolval)",
            Self::IntToInt(_) => "(intval) => (intval)",
            Self::IntToNamedInt(_) => "(intval) => (key, intval)",
            Self::Enum(_) => "enum",
            Self::EnumFn(_) => "() => (enum)",
            Self::NamedEnumFn(_) => "() => (key, enum)",
            Self::EnumItem(_) => "(enumItem) => (enumItem, enum)",
            Self::NamedEnumItem(_) => "(enumItem) => (key, enumItem, enum)",
            Self::Override(_) => "(operator, strval) => (query, args)",
            Self::Skip(_) => "(operator, strval) => ()",
        }
    }

    /// Runs the mapper against [expr]'s raw value.
    pub fn apply(&self, expr: &mut Expression) -> Result<Outcome, Error> {
        // Already typed? No matter who did it, leave it be.
        let ClauseValue::Raw(raw) = &expr.value else {
            return Ok(Outcome::Keep);
        };
        let raw = raw.clone();

        let parse_int = |expr: &Expression| {
            raw.parse::<i64>().map_err(|_| Error::BadConversion {
                field: expr.name.clone(),
                value: raw.clone(),
                from: ValueKind::Raw,
                to: ValueKind::Number,
            })
        };

        match self {
            Self::StrToStr(f) => expr.set_string(f(&raw)),
            Self::StrToNamedStr(f) => {
                let (key, val) = f(&raw);
                expr.set_name(key);
                expr.set_string(val);
            }
            Self::StrToInt(f) => expr.set_number(f(&raw)),
            Self::StrToNamedInt(f) => {
                let (key, val) = f(&raw);
                expr.set_name(key);
                expr.set_number(val);
            }
            Self::StrToBool(f) => expr.set_boolean(f(&raw)),
            Self::StrToNamedBool(f) => {
                let (key, val) = f(&raw);
                expr.set_name(key);
                expr.set_boolean(val);
            }
            Self::IntToInt(f) => {
                let num = parse_int(expr)?;
                expr.set_number(f(num));
            }
            Self::IntToNamedInt(f) => {
                let num = parse_int(expr)?;
                let (key, val) = f(num);
                expr.set_name(key);
                expr.set_number(val);
            }
            Self::Enum(table) => {
                let val = lookup(&expr.name, table, &raw)?;
                expr.set_number(val);
            }
            Self::EnumFn(f) => {
                let val = lookup(&expr.name, &f(), &raw)?;
                expr.set_number(val);
            }
            Self::NamedEnumFn(f) => {
                let (key, table) = f();
                let val = lookup(&key, &table, &raw)?;
                expr.set_name(key);
                expr.set_number(val);
            }
            Self::EnumItem(f) => {
                let (item, table) = f(&raw);
                let val = lookup(&expr.name, &table, &item)?;
                expr.set_number(val);
            }
            Self::NamedEnumItem(f) => {
                let (key, item, table) = f(&raw);
                let val = lookup(&key, &table, &item)?;
                expr.set_name(key);
                expr.set_number(val);
            }
            Self::Override(f) => {
                let (query, args) = f(expr.operator, &raw);
                expr.set_override(query, args);
            }
            Self::Skip(f) => {
                f(expr.operator, &raw);
                return Ok(Outcome::Skip);
            }
        }
        Ok(Outcome::Keep)
    }
}

impl Debug for MapperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MapperKind").field(&self.shape()).finish()
    }
}

fn lookup(enum_name: &str, table: &EnumTable, key: &str) -> Result<i64, Error> {
    table
        .get(key)
        .map(|&v| i64::from(v))
        .ok_or_else(|| Error::EnumNotFound {
            enum_name: enum_name.to_string(),
            key: key.to_string(),
        })
}

#[derive(Debug)]
enum Slot {
    Known(MapperKind),
    /// A type-erased value of no recognized shape; reported when used.
    Unrecognized(&'static str),
}

/// Field name to [MapperKind]. Built once, then shared read-only between
///  any number of concurrent compilations.
#[derive(Debug, Default)]
pub struct Mapper {
    entries: HashMap<String, Slot>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, kind: MapperKind) -> &mut Self {
        self.entries.insert(field.into(), Slot::Known(kind));
        self
    }

    pub fn with(mut self, field: impl Into<String>, kind: MapperKind) -> Self {
        self.insert(field, kind);
        self
    }

    /// Inserts a type-erased mapper, for tables assembled from registries of
    ///  boxed callables. A value of an unrecognized type makes every filter
    ///  that uses [field] fail with [Error::UnknownMapper].
    pub fn insert_erased<T: Any + Send + Sync>(
        &mut self,
        field: impl Into<String>,
        value: T,
    ) -> &mut Self {
        let slot = match MapperKind::from_any(Box::new(value)) {
            Ok(kind) => Slot::Known(kind),
            Err(_) => Slot::Unrecognized(std::any::type_name::<T>()),
        };
        self.entries.insert(field.into(), slot);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the mapper registered for [expr]'s field, if there is one.
    pub fn apply(&self, expr: &mut Expression) -> Result<Outcome, Error> {
        match self.entries.get(&expr.name) {
            None => Ok(Outcome::Keep),
            Some(Slot::Known(kind)) => {
                tracing::trace!(field = %expr.name, shape = kind.shape(), "applying mapper");
                kind.apply(expr)
            }
            Some(Slot::Unrecognized(shape)) => Err(Error::UnknownMapper {
                field: expr.name.clone(),
                shape: *shape,
            }),
        }
    }
}
