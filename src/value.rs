use chrono::NaiveDateTime;

/// A value bound to a `?` placeholder.
///
/// Booleans have no variant of their own: they are stored as one-byte
///  integer columns, so `From<bool>` produces `Int(1)` or `Int(0)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Str(String),
    /// Bound as a single value, never expanded like a [Arg::List].
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Null,
    /// Expands its placeholder into one `?` per element.
    List(Vec<Arg>),
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::Int(v.into())
            }
        })*
    };
}

// No `u8`: byte vectors are `Bytes`, not lists of integers
from_int!(i8, i16, i32, i64, u16, u32);

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Int(if v { 1 } else { 0 })
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Arg::Float(v.into())
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<&[u8]> for Arg {
    fn from(v: &[u8]) -> Self {
        Arg::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(v: Vec<u8>) -> Self {
        Arg::Bytes(v)
    }
}

impl From<NaiveDateTime> for Arg {
    fn from(v: NaiveDateTime) -> Self {
        Arg::DateTime(v)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(v: Vec<T>) -> Self {
        Arg::List(v.into_iter().map(Into::into).collect())
    }
}

/// Builds a `Vec<Arg>` from heterogeneous values: `args![1, "tao", vec![1, 2]]`.
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::value::Arg::from($arg)),*]
    };
}
