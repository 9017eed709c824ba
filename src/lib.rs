//! Compiles user supplied filter strings such as `name=@tao;age>18,age<10`
//!  into parameterized SQL `WHERE` fragments, and assembles statements around
//!  them.

pub mod ast;
pub mod error;
pub mod filter;
pub mod lex;
pub mod mapper;
pub mod parser;
pub mod stmt;
pub mod to_sql;
pub mod value;


pub use ast::{Kind, Operator};
pub use error::Error;
pub use filter::{Columns, Fielder, Filter, filter};
pub use mapper::{Mapper, MapperKind};
pub use parser::{SyntaxError, parse};
pub use stmt::{Stmt, Where, expr};
pub use value::Arg;
