//! csutils – small helpers for web request handlers.
//!
//! Two independent pieces make up the core:
//! * [`filename`] – turns arbitrary text into a filename that is safe on every
//!   mainstream filesystem (illegal characters, reserved device names such as
//!   `con` or `lpt1`, trailing dots and spaces).
//! * [`query`] – permissive coercion of loosely-typed query values into
//!   booleans, numbers, dates, arrays and strings, plus
//!   [`query::parse_query_object`] which applies a recursive [`shape::Shape`]
//!   to a whole mapping.
//!
//! ## Modules
//! * [`value`] – [`value::QueryValue`], the loosely-typed value the coercers
//!   read and produce.
//! * [`shape`] – field type tags and nested shape descriptors.
//! * [`dates`] – local-timezone calendar conversions.
//! * [`config`] – layered [`config::Settings`].
//!
//! ## Coercion contract
//! Coercion never fails. A value that cannot be read as the requested type is
//! [`query::Coerced::Unset`], which is kept apart from successfully parsed
//! falsy values like `false` or `0`. The empty string and the tokens
//! `undefined` and `null` always mean "not provided".
//!
//! ## Quick Start
//! ```
//! use csutils::query::{parse_query_object, parse_query_string};
//! use csutils::shape::{FieldType, Shape};
//! use csutils::value::QueryValue;
//!
//! let query = parse_query_string("page=2&archived=1&tag=a&tag=b");
//! let shape = Shape::new()
//!     .field("page", FieldType::Number)
//!     .field("archived", FieldType::Boolean)
//!     .field("tag", FieldType::Array);
//! let parsed = parse_query_object(&query, &shape);
//! assert_eq!(parsed.get("page"), Some(&QueryValue::Number(2.)));
//! assert_eq!(parsed.get("archived"), Some(&QueryValue::Bool(true)));
//!
//! use csutils::filename::{sanitize_filename, SanitizeOptions};
//! assert_eq!(sanitize_filename("con.txt", &SanitizeOptions::default()), "_con.txt");
//! ```

pub mod config;
pub mod dates;
pub mod error;
pub mod filename;
pub mod query;
pub mod shape;
pub mod value;

pub use error::{Result, UtilsError};
