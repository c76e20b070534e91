//! # openform-expr
//!
//! Derived values for VIEWONLY fields and computed table columns.
//!
//! Expressions are written in a small, script-like language: field lookup,
//! arithmetic, string concatenation, comparison, boolean logic, the ternary
//! operator and a fixed set of conversion and `Math` functions. There is no
//! assignment, no user-defined function and no access to anything outside the
//! supplied context, so a form definition cannot run code.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated against any
//! [`ValueLookup`](openform_core::value::ValueLookup) context (the form's value
//! set or a single table row). Evaluation never fails: problems are logged and
//! yield the `NaN` sentinel.
//!
//! ## Modules
//!
//! - [`lexer`] - Source text to tokens
//! - [`parser`] - Tokens to an [`Expr`] tree
//! - [`evaluator`] - Evaluating an [`Expr`] against a context
//!
//! ## Quick Start
//!
//! ```
//! use openform_expr::Expression;
//! use serde_json::json;
//!
//! let row = json!({"quantity": "2", "price": 120});
//! let expr = Expression::parse("Number(data.quantity) * Number(data.price)").unwrap();
//! assert_eq!(expr.evaluate(&row).to_display_string(), "240");
//! ```

pub mod evaluator;
pub mod lexer;
pub mod parser;

pub use evaluator::{evaluate, evaluate_str, ExprValue, Expression};
pub use parser::{parse, BinaryOp, Expr, Function, LogicalOp, UnaryOp};
