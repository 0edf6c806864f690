//! Compiles arithmetic and boolean expressions into algebraic decision
//! diagrams (ADDs).
//!
//! # Why?
//!
//! An ADD represents a real-valued function of many boolean variables as a
//! shared, canonical graph. Compiling `x * y + 2` against ADD-valued `x` and
//! `y` computes the expression for _every_ variable assignment at once,
//! without enumerating assignments: each operator becomes a structural
//! combination of two diagrams.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use add_expr::*;
//!
//! let manager = DiagramManager::<f64>::new();
//! let solver = ExpressionSolver::new(&manager);
//!
//! // A 0/1 diagram over the decision variables `fast` and `cheap`.
//! let guard = solver.encode_formula("fast && !cheap").unwrap();
//!
//! let interpretation = HashMap::from([
//!     ("guard".to_string(), guard),
//!     ("cost".to_string(), manager.constant(40.0)),
//! ]);
//! let total = solver
//!     .solve_expression("cost * (1 + guard / 2)", &interpretation)
//!     .unwrap();
//!
//! let premium = manager.assignment([("fast", true), ("cheap", false)]);
//! let basic = manager.assignment([("fast", true), ("cheap", true)]);
//! assert_eq!(manager.evaluate(total, &premium), 60.0);
//! assert_eq!(manager.evaluate(total, &basic), 40.0);
//! ```

mod diagram;
mod dot;
mod error;
mod evaluate;
mod expression;
pub mod operators;
mod parse;
mod resolve;
mod solver;

/// Uses the [`pest`] parsing expression grammar language.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use diagram::{BinaryOp, Diagram, DiagramManager};
pub use error::{CompileError, SyntaxError};
pub use evaluate::Vocabulary;
pub use expression::*;
pub use parse::MAX_NESTING_DEPTH;
pub use resolve::{resolve, BindingMode, Bindings};
pub use solver::ExpressionSolver;

/// Terminal value types a [`DiagramManager`] can hold.
pub trait FloatExt:
    num_traits::Float + std::str::FromStr + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
}
impl FloatExt for f32 {}
impl FloatExt for f64 {}
