use std::collections::HashMap;

use log::debug;

use crate::diagram::{Diagram, DiagramManager};
use crate::error::CompileError;
use crate::evaluate::Vocabulary;
use crate::expression::Expression;
use crate::resolve::{resolve, BindingMode};
use crate::FloatExt;

/// Compiles expression text into diagrams of a borrowed [`DiagramManager`].
///
/// The solver keeps no state between calls; the only identity shared across
/// compilations is the manager's variable table. A failed call leaves the
/// solver ready for the next one.
#[derive(Clone, Copy)]
pub struct ExpressionSolver<'m, Real = f64> {
    manager: &'m DiagramManager<Real>,
}

impl<'m, Real: FloatExt> ExpressionSolver<'m, Real> {
    pub fn new(manager: &'m DiagramManager<Real>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &'m DiagramManager<Real> {
        self.manager
    }

    /// Solves `expression` with its variables read from `interpretation`.
    ///
    /// Variables are algebraic values here, not decision variables: each one
    /// stands for whatever (possibly constant) diagram the caller bound it
    /// to, and the result covers every combination those diagrams encode.
    pub fn solve_expression(
        &self,
        expression: &str,
        interpretation: &HashMap<String, Diagram>,
    ) -> Result<Diagram, CompileError> {
        self.compile(expression, BindingMode::Interpretation(interpretation))
    }

    /// Shortcut for expressions without variables.
    pub fn solve_expression_without_vars(&self, expression: &str) -> Result<Diagram, CompileError> {
        self.solve_expression(expression, &HashMap::new())
    }

    /// Encodes a propositional formula over `&&`, `||` and `!` as a 0/1
    /// diagram.
    ///
    /// Every variable becomes the manager's decision variable of the same
    /// name, so a name used in several formulas always refers to one
    /// variable.
    pub fn encode_formula(&self, formula: &str) -> Result<Diagram, CompileError> {
        self.compile(formula, BindingMode::Encoding)
    }

    /// Parses, resolves and evaluates `text`.
    ///
    /// Encoding mode restricts the tree to propositional operators.
    pub fn compile(&self, text: &str, mode: BindingMode<'_>) -> Result<Diagram, CompileError> {
        let expression = Expression::parse(text).map_err(|err| {
            debug!("failed to parse {text:?}: {err}");
            CompileError::from(err)
        })?;
        debug!("parsed {text:?}");
        self.compile_tree(&expression, mode)
    }

    /// Compiles an already built tree.
    pub fn compile_tree(
        &self,
        expression: &Expression<Real>,
        mode: BindingMode<'_>,
    ) -> Result<Diagram, CompileError> {
        let vocabulary = match mode {
            BindingMode::Interpretation(_) => Vocabulary::Full,
            BindingMode::Encoding => Vocabulary::Propositional,
        };
        let names = expression.free_variable_names();
        let bindings = resolve(&names, mode, self.manager)?;
        debug!("resolved {} variable(s)", bindings.len());

        let diagram = expression
            .evaluate(self.manager, &bindings, vocabulary)
            .map_err(|err| {
                debug!("evaluation failed: {err}");
                err
            })?;
        debug!("compiled to {diagram:?} with {} node(s)", self.manager.size(diagram));
        Ok(diagram)
    }
}
