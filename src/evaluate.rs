use crate::diagram::{Diagram, DiagramManager};
use crate::error::CompileError;
use crate::expression::{Expression, Operator};
use crate::operators;
use crate::resolve::Bindings;
use crate::FloatExt;

/// Operators an evaluation is willing to dispatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Vocabulary {
    /// Arithmetic and logic.
    Full,
    /// Only `&&`, `||` and `!`.
    Propositional,
}

impl Vocabulary {
    fn allows(self, op: Operator) -> bool {
        match self {
            Self::Full => true,
            Self::Propositional => op.is_boolean(),
        }
    }
}

enum Step<'e, Real> {
    Visit(&'e Expression<Real>),
    Combine(Operator),
}

impl<Real: FloatExt> Expression<Real> {
    /// Builds the diagram of this tree bottom-up.
    ///
    /// Leaves become constants or their bound diagrams; each operator node is
    /// checked against its arity and then combined from the diagrams of its
    /// operands. Nodes are visited left to right from an explicit stack, so
    /// the depth of the tree is not limited by the call stack.
    pub fn evaluate(
        &self,
        manager: &DiagramManager<Real>,
        bindings: &Bindings,
        vocabulary: Vocabulary,
    ) -> Result<Diagram, CompileError> {
        let mut steps = vec![Step::Visit(self)];
        let mut values: Vec<Diagram> = Vec::new();

        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(Self::Literal(value)) => values.push(manager.constant(*value)),
                Step::Visit(Self::Variable(name)) => {
                    let bound = bindings
                        .get(name)
                        .copied()
                        .ok_or_else(|| CompileError::UnresolvedVariables(vec![name.clone()]))?;
                    values.push(bound);
                }
                Step::Visit(Self::Apply(op, operands)) => {
                    if !vocabulary.allows(*op) {
                        return Err(CompileError::OperatorNotAllowed { operator: *op });
                    }
                    if operands.len() != op.arity() {
                        return Err(CompileError::ArityMismatch {
                            operator: *op,
                            expected: op.arity(),
                            found: operands.len(),
                        });
                    }
                    steps.push(Step::Combine(*op));
                    steps.extend(operands.iter().rev().map(Step::Visit));
                }
                Step::Combine(op) => {
                    let result = match op {
                        Operator::Add => evaluate_binary_op(operators::add, &mut values, manager),
                        Operator::Subtract => {
                            evaluate_binary_op(operators::subtract, &mut values, manager)
                        }
                        Operator::Multiply => {
                            evaluate_binary_op(operators::multiply, &mut values, manager)
                        }
                        Operator::Divide => {
                            evaluate_binary_op(operators::divide, &mut values, manager)
                        }
                        Operator::And => evaluate_binary_op(operators::and, &mut values, manager),
                        Operator::Or => evaluate_binary_op(operators::or, &mut values, manager),
                        Operator::Negate => {
                            evaluate_unary_op(operators::negate, &mut values, manager)
                        }
                        Operator::Not => evaluate_unary_op(operators::not, &mut values, manager),
                    };
                    values.push(result);
                }
            }
        }

        match (values.pop(), values.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => unreachable!("a checked tree leaves exactly one value"),
        }
    }
}

// Operands were pushed left to right by the visits the arity check allowed,
// so the rightmost operand is on top of `values`.

fn evaluate_binary_op<Real: FloatExt>(
    op: fn(&DiagramManager<Real>, Diagram, Diagram) -> Diagram,
    values: &mut Vec<Diagram>,
    manager: &DiagramManager<Real>,
) -> Diagram {
    match (values.pop(), values.pop()) {
        (Some(rhs), Some(lhs)) => op(manager, lhs, rhs),
        _ => unreachable!("binary operator without two operands"),
    }
}

fn evaluate_unary_op<Real: FloatExt>(
    op: fn(&DiagramManager<Real>, Diagram) -> Diagram,
    values: &mut Vec<Diagram>,
    manager: &DiagramManager<Real>,
) -> Diagram {
    match values.pop() {
        Some(only) => op(manager, only),
        None => unreachable!("unary operator without an operand"),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn arity_is_checked_before_dispatch() {
        let manager = DiagramManager::<f64>::new();
        let bindings = Bindings::new();

        let tree = Expression::Apply(
            Operator::Add,
            vec![
                Expression::Literal(1.0),
                Expression::Literal(2.0),
                Expression::Literal(3.0),
            ],
        );
        assert_eq!(
            tree.evaluate(&manager, &bindings, Vocabulary::Full),
            Err(CompileError::ArityMismatch {
                operator: Operator::Add,
                expected: 2,
                found: 3,
            })
        );

        let nested = Expression::unary(
            Operator::Negate,
            Expression::Apply(Operator::Not, vec![]),
        );
        assert_eq!(
            nested.evaluate(&manager, &bindings, Vocabulary::Full),
            Err(CompileError::ArityMismatch {
                operator: Operator::Not,
                expected: 1,
                found: 0,
            })
        );
    }

    #[test]
    fn propositional_vocabulary_rejects_arithmetic() {
        let manager = DiagramManager::<f64>::new();
        let bindings = Bindings::new();

        let tree = Expression::unary(
            Operator::Not,
            Expression::binary(
                Operator::Multiply,
                Expression::Literal(1.0),
                Expression::Literal(0.0),
            ),
        );
        assert_eq!(
            tree.evaluate(&manager, &bindings, Vocabulary::Propositional),
            Err(CompileError::OperatorNotAllowed {
                operator: Operator::Multiply
            })
        );
        assert_eq!(
            tree.evaluate(&manager, &bindings, Vocabulary::Full),
            Ok(manager.one())
        );
    }

    #[test]
    fn leaves_use_bindings_and_constants() {
        let manager = DiagramManager::<f64>::new();
        let p = manager.get_or_create_variable("p");
        let bindings = Bindings::from([("x".to_string(), p)]);

        let tree = Expression::binary(
            Operator::Multiply,
            Expression::variable("x"),
            Expression::Literal(4.0),
        );
        let result = tree.evaluate(&manager, &bindings, Vocabulary::Full).unwrap();
        assert_eq!(
            manager.evaluate(result, &manager.assignment([("p", true)])),
            4.0
        );
        assert_eq!(
            manager.evaluate(result, &manager.assignment([("p", false)])),
            0.0
        );

        let unbound = Expression::<f64>::variable("y");
        assert_eq!(
            unbound.evaluate(&manager, &bindings, Vocabulary::Full),
            Err(CompileError::UnresolvedVariables(vec!["y".to_string()]))
        );
    }

    #[test]
    fn operands_are_combined_in_order() {
        let manager = DiagramManager::<f64>::new();
        let bindings = Bindings::new();

        // (10 - 4) / (1 - 3)
        let tree = Expression::binary(
            Operator::Divide,
            Expression::binary(
                Operator::Subtract,
                Expression::Literal(10.0),
                Expression::Literal(4.0),
            ),
            Expression::binary(
                Operator::Subtract,
                Expression::Literal(1.0),
                Expression::Literal(3.0),
            ),
        );
        let result = tree.evaluate(&manager, &bindings, Vocabulary::Full).unwrap();
        assert_eq!(manager.value(result), Some(-3.0));
    }

    #[test]
    fn deep_left_chains_evaluate() {
        let manager = DiagramManager::<f64>::new();
        let bindings = Bindings::new();

        let mut tree = Expression::Literal(0.0);
        for _ in 0..50_000 {
            tree = Expression::binary(Operator::Subtract, tree, Expression::Literal(1.0));
        }
        let negated = Expression::unary(Operator::Negate, tree);
        let result = negated
            .evaluate(&manager, &bindings, Vocabulary::Full)
            .unwrap();
        assert_eq!(manager.value(result), Some(50_000.0));
    }

    #[test]
    fn errors_surface_in_left_to_right_order() {
        let manager = DiagramManager::<f64>::new();
        let bindings = Bindings::new();

        let tree = Expression::binary(
            Operator::Add,
            Expression::variable("missing"),
            Expression::Apply(Operator::Not, vec![]),
        );
        assert_eq!(
            tree.evaluate(&manager, &bindings, Vocabulary::Full),
            Err(CompileError::UnresolvedVariables(vec!["missing".to_string()]))
        );
    }
}
