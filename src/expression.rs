use std::collections::BTreeSet;
use std::fmt;

/// The fixed operator vocabulary understood by the compiler.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operator {
    // Arithmetic.
    Add,
    Subtract,
    Negate,
    Multiply,
    Divide,

    // Logic over 0/1-valued diagrams.
    And,
    Or,
    Not,
}

impl Operator {
    /// Number of operands this operator consumes.
    pub fn arity(self) -> usize {
        match self {
            Self::Negate | Self::Not => 1,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::And | Self::Or => 2,
        }
    }

    /// Whether the operator belongs to the propositional vocabulary accepted
    /// by formula encoding.
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract | Self::Negate => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.arity() == 1 { "unary" } else { "binary" };
        write!(f, "{kind} `{}`", self.symbol())
    }
}

/// Parsed operator tree.
///
/// Operand counts are not checked when a node is built; the evaluator
/// verifies every node against [`Operator::arity`] before dispatching it, so
/// trees coming from other producers are validated the same way as parsed
/// ones.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression<Real = f64> {
    // Constant.
    Literal(Real),

    // Free variable, resolved at compile time.
    Variable(String),

    // Operator applied to its ordered operands.
    Apply(Operator, Vec<Expression<Real>>),
}

impl<Real> Expression<Real> {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn unary(op: Operator, only: Self) -> Self {
        Self::Apply(op, vec![only])
    }

    pub fn binary(op: Operator, lhs: Self, rhs: Self) -> Self {
        Self::Apply(op, vec![lhs, rhs])
    }

    /// Every variable name referenced anywhere in the tree.
    pub fn free_variable_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut pending = vec![self];
        while let Some(next) = pending.pop() {
            match next {
                Self::Literal(_) => {}
                Self::Variable(name) => {
                    if !names.contains(name) {
                        names.insert(name.clone());
                    }
                }
                Self::Apply(_, operands) => pending.extend(operands),
            }
        }
        names
    }
}

// Parsed chains are as deep as they are long, so children are released from
// a heap stack rather than by the compiler's recursive drop glue.
impl<Real> Drop for Expression<Real> {
    fn drop(&mut self) {
        let Self::Apply(_, operands) = self else {
            return;
        };
        let mut pending = std::mem::take(operands);
        while let Some(mut next) = pending.pop() {
            if let Self::Apply(_, operands) = &mut next {
                pending.append(operands);
            }
        }
    }
}
