//! One function per surface operator.
//!
//! Operators never look inside their operands; all structural work is done
//! by the [`DiagramManager`]. Operand counts are checked by the evaluator
//! before any of these is called.

use crate::diagram::{BinaryOp, Diagram, DiagramManager};
use crate::FloatExt;

pub fn add<Real: FloatExt>(manager: &DiagramManager<Real>, lhs: Diagram, rhs: Diagram) -> Diagram {
    manager.combine(BinaryOp::Add, lhs, rhs)
}

pub fn subtract<Real: FloatExt>(
    manager: &DiagramManager<Real>,
    lhs: Diagram,
    rhs: Diagram,
) -> Diagram {
    manager.combine(BinaryOp::Subtract, lhs, rhs)
}

pub fn negate<Real: FloatExt>(manager: &DiagramManager<Real>, only: Diagram) -> Diagram {
    manager.negate(only)
}

pub fn multiply<Real: FloatExt>(
    manager: &DiagramManager<Real>,
    lhs: Diagram,
    rhs: Diagram,
) -> Diagram {
    manager.combine(BinaryOp::Multiply, lhs, rhs)
}

/// Branches where `rhs` is zero evaluate to an infinity or NaN.
pub fn divide<Real: FloatExt>(
    manager: &DiagramManager<Real>,
    lhs: Diagram,
    rhs: Diagram,
) -> Diagram {
    manager.combine(BinaryOp::Divide, lhs, rhs)
}

pub fn and<Real: FloatExt>(manager: &DiagramManager<Real>, lhs: Diagram, rhs: Diagram) -> Diagram {
    manager.combine(BinaryOp::And, lhs, rhs)
}

pub fn or<Real: FloatExt>(manager: &DiagramManager<Real>, lhs: Diagram, rhs: Diagram) -> Diagram {
    manager.combine(BinaryOp::Or, lhs, rhs)
}

pub fn not<Real: FloatExt>(manager: &DiagramManager<Real>, only: Diagram) -> Diagram {
    manager.complement(only)
}
