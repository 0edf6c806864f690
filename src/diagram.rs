//! Algebraic decision diagrams.
//!
//! A [`DiagramManager`] owns every node. Nodes are hash-consed through a
//! unique table and reduced on creation (a branch whose two children are the
//! same diagram is never built), so for the manager's fixed variable order
//! each function has exactly one node. [`Diagram`] handles can therefore be
//! compared with `==`: equal handles are equal functions and vice versa.
//!
//! Variables are ordered by the time they are first interned. The first name
//! passed to [`DiagramManager::get_or_create_variable`] is tested at the root.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bitvec::prelude::*;
use log::{debug, trace};

#[cfg(feature = "rayon")]
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::FloatExt;

/// Handle to a node owned by a [`DiagramManager`].
///
/// Handles are only meaningful for the manager that produced them, and only
/// until that manager is [cleared](DiagramManager::clear). Passing any other
/// handle to a manager is a logic error: it may panic or denote an unrelated
/// function. [`DiagramManager::contains`] tells whether a handle is in range.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Diagram(u32);

impl Diagram {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

const ZERO: Diagram = Diagram(0);
const ONE: Diagram = Diagram(1);

/// Pointwise binary combinators supported by [`DiagramManager::combine`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
}

impl BinaryOp {
    fn compute<Real: FloatExt>(self, lhs: Real, rhs: Real) -> Real {
        match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => lhs / rhs,
            Self::And => from_bool(!lhs.is_zero() && !rhs.is_zero()),
            Self::Or => from_bool(!lhs.is_zero() || !rhs.is_zero()),
        }
    }

    fn is_commutative(self) -> bool {
        !matches!(self, Self::Subtract | Self::Divide)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum UnaryOp {
    Negate,
    Complement,
}

impl UnaryOp {
    fn compute<Real: FloatExt>(self, only: Real) -> Real {
        match self {
            Self::Negate => -only,
            Self::Complement => from_bool(only.is_zero()),
        }
    }
}

fn from_bool<Real: FloatExt>(value: bool) -> Real {
    if value {
        Real::one()
    } else {
        Real::zero()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Node<Real> {
    Terminal(Real),
    Branch {
        variable: u32,
        low: Diagram,
        high: Diagram,
    },
}

/// Unique-table key. Terminals are keyed by their exact bit pattern, so
/// `0.0` and `-0.0` stay distinct; all NaNs are collapsed beforehand.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum NodeKey {
    Terminal(u64, i16, i8),
    Branch(u32, Diagram, Diagram),
}

/// Pending work of an iterative apply: expand an operand pair, or build the
/// branch once both cofactor results sit on the result stack.
enum Step<Operands, Key> {
    Expand(Operands),
    Build { key: Key, variable: u32 },
}

pub(crate) struct Tables<Real> {
    nodes: Vec<Node<Real>>,
    // Whether every terminal below a node is the ZERO or ONE terminal.
    zero_one: Vec<bool>,
    unique: HashMap<NodeKey, Diagram>,
    binary_cache: HashMap<(BinaryOp, Diagram, Diagram), Diagram>,
    unary_cache: HashMap<(UnaryOp, Diagram), Diagram>,
    variables: HashMap<String, u32>,
    variable_names: Vec<String>,
}

impl<Real: FloatExt> Tables<Real> {
    fn new() -> Self {
        let mut tables = Self {
            nodes: vec![],
            zero_one: vec![],
            unique: HashMap::new(),
            binary_cache: HashMap::new(),
            unary_cache: HashMap::new(),
            variables: HashMap::new(),
            variable_names: vec![],
        };
        // The constants 0 and 1 always live at indices 0 and 1.
        let zero = tables.mk_terminal(Real::zero());
        let one = tables.mk_terminal(Real::one());
        debug_assert_eq!((zero, one), (ZERO, ONE));
        tables
    }

    pub(crate) fn node(&self, diagram: Diagram) -> Node<Real> {
        self.nodes[diagram.index()]
    }

    pub(crate) fn variable_name(&self, variable: u32) -> &str {
        &self.variable_names[variable as usize]
    }

    fn insert(&mut self, key: NodeKey, node: Node<Real>) -> Diagram {
        if let Some(&existing) = self.unique.get(&key) {
            return existing;
        }
        let diagram = Diagram(self.nodes.len() as u32);
        trace!("mk {diagram:?} = {node:?}");
        let zero_one = match node {
            Node::Terminal(_) => diagram == ZERO || diagram == ONE,
            Node::Branch { low, high, .. } => {
                self.zero_one[low.index()] && self.zero_one[high.index()]
            }
        };
        self.nodes.push(node);
        self.zero_one.push(zero_one);
        self.unique.insert(key, diagram);
        diagram
    }

    fn mk_terminal(&mut self, value: Real) -> Diagram {
        let value = if value.is_nan() { Real::nan() } else { value };
        let (mantissa, exponent, sign) = value.integer_decode();
        self.insert(
            NodeKey::Terminal(mantissa, exponent, sign),
            Node::Terminal(value),
        )
    }

    fn mk_branch(&mut self, variable: u32, low: Diagram, high: Diagram) -> Diagram {
        if low == high {
            return low;
        }
        self.insert(
            NodeKey::Branch(variable, low, high),
            Node::Branch {
                variable,
                low,
                high,
            },
        )
    }

    fn intern_variable(&mut self, name: &str) -> u32 {
        if let Some(&variable) = self.variables.get(name) {
            return variable;
        }
        let variable = self.variable_names.len() as u32;
        debug!("interned variable {name:?} at level {variable}");
        self.variables.insert(name.to_string(), variable);
        self.variable_names.push(name.to_string());
        variable
    }

    /// Terminals sit below every variable.
    fn level(&self, diagram: Diagram) -> u32 {
        match self.node(diagram) {
            Node::Terminal(_) => u32::MAX,
            Node::Branch { variable, .. } => variable,
        }
    }

    fn cofactors(&self, diagram: Diagram, variable: u32) -> (Diagram, Diagram) {
        match self.node(diagram) {
            Node::Branch {
                variable: v,
                low,
                high,
            } if v == variable => (low, high),
            _ => (diagram, diagram),
        }
    }

    fn terminal_value(&self, diagram: Diagram) -> Option<Real> {
        match self.node(diagram) {
            Node::Terminal(value) => Some(value),
            Node::Branch { .. } => None,
        }
    }

    /// Results that are known without looking below the roots.
    fn shortcut(&self, op: BinaryOp, f: Diagram, g: Diagram) -> Option<Diagram> {
        let absorbs = |d: Diagram| match (op, self.terminal_value(d)) {
            (BinaryOp::And, Some(value)) => value.is_zero(),
            (BinaryOp::Or, Some(value)) => !value.is_zero(),
            _ => false,
        };
        let zero_one = |d: Diagram| self.zero_one[d.index()];
        match op {
            BinaryOp::And if absorbs(f) || absorbs(g) => Some(ZERO),
            BinaryOp::Or if absorbs(f) || absorbs(g) => Some(ONE),
            BinaryOp::And | BinaryOp::Or if f == g && zero_one(f) => Some(f),
            BinaryOp::And if f == ONE && zero_one(g) => Some(g),
            BinaryOp::And if g == ONE && zero_one(f) => Some(f),
            BinaryOp::Or if f == ZERO && zero_one(g) => Some(g),
            BinaryOp::Or if g == ZERO && zero_one(f) => Some(f),
            _ => None,
        }
    }

    fn binary_key(op: BinaryOp, f: Diagram, g: Diagram) -> (BinaryOp, Diagram, Diagram) {
        if op.is_commutative() && g < f {
            (op, g, f)
        } else {
            (op, f, g)
        }
    }

    /// Combines the two cofactor results on top of `results` under `variable`.
    fn build(&mut self, results: &mut Vec<Diagram>, variable: u32) -> Diagram {
        match (results.pop(), results.pop()) {
            (Some(high), Some(low)) => self.mk_branch(variable, low, high),
            _ => unreachable!("branch built before both cofactors"),
        }
    }

    // Shannon expansion over an explicit stack. Low cofactors are finished
    // before high ones, so results come off `results` as (low, high) pairs.
    fn apply(&mut self, op: BinaryOp, f: Diagram, g: Diagram) -> Diagram {
        let mut steps = vec![Step::Expand((f, g))];
        let mut results = Vec::new();

        while let Some(step) = steps.pop() {
            let (f, g) = match step {
                Step::Expand(operands) => operands,
                Step::Build { key, variable } => {
                    let result = self.build(&mut results, variable);
                    self.binary_cache.insert(key, result);
                    results.push(result);
                    continue;
                }
            };

            if let (Some(lhs), Some(rhs)) = (self.terminal_value(f), self.terminal_value(g)) {
                results.push(self.mk_terminal(op.compute(lhs, rhs)));
                continue;
            }
            if let Some(result) = self.shortcut(op, f, g) {
                results.push(result);
                continue;
            }
            let key = Self::binary_key(op, f, g);
            if let Some(&cached) = self.binary_cache.get(&key) {
                results.push(cached);
                continue;
            }

            let variable = self.level(f).min(self.level(g));
            let (f_low, f_high) = self.cofactors(f, variable);
            let (g_low, g_high) = self.cofactors(g, variable);
            steps.push(Step::Build { key, variable });
            steps.push(Step::Expand((f_high, g_high)));
            steps.push(Step::Expand((f_low, g_low)));
        }

        match results.pop() {
            Some(result) => result,
            None => unreachable!("apply finished without a result"),
        }
    }

    fn apply_unary(&mut self, op: UnaryOp, f: Diagram) -> Diagram {
        let mut steps = vec![Step::Expand(f)];
        let mut results = Vec::new();

        while let Some(step) = steps.pop() {
            let f = match step {
                Step::Expand(f) => f,
                Step::Build { key, variable } => {
                    let result = self.build(&mut results, variable);
                    self.unary_cache.insert(key, result);
                    results.push(result);
                    continue;
                }
            };

            let (variable, low, high) = match self.node(f) {
                Node::Terminal(value) => {
                    results.push(self.mk_terminal(op.compute(value)));
                    continue;
                }
                Node::Branch {
                    variable,
                    low,
                    high,
                } => (variable, low, high),
            };
            if let Some(&cached) = self.unary_cache.get(&(op, f)) {
                results.push(cached);
                continue;
            }

            steps.push(Step::Build {
                key: (op, f),
                variable,
            });
            steps.push(Step::Expand(high));
            steps.push(Step::Expand(low));
        }

        match results.pop() {
            Some(result) => result,
            None => unreachable!("apply finished without a result"),
        }
    }

    fn evaluate(&self, mut diagram: Diagram, assignment: &BitSlice) -> Real {
        loop {
            match self.node(diagram) {
                Node::Terminal(value) => return value,
                Node::Branch {
                    variable,
                    low,
                    high,
                } => {
                    let bit = assignment
                        .get(variable as usize)
                        .map_or(false, |bit| *bit);
                    diagram = if bit { high } else { low };
                }
            }
        }
    }
}

/// Owner of all diagram nodes and of the name-interned variable table.
///
/// Every operation takes `&self`; the tables sit behind a lock so a manager
/// can be shared between threads. Resetting it with [`DiagramManager::clear`]
/// requires exclusive access, which guarantees no compiler still borrows it.
pub struct DiagramManager<Real = f64> {
    tables: RwLock<Tables<Real>>,
}

impl<Real: FloatExt> Default for DiagramManager<Real> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Real: FloatExt> DiagramManager<Real> {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Tables<Real>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables<Real>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops every node, cache entry and interned variable.
    ///
    /// Handles obtained before the call no longer denote anything.
    pub fn clear(&mut self) {
        debug!("clearing diagram manager");
        *self
            .tables
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = Tables::new();
    }

    pub fn zero(&self) -> Diagram {
        ZERO
    }

    pub fn one(&self) -> Diagram {
        ONE
    }

    pub fn constant(&self, value: Real) -> Diagram {
        self.write().mk_terminal(value)
    }

    /// The 0/1 diagram testing the variable called `name`, interning the
    /// name on first use. Repeated calls return the same handle.
    pub fn get_or_create_variable(&self, name: &str) -> Diagram {
        let mut tables = self.write();
        let variable = tables.intern_variable(name);
        tables.mk_branch(variable, ZERO, ONE)
    }

    /// Level of an already interned variable.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.read().variables.get(name).map(|&v| v as usize)
    }

    pub fn variable_name(&self, index: usize) -> Option<String> {
        self.read().variable_names.get(index).cloned()
    }

    pub fn num_variables(&self) -> usize {
        self.read().variable_names.len()
    }

    /// Whether `diagram` is in range of this manager's node table.
    pub fn contains(&self, diagram: Diagram) -> bool {
        diagram.index() < self.read().nodes.len()
    }

    /// Total number of nodes ever created, including terminals.
    pub fn num_nodes(&self) -> usize {
        self.read().nodes.len()
    }

    /// Pointwise combination of two diagrams.
    pub fn combine(&self, op: BinaryOp, lhs: Diagram, rhs: Diagram) -> Diagram {
        self.write().apply(op, lhs, rhs)
    }

    /// Pointwise additive inverse.
    pub fn negate(&self, only: Diagram) -> Diagram {
        self.write().apply_unary(UnaryOp::Negate, only)
    }

    /// Pointwise boolean complement: 1 where `only` is zero, 0 elsewhere.
    pub fn complement(&self, only: Diagram) -> Diagram {
        self.write().apply_unary(UnaryOp::Complement, only)
    }

    /// The value of a constant diagram, `None` if it depends on a variable.
    pub fn value(&self, diagram: Diagram) -> Option<Real> {
        self.read().terminal_value(diagram)
    }

    /// Value of `diagram` under `assignment`, indexed by variable level.
    /// Levels beyond the end of `assignment` read as `false`.
    pub fn evaluate(&self, diagram: Diagram, assignment: &BitSlice) -> Real {
        self.read().evaluate(diagram, assignment)
    }

    /// Evaluates `diagram` under many assignments at once.
    pub fn evaluate_many(&self, diagram: Diagram, assignments: &[BitVec]) -> Vec<Real> {
        let guard = self.read();
        let tables = &*guard;

        #[cfg(feature = "rayon")]
        let values = assignments
            .par_iter()
            .map(|assignment| tables.evaluate(diagram, assignment))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let values = assignments
            .iter()
            .map(|assignment| tables.evaluate(diagram, assignment))
            .collect();

        values
    }

    /// Builds an assignment from variable names. Names that were never
    /// interned cannot influence any diagram of this manager and are skipped.
    pub fn assignment<'a>(&self, values: impl IntoIterator<Item = (&'a str, bool)>) -> BitVec {
        let tables = self.read();
        let mut bits = bitvec![0; tables.variable_names.len()];
        for (name, value) in values {
            if let Some(&variable) = tables.variables.get(name) {
                bits.set(variable as usize, value);
            }
        }
        bits
    }

    /// Number of distinct nodes reachable from `diagram`.
    pub fn size(&self, diagram: Diagram) -> usize {
        let tables = self.read();
        let mut visited = HashSet::new();
        let mut stack = vec![diagram];
        while let Some(next) = stack.pop() {
            if !visited.insert(next) {
                continue;
            }
            if let Node::Branch { low, high, .. } = tables.node(next) {
                stack.push(low);
                stack.push(high);
            }
        }
        visited.len()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn constants_are_hash_consed() {
        let manager = DiagramManager::<f64>::new();

        assert_eq!(manager.constant(0.0), manager.zero());
        assert_eq!(manager.constant(1.0), manager.one());
        assert_eq!(manager.constant(2.5), manager.constant(2.5));
        assert_ne!(manager.constant(0.0), manager.constant(-0.0));
        assert_eq!(manager.constant(f64::NAN), manager.constant(-f64::NAN));
        assert_eq!(manager.value(manager.constant(2.5)), Some(2.5));
    }

    #[test]
    fn variables_are_interned_by_name() {
        let manager = DiagramManager::<f64>::new();

        let p = manager.get_or_create_variable("p");
        let q = manager.get_or_create_variable("q");
        assert_ne!(p, q);
        assert_eq!(manager.get_or_create_variable("p"), p);
        assert_eq!(manager.num_variables(), 2);
        assert_eq!(manager.variable_index("q"), Some(1));
        assert_eq!(manager.variable_name(0).as_deref(), Some("p"));
        assert_eq!(manager.variable_index("r"), None);
        assert_eq!(manager.value(p), None);
        assert_eq!(manager.size(p), 3);
    }

    #[test]
    fn arithmetic_is_pointwise() {
        let manager = DiagramManager::<f64>::new();

        let p = manager.get_or_create_variable("p");
        let q = manager.get_or_create_variable("q");
        let three = manager.constant(3.0);
        // 3p + q
        let scaled = manager.combine(BinaryOp::Multiply, three, p);
        let sum = manager.combine(BinaryOp::Add, scaled, q);

        for (p_val, q_val, expected) in [
            (false, false, 0.0),
            (false, true, 1.0),
            (true, false, 3.0),
            (true, true, 4.0),
        ] {
            let assignment = manager.assignment([("p", p_val), ("q", q_val)]);
            assert_eq!(manager.evaluate(sum, &assignment), expected);
        }

        let negated = manager.negate(sum);
        let assignment = manager.assignment([("p", true), ("q", true)]);
        assert_eq!(manager.evaluate(negated, &assignment), -4.0);
    }

    #[test]
    fn reduction_collapses_cancelled_variables() {
        let manager = DiagramManager::<f64>::new();

        let p = manager.get_or_create_variable("p");
        let difference = manager.combine(BinaryOp::Subtract, p, p);
        assert_eq!(difference, manager.zero());

        let q = manager.get_or_create_variable("q");
        let lhs = manager.combine(BinaryOp::Add, p, q);
        let rhs = manager.combine(BinaryOp::Add, q, p);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn division_by_zero_stays_inside_the_diagram() {
        let manager = DiagramManager::<f64>::new();

        let p = manager.get_or_create_variable("p");
        let quotient = manager.combine(BinaryOp::Divide, manager.one(), p);

        let on = manager.assignment([("p", true)]);
        let off = manager.assignment([("p", false)]);
        assert_eq!(manager.evaluate(quotient, &on), 1.0);
        assert_eq!(manager.evaluate(quotient, &off), f64::INFINITY);

        let nan = manager.combine(BinaryOp::Divide, manager.zero(), manager.zero());
        assert!(manager.value(nan).unwrap().is_nan());
    }

    #[test]
    fn boolean_connectives() {
        let manager = DiagramManager::<f64>::new();

        let a = manager.get_or_create_variable("a");
        let b = manager.get_or_create_variable("b");
        let not_b = manager.complement(b);
        let conjunction = manager.combine(BinaryOp::And, a, not_b);
        let disjunction = manager.combine(BinaryOp::Or, a, not_b);

        let eval = |d, a_val, b_val| {
            let assignment = manager.assignment([("a", a_val), ("b", b_val)]);
            manager.evaluate(d, &assignment)
        };
        assert_eq!(eval(conjunction, true, false), 1.0);
        assert_eq!(eval(conjunction, true, true), 0.0);
        assert_eq!(eval(disjunction, false, false), 1.0);
        assert_eq!(eval(disjunction, false, true), 0.0);

        assert_eq!(
            manager.combine(BinaryOp::And, a, manager.zero()),
            manager.zero()
        );
        let seven = manager.constant(7.0);
        assert_eq!(manager.combine(BinaryOp::Or, seven, b), manager.one());
        assert_eq!(manager.complement(manager.complement(a)), a);
    }

    #[test]
    fn evaluate_many_matches_evaluate() {
        let manager = DiagramManager::<f32>::new();

        let p = manager.get_or_create_variable("p");
        let q = manager.get_or_create_variable("q");
        let two = manager.constant(2.0);
        let doubled = manager.combine(BinaryOp::Multiply, q, two);
        let f = manager.combine(BinaryOp::Subtract, p, doubled);

        let assignments: Vec<_> = [(false, false), (false, true), (true, false), (true, true)]
            .into_iter()
            .map(|(p_val, q_val)| manager.assignment([("p", p_val), ("q", q_val)]))
            .collect();
        assert_eq!(manager.evaluate_many(f, &assignments), [0.0, -2.0, 1.0, -1.0]);
    }

    #[test]
    fn clear_resets_interning() {
        let mut manager = DiagramManager::<f64>::new();

        let p = manager.get_or_create_variable("p");
        manager.constant(42.0);
        assert!(manager.contains(p));
        manager.clear();

        assert_eq!(manager.num_variables(), 0);
        assert_eq!(manager.num_nodes(), 2);
        assert_eq!(manager.value(manager.one()), Some(1.0));
        assert!(!manager.contains(p));
        assert!(manager.contains(manager.one()));
    }

    #[test]
    fn deep_diagrams_are_combined_iteratively() {
        let manager = DiagramManager::<f64>::new();
        let count = 20_000;

        let variables: Vec<_> = (0..count)
            .map(|i| manager.get_or_create_variable(&format!("v{i}")))
            .collect();
        // Folding from the last level up adds one node above the rest each time.
        let all = variables
            .iter()
            .rev()
            .fold(manager.one(), |acc, &v| manager.combine(BinaryOp::And, v, acc));
        assert_eq!(manager.size(all), count + 2);

        let negated = manager.negate(all);
        assert_eq!(manager.combine(BinaryOp::Add, all, negated), manager.zero());
        assert_eq!(manager.complement(manager.complement(all)), all);

        let every = bitvec![1; count];
        assert_eq!(manager.evaluate(negated, &every), -1.0);
        let mut last_off = every.clone();
        last_off.set(count - 1, false);
        assert_eq!(manager.evaluate(all, &last_off), 0.0);
    }

    #[test]
    fn zero_one_operands_skip_expansion() {
        let manager = DiagramManager::<f64>::new();

        let p = manager.get_or_create_variable("p");
        let q = manager.get_or_create_variable("q");
        let p_and_q = manager.combine(BinaryOp::And, p, q);
        let nodes = manager.num_nodes();

        assert_eq!(manager.combine(BinaryOp::And, manager.one(), p_and_q), p_and_q);
        assert_eq!(manager.combine(BinaryOp::Or, p_and_q, manager.zero()), p_and_q);
        assert_eq!(manager.combine(BinaryOp::Or, p_and_q, p_and_q), p_and_q);
        assert_eq!(manager.num_nodes(), nodes);

        // A non 0/1 operand is still normalised to 0/1.
        let two_p = manager.combine(BinaryOp::Multiply, manager.constant(2.0), p);
        assert_eq!(manager.combine(BinaryOp::And, manager.one(), two_p), p);
    }
}
