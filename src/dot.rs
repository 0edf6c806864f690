//! Diagram to DOT (Graphviz) conversion.
//!
//! - Named roots are boxes pointing at their diagram.
//! - Branch nodes are circles labelled with their variable name and are
//!   ranked by variable level.
//! - Terminals are squares labelled with their value.
//! - Solid edges are taken when the variable is 1, dashed edges when it is 0.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write};

use crate::diagram::{Diagram, DiagramManager, Node};
use crate::FloatExt;

impl<Real: FloatExt> DiagramManager<Real> {
    /// Renders every node reachable from `roots`.
    ///
    /// ```
    /// use add_expr::{DiagramManager, ExpressionSolver};
    ///
    /// let manager = DiagramManager::<f64>::new();
    /// let f = ExpressionSolver::new(&manager).encode_formula("a && !b").unwrap();
    /// let dot = manager.to_dot(&[(f, "a && !b")]).unwrap();
    /// assert!(dot.starts_with("digraph"));
    /// ```
    pub fn to_dot(&self, roots: &[(Diagram, &str)]) -> Result<String, fmt::Error> {
        let tables = self.read();

        let mut reachable = BTreeSet::new();
        let mut stack: Vec<Diagram> = roots.iter().map(|(d, _)| *d).collect();
        while let Some(next) = stack.pop() {
            if !reachable.insert(next) {
                continue;
            }
            if let Node::Branch { low, high, .. } = tables.node(next) {
                stack.push(low);
                stack.push(high);
            }
        }

        let mut levels: BTreeMap<u32, Vec<Diagram>> = BTreeMap::new();
        let mut terminals = vec![];
        for &d in &reachable {
            match tables.node(d) {
                Node::Terminal(_) => terminals.push(d),
                Node::Branch { variable, .. } => levels.entry(variable).or_default().push(d),
            }
        }

        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;

        writeln!(dot, "  {{ rank = source;")?;
        for (i, (root, name)) in roots.iter().enumerate() {
            writeln!(dot, "    r{i} [shape=box, label=\"{}\"];", escape(name))?;
            writeln!(dot, "    r{i} -> n{};", root.index())?;
        }
        writeln!(dot, "  }}")?;

        for (variable, nodes) in &levels {
            writeln!(dot, "  {{ rank = same;")?;
            let label = escape(tables.variable_name(*variable));
            for d in nodes {
                writeln!(dot, "    n{} [shape=circle, label=\"{label}\"];", d.index())?;
            }
            writeln!(dot, "  }}")?;
        }

        writeln!(dot, "  {{ rank = sink;")?;
        for d in &terminals {
            if let Node::Terminal(value) = tables.node(*d) {
                writeln!(dot, "    n{} [shape=square, label=\"{value}\"];", d.index())?;
            }
        }
        writeln!(dot, "  }}")?;

        for nodes in levels.values() {
            for d in nodes {
                if let Node::Branch { low, high, .. } = tables.node(*d) {
                    writeln!(dot, "  n{} -> n{};", d.index(), high.index())?;
                    writeln!(dot, "  n{} -> n{} [style=dashed];", d.index(), low.index())?;
                }
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
