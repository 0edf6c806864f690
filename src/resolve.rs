use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::diagram::{Diagram, DiagramManager};
use crate::error::CompileError;
use crate::FloatExt;

/// How free variables of an expression are bound to diagrams.
#[derive(Clone, Copy, Debug)]
pub enum BindingMode<'a> {
    /// Every name must have an entry in the caller's interpretation.
    Interpretation(&'a HashMap<String, Diagram>),

    /// Every name becomes the manager's interned 0/1 variable of that name.
    Encoding,
}

/// Resolved name to diagram mapping for one compilation.
pub type Bindings = HashMap<String, Diagram>;

/// Binds each of `names` according to `mode`.
///
/// In interpretation mode every missing name is collected before failing, so
/// the error lists all of them. Names bound to handles outside the manager's
/// node table (stale after [`DiagramManager::clear`], or from another
/// manager) are reported the same way, after any missing names.
pub fn resolve<Real: FloatExt>(
    names: &BTreeSet<String>,
    mode: BindingMode<'_>,
    manager: &DiagramManager<Real>,
) -> Result<Bindings, CompileError> {
    match mode {
        BindingMode::Interpretation(interpretation) => {
            let mut bindings = Bindings::with_capacity(names.len());
            let mut unresolved = vec![];
            let mut unknown = vec![];
            for name in names {
                match interpretation.get(name) {
                    Some(&diagram) if manager.contains(diagram) => {
                        bindings.insert(name.clone(), diagram);
                    }
                    Some(_) => unknown.push(name.clone()),
                    None => unresolved.push(name.clone()),
                }
            }
            if !unresolved.is_empty() {
                debug!("no interpretation for {unresolved:?}");
                Err(CompileError::UnresolvedVariables(unresolved))
            } else if !unknown.is_empty() {
                debug!("interpretation outside the manager for {unknown:?}");
                Err(CompileError::UnknownDiagrams(unknown))
            } else {
                Ok(bindings)
            }
        }
        BindingMode::Encoding => Ok(names
            .iter()
            .map(|name| (name.clone(), manager.get_or_create_variable(name)))
            .collect()),
    }
}
