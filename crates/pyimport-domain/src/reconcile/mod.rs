//! Merge converted metadata into a manifest and settle `[build-system]`.

use anyhow::{bail, Result};
use toml_edit::{DocumentMut, Item, Table, Value};

use crate::manifest::{
    merge_tables, normalize_legacy_build, project_table_mut, tool_settings_mut, ArrayMerge,
};

mod build_system;

pub use build_system::BuildSystemAction;
use build_system::BuildSystemPlan;

pub(crate) const BUILD_REQUIRES_KEY: &str = "-build-requires";
pub(crate) const BUILD_BACKEND_KEY: &str = "-build-backend";

/// Major/minor of the interpreter a project is imported for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpreterVersion {
    pub major: u64,
    pub minor: u64,
}

/// Collaborators the reconciler calls out to.
pub trait ReconcileHost {
    /// Resolve the active interpreter. `in_import` is true when called while
    /// importing metadata, before the project is fully configured.
    fn resolve_interpreter(&self, in_import: bool) -> Result<InterpreterVersion>;

    /// Report a user-visible notice.
    fn echo(&self, message: &str);
}

/// Build requirements and backend supplied by an import.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSystemDeclaration {
    pub requires: Option<Vec<String>>,
    pub backend: Option<String>,
}

impl BuildSystemDeclaration {
    /// Move the reserved `-build-requires` / `-build-backend` keys out of
    /// imported project data. Absent keys leave the declaration as is.
    pub fn absorb(&mut self, project_data: &mut Table) -> Result<()> {
        if let Some(item) = project_data.remove(BUILD_REQUIRES_KEY) {
            let Some(array) = item.as_array() else {
                bail!("`{BUILD_REQUIRES_KEY}` must be an array of requirement strings");
            };
            let mut requires = Vec::with_capacity(array.len());
            for entry in array {
                let Some(spec) = entry.as_str() else {
                    bail!("`{BUILD_REQUIRES_KEY}` must be an array of requirement strings");
                };
                requires.push(spec.to_string());
            }
            self.requires = Some(requires);
        }
        if let Some(item) = project_data.remove(BUILD_BACKEND_KEY) {
            let Some(backend) = item.as_str() else {
                bail!("`{BUILD_BACKEND_KEY}` must be a string");
            };
            self.backend = Some(backend.to_string());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    pub build_system: BuildSystemAction,
    /// Set when `requires-python` was filled in from the interpreter.
    pub requires_python: Option<String>,
}

/// Merge `project_data` and `settings` into `doc` and reconcile
/// `[build-system]`.
///
/// The document is mutated in place; on error it may be partially updated
/// and should not be written.
pub fn reconcile(
    doc: &mut DocumentMut,
    mut project_data: Table,
    settings: Table,
    mut build_system: BuildSystemDeclaration,
    reset_backend: bool,
    host: &dyn ReconcileHost,
) -> Result<ReconcileReport> {
    build_system.absorb(&mut project_data)?;

    project_table_mut(doc)?;
    normalize_legacy_build(tool_settings_mut(doc)?);

    merge_tables(project_table_mut(doc)?, project_data, ArrayMerge::Replace);
    merge_tables(tool_settings_mut(doc)?, settings, ArrayMerge::Replace);

    let plan = BuildSystemPlan::decide(doc.get("build-system"), &build_system, reset_backend)?;
    tracing::debug!(?plan, "build-system plan");
    let build_system = plan.apply(doc, host);

    let project = project_table_mut(doc)?;
    let requires_python = if project.contains_key("requires-python") {
        None
    } else {
        let python = host.resolve_interpreter(true)?;
        let constraint = format!(">={}.{}", python.major, python.minor);
        project.insert("requires-python", Item::Value(Value::from(constraint.as_str())));
        host.echo(&format!(
            "The project's requires-python has been set to {constraint}. You can change it later if necessary."
        ));
        Some(constraint)
    };

    Ok(ReconcileReport {
        build_system,
        requires_python,
    })
}

#[cfg(test)]
mod tests;
