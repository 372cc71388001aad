use toml_edit::{Array, DocumentMut, Item, Table, TableLike, Value};

use crate::backend::DEFAULT_BACKEND;
use crate::error::UsageError;
use crate::manifest::{merge_tables, ArrayMerge};
use crate::requirement::requirement_stem;

use super::{BuildSystemDeclaration, ReconcileHost};

/// What happened to `[build-system]` during an import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildSystemAction {
    /// Replaced with the default backend's declaration.
    Reset,
    /// Created from the imported declaration.
    Created,
    /// Imported requirements with new stems were appended.
    Extended { added: Vec<String> },
    /// Left untouched.
    Unchanged,
}

/// The single decision taken for `[build-system]`, evaluated in a fixed
/// order: reset, create, extend, no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BuildSystemPlan {
    Reset,
    CreateFresh { requires: Vec<String>, backend: String },
    AppendRequires { requires: Vec<String> },
    Unchanged,
}

impl BuildSystemPlan {
    pub(crate) fn decide(
        existing: Option<&Item>,
        declaration: &BuildSystemDeclaration,
        reset_backend: bool,
    ) -> Result<Self, UsageError> {
        if reset_backend {
            return Ok(Self::Reset);
        }

        let Some(existing) = existing else {
            return match (&declaration.requires, &declaration.backend) {
                (Some(requires), Some(backend)) => Ok(Self::CreateFresh {
                    requires: requires.clone(),
                    backend: backend.clone(),
                }),
                _ => Err(UsageError::BuildSystemUnavailable),
            };
        };

        let (Some(imported_requires), Some(imported_backend)) =
            (&declaration.requires, &declaration.backend)
        else {
            return Ok(Self::Unchanged);
        };

        let table = existing.as_table_like();
        let current_requires = table
            .and_then(|table| table.get("requires"))
            .and_then(Item::as_array);
        let current_backend = table
            .and_then(|table| table.get("build-backend"))
            .and_then(Item::as_str);
        let (Some(current_requires), Some(current_backend)) = (current_requires, current_backend)
        else {
            return Err(UsageError::IncompleteBuildSystem);
        };
        if current_backend != imported_backend {
            return Err(UsageError::BackendMismatch {
                found: current_backend.to_string(),
                expected: imported_backend.clone(),
            });
        }

        let current_stems: Vec<String> = current_requires
            .iter()
            .filter_map(Value::as_str)
            .map(requirement_stem)
            .collect();
        let additions: Vec<String> = imported_requires
            .iter()
            .filter(|req| !current_stems.contains(&requirement_stem(req)))
            .cloned()
            .collect();
        if additions.is_empty() {
            Ok(Self::Unchanged)
        } else {
            Ok(Self::AppendRequires {
                requires: additions,
            })
        }
    }

    pub(crate) fn apply(self, doc: &mut DocumentMut, host: &dyn ReconcileHost) -> BuildSystemAction {
        match self {
            Self::Reset => {
                let mut table = DEFAULT_BACKEND.build_system();
                if let Some(previous) = doc.get("build-system").and_then(Item::as_table) {
                    *table.decor_mut() = previous.decor().clone();
                    if let Some(position) = previous.position() {
                        table.set_position(position);
                    }
                }
                doc.insert("build-system", Item::Table(table));
                tracing::debug!("build-system reset to default backend");
                BuildSystemAction::Reset
            }
            Self::CreateFresh { requires, backend } => {
                let mut incoming = Table::new();
                incoming.insert("requires", toml_edit::value(string_array(&requires)));
                incoming.insert("build-backend", toml_edit::value(backend.as_str()));
                let mut table = Table::new();
                merge_tables(&mut table, incoming, ArrayMerge::Extend);
                doc.insert("build-system", Item::Table(table));
                host.echo(&format!(
                    "The project's build dependencies have been set to {}",
                    render_requires(&requires)
                ));
                host.echo(&format!(
                    "The project's build backend has been set to {backend}"
                ));
                BuildSystemAction::Created
            }
            Self::AppendRequires { requires } => {
                let mut incoming = Table::new();
                incoming.insert("requires", toml_edit::value(string_array(&requires)));
                let Some(table) = doc
                    .get_mut("build-system")
                    .and_then(Item::as_table_like_mut)
                else {
                    return BuildSystemAction::Unchanged;
                };
                merge_tables(table, incoming, ArrayMerge::Extend);
                host.echo(&format!(
                    "The project's build dependencies have been set to {}",
                    render_requires(&current_requires(table))
                ));
                BuildSystemAction::Extended { added: requires }
            }
            Self::Unchanged => BuildSystemAction::Unchanged,
        }
    }
}

fn string_array(items: &[String]) -> Array {
    items.iter().map(String::as_str).collect()
}

fn current_requires(table: &dyn TableLike) -> Vec<String> {
    table
        .get("requires")
        .and_then(Item::as_array)
        .map(|array| {
            array
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `["a", "b"]`, independent of how the array is laid out in the file.
fn render_requires(requires: &[String]) -> String {
    string_array(requires).to_string()
}
