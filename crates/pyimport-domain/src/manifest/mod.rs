//! `pyproject.toml` loading, scaffolding, and comment-preserving edits.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use toml_edit::{DocumentMut, Item, Table, TableLike};

mod legacy;
mod merge;

pub(crate) use legacy::normalize_legacy_build;
pub use merge::{merge_tables, ArrayMerge};
pub(crate) use merge::format_multiline;

/// Name of the `[tool.*]` table that receives imported settings.
pub const TOOL_SECTION: &str = "pdm";

pub const MANIFEST_FILE: &str = "pyproject.toml";

const PROJECT_COMMENTS: &str =
    "# PEP 621 project metadata\n# See https://www.python.org/dev/peps/pep-0621/\n";

/// An editable manifest bound to the file it was read from.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    doc: DocumentMut,
}

impl Manifest {
    /// Read the manifest at `path`.
    ///
    /// A missing file yields an empty document so that importing into a
    /// fresh directory creates the manifest on [`Manifest::write`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            contents
                .parse::<DocumentMut>()
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "manifest missing; starting from empty document");
            DocumentMut::new()
        };
        Ok(Self { path, doc })
    }

    /// Manifest for the project rooted at `root`.
    pub fn load_project(root: &Path) -> Result<Self> {
        Self::load(root.join(MANIFEST_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn doc(&self) -> &DocumentMut {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut DocumentMut {
        &mut self.doc
    }

    /// Serialize the document back to the file it was loaded from.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        fs::write(&self.path, self.doc.to_string())
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "manifest written");
        Ok(())
    }
}

impl FromStr for Manifest {
    type Err = anyhow::Error;

    fn from_str(contents: &str) -> Result<Self> {
        Ok(Self {
            path: PathBuf::from(MANIFEST_FILE),
            doc: contents.parse()?,
        })
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc)
    }
}

fn implicit_table() -> Item {
    let mut table = Table::new();
    table.set_implicit(true);
    Item::Table(table)
}

/// `[tool.pdm]`, created (with an implicit `[tool]`) when missing.
pub(crate) fn tool_settings_mut(doc: &mut DocumentMut) -> Result<&mut dyn TableLike> {
    let tool = doc
        .entry("tool")
        .or_insert_with(implicit_table)
        .as_table_like_mut()
        .ok_or_else(|| anyhow!("[tool] in pyproject.toml must be a table"))?;
    if !tool.contains_key(TOOL_SECTION) {
        tool.insert(TOOL_SECTION, Item::Table(Table::new()));
    }
    tool.get_mut(TOOL_SECTION)
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| anyhow!("[tool.{TOOL_SECTION}] in pyproject.toml must be a table"))
}

/// `[project]`, created with explanatory comments when missing.
pub(crate) fn project_table_mut(doc: &mut DocumentMut) -> Result<&mut dyn TableLike> {
    if !doc.contains_key("project") {
        let mut project = Table::new();
        let prefix = if doc.as_table().is_empty() {
            PROJECT_COMMENTS.to_string()
        } else {
            format!("\n{PROJECT_COMMENTS}")
        };
        project.decor_mut().set_prefix(prefix);
        doc.insert("project", Item::Table(project));
    }
    doc.get_mut("project")
        .and_then(Item::as_table_like_mut)
        .ok_or_else(|| anyhow!("[project] in pyproject.toml must be a table"))
}
