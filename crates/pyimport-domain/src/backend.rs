use toml_edit::{value, Array, Item, Table};

/// A PEP 517 build backend together with the requirements needed to load it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildBackend {
    pub requires: &'static [&'static str],
    pub build_backend: &'static str,
}

pub const DEFAULT_BACKEND: BuildBackend = BuildBackend {
    requires: &["pdm-backend"],
    build_backend: "pdm.backend",
};

impl BuildBackend {
    /// Canonical `[build-system]` table for this backend.
    #[must_use]
    pub fn build_system(&self) -> Table {
        let mut table = Table::new();
        table.insert("requires", value(self.requires.iter().copied().collect::<Array>()));
        table.insert("build-backend", value(self.build_backend));
        table
    }

    /// Whether `table` declares exactly this backend and requirement list.
    pub fn matches(&self, table: &dyn toml_edit::TableLike) -> bool {
        let backend = table.get("build-backend").and_then(Item::as_str);
        let requires: Option<Vec<&str>> = table
            .get("requires")
            .and_then(Item::as_array)
            .map(|array| array.iter().filter_map(toml_edit::Value::as_str).collect());
        backend == Some(self.build_backend) && requires.as_deref() == Some(self.requires)
    }
}
