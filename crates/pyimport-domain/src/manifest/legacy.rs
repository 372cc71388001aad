use toml_edit::{InlineTable, Item, TableLike, Value};

/// Rewrite `build = "setup.py"` into its structured form.
///
/// Older manifests stored only the setup script path; the structured table
/// also records that setuptools must run it. Returns whether a rewrite
/// happened.
pub(crate) fn normalize_legacy_build(settings: &mut dyn TableLike) -> bool {
    let Some(slot) = settings.get_mut("build") else {
        return false;
    };
    let Some(current) = slot.as_value().filter(|value| value.is_str()) else {
        return false;
    };
    let script = current.as_str().unwrap_or_default().to_string();
    let decor = current.decor().clone();

    let mut build = InlineTable::new();
    build.insert("setup-script", Value::from(script));
    build.insert("run-setuptools", Value::from(true));
    let mut replacement = Value::InlineTable(build);
    *replacement.decor_mut() = decor;
    *slot = Item::Value(replacement);
    tracing::debug!("normalized legacy string build setting");
    true
}
