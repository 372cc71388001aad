//! Foreign dependency files and the converters that translate them into
//! `[project]` metadata plus `[tool.pdm]` settings.

use std::{fmt, fs, path::Path, str::FromStr};

use anyhow::{anyhow, Context, Result};
use toml_edit::{value, Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table, Value};
use url::Url;

use crate::error::UsageError;
use crate::manifest::format_multiline;
use crate::reconcile::{BUILD_BACKEND_KEY, BUILD_REQUIRES_KEY};

mod flit;
mod pipfile;
mod poetry;
mod requirements;

/// Import formats, in fingerprint probing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKey {
    Requirements,
    Pipfile,
    Poetry,
    Flit,
}

impl FormatKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FormatKey::Requirements => "requirements",
            FormatKey::Pipfile => "pipfile",
            FormatKey::Poetry => "poetry",
            FormatKey::Flit => "flit",
        }
    }

    /// The converter registered under this key.
    #[must_use]
    pub fn converter(self) -> &'static dyn Converter {
        match self {
            FormatKey::Requirements => &requirements::Requirements,
            FormatKey::Pipfile => &pipfile::Pipfile,
            FormatKey::Poetry => &poetry::Poetry,
            FormatKey::Flit => &flit::Flit,
        }
    }
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKey {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        FORMATS
            .iter()
            .map(|converter| converter.key())
            .find(|key| key.as_str().eq_ignore_ascii_case(input.trim()))
            .ok_or_else(|| anyhow!("unknown import format `{input}`"))
    }
}

/// Options forwarded verbatim to converters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Import dependencies as development dependencies.
    pub dev: bool,
    /// Dependency group to place imported requirements in.
    pub group: Option<String>,
}

/// Output of a converter: `[project]` fields (possibly carrying the reserved
/// `-build-requires` / `-build-backend` keys) and `[tool.pdm]` settings.
#[derive(Clone, Debug, Default)]
pub struct Converted {
    pub project_data: Table,
    pub settings: Table,
}

pub trait Converter: Sync {
    fn key(&self) -> FormatKey;

    /// Cheap probe deciding whether `filename` looks like this format.
    fn check_fingerprint(&self, project: &Path, filename: &Path) -> bool;

    fn convert(&self, project: &Path, filename: &Path, options: &ImportOptions)
        -> Result<Converted>;
}

pub static FORMATS: &[&dyn Converter] = &[
    &requirements::Requirements,
    &pipfile::Pipfile,
    &poetry::Poetry,
    &flit::Flit,
];

/// Pick the converter for `filename`: the explicit hint when given,
/// otherwise the first registered converter whose fingerprint matches.
pub fn resolve_format(
    project: &Path,
    filename: &Path,
    hint: Option<FormatKey>,
) -> Result<FormatKey, UsageError> {
    if let Some(key) = hint {
        return Ok(key);
    }
    FORMATS
        .iter()
        .find(|converter| converter.check_fingerprint(project, filename))
        .map(|converter| converter.key())
        .ok_or(UsageError::UndetectedFormat)
}

pub(crate) fn read_toml(path: &Path) -> Result<DocumentMut> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    contents
        .parse::<DocumentMut>()
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse `path` as TOML without reporting errors; used by fingerprint probes.
pub(crate) fn probe_toml(path: &Path) -> Option<DocumentMut> {
    fs::read_to_string(path).ok()?.parse().ok()
}

/// Walk a dotted path of tables (standard or inline).
pub(crate) fn lookup<'a>(doc: &'a DocumentMut, path: &[&str]) -> Option<&'a Item> {
    let mut current = doc.as_item();
    for key in path {
        current = current.as_table_like()?.get(key)?;
    }
    Some(current)
}

/// Nested table under `key`, created (or replacing a non-table) on demand.
pub(crate) fn subtable<'a>(table: &'a mut Table, key: &str) -> &'a mut Table {
    let slot = table.entry(key).or_insert(Item::None);
    if !slot.is_table() {
        *slot = Item::Table(Table::new());
    }
    match slot {
        Item::Table(nested) => nested,
        _ => unreachable!("slot was just replaced with a table"),
    }
}

/// Single-line string array, e.g. keywords.
pub(crate) fn string_array<I, S>(items: I) -> Array
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|item| Value::from(item.as_ref())).collect()
}

/// Dependency array, one requirement per line.
pub(crate) fn dependency_array<I, S>(items: I) -> Array
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut array = string_array(items);
    if !array.is_empty() {
        format_multiline(&mut array);
    }
    array
}

pub(crate) fn string_list(item: Option<&Item>) -> Vec<String> {
    let Some(array) = item.and_then(Item::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Route a flat requirement list according to `--dev` / `--group`.
pub(crate) fn place_dependencies(
    converted: &mut Converted,
    requirements: &[String],
    options: &ImportOptions,
) {
    let array = value(dependency_array(requirements));
    if options.dev {
        let group = options.group.as_deref().unwrap_or("dev");
        subtable(&mut converted.settings, "dev-dependencies").insert(group, array);
    } else if let Some(group) = options.group.as_deref() {
        subtable(&mut converted.project_data, "optional-dependencies").insert(group, array);
    } else {
        converted.project_data.insert("dependencies", array);
    }
}

/// URL for a local path dependency. Relative paths are anchored at
/// `${PROJECT_ROOT}` so the manifest stays relocatable.
pub(crate) fn file_url(path: &str) -> String {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        if let Ok(url) = Url::from_file_path(candidate) {
            return url.to_string();
        }
    }
    let relative = path.trim_start_matches("./").trim_end_matches('/');
    if relative.is_empty() || relative == "." {
        "file:///${PROJECT_ROOT}".to_string()
    } else {
        format!("file:///${{PROJECT_ROOT}}/{relative}")
    }
}

/// `{name, url, verify_ssl}` package index entry.
pub(crate) fn source_entry(name: &str, url: &str, verify_ssl: bool) -> Table {
    let mut entry = Table::new();
    entry.insert("name", value(name));
    entry.insert("url", value(url));
    entry.insert("verify_ssl", value(verify_ssl));
    entry
}

pub(crate) fn source_list(entries: impl IntoIterator<Item = Table>) -> Option<Item> {
    let mut sources = ArrayOfTables::new();
    for entry in entries {
        sources.push(entry);
    }
    (!sources.is_empty()).then_some(Item::ArrayOfTables(sources))
}

/// `{name = .., email = ..}` person entry; missing parts are omitted.
pub(crate) fn person(name: Option<&str>, email: Option<&str>) -> Option<Value> {
    let mut entry = InlineTable::new();
    if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
        entry.insert("name", Value::from(name));
    }
    if let Some(email) = email.map(str::trim).filter(|email| !email.is_empty()) {
        entry.insert("email", Value::from(email));
    }
    (!entry.is_empty()).then(|| Value::InlineTable(entry))
}

/// `license = { text = ".." }`.
pub(crate) fn license_text(text: &str) -> Item {
    let mut license = InlineTable::new();
    license.insert("text", Value::from(text));
    value(license)
}

/// Forward the source file's own `[build-system]` through the reserved
/// project keys so that reconciliation can act on it.
pub(crate) fn forward_build_system(doc: &DocumentMut, project_data: &mut Table) {
    let Some(build_system) = doc.get("build-system").and_then(Item::as_table_like) else {
        return;
    };
    if let Some(requires) = build_system.get("requires").and_then(Item::as_array) {
        let requires: Vec<&str> = requires.iter().filter_map(Value::as_str).collect();
        project_data.insert(BUILD_REQUIRES_KEY, value(string_array(requires)));
    }
    if let Some(backend) = build_system.get("build-backend").and_then(Item::as_str) {
        project_data.insert(BUILD_BACKEND_KEY, value(backend));
    }
}
