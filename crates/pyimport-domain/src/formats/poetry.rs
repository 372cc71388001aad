use std::path::Path;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use toml_edit::{value, Array, InlineTable, Item, Table, TableLike, Value};

use super::{
    dependency_array, file_url, forward_build_system, license_text, lookup, person, probe_toml,
    read_toml, source_entry, source_list, string_array, string_list, subtable, Converted,
    Converter, FormatKey, ImportOptions,
};
use crate::requirement::direct_reference;

static PERSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[^<>]*?)\s*(?:<(?P<email>[^<>]+)>)?\s*$").expect("person pattern")
});

const URL_FIELDS: &[(&str, &str)] = &[
    ("homepage", "Homepage"),
    ("repository", "Repository"),
    ("documentation", "Documentation"),
];

pub(crate) struct Poetry;

impl Converter for Poetry {
    fn key(&self) -> FormatKey {
        FormatKey::Poetry
    }

    fn check_fingerprint(&self, _project: &Path, filename: &Path) -> bool {
        probe_toml(filename)
            .is_some_and(|doc| lookup(&doc, &["tool", "poetry"]).is_some_and(Item::is_table_like))
    }

    fn convert(
        &self,
        _project: &Path,
        filename: &Path,
        _options: &ImportOptions,
    ) -> Result<Converted> {
        let doc = read_toml(filename)?;
        let poetry = lookup(&doc, &["tool", "poetry"])
            .and_then(Item::as_table_like)
            .ok_or_else(|| anyhow!("{} has no [tool.poetry] table", filename.display()))?;

        let mut converted = Converted::default();
        convert_metadata(poetry, &mut converted.project_data);
        convert_dependencies(poetry, &mut converted)?;
        convert_entry_points(poetry, &mut converted.project_data);
        convert_settings(poetry, &mut converted.settings);
        forward_build_system(&doc, &mut converted.project_data);
        tracing::debug!(file = %filename.display(), "converted poetry metadata");
        Ok(converted)
    }
}

fn convert_metadata(poetry: &dyn TableLike, project: &mut Table) {
    let text = |key: &str| poetry.get(key).and_then(Item::as_str);

    for key in ["name", "version", "description"] {
        if let Some(field) = text(key) {
            project.insert(key, value(field));
        }
    }
    if let Some(license) = text("license") {
        project.insert("license", license_text(license));
    }
    let readme = text("readme").map(str::to_string).or_else(|| {
        string_list(poetry.get("readme")).into_iter().next()
    });
    if let Some(readme) = readme {
        project.insert("readme", value(readme));
    }
    for key in ["authors", "maintainers"] {
        let people: Array = string_list(poetry.get(key))
            .iter()
            .filter_map(|entry| parse_person(entry))
            .collect();
        if !people.is_empty() {
            project.insert(key, value(people));
        }
    }
    for key in ["keywords", "classifiers"] {
        let entries = string_list(poetry.get(key));
        if !entries.is_empty() {
            project.insert(key, value(string_array(entries)));
        }
    }

    let mut urls = Table::new();
    for &(field, label) in URL_FIELDS {
        if let Some(url) = text(field) {
            urls.insert(label, value(url));
        }
    }
    if let Some(extra) = poetry.get("urls").and_then(Item::as_table_like) {
        for (label, url) in extra.iter() {
            if let Some(url) = url.as_str() {
                urls.insert(label, value(url));
            }
        }
    }
    if !urls.is_empty() {
        project.insert("urls", Item::Table(urls));
    }
}

fn parse_person(entry: &str) -> Option<Value> {
    let captures = PERSON.captures(entry.trim())?;
    person(
        captures.name("name").map(|m| m.as_str()),
        captures.name("email").map(|m| m.as_str()),
    )
}

fn convert_dependencies(poetry: &dyn TableLike, converted: &mut Converted) -> Result<()> {
    let declared = poetry.get("dependencies").and_then(Item::as_table_like);
    let mut dependencies = Vec::new();
    if let Some(declared) = declared {
        for (name, spec) in declared.iter() {
            if name == "python" {
                if let Some(python) = spec.as_str() {
                    converted
                        .project_data
                        .insert("requires-python", value(requires_python(python)?));
                }
                continue;
            }
            if is_optional(spec) {
                continue;
            }
            dependencies.extend(poetry_requirements(name, spec));
        }
    }
    converted
        .project_data
        .insert("dependencies", value(dependency_array(&dependencies)));

    if let Some(extras) = poetry.get("extras").and_then(Item::as_table_like) {
        let optional = subtable(&mut converted.project_data, "optional-dependencies");
        for (extra, members) in extras.iter() {
            let requirements: Vec<String> = string_list(Some(members))
                .iter()
                .flat_map(|member| {
                    let spec = declared.and_then(|declared| find_dependency(declared, member));
                    match spec {
                        Some((name, spec)) => poetry_requirements(name, spec),
                        None => vec![member.clone()],
                    }
                })
                .collect();
            optional.insert(extra, value(dependency_array(&requirements)));
        }
    }

    let mut dev_groups: Vec<(String, Vec<String>)> = Vec::new();
    if let Some(dev) = poetry.get("dev-dependencies").and_then(Item::as_table_like) {
        dev_groups.push(("dev".to_string(), table_requirements(dev)));
    }
    if let Some(groups) = poetry.get("group").and_then(Item::as_table_like) {
        for (group, body) in groups.iter() {
            let Some(deps) = body
                .as_table_like()
                .and_then(|body| body.get("dependencies"))
                .and_then(Item::as_table_like)
            else {
                continue;
            };
            let requirements = table_requirements(deps);
            match dev_groups.iter_mut().find(|(name, _)| name == group) {
                Some((_, existing)) => existing.extend(requirements),
                None => dev_groups.push((group.to_string(), requirements)),
            }
        }
    }
    if !dev_groups.is_empty() {
        let settings = subtable(&mut converted.settings, "dev-dependencies");
        for (group, requirements) in dev_groups {
            settings.insert(&group, value(dependency_array(&requirements)));
        }
    }
    Ok(())
}

fn table_requirements(table: &dyn TableLike) -> Vec<String> {
    table
        .iter()
        .filter(|(name, _)| *name != "python")
        .flat_map(|(name, spec)| poetry_requirements(name, spec))
        .collect()
}

fn is_optional(spec: &Item) -> bool {
    spec.as_table_like()
        .and_then(|table| table.get("optional"))
        .and_then(Item::as_bool)
        .unwrap_or(false)
}

fn find_dependency<'a>(declared: &'a dyn TableLike, member: &str) -> Option<(&'a str, &'a Item)> {
    let wanted = canonical_name(member);
    declared
        .iter()
        .find(|(name, _)| canonical_name(name) == wanted)
}

fn canonical_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}

/// Requirements for one poetry dependency entry. Multiple-constraint
/// dependencies (arrays of tables) produce one requirement per entry.
fn poetry_requirements(name: &str, spec: &Item) -> Vec<String> {
    if let Some(entries) = spec.as_array() {
        return entries
            .iter()
            .filter_map(|entry| match entry {
                Value::InlineTable(table) => table_requirement(name, table),
                Value::String(_) => entry.as_str().map(|version| versioned(name, version)),
                _ => None,
            })
            .collect();
    }
    if let Some(version) = spec.as_str() {
        return vec![versioned(name, version)];
    }
    spec.as_table_like()
        .and_then(|table| table_requirement(name, table))
        .into_iter()
        .collect()
}

fn versioned(name: &str, version: &str) -> String {
    format!("{name}{}", convert_constraint(version))
}

fn table_requirement(name: &str, table: &dyn TableLike) -> Option<String> {
    let field = |key: &str| table.get(key).and_then(Item::as_str).map(str::trim);

    let extras = string_list(table.get("extras"));
    let named = if extras.is_empty() {
        name.to_string()
    } else {
        format!("{name}[{}]", extras.join(","))
    };

    let base = if let Some(git) = field("git") {
        let reference = field("rev").or_else(|| field("tag")).or_else(|| field("branch"));
        let mut url = format!("git+{git}");
        if let Some(reference) = reference {
            url = format!("{url}@{reference}");
        }
        if let Some(subdirectory) = field("subdirectory") {
            url = format!("{url}#subdirectory={subdirectory}");
        }
        direct_reference(&named, &url)
    } else if let Some(path) = field("path") {
        direct_reference(&named, &file_url(path))
    } else if let Some(url) = field("url") {
        direct_reference(&named, url)
    } else {
        let constraint = field("version").map(convert_constraint).unwrap_or_default();
        format!("{named}{constraint}")
    };

    let mut markers = Vec::new();
    if let Some(python) = field("python") {
        markers.extend(python_markers(python));
    }
    if let Some(expr) = field("markers").filter(|expr| !expr.is_empty()) {
        markers.push(expr.to_string());
    }
    if markers.is_empty() {
        return Some(base);
    }
    if markers.len() > 1 {
        for marker in &mut markers {
            if marker.contains(" or ") {
                *marker = format!("({marker})");
            }
        }
    }
    Some(format!("{base}; {}", markers.join(" and ")))
}

/// Translate a poetry constraint into PEP 440 specifiers.
///
/// `^` and `~` become explicit ranges and bare versions become `==`.
/// Poetry `||` unions have no PEP 440 equivalent; the first alternative is
/// used.
pub(crate) fn convert_constraint(raw: &str) -> String {
    let raw = raw.trim();
    let first = raw.split("||").next().unwrap_or(raw);
    if first.len() != raw.len() {
        tracing::warn!(constraint = raw, "only the first alternative of a `||` constraint is kept");
    }
    first
        .split(',')
        .map(str::trim)
        .filter(|clause| !clause.is_empty() && *clause != "*")
        .map(convert_clause)
        .collect::<Vec<_>>()
        .join(",")
}

fn convert_clause(clause: &str) -> String {
    if let Some(version) = clause.strip_prefix('^') {
        return caret_bounds(version.trim());
    }
    if !clause.starts_with("~=") {
        if let Some(version) = clause.strip_prefix('~') {
            return tilde_bounds(version.trim());
        }
    }
    if clause.starts_with(|ch: char| ch.is_ascii_digit()) {
        return format!("=={clause}");
    }
    clause.split_whitespace().collect()
}

fn release_parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map_while(|piece| piece.parse::<u64>().ok())
        .collect()
}

fn caret_bounds(version: &str) -> String {
    let parts = release_parts(version);
    let major = parts.first().copied().unwrap_or(0);
    let minor = parts.get(1).copied().unwrap_or(0);
    let patch = parts.get(2).copied().unwrap_or(0);
    let upper = if major > 0 || parts.len() == 1 {
        format!("{}.0.0", major + 1)
    } else if minor > 0 || parts.len() == 2 {
        format!("0.{}.0", minor + 1)
    } else {
        format!("0.0.{}", patch + 1)
    };
    format!(">={version},<{upper}")
}

fn tilde_bounds(version: &str) -> String {
    let parts = release_parts(version);
    let major = parts.first().copied().unwrap_or(0);
    let upper = match parts.get(1) {
        Some(minor) => format!("{major}.{}.0", minor + 1),
        _ => format!("{}.0.0", major + 1),
    };
    format!(">={version},<{upper}")
}

/// `requires-python` for a poetry `python` constraint. Unions keep the
/// lowest lower bound of their alternatives.
fn requires_python(raw: &str) -> Result<String> {
    let alternatives: Vec<&str> = raw.split("||").map(str::trim).collect();
    if alternatives.len() == 1 {
        return Ok(convert_constraint(raw));
    }
    alternatives
        .iter()
        .filter_map(|alternative| lower_bound(&convert_constraint(alternative)))
        .min_by(|left, right| release_parts(left).cmp(&release_parts(right)))
        .map(|lowest| format!(">={lowest}"))
        .ok_or_else(|| anyhow!("can't derive requires-python from python = \"{raw}\""))
}

fn lower_bound(constraint: &str) -> Option<String> {
    constraint.split(',').find_map(|clause| {
        ["==", ">=", "~="]
            .iter()
            .find_map(|op| clause.strip_prefix(op))
            .map(|version| version.trim_end_matches(".*").to_string())
    })
}

/// `python_version` markers equivalent to a poetry `python` restriction.
fn python_markers(raw: &str) -> Vec<String> {
    let converted = convert_constraint(raw);
    let clauses: Vec<String> = converted
        .split(',')
        .filter_map(|clause| {
            let op = ["==", "!=", ">=", "<=", "~=", ">", "<"]
                .into_iter()
                .find(|op| clause.starts_with(op))?;
            let version = clause[op.len()..].trim();
            (!version.is_empty()).then(|| format!("python_version {op} \"{version}\""))
        })
        .collect();
    clauses
}

fn convert_entry_points(poetry: &dyn TableLike, project: &mut Table) {
    if let Some(scripts) = poetry.get("scripts").and_then(Item::as_table_like) {
        let mut converted = Table::new();
        for (name, target) in scripts.iter() {
            let reference = target.as_str().or_else(|| {
                target
                    .as_table_like()
                    .and_then(|table| table.get("callable"))
                    .and_then(Item::as_str)
            });
            match reference {
                Some(reference) => {
                    converted.insert(name, value(reference));
                }
                None => tracing::debug!(script = name, "skipping non-callable poetry script"),
            }
        }
        if !converted.is_empty() {
            project.insert("scripts", Item::Table(converted));
        }
    }

    if let Some(plugins) = poetry.get("plugins").and_then(Item::as_table_like) {
        let mut entry_points = Table::new();
        for (group, entries) in plugins.iter() {
            let Some(entries) = entries.as_table_like() else {
                continue;
            };
            let mut converted = Table::new();
            for (name, target) in entries.iter() {
                if let Some(target) = target.as_str() {
                    converted.insert(name, value(target));
                }
            }
            entry_points.insert(group, Item::Table(converted));
        }
        if !entry_points.is_empty() {
            project.insert("entry-points", Item::Table(entry_points));
        }
    }
}

fn convert_settings(poetry: &dyn TableLike, settings: &mut Table) {
    if let Some(build) = poetry.get("build") {
        let script = build.as_str().map(|script| (script, true)).or_else(|| {
            let table = build.as_table_like()?;
            let script = table.get("script").and_then(Item::as_str)?;
            let generate = table
                .get("generate-setup-file")
                .and_then(Item::as_bool)
                .unwrap_or(false);
            Some((script, generate))
        });
        if let Some((script, run_setuptools)) = script {
            let mut build = InlineTable::new();
            build.insert("setup-script", Value::from(script));
            build.insert("run-setuptools", Value::from(run_setuptools));
            settings.insert("build", value(build));
        }
    }

    let sources = poetry
        .get("source")
        .and_then(Item::as_array_of_tables)
        .into_iter()
        .flat_map(|sources| sources.iter())
        .filter_map(|source| {
            let name = source.get("name").and_then(Item::as_str)?;
            let url = source.get("url").and_then(Item::as_str)?;
            Some(source_entry(name, url, !url.starts_with("http://")))
        });
    if let Some(sources) = source_list(sources) {
        settings.insert("source", sources);
    }
}
