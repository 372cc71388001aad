use std::path::Path;

use anyhow::Result;
use toml_edit::{value, Item, TableLike, Value};

use super::{
    file_url, place_dependencies, read_toml, source_entry, source_list, subtable, Converted,
    Converter, FormatKey, ImportOptions,
};
use crate::requirement::direct_reference;

const MARKER_KEYS: &[&str] = &[
    "os_name",
    "sys_platform",
    "platform_machine",
    "platform_python_implementation",
    "platform_release",
    "platform_system",
    "platform_version",
    "python_version",
    "python_full_version",
    "implementation_name",
    "implementation_version",
];

pub(crate) struct Pipfile;

impl Converter for Pipfile {
    fn key(&self) -> FormatKey {
        FormatKey::Pipfile
    }

    fn check_fingerprint(&self, _project: &Path, filename: &Path) -> bool {
        filename.file_name().is_some_and(|name| name == "Pipfile")
    }

    fn convert(
        &self,
        _project: &Path,
        filename: &Path,
        options: &ImportOptions,
    ) -> Result<Converted> {
        let doc = read_toml(filename)?;
        let mut converted = Converted::default();

        let requires = doc.get("requires").and_then(Item::as_table_like);
        let python = requires.and_then(|requires| {
            requires
                .get("python_full_version")
                .or_else(|| requires.get("python_version"))
                .and_then(Item::as_str)
        });
        if let Some(python) = python {
            converted
                .project_data
                .insert("requires-python", value(format!(">={}", python.trim())));
        }

        let packages = section_requirements(doc.get("packages"));
        place_dependencies(&mut converted, &packages, options);

        let dev_packages = section_requirements(doc.get("dev-packages"));
        if !dev_packages.is_empty() {
            let groups = subtable(&mut converted.settings, "dev-dependencies");
            match groups.get_mut("dev").and_then(Item::as_array_mut) {
                Some(existing) => {
                    for requirement in &dev_packages {
                        existing.push(requirement.as_str());
                    }
                    crate::manifest::format_multiline(existing);
                }
                None => {
                    groups.insert("dev", value(super::dependency_array(&dev_packages)));
                }
            }
        }

        let sources = doc
            .get("source")
            .and_then(Item::as_array_of_tables)
            .into_iter()
            .flat_map(|sources| sources.iter())
            .filter_map(|source| {
                let name = source.get("name").and_then(Item::as_str)?;
                let url = source.get("url").and_then(Item::as_str)?;
                let verify_ssl = source
                    .get("verify_ssl")
                    .and_then(Item::as_bool)
                    .unwrap_or(true);
                Some(source_entry(name, url, verify_ssl))
            });
        if let Some(sources) = source_list(sources) {
            converted.settings.insert("source", sources);
        }

        let prereleases = doc
            .get("pipenv")
            .and_then(Item::as_table_like)
            .and_then(|pipenv| pipenv.get("allow_prereleases"))
            .and_then(Item::as_bool);
        if let Some(allow) = prereleases {
            subtable(&mut converted.settings, "resolution").insert("allow-prereleases", value(allow));
        }

        tracing::debug!(
            packages = packages.len(),
            dev_packages = dev_packages.len(),
            "converted Pipfile"
        );
        Ok(converted)
    }
}

fn section_requirements(section: Option<&Item>) -> Vec<String> {
    let Some(section) = section.and_then(Item::as_table_like) else {
        return Vec::new();
    };
    section
        .iter()
        .filter_map(|(name, spec)| pipfile_requirement(name, spec))
        .collect()
}

fn pipfile_requirement(name: &str, spec: &Item) -> Option<String> {
    if let Some(version) = spec.as_str() {
        return Some(versioned(name, version));
    }
    let table = spec.as_table_like()?;
    let field = |key: &str| table.get(key).and_then(Item::as_str).map(str::trim);

    let extras: Vec<&str> = table
        .get("extras")
        .and_then(Item::as_array)
        .map(|extras| extras.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let named = if extras.is_empty() {
        name.to_string()
    } else {
        format!("{name}[{}]", extras.join(","))
    };

    let mut requirement = if let Some(git) = field("git") {
        let url = match field("ref") {
            Some(reference) => format!("git+{git}@{reference}"),
            None => format!("git+{git}"),
        };
        direct_reference(&named, &url)
    } else if let Some(path) = field("path") {
        direct_reference(&named, &file_url(path))
    } else if let Some(file) = field("file") {
        direct_reference(&named, file)
    } else {
        versioned(&named, field("version").unwrap_or("*"))
    };

    let markers = markers(table);
    if !markers.is_empty() {
        requirement = format!("{requirement}; {}", markers.join(" and "));
    }
    Some(requirement)
}

fn versioned(name: &str, version: &str) -> String {
    let version = version.trim();
    if version.is_empty() || version == "*" {
        name.to_string()
    } else {
        let compact: String = version.split_whitespace().collect();
        format!("{name}{compact}")
    }
}

fn markers(table: &dyn TableLike) -> Vec<String> {
    let mut markers = Vec::new();
    if let Some(expr) = table.get("markers").and_then(Item::as_str) {
        markers.push(expr.trim().to_string());
    }
    for key in MARKER_KEYS {
        if let Some(constraint) = table.get(key).and_then(Item::as_str) {
            markers.push(format!("{key} {}", constraint.trim()));
        }
    }
    if markers.len() > 1 {
        for marker in &mut markers {
            if marker.contains(" or ") {
                *marker = format!("({marker})");
            }
        }
    }
    markers
}
