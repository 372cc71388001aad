use std::path::Path;

use anyhow::{anyhow, Result};
use toml_edit::{value, Array, Item, Table, TableLike};

use super::{
    dependency_array, forward_build_system, license_text, lookup, person, probe_toml, read_toml,
    string_array, string_list, subtable, Converted, Converter, FormatKey, ImportOptions,
};

pub(crate) struct Flit;

impl Converter for Flit {
    fn key(&self) -> FormatKey {
        FormatKey::Flit
    }

    fn check_fingerprint(&self, _project: &Path, filename: &Path) -> bool {
        probe_toml(filename).is_some_and(|doc| {
            lookup(&doc, &["tool", "flit", "metadata"]).is_some_and(Item::is_table_like)
        })
    }

    fn convert(
        &self,
        _project: &Path,
        filename: &Path,
        _options: &ImportOptions,
    ) -> Result<Converted> {
        let doc = read_toml(filename)?;
        let metadata = lookup(&doc, &["tool", "flit", "metadata"])
            .and_then(Item::as_table_like)
            .ok_or_else(|| anyhow!("{} has no [tool.flit.metadata] table", filename.display()))?;

        let mut converted = Converted::default();
        convert_metadata(metadata, &mut converted);

        let flit = lookup(&doc, &["tool", "flit"]).and_then(Item::as_table_like);
        if let Some(flit) = flit {
            convert_entry_points(flit, &mut converted.project_data);
            convert_sdist(flit, &mut converted.settings);
        }
        forward_build_system(&doc, &mut converted.project_data);
        tracing::debug!(file = %filename.display(), "converted flit metadata");
        Ok(converted)
    }
}

fn convert_metadata(metadata: &dyn TableLike, converted: &mut Converted) {
    let text = |key: &str| metadata.get(key).and_then(Item::as_str);
    let project = &mut converted.project_data;

    if let Some(name) = text("dist-name").or_else(|| text("module")) {
        project.insert("name", value(name));
    }
    for (key, name_key, email_key) in [
        ("authors", "author", "author-email"),
        ("maintainers", "maintainer", "maintainer-email"),
    ] {
        if let Some(entry) = person(text(name_key), text(email_key)) {
            let mut people = Array::new();
            people.push(entry);
            project.insert(key, value(people));
        }
    }
    if let Some(readme) = text("description-file") {
        project.insert("readme", value(readme));
    }
    if let Some(python) = text("requires-python") {
        project.insert("requires-python", value(python));
    }
    if let Some(license) = text("license") {
        project.insert("license", license_text(license));
    }
    if let Some(keywords) = text("keywords") {
        project.insert("keywords", value(string_array(split_keywords(keywords))));
    }
    let classifiers = string_list(metadata.get("classifiers"));
    if !classifiers.is_empty() {
        project.insert("classifiers", value(string_array(classifiers)));
    }
    if metadata.contains_key("requires") {
        let requires = string_list(metadata.get("requires"));
        project.insert("dependencies", value(dependency_array(requires)));
    }

    let mut urls = Table::new();
    if let Some(home) = text("home-page") {
        urls.insert("Homepage", value(home));
    }
    if let Some(extra) = metadata.get("urls").and_then(Item::as_table_like) {
        for (label, url) in extra.iter() {
            if let Some(url) = url.as_str() {
                urls.insert(label, value(url));
            }
        }
    }
    if !urls.is_empty() {
        project.insert("urls", Item::Table(urls));
    }

    project.insert("dynamic", value(string_array(["version", "description"])));

    if let Some(extras) = metadata.get("requires-extra").and_then(Item::as_table_like) {
        for (extra, requirements) in extras.iter() {
            let array = value(dependency_array(string_list(Some(requirements))));
            if extra == "dev" {
                subtable(&mut converted.settings, "dev-dependencies").insert("dev", array);
            } else {
                subtable(&mut converted.project_data, "optional-dependencies").insert(extra, array);
            }
        }
    }
}

fn split_keywords(raw: &str) -> Vec<&str> {
    let pieces: Vec<&str> = if raw.contains(',') {
        raw.split(',').collect()
    } else {
        raw.split_whitespace().collect()
    };
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

fn string_table(source: &dyn TableLike) -> Table {
    let mut table = Table::new();
    for (key, entry) in source.iter() {
        if let Some(entry) = entry.as_str() {
            table.insert(key, value(entry));
        }
    }
    table
}

fn convert_entry_points(flit: &dyn TableLike, project: &mut Table) {
    if let Some(scripts) = flit.get("scripts").and_then(Item::as_table_like) {
        project.insert("scripts", Item::Table(string_table(scripts)));
    }
    if let Some(groups) = flit.get("entrypoints").and_then(Item::as_table_like) {
        let mut entry_points = Table::new();
        for (group, entries) in groups.iter() {
            if let Some(entries) = entries.as_table_like() {
                entry_points.insert(group, Item::Table(string_table(entries)));
            }
        }
        if !entry_points.is_empty() {
            project.insert("entry-points", Item::Table(entry_points));
        }
    }
}

fn convert_sdist(flit: &dyn TableLike, settings: &mut Table) {
    let Some(sdist) = flit.get("sdist").and_then(Item::as_table_like) else {
        return;
    };
    let includes = string_list(sdist.get("include"));
    let excludes = string_list(sdist.get("exclude"));
    if includes.is_empty() && excludes.is_empty() {
        return;
    }
    let build = subtable(settings, "build");
    if !includes.is_empty() {
        build.insert("source-includes", value(string_array(includes)));
    }
    if !excludes.is_empty() {
        build.insert("excludes", value(string_array(excludes)));
    }
}
