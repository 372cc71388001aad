use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use toml_edit::DocumentMut;
use url::Url;

use super::{
    place_dependencies, source_entry, source_list, Converted, Converter, FormatKey,
    ImportOptions,
};
use crate::requirement::{direct_reference, is_pep508_requirement, normalize_requirement};

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\s+)#.*$").expect("comment pattern"));
static EGG_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#egg=([A-Za-z0-9][A-Za-z0-9._-]*)").expect("egg fragment pattern"));

pub(crate) struct Requirements;

impl Converter for Requirements {
    fn key(&self) -> FormatKey {
        FormatKey::Requirements
    }

    fn check_fingerprint(&self, _project: &Path, filename: &Path) -> bool {
        if !filename.is_file() {
            return false;
        }
        let Ok(contents) = fs::read_to_string(filename) else {
            return false;
        };
        let first = logical_lines(&contents).next();
        match first {
            // Blank and comment-only files parse as TOML too; only the name
            // can tell them apart.
            None => has_requirements_name(filename),
            Some(_) if contents.parse::<DocumentMut>().is_ok() => false,
            Some(line) => line.starts_with('-') || is_pep508_requirement(&line),
        }
    }

    fn convert(
        &self,
        _project: &Path,
        filename: &Path,
        options: &ImportOptions,
    ) -> Result<Converted> {
        let mut parsed = ParsedRequirements::default();
        let mut visited = HashSet::new();
        read_requirements(filename, &mut visited, &mut parsed)?;
        tracing::debug!(
            file = %filename.display(),
            requirements = parsed.requirements.len(),
            indexes = parsed.index_urls.len(),
            "parsed requirements file"
        );

        let mut converted = Converted::default();
        place_dependencies(&mut converted, &parsed.requirements, options);
        if let Some(sources) = source_list(parsed.sources()) {
            converted.settings.insert("source", sources);
        }
        Ok(converted)
    }
}

#[derive(Debug, Default)]
struct ParsedRequirements {
    requirements: Vec<String>,
    index_urls: Vec<String>,
    trusted_hosts: Vec<String>,
}

impl ParsedRequirements {
    fn sources(&self) -> Vec<toml_edit::Table> {
        self.index_urls
            .iter()
            .enumerate()
            .map(|(idx, url)| {
                let name = match idx {
                    0 => "pypi".to_string(),
                    1 => "extra".to_string(),
                    n => format!("extra{}", n - 1),
                };
                source_entry(&name, url, self.verify_ssl(url))
            })
            .collect()
    }

    fn verify_ssl(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        if parsed.scheme() == "http" {
            return false;
        }
        let host = parsed.host_str().unwrap_or_default();
        let with_port = parsed
            .port()
            .map(|port| format!("{host}:{port}"))
            .unwrap_or_else(|| host.to_string());
        !self
            .trusted_hosts
            .iter()
            .any(|trusted| trusted == host || *trusted == with_port)
    }

    fn add_index(&mut self, url: &str, primary: bool) {
        let url = url.trim().to_string();
        if url.is_empty() || self.index_urls.contains(&url) {
            return;
        }
        if primary {
            self.index_urls.insert(0, url);
        } else {
            self.index_urls.push(url);
        }
    }
}

/// `requirements.txt`, `requirements-dev.txt` and similar names.
fn has_requirements_name(filename: &Path) -> bool {
    filename
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|name| name.starts_with("requirements") && name.ends_with(".txt"))
}

/// Comment-stripped, continuation-joined, non-empty lines.
fn logical_lines(contents: &str) -> impl Iterator<Item = String> + '_ {
    let mut pending = String::new();
    let mut lines = contents.lines();
    std::iter::from_fn(move || loop {
        let Some(raw) = lines.next() else {
            if pending.trim().is_empty() {
                return None;
            }
            let line = pending.trim().to_string();
            pending.clear();
            return Some(line);
        };
        let stripped = COMMENT.replace(raw, "");
        if let Some(continued) = stripped.strip_suffix('\\') {
            pending.push_str(continued);
            pending.push(' ');
            continue;
        }
        pending.push_str(&stripped);
        let line = pending.trim().to_string();
        pending.clear();
        if !line.is_empty() {
            return Some(line);
        }
    })
}

/// Split `--opt value`, `--opt=value` and `-ovalue` forms.
fn option_value<'a>(line: &'a str, names: &[&str]) -> Option<&'a str> {
    for name in names {
        let Some(rest) = line.strip_prefix(name) else {
            continue;
        };
        if name.starts_with("--") {
            if let Some(value) = rest.strip_prefix('=') {
                return Some(value.trim());
            }
            if rest.starts_with(char::is_whitespace) {
                return Some(rest.trim());
            }
        } else {
            return Some(rest.trim_start_matches('=').trim());
        }
    }
    None
}

fn read_requirements(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    parsed: &mut ParsedRequirements,
) -> Result<()> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        tracing::debug!(file = %path.display(), "skipping already included requirements file");
        return Ok(());
    }
    let contents = fs::read_to_string(&canonical)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let base_dir = canonical.parent().unwrap_or_else(|| Path::new("."));

    for line in logical_lines(&contents) {
        if let Some(target) = option_value(&line, &["--requirement", "-r"]) {
            if !target.is_empty() {
                read_requirements(&base_dir.join(target), visited, parsed)?;
            }
            continue;
        }
        if let Some(url) = option_value(&line, &["--index-url", "-i"]) {
            parsed.add_index(url, true);
            continue;
        }
        if let Some(url) = option_value(&line, &["--extra-index-url"]) {
            parsed.add_index(url, false);
            continue;
        }
        if let Some(host) = option_value(&line, &["--trusted-host"]) {
            parsed.trusted_hosts.push(host.to_string());
            continue;
        }
        let spec = option_value(&line, &["--editable", "-e"]).unwrap_or(&line);
        if spec.starts_with('-') {
            tracing::debug!(option = %spec, "ignoring unsupported pip option");
            continue;
        }
        if let Some(requirement) = requirement_line(spec) {
            parsed.requirements.push(requirement);
        }
    }
    Ok(())
}

/// Normalize one requirement line, dropping per-requirement pip options
/// such as `--hash`.
fn requirement_line(spec: &str) -> Option<String> {
    let spec = match spec.find(" --") {
        Some(idx) => spec[..idx].trim(),
        None => spec.trim(),
    };
    if spec.is_empty() {
        return None;
    }
    if let Some(captures) = EGG_FRAGMENT.captures(spec) {
        let name = &captures[1];
        let url = EGG_FRAGMENT.replace(spec, "");
        return Some(direct_reference(name, url.trim_end_matches('#')));
    }
    Some(normalize_requirement(spec))
}
