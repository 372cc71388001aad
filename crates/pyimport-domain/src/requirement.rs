use std::str::FromStr;

use once_cell::sync::Lazy;
use pep508_rs::Requirement as PepRequirement;
use regex::Regex;

// Optional extras group directly followed by a comparison operator and a
// dotted numeric version at the very end of the requirement.
static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\[[^\]]+\])?([<=>~]+[0-9.]+$)").expect("version suffix pattern")
});

/// Base package name of a requirement, used as the dedup key when merging
/// build requirements.
///
/// Whitespace is dropped first, then a trailing `[extras]<op><version>`
/// suffix is removed. Comparison of stems is case-sensitive.
pub fn requirement_stem(spec: &str) -> String {
    VERSION_SUFFIX.replace_all(&compact(spec), "").into_owned()
}

/// Whitespace-normalize a requirement that parses as PEP 508, keeping the
/// original text (trimmed) otherwise.
///
/// The name, extras and version specifiers are written without spaces
/// (`requests[socks]>=2.0,<3`), direct references as `name @ url`, and
/// markers follow `; ` with their internal spacing collapsed.
pub fn normalize_requirement(spec: &str) -> String {
    let trimmed = spec.trim();
    if PepRequirement::from_str(trimmed).is_err() {
        return trimmed.to_string();
    }
    // A URL may itself contain `;`, so direct references need whitespace
    // before their marker.
    let separator = if trimmed.contains('@') { " ;" } else { ";" };
    let (head, marker) = match trimmed.split_once(separator) {
        Some((head, marker)) => (head, Some(marker)),
        None => (trimmed, None),
    };
    let mut normalized = match head.split_once('@') {
        Some((name, url)) => direct_reference(&compact(name), url.trim()),
        None => compact(head),
    };
    if let Some(marker) = marker {
        let marker = marker.split_whitespace().collect::<Vec<_>>().join(" ");
        if !marker.is_empty() {
            normalized = format!("{normalized}; {marker}");
        }
    }
    normalized
}

fn compact(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}

pub(crate) fn is_pep508_requirement(spec: &str) -> bool {
    PepRequirement::from_str(spec.trim()).is_ok()
}

/// `name @ url` form for direct references such as VCS checkouts.
pub(crate) fn direct_reference(name: &str, url: &str) -> String {
    format!("{name} @ {url}")
}
