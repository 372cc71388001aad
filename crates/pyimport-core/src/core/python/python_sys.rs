use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use pyimport_domain::InterpreterVersion;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::from_slice;
use which::which;

use crate::RUNTIME_PYTHON_ENV;

const VERSION_SCRIPT: &str = r#"import json, sys
print(json.dumps({"major": sys.version_info[0], "minor": sys.version_info[1]}))
"#;

#[derive(Deserialize)]
struct VersionPayload {
    major: u64,
    minor: u64,
}

/// Detects a usable Python interpreter.
///
/// An explicit interpreter (from `PYIMPORT_RUNTIME_PYTHON`) wins; otherwise
/// `python3` then `python` are looked up on `PATH`.
pub fn detect_interpreter(explicit: Option<&str>) -> Result<String> {
    if let Some(explicit) = explicit {
        tracing::debug!(python = explicit, "using explicit interpreter");
        return Ok(explicit.to_string());
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which(candidate) {
            return path
                .into_os_string()
                .into_string()
                .map_err(|_| anyhow!("non-utf8 path"));
        }
    }

    bail!("no python interpreter found; set {RUNTIME_PYTHON_ENV}")
}

/// Asks `python` for its major/minor version.
pub fn probe_version(python: &str) -> Result<InterpreterVersion> {
    let payload: VersionPayload = probe_python(python, VERSION_SCRIPT, "version")?;
    tracing::debug!(python, major = payload.major, minor = payload.minor, "probed interpreter");
    Ok(InterpreterVersion {
        major: payload.major,
        minor: payload.minor,
    })
}

fn probe_python<T>(python: &str, script: &str, guide: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let cmd = Command::new(python)
        .arg("-c")
        .arg(script)
        .output()
        .with_context(|| format!("failed to probe {guide} via {python}"))?;
    if !cmd.status.success() {
        let stderr = String::from_utf8_lossy(&cmd.stderr);
        bail!("python {guide} probe failed: {stderr}");
    }
    from_slice(&cmd.stdout).context(format!("invalid {guide} payload"))
}
