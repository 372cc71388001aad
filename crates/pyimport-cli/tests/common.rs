#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;
use toml_edit::DocumentMut;

pub fn project_dir(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir")
}

/// Writes an executable that answers the interpreter version probe with
/// Python 3.11, so tests never depend on a system interpreter.
#[cfg(unix)]
pub fn stub_python(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-python");
    fs::write(&path, "#!/bin/sh\necho '{\"major\": 3, \"minor\": 11}'\n").expect("write stub");
    let mut perms = fs::metadata(&path).expect("stub metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod stub");
    path
}

pub fn read_manifest(project: &Path) -> DocumentMut {
    let contents = fs::read_to_string(project.join("pyproject.toml")).expect("read manifest");
    contents.parse().expect("valid manifest")
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn stdout(assert: &Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}
