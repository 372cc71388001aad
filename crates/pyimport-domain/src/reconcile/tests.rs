use std::cell::{Cell, RefCell};

use anyhow::Result;
use toml_edit::{value, Array, DocumentMut, Item, Table};

use super::*;
use crate::backend::DEFAULT_BACKEND;
use crate::error::UsageError;

struct FakeHost {
    version: InterpreterVersion,
    interpreter_calls: Cell<usize>,
    notices: RefCell<Vec<String>>,
}

impl FakeHost {
    fn new(major: u64, minor: u64) -> Self {
        Self {
            version: InterpreterVersion { major, minor },
            interpreter_calls: Cell::new(0),
            notices: RefCell::new(Vec::new()),
        }
    }

    fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }
}

impl ReconcileHost for FakeHost {
    fn resolve_interpreter(&self, in_import: bool) -> Result<InterpreterVersion> {
        assert!(in_import, "import must resolve with the importing flag");
        self.interpreter_calls.set(self.interpreter_calls.get() + 1);
        Ok(self.version)
    }

    fn echo(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }
}

fn doc(src: &str) -> DocumentMut {
    src.parse().expect("valid toml")
}

fn data(src: &str) -> Table {
    doc(src).as_table().clone()
}

fn requires(doc: &DocumentMut) -> Vec<String> {
    doc["build-system"]["requires"]
        .as_array()
        .expect("requires array")
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn build_system_matches_default(doc: &DocumentMut) -> bool {
    doc.get("build-system")
        .and_then(Item::as_table_like)
        .is_some_and(|table| DEFAULT_BACKEND.matches(table) && table.len() == 2)
}

#[test]
fn empty_manifest_with_reset_uses_default_backend() -> Result<()> {
    let host = FakeHost::new(3, 11);
    let mut manifest = DocumentMut::new();
    let mut project_data = Table::new();
    project_data.insert("name", value("pkg"));
    project_data.insert(
        "-build-requires",
        value(["setuptools>=40"].into_iter().collect::<Array>()),
    );
    project_data.insert("-build-backend", value("setuptools.build_meta"));

    let report = reconcile(
        &mut manifest,
        project_data,
        Table::new(),
        BuildSystemDeclaration::default(),
        true,
        &host,
    )?;

    assert_eq!(manifest["project"]["name"].as_str(), Some("pkg"));
    assert!(manifest["project"].get("-build-requires").is_none());
    assert!(manifest["project"].get("-build-backend").is_none());
    assert!(build_system_matches_default(&manifest));
    assert_eq!(manifest["project"]["requires-python"].as_str(), Some(">=3.11"));
    assert!(manifest["tool"]["pdm"].is_table());
    assert_eq!(report.build_system, BuildSystemAction::Reset);
    assert_eq!(report.requires_python.as_deref(), Some(">=3.11"));
    assert_eq!(host.interpreter_calls.get(), 1);
    assert_eq!(
        host.notices(),
        vec![
            "The project's requires-python has been set to >=3.11. You can change it later if necessary."
                .to_string()
        ]
    );
    let rendered = manifest.to_string();
    assert!(rendered.contains("# PEP 621 project metadata"));
    Ok(())
}

#[test]
fn reset_replaces_any_existing_build_system() -> Result<()> {
    let host = FakeHost::new(3, 12);
    let mut manifest = doc(
        r#"[project]
name = "demo"
requires-python = ">=3.9"

# build configuration
[build-system]
requires = ["hatchling", "hatch-vcs"]
build-backend = "hatchling.build"
backend-path = ["."]
"#,
    );
    reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        BuildSystemDeclaration::default(),
        true,
        &host,
    )?;
    assert!(build_system_matches_default(&manifest));
    assert!(manifest.to_string().contains("# build configuration\n[build-system]"));
    Ok(())
}

#[test]
fn existing_requires_python_is_untouched() -> Result<()> {
    let host = FakeHost::new(3, 13);
    let mut manifest = doc("[project]\nname = \"demo\"\nrequires-python = \">=3.8\"\n");
    let report = reconcile(
        &mut manifest,
        data("version = \"1.0\"\n"),
        Table::new(),
        BuildSystemDeclaration::default(),
        true,
        &host,
    )?;
    assert_eq!(manifest["project"]["requires-python"].as_str(), Some(">=3.8"));
    assert_eq!(host.interpreter_calls.get(), 0);
    assert!(report.requires_python.is_none());
    assert!(host.notices().is_empty());
    Ok(())
}

#[test]
fn fresh_build_system_is_created_from_import() -> Result<()> {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc("[project]\nname = \"demo\"\nrequires-python = \">=3.8\"\n");
    let declaration = BuildSystemDeclaration {
        requires: Some(vec!["setuptools>=40".to_string(), "wheel".to_string()]),
        backend: Some("setuptools.build_meta".to_string()),
    };
    let report = reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration,
        false,
        &host,
    )?;
    assert_eq!(report.build_system, BuildSystemAction::Created);
    assert_eq!(requires(&manifest), vec!["setuptools>=40", "wheel"]);
    assert_eq!(
        manifest["build-system"]["build-backend"].as_str(),
        Some("setuptools.build_meta")
    );
    assert_eq!(
        host.notices(),
        vec![
            "The project's build dependencies have been set to [\"setuptools>=40\", \"wheel\"]"
                .to_string(),
            "The project's build backend has been set to setuptools.build_meta".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn missing_build_system_without_full_declaration_fails() {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc("[project]\nname = \"demo\"\n");
    let mut project_data = Table::new();
    project_data.insert("-build-backend", value("setuptools.build_meta"));
    let err = reconcile(
        &mut manifest,
        project_data,
        Table::new(),
        BuildSystemDeclaration::default(),
        false,
        &host,
    )
    .unwrap_err();
    let usage = err.downcast_ref::<UsageError>().expect("usage error");
    assert_eq!(usage, &UsageError::BuildSystemUnavailable);
    assert!(err.to_string().contains("please fill it manually"));
    assert_eq!(host.interpreter_calls.get(), 0);
}

#[test]
fn backend_disagreement_names_both_values() {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc(
        "[project]\nname = \"demo\"\n\n[build-system]\nrequires = [\"a\"]\nbuild-backend = \"A\"\n",
    );
    let declaration = BuildSystemDeclaration {
        requires: Some(vec!["a".to_string()]),
        backend: Some("B".to_string()),
    };
    let err = reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration,
        false,
        &host,
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("found A"), "{message}");
    assert!(message.contains("expected B"), "{message}");
}

#[test]
fn incomplete_build_system_fails() {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc("[build-system]\nbuild-backend = \"A\"\n");
    let declaration = BuildSystemDeclaration {
        requires: Some(vec!["a".to_string()]),
        backend: Some("A".to_string()),
    };
    let err = reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration,
        false,
        &host,
    )
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<UsageError>(),
        Some(&UsageError::IncompleteBuildSystem)
    );
}

#[test]
fn repeated_imports_do_not_duplicate_build_requirements() -> Result<()> {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc(
        r#"[project]
name = "demo"
requires-python = ">=3.8"

[build-system]
requires = ["setuptools>=61"]
build-backend = "setuptools.build_meta"
"#,
    );
    let declaration = BuildSystemDeclaration {
        requires: Some(vec![
            "setuptools>=40".to_string(),
            "setuptools-scm[toml]>=6.2".to_string(),
        ]),
        backend: Some("setuptools.build_meta".to_string()),
    };

    let first = reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration.clone(),
        false,
        &host,
    )?;
    let after_first = requires(&manifest);
    let second = reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration,
        false,
        &host,
    )?;

    assert_eq!(after_first, vec!["setuptools>=61", "setuptools-scm[toml]>=6.2"]);
    assert_eq!(requires(&manifest), after_first);
    assert_eq!(
        first.build_system,
        BuildSystemAction::Extended {
            added: vec!["setuptools-scm[toml]>=6.2".to_string()]
        }
    );
    assert_eq!(second.build_system, BuildSystemAction::Unchanged);
    assert_eq!(
        host.notices(),
        vec![
            "The project's build dependencies have been set to [\"setuptools>=61\", \"setuptools-scm[toml]>=6.2\"]"
                .to_string()
        ]
    );
    Ok(())
}

#[test]
fn partial_declaration_with_existing_table_is_a_no_op() -> Result<()> {
    let host = FakeHost::new(3, 10);
    let src = "[project]\nname = \"demo\"\nrequires-python = \">=3.8\"\n\n[build-system]\nrequires = [\"flit_core\"]\nbuild-backend = \"flit_core.buildapi\"\n";
    let mut manifest = doc(src);
    let declaration = BuildSystemDeclaration {
        requires: None,
        backend: Some("setuptools.build_meta".to_string()),
    };
    let report = reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration,
        false,
        &host,
    )?;
    assert_eq!(report.build_system, BuildSystemAction::Unchanged);
    assert_eq!(manifest.to_string(), format!("{src}\n[tool.pdm]\n"));
    Ok(())
}

#[test]
fn legacy_build_setting_is_structured_before_merge() -> Result<()> {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc(
        "[project]\nname = \"demo\"\nrequires-python = \">=3.8\"\n\n[tool.pdm]\nbuild = \"build.py\"\n",
    );
    reconcile(
        &mut manifest,
        Table::new(),
        data("[build]\nis-purelib = true\n"),
        BuildSystemDeclaration::default(),
        true,
        &host,
    )?;
    let build = manifest["tool"]["pdm"]["build"]
        .as_table_like()
        .expect("build table");
    assert_eq!(build.get("setup-script").and_then(Item::as_str), Some("build.py"));
    assert_eq!(build.get("run-setuptools").and_then(Item::as_bool), Some(true));
    assert_eq!(build.get("is-purelib").and_then(Item::as_bool), Some(true));
    Ok(())
}

#[test]
fn metadata_merge_overwrites_and_keeps_untouched_content() -> Result<()> {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc(
        r#"# Managed by hand
[project]
name = "demo" # project name
dependencies = ["requests"]
requires-python = ">=3.8"

[project.urls]
Homepage = "https://example.com"

[tool.black]
line-length = 100
"#,
    );
    reconcile(
        &mut manifest,
        data(
            "dependencies = [\"httpx\"]\ndescription = \"imported\"\n[urls]\nRepository = \"https://git.example.com\"\n",
        ),
        data("[dev-dependencies]\ntest = [\"pytest\"]\n"),
        BuildSystemDeclaration::default(),
        true,
        &host,
    )?;
    let deps: Vec<_> = manifest["project"]["dependencies"]
        .as_array()
        .expect("deps")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(deps, vec!["httpx"]);
    assert_eq!(manifest["project"]["description"].as_str(), Some("imported"));
    assert_eq!(
        manifest["project"]["urls"]["Homepage"].as_str(),
        Some("https://example.com")
    );
    assert_eq!(
        manifest["project"]["urls"]["Repository"].as_str(),
        Some("https://git.example.com")
    );
    assert_eq!(
        manifest["tool"]["pdm"]["dev-dependencies"]["test"][0].as_str(),
        Some("pytest")
    );
    let rendered = manifest.to_string();
    assert!(rendered.starts_with("# Managed by hand\n[project]\nname = \"demo\" # project name\n"));
    assert!(rendered.contains("[tool.black]\nline-length = 100\n"));
    Ok(())
}

#[test]
fn malformed_reserved_keys_are_rejected() {
    let mut project_data = Table::new();
    project_data.insert("-build-backend", value(3));
    let mut declaration = BuildSystemDeclaration::default();
    assert!(declaration.absorb(&mut project_data).is_err());
}

#[test]
fn appended_build_requirements_keep_existing_comments() -> Result<()> {
    let host = FakeHost::new(3, 10);
    let mut manifest = doc(
        r#"[project]
name = "demo"
requires-python = ">=3.8"

[build-system]
requires = [
  # pinned for legacy builds
  "setuptools>=40",  # keep
  "wheel",
]
build-backend = "setuptools.build_meta"
"#,
    );
    let declaration = BuildSystemDeclaration {
        requires: Some(vec!["setuptools>=61".to_string(), "cython>=3".to_string()]),
        backend: Some("setuptools.build_meta".to_string()),
    };
    reconcile(
        &mut manifest,
        Table::new(),
        Table::new(),
        declaration,
        false,
        &host,
    )?;
    assert!(manifest.to_string().contains(
        "requires = [\n  # pinned for legacy builds\n  \"setuptools>=40\",  # keep\n  \"wheel\",\n  \"cython>=3\",\n]\n"
    ));
    Ok(())
}

#[test]
fn fresh_manifest_lists_project_before_tool_settings() -> Result<()> {
    let host = FakeHost::new(3, 12);
    let mut manifest = DocumentMut::new();
    reconcile(
        &mut manifest,
        data("name = \"pkg\"\n"),
        data("[dev-dependencies]\ntest = [\"pytest\"]\n"),
        BuildSystemDeclaration::default(),
        true,
        &host,
    )?;
    let rendered = manifest.to_string();
    assert!(rendered.starts_with("# PEP 621 project metadata\n"), "{rendered}");
    let project = rendered.find("[project]");
    let tool = rendered.find("[tool.pdm");
    assert!(project.is_some() && project < tool, "{rendered}");
    Ok(())
}
