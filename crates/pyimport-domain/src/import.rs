use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::formats::{resolve_format, FormatKey, ImportOptions};
use crate::manifest::Manifest;
use crate::reconcile::{reconcile, BuildSystemAction, BuildSystemDeclaration, ReconcileHost};

/// What an import did to the project manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub format: FormatKey,
    pub manifest_path: PathBuf,
    pub build_system: BuildSystemAction,
    pub requires_python: Option<String>,
}

/// Import `filename` into the `pyproject.toml` at `project_root`.
///
/// The manifest is only written once conversion and reconciliation have
/// both succeeded.
pub fn import_file(
    project_root: &Path,
    filename: &Path,
    format: Option<FormatKey>,
    options: &ImportOptions,
    reset_backend: bool,
    host: &dyn ReconcileHost,
) -> Result<ImportSummary> {
    let format = resolve_format(project_root, filename, format)?;
    tracing::debug!(file = %filename.display(), format = %format, "import format selected");

    let converted = format.converter().convert(project_root, filename, options)?;
    let mut manifest = Manifest::load_project(project_root)?;
    let report = reconcile(
        manifest.doc_mut(),
        converted.project_data,
        converted.settings,
        BuildSystemDeclaration::default(),
        reset_backend,
        host,
    )?;
    manifest.write()?;
    tracing::info!(
        manifest = %manifest.path().display(),
        format = %format,
        build_system = ?report.build_system,
        "imported project metadata"
    );

    Ok(ImportSummary {
        format,
        manifest_path: manifest.path().to_path_buf(),
        build_system: report.build_system,
        requires_python: report.requires_python,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UsageError;
    use crate::reconcile::InterpreterVersion;
    use std::{cell::RefCell, fs};
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingHost {
        notices: RefCell<Vec<String>>,
    }

    impl ReconcileHost for RecordingHost {
        fn resolve_interpreter(&self, _in_import: bool) -> Result<InterpreterVersion> {
            Ok(InterpreterVersion {
                major: 3,
                minor: 12,
            })
        }

        fn echo(&self, message: &str) {
            self.notices.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn requirements_import_creates_manifest() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        let reqs = root.join("requirements.txt");
        fs::write(&reqs, "requests==2.31.0\nclick>=8\n")?;
        let host = RecordingHost::default();

        let summary = import_file(root, &reqs, None, &ImportOptions::default(), true, &host)?;
        assert_eq!(summary.format, FormatKey::Requirements);
        assert_eq!(summary.build_system, BuildSystemAction::Reset);
        assert_eq!(summary.requires_python.as_deref(), Some(">=3.12"));

        let written = fs::read_to_string(root.join("pyproject.toml"))?;
        assert!(written.starts_with("# PEP 621 project metadata\n"), "{written}");
        assert!(written.contains("    \"requests==2.31.0\",\n"), "{written}");
        assert!(written.contains("requires-python = \">=3.12\""), "{written}");
        assert!(written.contains("[tool.pdm]"), "{written}");
        assert!(written.contains("build-backend = \"pdm.backend\""), "{written}");
        Ok(())
    }

    #[test]
    fn failed_reconciliation_leaves_manifest_untouched() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        let manifest = root.join("pyproject.toml");
        let original = "[project]\nname = \"demo\"\n";
        fs::write(&manifest, original)?;
        let reqs = root.join("requirements.txt");
        fs::write(&reqs, "requests\n")?;

        let err = import_file(
            root,
            &reqs,
            Some(FormatKey::Requirements),
            &ImportOptions::default(),
            false,
            &RecordingHost::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<UsageError>(),
            Some(&UsageError::BuildSystemUnavailable)
        );
        assert_eq!(fs::read_to_string(&manifest)?, original);
        Ok(())
    }

    #[test]
    fn poetry_import_keeps_matching_backend() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        fs::write(
            root.join("pyproject.toml"),
            "[project]\nname = \"demo\"\nrequires-python = \">=3.9\"\n\n[build-system]\nrequires = [\"poetry-core>=1.0.0\"]\nbuild-backend = \"poetry.core.masonry.api\"\n",
        )?;
        let source = root.join("poetry-source.toml");
        fs::write(
            &source,
            "[tool.poetry]\nname = \"demo\"\nversion = \"1.0.0\"\n\n[tool.poetry.dependencies]\npython = \"^3.9\"\n\n[build-system]\nrequires = [\"poetry-core>=1.5\", \"cython\"]\nbuild-backend = \"poetry.core.masonry.api\"\n",
        )?;
        let host = RecordingHost::default();
        let summary = import_file(root, &source, None, &ImportOptions::default(), false, &host)?;
        assert_eq!(summary.format, FormatKey::Poetry);
        assert_eq!(
            summary.build_system,
            BuildSystemAction::Extended {
                added: vec!["cython".to_string()]
            }
        );
        let manifest = Manifest::load_project(root)?;
        assert_eq!(
            manifest.doc()["project"]["requires-python"].as_str(),
            Some(">=3.9,<4.0.0")
        );
        assert!(summary.requires_python.is_none());
        assert_eq!(
            host.notices.borrow().as_slice(),
            ["The project's build dependencies have been set to [\"poetry-core>=1.0.0\", \"cython\"]"]
        );
        Ok(())
    }

    #[test]
    fn unknown_format_is_reported_before_anything_is_read() -> Result<()> {
        let dir = tempdir()?;
        let notes = dir.path().join("NOTES");
        fs::write(&notes, "just some prose\n")?;
        let err = import_file(
            dir.path(),
            &notes,
            None,
            &ImportOptions::default(),
            true,
            &RecordingHost::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<UsageError>(),
            Some(&UsageError::UndetectedFormat)
        );
        assert!(!dir.path().join("pyproject.toml").exists());
        Ok(())
    }
}
