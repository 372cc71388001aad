use std::cell::RefCell;
use std::path::PathBuf;

use anyhow::{Context, Result};
use pyimport_domain::{
    import_file, BuildSystemAction, FormatKey, ImportOptions, ImportSummary, InterpreterVersion,
    ReconcileHost, UsageError,
};
use serde_json::{json, Value};

use crate::context::CommandContext;
use crate::outcome::ExecutionOutcome;
use crate::RUNTIME_PYTHON_ENV;

#[derive(Clone, Debug)]
pub struct ImportRequest {
    pub filename: PathBuf,
    pub format: Option<FormatKey>,
    pub dev: bool,
    pub group: Option<String>,
    /// Keep the existing `[build-system]` instead of resetting it to the
    /// default backend.
    pub keep_backend: bool,
}

/// Import a foreign dependency file into the project's `pyproject.toml`.
///
/// Usage errors become a `user_error` outcome carrying any notices emitted
/// before the failure; other errors propagate.
pub fn import_project(ctx: &CommandContext, request: &ImportRequest) -> Result<ExecutionOutcome> {
    let root = ctx.project_root()?;
    let filename = if request.filename.is_absolute() {
        request.filename.clone()
    } else {
        std::env::current_dir()
            .context("failed to read the current directory")?
            .join(&request.filename)
    };
    let options = ImportOptions {
        dev: request.dev,
        group: request.group.clone(),
    };
    tracing::debug!(
        root = %root.display(),
        file = %filename.display(),
        format = ?request.format,
        "starting import"
    );

    let session = ImportSession::new(ctx);
    let result = import_file(
        &root,
        &filename,
        request.format,
        &options,
        !request.keep_backend,
        &session,
    );
    let notices = session.into_notices();
    match result {
        Ok(summary) => Ok(success_outcome(&request.filename, &summary, notices)),
        Err(err) => match err.downcast_ref::<UsageError>() {
            Some(usage) => Ok(ExecutionOutcome::user_error(
                usage.to_string(),
                json!({
                    "reason": usage.reason(),
                    "hint": usage.hint(),
                    "notices": notices,
                }),
            )),
            None => Err(err),
        },
    }
}

fn success_outcome(
    filename: &std::path::Path,
    summary: &ImportSummary,
    notices: Vec<String>,
) -> ExecutionOutcome {
    ExecutionOutcome::success(
        format!("imported {} ({})", filename.display(), summary.format),
        json!({
            "format": summary.format.as_str(),
            "path": summary.manifest_path.display().to_string(),
            "build_system": build_system_label(&summary.build_system),
            "requires_python": summary.requires_python,
            "notices": notices,
        }),
    )
}

fn build_system_label(action: &BuildSystemAction) -> Value {
    match action {
        BuildSystemAction::Reset => json!("reset"),
        BuildSystemAction::Created => json!("created"),
        BuildSystemAction::Extended { added } => json!({ "extended": added }),
        BuildSystemAction::Unchanged => json!("unchanged"),
    }
}

/// Reconciliation host backed by the command context: interpreter lookups go
/// through the runtime effects and notices are collected for the outcome.
struct ImportSession<'ctx, 'a> {
    ctx: &'ctx CommandContext<'a>,
    notices: RefCell<Vec<String>>,
}

impl<'ctx, 'a> ImportSession<'ctx, 'a> {
    fn new(ctx: &'ctx CommandContext<'a>) -> Self {
        Self {
            ctx,
            notices: RefCell::new(Vec::new()),
        }
    }

    fn into_notices(self) -> Vec<String> {
        self.notices.into_inner()
    }
}

impl ReconcileHost for ImportSession<'_, '_> {
    fn resolve_interpreter(&self, in_import: bool) -> Result<InterpreterVersion> {
        let runtime = self.ctx.python_runtime();
        let explicit = self.ctx.config().python().explicit.as_deref();
        let python = match runtime.detect_interpreter(explicit) {
            Ok(python) => python,
            Err(err) if in_import => {
                return Err(err.context(format!(
                    "can't pick a default requires-python while importing; set {RUNTIME_PYTHON_ENV} or add requires-python to pyproject.toml"
                )));
            }
            Err(err) => return Err(err),
        };
        runtime.probe_version(&python)
    }

    fn echo(&self, message: &str) {
        tracing::info!("{message}");
        self.notices.borrow_mut().push(message.to_string());
    }
}
