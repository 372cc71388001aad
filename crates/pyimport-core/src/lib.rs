#![deny(clippy::all)]
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod core;

pub(crate) use crate::core::config;
pub(crate) use crate::core::config::context;
pub(crate) use crate::core::python::python_sys;
pub(crate) use crate::core::runtime::effects;
pub(crate) use crate::core::tooling::outcome;

pub use crate::core::config::context::CommandContext;
pub use crate::core::config::{Config, GlobalOptions, PythonConfig};
pub use crate::core::project::import::{import_project, ImportRequest};
pub use crate::core::runtime::effects::{Effects, PythonRuntime, SharedEffects, SystemEffects};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};

pub use pyimport_domain::{FormatKey, ImportOptions, UsageError};

pub const RUNTIME_PYTHON_ENV: &str = "PYIMPORT_RUNTIME_PYTHON";
