#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod backend;
pub mod error;
pub mod formats;
pub mod import;
pub mod manifest;
pub mod reconcile;
pub mod requirement;

pub use backend::{BuildBackend, DEFAULT_BACKEND};
pub use error::UsageError;
pub use formats::{
    resolve_format, Converted, Converter, FormatKey, ImportOptions, FORMATS,
};
pub use import::{import_file, ImportSummary};
pub use manifest::{merge_tables, ArrayMerge, Manifest, MANIFEST_FILE, TOOL_SECTION};
pub use reconcile::{
    reconcile, BuildSystemAction, BuildSystemDeclaration, InterpreterVersion, ReconcileHost,
    ReconcileReport,
};
pub use requirement::{normalize_requirement, requirement_stem};
