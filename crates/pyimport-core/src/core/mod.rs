pub(crate) mod config;
pub(crate) mod project;
pub(crate) mod python;
pub(crate) mod runtime;
pub(crate) mod tooling;
