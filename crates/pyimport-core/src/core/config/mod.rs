pub(crate) mod context;
mod settings;

pub(crate) use settings::EnvSnapshot;
pub use settings::{Config, GlobalOptions, PythonConfig};
