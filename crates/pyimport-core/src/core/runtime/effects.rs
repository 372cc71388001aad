use std::sync::Arc;

use anyhow::Result;
use pyimport_domain::InterpreterVersion;

use crate::python_sys::{detect_interpreter, probe_version};

pub trait PythonRuntime: Send + Sync {
    /// Locate an interpreter, preferring `explicit` when given.
    fn detect_interpreter(&self, explicit: Option<&str>) -> Result<String>;
    fn probe_version(&self, python: &str) -> Result<InterpreterVersion>;
}

pub trait Effects: Send + Sync {
    fn python(&self) -> &dyn PythonRuntime;
}

pub type SharedEffects = Arc<dyn Effects>;

pub struct SystemEffects {
    python: Arc<SystemPythonRuntime>,
}

impl SystemEffects {
    #[must_use]
    pub fn new() -> Self {
        Self {
            python: Arc::new(SystemPythonRuntime),
        }
    }

    #[must_use]
    pub fn shared() -> SharedEffects {
        Arc::new(Self::new())
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl Effects for SystemEffects {
    fn python(&self) -> &dyn PythonRuntime {
        self.python.as_ref()
    }
}

struct SystemPythonRuntime;

impl PythonRuntime for SystemPythonRuntime {
    fn detect_interpreter(&self, explicit: Option<&str>) -> Result<String> {
        detect_interpreter(explicit)
    }

    fn probe_version(&self, python: &str) -> Result<InterpreterVersion> {
        probe_version(python)
    }
}
