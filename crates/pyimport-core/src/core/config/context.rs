use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};

use crate::config::{Config, EnvSnapshot, GlobalOptions};
use crate::effects::{self, SharedEffects};

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
    project_root: OnceLock<PathBuf>,
    effects: SharedEffects,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options.
    pub fn new(global: &'a GlobalOptions, effects: SharedEffects) -> Self {
        let env = EnvSnapshot::capture();
        Self::with_snapshot(global, &env, effects)
    }

    pub(crate) fn with_snapshot(
        global: &'a GlobalOptions,
        env: &EnvSnapshot,
        effects: SharedEffects,
    ) -> Self {
        Self {
            global,
            config: Config::from_snapshot(env),
            project_root: OnceLock::new(),
            effects,
        }
    }

    pub fn python_runtime(&self) -> &dyn effects::PythonRuntime {
        self.effects.python()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves the project root: `--directory` (relative to the working
    /// directory) or the working directory itself.
    pub fn project_root(&self) -> Result<PathBuf> {
        if let Some(path) = self.project_root.get() {
            return Ok(path.clone());
        }
        let cwd = env::current_dir().context("failed to read the current directory")?;
        let path = match &self.global.directory {
            Some(dir) => cwd.join(dir),
            None => cwd,
        };
        let _ = self.project_root.set(path.clone());
        Ok(path)
    }
}
