/// Problems the user can fix by changing their input or manifest.
///
/// Everything else (I/O, parse failures, interpreter probing) travels as a
/// plain `anyhow::Error`; callers tell the two apart with
/// `err.downcast_ref::<UsageError>()`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error(
        "Can't derive the file format automatically, please specify it via '-f/--format' option."
    )]
    UndetectedFormat,
    #[error(
        "Can't create [\"build-system\"] section in pyproject.toml with selected import method, please fill it manually."
    )]
    BuildSystemUnavailable,
    #[error("Project's [\"build-system\"] section is incomplete, don't know how to proceed.")]
    IncompleteBuildSystem,
    #[error(
        "Project's [\"build-system\"] section and the selected import method disagree on the build-backend value (found {found}, expected {expected}), don't know how to proceed."
    )]
    BackendMismatch { found: String, expected: String },
}

impl UsageError {
    /// Stable machine-readable reason used in JSON envelopes.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UndetectedFormat => "undetected_format",
            Self::BuildSystemUnavailable => "build_system_unavailable",
            Self::IncompleteBuildSystem => "incomplete_build_system",
            Self::BackendMismatch { .. } => "backend_mismatch",
        }
    }

    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::UndetectedFormat => {
                "pass one of requirements, pipfile, poetry, flit to --format"
            }
            Self::BuildSystemUnavailable | Self::IncompleteBuildSystem => {
                "edit [build-system] in pyproject.toml by hand, or drop --keep-backend"
            }
            Self::BackendMismatch { .. } => {
                "drop --keep-backend to reset [build-system] to the default backend"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_mismatch_names_both_backends() {
        let err = UsageError::BackendMismatch {
            found: "hatchling.build".to_string(),
            expected: "setuptools.build_meta".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("found hatchling.build"));
        assert!(message.contains("expected setuptools.build_meta"));
        assert_eq!(err.reason(), "backend_mismatch");
    }
}
