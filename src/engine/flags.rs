use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Runtime toggles recognised by the engine, equivalent to the legacy command-line flags.
///
/// The engine core never reads the environment itself; [`ConfigFlags::from_env`] is the thin
/// adapter that translates `CP_*` environment variables into this struct, and embedders can
/// just as well fill it in directly.
#[derive(Clone, Debug, Default)]
pub struct ConfigFlags {
    /// Trace propagation events (constraint and demon executions, variable modifications).
    pub trace_propagation: bool,
    /// Trace search events.
    pub trace_search: bool,
    /// Log each constraint when it is added to the solver.
    pub show_constraints: bool,
    /// Force a failure at the beginning of every search.
    pub no_solve: bool,
    /// Force all variables to have names.
    pub name_variables: bool,
    /// Destination of the profiling overview written at the end of a search.
    pub profile_file: Option<PathBuf>,
    /// Destination of the constraint listing written before the initial propagation.
    pub export_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("invalid boolean value {value:?} for {variable}: expected 0/1/true/false")]
    InvalidBool { variable: String, value: String },
}

impl ConfigFlags {
    /// Reads the `CP_TRACE_PROPAGATION`, `CP_TRACE_SEARCH`, `CP_SHOW_CONSTRAINTS`,
    /// `CP_NO_SOLVE`, `CP_NAME_VARIABLES`, `CP_PROFILE_FILE` and `CP_EXPORT_FILE` environment
    /// variables.
    pub fn from_env() -> Result<ConfigFlags, FlagError> {
        Ok(ConfigFlags {
            trace_propagation: read_bool("CP_TRACE_PROPAGATION")?,
            trace_search: read_bool("CP_TRACE_SEARCH")?,
            show_constraints: read_bool("CP_SHOW_CONSTRAINTS")?,
            no_solve: read_bool("CP_NO_SOLVE")?,
            name_variables: read_bool("CP_NAME_VARIABLES")?,
            profile_file: read_path("CP_PROFILE_FILE"),
            export_file: read_path("CP_EXPORT_FILE"),
        })
    }
}

fn read_bool(variable: &str) -> Result<bool, FlagError> {
    match env::var(variable) {
        Err(_) => Ok(false),
        Ok(value) => match value.as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            _ => Err(FlagError::InvalidBool {
                variable: variable.to_owned(),
                value,
            }),
        },
    }
}

fn read_path(variable: &str) -> Option<PathBuf> {
    env::var(variable).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_off() {
        let flags = ConfigFlags::default();
        assert!(!flags.trace_propagation);
        assert!(!flags.no_solve);
        assert!(flags.profile_file.is_none());
    }
}
