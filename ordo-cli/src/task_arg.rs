//! Parsing of `name:priority` task arguments.

use std::str::FromStr;

use ordo_core::constants::TASK_SPEC_SEPARATOR;
use ordo_core::error::{OrdoError, Result};

/// A task named on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskArg {
    pub name: String,
    pub priority: i64,
}

impl FromStr for TaskArg {
    type Err = OrdoError;

    /// Splits on the last separator so names may contain `:` themselves.
    fn from_str(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| OrdoError::InvalidTaskSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (name, priority) = spec
            .rsplit_once(TASK_SPEC_SEPARATOR)
            .ok_or_else(|| invalid("expected name:priority"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("task name is empty"));
        }
        let priority = priority
            .trim()
            .parse()
            .map_err(|_| invalid("priority must be an integer"))?;

        Ok(Self {
            name: name.to_string(),
            priority,
        })
    }
}
