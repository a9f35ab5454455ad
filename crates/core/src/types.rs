//! Small value types shared across the workspace

use crate::error::TxnError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a unit of work interacts with the ambient transaction manager
///
/// The policy is read when the coordinator begins a unit of work. Changing it
/// while a unit of work is active only affects the next `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientPolicy {
    /// Do not interact with the ambient transaction manager at all
    NotSupported,
    /// Begin a new ambient transaction for every unit of work.
    ///
    /// An ambient transaction already associated with the calling context is
    /// suspended and resumed once the unit of work finishes.
    #[default]
    RequiresNew,
}

impl AmbientPolicy {
    /// Configuration spelling of this policy
    pub fn as_str(&self) -> &'static str {
        match self {
            AmbientPolicy::NotSupported => "not_supported",
            AmbientPolicy::RequiresNew => "requires_new",
        }
    }
}

impl fmt::Display for AmbientPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmbientPolicy {
    type Err = TxnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_supported" => Ok(AmbientPolicy::NotSupported),
            "requires_new" => Ok(AmbientPolicy::RequiresNew),
            other => Err(TxnError::Config(format!(
                "unknown ambient policy '{}', expected \"requires_new\" or \"not_supported\"",
                other
            ))),
        }
    }
}

/// Operation a resource was performing when it failed
///
/// `Setup` covers everything that is not a terminal call: beginning a
/// resource, marking it rollback-only, and querying its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePhase {
    /// Commit of the resource transaction
    Commit,
    /// Rollback of the resource transaction
    Rollback,
    /// Begin, rollback-only marking or status query
    Setup,
}

impl fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourcePhase::Commit => "commit",
            ResourcePhase::Rollback => "rollback",
            ResourcePhase::Setup => "setup",
        };
        f.write_str(s)
    }
}

/// Enlistment group of a resource
///
/// Commit order is `Prepare -> Main -> AfterCompletion`. Rollback order is
/// `Main -> AfterCompletion`; prepare resources never see a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnlistGroup {
    /// Committed first; a failure aborts the unit before main commits
    Prepare,
    /// Regular participants
    Main,
    /// Committed last, and only if every main resource committed
    AfterCompletion,
}

impl fmt::Display for EnlistGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnlistGroup::Prepare => "prepare",
            EnlistGroup::Main => "main",
            EnlistGroup::AfterCompletion => "after_completion",
        };
        f.write_str(s)
    }
}
