//! TOML configuration for the `timetable` CLI.
//!
//! Every field has a default, so an empty or missing file is a valid config:
//!
//! ```toml
//! principal = "organizer"
//!
//! [scheduling]
//! auto_extend = true
//! allow_event_extension = true
//! protected_sessions = [2, 5]
//!
//! [reschedule]
//! gap_minutes = 5
//! fit_blocks = true
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use timetable_engine::{Authorizer, BlockId, ObjectRef, SessionId, Timetable};

/// How cascades may grow blocks and the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Grow parents of every touched entry when a change is committed.
    #[serde(default = "default_true")]
    pub auto_extend: bool,
    #[serde(default = "default_true")]
    pub allow_event_extension: bool,
    /// Sessions whose blocks the principal may not grow through a cascade.
    #[serde(default)]
    pub protected_sessions: Vec<SessionId>,
}

/// Defaults for the `reschedule` subcommand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleConfig {
    #[serde(default)]
    pub gap_minutes: i64,
    #[serde(default)]
    pub fit_blocks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_principal")]
    pub principal: String,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub reschedule: RescheduleConfig,
}

fn default_true() -> bool {
    true
}

fn default_principal() -> String {
    "organizer".to_string()
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            auto_extend: true,
            allow_event_extension: true,
            protected_sessions: Vec::new(),
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            principal: default_principal(),
            scheduling: SchedulingConfig::default(),
            reschedule: RescheduleConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Authorization derived from the config: which objects a cascade may not grow.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    allow_event_extension: bool,
    protected_blocks: BTreeSet<BlockId>,
}

impl Policy {
    /// Resolve protected sessions to the blocks of `timetable` that belong to them.
    pub fn new(config: &SchedulingConfig, timetable: &Timetable) -> Self {
        let protected_blocks = timetable
            .blocks()
            .filter(|block| config.protected_sessions.contains(&block.session))
            .map(|block| block.id)
            .collect();
        Self {
            allow_event_extension: config.allow_event_extension,
            protected_blocks,
        }
    }
}

impl Authorizer for Policy {
    fn can_manage(&self, _principal: &str, object: ObjectRef) -> bool {
        match object {
            ObjectRef::Event => self.allow_event_extension,
            ObjectRef::SessionBlock(block) => !self.protected_blocks.contains(&block),
            ObjectRef::Contribution(_) | ObjectRef::Break(_) => true,
        }
    }
}
