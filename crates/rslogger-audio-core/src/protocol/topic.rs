//! Topic layout shared by modules and controllers.
//!
//! Every message kind for module `m` under base topic `B` lives at
//! `B/m/<kind>`. Controllers observe the whole fleet through the single-level
//! wildcard forms `B/+/status`, `B/+/response` and `B/+/data`.

use crate::{CoreResult, RecorderError};

use std::{fmt, panic::Location, str::FromStr};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

/// Base topic used when none is configured.
pub const DEFAULT_BASE_TOPIC: &str = "rslogger/audio";

/// Validated module identifier.
///
/// Rejects values that would corrupt the topic layout: empty strings, the
/// level separator `/`, and the wildcard characters `+` and `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId(String);

impl ModuleId {
    /// Validate and wrap a module identifier.
    #[track_caller]
    pub fn new(module_id: impl Into<String>) -> CoreResult<Self> {
        let module_id = module_id.into();

        let reason = if module_id.is_empty() {
            Some("must not be empty")
        } else if module_id.contains('/') {
            Some("must not contain '/'")
        } else if module_id.contains(['+', '#']) {
            Some("must not contain wildcard characters")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(RecorderError::InvalidModuleId {
                module_id,
                reason: reason.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => Ok(Self(module_id)),
        }
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModuleId {
    type Err = RecorderError;

    #[track_caller]
    fn from_str(s: &str) -> CoreResult<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = RecorderError;

    #[track_caller]
    fn try_from(value: String) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl From<ModuleId> for String {
    fn from(value: ModuleId) -> Self {
        value.0
    }
}

/// The four per-module message channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Controller to module.
    Command,
    /// Module to everyone: current state, also used as heartbeat.
    Status,
    /// Module to controller, one per request.
    Response,
    /// Module to controller: discrete events such as recording completion.
    Data,
}

impl MessageKind {
    /// Last topic level for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Command => "command",
            MessageKind::Status => "status",
            MessageKind::Response => "response",
            MessageKind::Data => "data",
        }
    }

    fn parse(level: &str) -> Option<Self> {
        match level {
            "command" => Some(MessageKind::Command),
            "status" => Some(MessageKind::Status),
            "response" => Some(MessageKind::Response),
            "data" => Some(MessageKind::Data),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives every topic of a deployment from its base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    base: String,
}

impl TopicScheme {
    /// Scheme rooted at `base`; trailing separators are ignored.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Base topic without trailing separator.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Concrete topic for one module and message kind.
    pub fn topic(&self, module_id: &ModuleId, kind: MessageKind) -> String {
        format!("{}/{}/{}", self.base, module_id, kind)
    }

    /// Fleet-wide subscription pattern for one message kind.
    pub fn wildcard(&self, kind: MessageKind) -> String {
        format!("{}/+/{}", self.base, kind)
    }

    /// Split a concrete topic back into module and kind.
    ///
    /// Returns `None` for topics outside this scheme, with extra levels, an
    /// invalid module id, or an unknown kind.
    pub fn parse(&self, topic: &str) -> Option<(ModuleId, MessageKind)> {
        let rest = topic.strip_prefix(&self.base)?.strip_prefix('/')?;
        let (module_id, kind) = rest.split_once('/')?;
        let kind = MessageKind::parse(kind)?;
        let module_id = ModuleId::new(module_id).ok()?;
        Some((module_id, kind))
    }

    /// All four topics of one module.
    pub fn module(&self, module_id: &ModuleId) -> ModuleTopics {
        ModuleTopics {
            command: self.topic(module_id, MessageKind::Command),
            status: self.topic(module_id, MessageKind::Status),
            response: self.topic(module_id, MessageKind::Response),
            data: self.topic(module_id, MessageKind::Data),
        }
    }
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC)
    }
}

/// Precomputed topics for a single module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTopics {
    /// Inbound commands.
    pub command: String,
    /// Status and heartbeat.
    pub status: String,
    /// Per-request responses.
    pub response: String,
    /// Data events.
    pub data: String,
}
