//! Identifier newtypes. Kept as distinct types (never bare `String`/`Uuid`)
//! so the compiler catches an `VoteId` passed where a `MotionId` is wanted.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(MotionId);
uuid_id!(VoteId);
uuid_id!(TaskActivationId);
uuid_id!(LeaseId);
uuid_id!(BreachId);
uuid_id!(CeremonyId);

/// `agent-{uuid}` for ordinary archons, `SYSTEM:{name}` for the process
/// itself (MA-2/RT-2 attribution discipline: events are never attributed to
/// "the system" making a decision, only to the process performing a
/// mechanical step).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AgentId {
    Agent(Uuid),
    System(String),
}

impl AgentId {
    pub fn agent(id: Uuid) -> Self {
        Self::Agent(id)
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self::System(name.into())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentId::Agent(u) => write!(f, "agent-{u}"),
            AgentId::System(name) => write!(f, "SYSTEM:{name}"),
        }
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed agent id: {0:?}")]
pub struct AgentIdParseError(String);

impl TryFrom<String> for AgentId {
    type Error = AgentIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if let Some(rest) = value.strip_prefix("agent-") {
            let uuid = Uuid::parse_str(rest).map_err(|_| AgentIdParseError(value.clone()))?;
            Ok(AgentId::Agent(uuid))
        } else if let Some(name) = value.strip_prefix("SYSTEM:") {
            Ok(AgentId::System(name.to_string()))
        } else {
            Err(AgentIdParseError(value))
        }
    }
}

/// The closed set of archon roles (§9 design notes: dispatch on variant, not
/// on subclass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchonRole {
    Ordinary,
    President,
    Duke,
    Earl,
    Keeper,
    Witness,
    SecretaryText,
    SecretaryJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archon {
    pub id: AgentId,
    pub role: ArchonRole,
    /// Set only for `President`.
    pub portfolio: Option<String>,
    /// Set only for `Earl`.
    pub domain: Option<String>,
}

/// `T-{ABBR}-NNN` / `R-{ABBR}-NNN` / `RR-{ABBR}-NNN` style identifiers,
/// allocated monotonically per-producer (§4.8 counter monotonicity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterId(pub String);

impl CounterId {
    pub fn new(prefix: &str, abbr: &str, n: u32) -> Self {
        Self(format!("{prefix}-{abbr}-{n:03}"))
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
