//! Garrison agent engine: garrisons, groups and per-agent mailboxes.
//!
//! A garrison owns groups and holds loose units such as vehicles. Groups own
//! their member units and are advanced by a [`GroupThread`], a processing
//! context separate from the one that owns the garrisons. Every agent has a
//! mailbox; work that must run in an agent's own context is posted there and
//! executed the next time that context drains it.
//!
//! # Architecture
//!
//! ```text
//! owning context                         group context
//! ┌──────────────────────────────┐       ┌──────────────────────┐
//! │ GarrisonRegistry             │       │ GroupThread          │
//! │  └─ Garrison ── GroupHandle ─┼─post─▶│  └─ Group (mailbox)  │
//! │      └─ units, crews         │       │      └─ units        │
//! └──────────────────────────────┘       └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`mailbox`]: Mailboxes, postboxes and replies
//! - [`agent`]: The agent trait and the generic processing walk
//! - [`group`]: Groups and the handles garrisons own them through
//! - [`group_thread`]: The context that advances groups
//! - [`garrison`]: Garrisons and their pending queries
//! - [`registry`]: Event routing and cross-garrison moves
//! - [`config`]: TOML engine configuration

pub mod agent;
pub mod config;
pub mod error;
pub mod garrison;
pub mod group;
pub mod group_thread;
pub mod mailbox;
pub mod registry;

// Re-export mailbox types
pub use mailbox::{Call, Mailbox, MailboxError, MailboxOwner, Postbox, Reply};

// Re-export agent types
pub use agent::{process_tree, Agent, Subagents};

// Re-export group types
pub use group::{Group, GroupBrain, GroupHandle};
pub use group_thread::{GroupThread, GroupThreadHandle, StepReport};

// Re-export garrison types
pub use garrison::{Garrison, PendingSnapshot, PendingUnits};
pub use registry::GarrisonRegistry;

// Re-export config and error types
pub use config::{default_config_toml, ConfigError, EngineConfig, GroupThreadConfig, MailboxConfig};
pub use error::{GarrisonError, Member};

// Re-export the shared vocabulary
pub use garrison_model::{
    AgentId, GarrisonId, GarrisonSnapshot, GroupId, GroupSnapshot, GroupType, LifecycleEvent,
    LocationId, Side, Unit, UnitId, UnitKind,
};
