// ── Command API ──
//
// All device traffic flows through a unified `Command` enum. The
// gateway's executor task pulls envelopes off the priority queue and
// routes each variant to the appropriate REST call.

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::CoreError;
use crate::model::{AccessProfile, ActiveSession, DeviceObject, ExpectedObject, ObjectKind,
    ProfileSpec};

/// Scheduling class for a queued command. Bands drain strictly in this
/// order, with a bounded-yield rule so Bulk never starves (see queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Interactive calls a person is waiting on.
    High,
    /// Routine reads and updates.
    Normal,
    /// Deferred maintenance.
    Low,
    /// Sync sweeps and batch provisioning.
    Bulk,
}

impl Priority {
    pub(crate) const COUNT: usize = 4;

    pub(crate) fn band(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
            Self::Bulk => 3,
        }
    }
}

/// Fields to change on an existing device object. `None` = leave as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub password: Option<String>,
    pub profile: Option<String>,
    pub comment: Option<String>,
    pub disabled: Option<bool>,
}

/// All operations dispatchable against the device.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a subscriber-access object with encoded metadata.
    CreateUser(ExpectedObject),
    /// Update an object, resolved by name.
    UpdateUser {
        kind: ObjectKind,
        name: String,
        update: UpdateUser,
    },
    /// Remove an object, resolved by name.
    DeleteUser { kind: ObjectKind, name: String },
    /// List all objects of one kind.
    ListUsers { kind: ObjectKind },
    /// List live sessions of one kind.
    ListActiveSessions { kind: ObjectKind },
    /// Force-disconnect a live session.
    RemoveActiveSession { kind: ObjectKind, id: String },
    /// Create a profile definition on the device.
    CreateProfile { kind: ObjectKind, spec: ProfileSpec },
    /// Identity probe -- the lightweight health verification command.
    Identity,
}

impl Command {
    /// Short name for logs.
    pub(crate) fn op(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => "create-user",
            Self::UpdateUser { .. } => "update-user",
            Self::DeleteUser { .. } => "delete-user",
            Self::ListUsers { .. } => "list-users",
            Self::ListActiveSessions { .. } => "list-active",
            Self::RemoveActiveSession { .. } => "remove-active",
            Self::CreateProfile { .. } => "create-profile",
            Self::Identity => "identity",
        }
    }
}

/// Successful command outcomes.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Done,
    User(DeviceObject),
    Users(Vec<DeviceObject>),
    Sessions(Vec<ActiveSession>),
    Profile(AccessProfile),
    Identity(String),
}

/// A command plus its response channel, queued for execution.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub submitted_at: Instant,
    pub response_tx: oneshot::Sender<Result<CommandResult, CoreError>>,
}
