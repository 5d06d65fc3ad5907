// ── Reconciliation engine ──
//
// Converges the device toward the database's expected state. Planning
// is pure (diff expected against a device snapshot); application runs
// the planned actions sequentially at Bulk priority so an interactive
// caller is never stuck behind a sweep.
//
// A "already exists" rejection during create is success: the object is
// on the device, which is exactly the state we wanted. A missing
// profile is repaired by creating it and retrying the create once.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::codec;
use crate::command::{Command, CommandResult, Priority};
use crate::error::CoreError;
use crate::gateway::DeviceGateway;
use crate::model::{DeviceObject, ExpectedObject, ObjectKind, ProfileSpec};

/// How many times a failed create is retried after repairing a missing
/// profile. One repair is the designed behavior; this is a parameter so
/// the loop provably terminates.
const PROFILE_REPAIRS: u32 = 1;

/// Status to write back to the local database for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStatus {
    /// Present and managed on the device.
    Synced,
    /// Present on the device but disabled there.
    Disabled,
}

/// A database write the caller should perform after the sweep.
#[derive(Debug, Clone)]
pub struct LocalUpdate {
    pub kind: ObjectKind,
    pub name: String,
    pub status: LocalStatus,
}

/// One object the sweep could not converge.
#[derive(Debug, Clone)]
pub struct ReconcileError {
    pub name: String,
    pub message: String,
}

/// Tally of one reconciliation sweep.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    /// Objects newly created on the device.
    pub created: u64,
    /// Legacy objects recreated with tagged metadata.
    pub migrated: u64,
    /// Objects already in the desired state (including creates that
    /// lost a race but found the object present).
    pub skipped: u64,
    pub errors: Vec<ReconcileError>,
    pub local_updates: Vec<LocalUpdate>,
}

// ── Planning ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Not on the device: create it.
    Create(usize),
    /// On the device with a pre-tag comment: recreate with metadata.
    Recreate(usize),
    /// Already converged; report its device-side disabled flag.
    MarkSynced { index: usize, disabled: bool },
}

/// Diff expected objects against a device snapshot. Pure; indices refer
/// into `expected`.
pub(crate) fn plan(expected: &[ExpectedObject], device: &[DeviceObject]) -> Vec<Action> {
    let on_device: HashMap<(ObjectKind, &str), &DeviceObject> = device
        .iter()
        .map(|o| ((o.kind, o.name.as_str()), o))
        .collect();

    expected
        .iter()
        .enumerate()
        .map(|(index, want)| match on_device.get(&(want.kind, want.name.as_str())) {
            None => Action::Create(index),
            Some(have) if codec::decode(&have.comment).needs_migration() => {
                Action::Recreate(index)
            }
            Some(have) => Action::MarkSynced {
                index,
                disabled: have.disabled,
            },
        })
        .collect()
}

// ── Application ─────────────────────────────────────────────────────

enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Run one full sweep: snapshot the device, plan, apply sequentially.
///
/// Fails outright only if the initial snapshot cannot be taken; from
/// then on each object is isolated -- one failure lands in `errors` and
/// the sweep moves on.
pub(crate) async fn run(
    gateway: &DeviceGateway,
    expected: Vec<ExpectedObject>,
) -> Result<ReconciliationResult, CoreError> {
    let mut kinds: Vec<ObjectKind> = expected.iter().map(|o| o.kind).collect();
    kinds.sort();
    kinds.dedup();

    let mut device = Vec::new();
    for kind in kinds {
        if let CommandResult::Users(users) = gateway
            .execute(Command::ListUsers { kind }, Priority::Bulk)
            .await?
        {
            device.extend(users);
        }
    }

    let actions = plan(&expected, &device);
    debug!(expected = expected.len(), on_device = device.len(), "reconciliation planned");

    let mut result = ReconciliationResult::default();
    for action in actions {
        match action {
            Action::Create(index) => {
                let want = &expected[index];
                match create_with_repair(gateway, want, PROFILE_REPAIRS).await {
                    Ok(CreateOutcome::Created) => {
                        result.created += 1;
                        result.local_updates.push(synced(want));
                    }
                    Ok(CreateOutcome::AlreadyExists) => {
                        // Someone beat us to it. The object exists, which
                        // is the state we were converging toward.
                        debug!(name = %want.name, "create raced an existing object");
                        result.skipped += 1;
                        result.local_updates.push(synced(want));
                    }
                    Err(e) => result.errors.push(failure(want, &e)),
                }
            }

            Action::Recreate(index) => {
                let want = &expected[index];
                match recreate(gateway, want).await {
                    Ok(()) => {
                        result.migrated += 1;
                        result.local_updates.push(synced(want));
                    }
                    Err(e) => result.errors.push(failure(want, &e)),
                }
            }

            Action::MarkSynced { index, disabled } => {
                let want = &expected[index];
                result.skipped += 1;
                result.local_updates.push(LocalUpdate {
                    kind: want.kind,
                    name: want.name.clone(),
                    status: if disabled {
                        LocalStatus::Disabled
                    } else {
                        LocalStatus::Synced
                    },
                });
            }
        }
    }

    info!(
        created = result.created,
        migrated = result.migrated,
        skipped = result.skipped,
        errors = result.errors.len(),
        "reconciliation sweep finished"
    );
    Ok(result)
}

/// Create, repairing a missing profile at most `repairs_left` times.
async fn create_with_repair(
    gateway: &DeviceGateway,
    want: &ExpectedObject,
    mut repairs_left: u32,
) -> Result<CreateOutcome, CoreError> {
    loop {
        match gateway
            .execute(Command::CreateUser(want.clone()), Priority::Bulk)
            .await
        {
            Ok(_) => return Ok(CreateOutcome::Created),
            Err(CoreError::Conflict { .. }) => return Ok(CreateOutcome::AlreadyExists),
            Err(e @ CoreError::ProfileMissing { .. }) => {
                if repairs_left == 0 {
                    return Err(e);
                }
                repairs_left -= 1;
                warn!(
                    name = %want.name,
                    profile = %want.profile,
                    "profile missing on device -- creating it and retrying"
                );
                gateway
                    .execute(
                        Command::CreateProfile {
                            kind: want.kind,
                            spec: ProfileSpec {
                                name: want.profile.clone(),
                                ..ProfileSpec::default()
                            },
                        },
                        Priority::Bulk,
                    )
                    .await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delete-then-create for legacy migration. A vanished object is fine:
/// the delete's job was to make room.
async fn recreate(gateway: &DeviceGateway, want: &ExpectedObject) -> Result<(), CoreError> {
    match gateway
        .execute(
            Command::DeleteUser {
                kind: want.kind,
                name: want.name.clone(),
            },
            Priority::Bulk,
        )
        .await
    {
        Ok(_) | Err(CoreError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    match create_with_repair(gateway, want, PROFILE_REPAIRS).await? {
        CreateOutcome::Created | CreateOutcome::AlreadyExists => Ok(()),
    }
}

fn synced(want: &ExpectedObject) -> LocalUpdate {
    LocalUpdate {
        kind: want.kind,
        name: want.name.clone(),
        status: LocalStatus::Synced,
    }
}

fn failure(want: &ExpectedObject, error: &CoreError) -> ReconcileError {
    warn!(name = %want.name, error = %error, "reconciliation failed for object");
    ReconcileError {
        name: want.name.clone(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MetadataRecord;

    fn expected(name: &str) -> ExpectedObject {
        ExpectedObject {
            kind: ObjectKind::HotspotUser,
            name: name.into(),
            password: "pw".into(),
            profile: "3day".into(),
            disabled: false,
            metadata: MetadataRecord::default(),
        }
    }

    fn device(name: &str, comment: &str, disabled: bool) -> DeviceObject {
        DeviceObject {
            id: "*1".into(),
            kind: ObjectKind::HotspotUser,
            name: name.into(),
            profile: Some("3day".into()),
            disabled,
            comment: comment.into(),
            bytes_in: None,
            bytes_out: None,
        }
    }

    #[test]
    fn missing_objects_are_planned_as_creates() {
        let actions = plan(&[expected("vc-1")], &[]);
        assert_eq!(actions, vec![Action::Create(0)]);
    }

    #[test]
    fn legacy_comments_are_planned_as_recreates() {
        let actions = plan(
            &[expected("vc-1")],
            &[device("vc-1", "old voucher Rp10.000", false)],
        );
        assert_eq!(actions, vec![Action::Recreate(0)]);
    }

    #[test]
    fn empty_comment_counts_as_legacy() {
        let actions = plan(&[expected("vc-1")], &[device("vc-1", "", false)]);
        assert_eq!(actions, vec![Action::Recreate(0)]);
    }

    #[test]
    fn tagged_objects_are_marked_synced_with_device_disabled_flag() {
        let comment = codec::encode(&MetadataRecord::default());
        let actions = plan(
            &[expected("vc-1"), expected("vc-2")],
            &[
                device("vc-1", &comment, false),
                device("vc-2", &comment, true),
            ],
        );
        assert_eq!(
            actions,
            vec![
                Action::MarkSynced { index: 0, disabled: false },
                Action::MarkSynced { index: 1, disabled: true },
            ]
        );
    }

    #[test]
    fn name_match_requires_the_same_kind() {
        let mut ppp = expected("vc-1");
        ppp.kind = ObjectKind::PppSecret;
        let comment = codec::encode(&MetadataRecord::default());
        // Same name exists as a hotspot user; the ppp secret is missing.
        let actions = plan(&[ppp], &[device("vc-1", &comment, false)]);
        assert_eq!(actions, vec![Action::Create(0)]);
    }

    #[test]
    fn mixed_plan_keeps_expected_order() {
        let comment = codec::encode(&MetadataRecord::default());
        let actions = plan(
            &[expected("a"), expected("b"), expected("c")],
            &[device("b", "legacy", false), device("c", &comment, false)],
        );
        assert_eq!(
            actions,
            vec![
                Action::Create(0),
                Action::Recreate(1),
                Action::MarkSynced { index: 2, disabled: false },
            ]
        );
    }
}
