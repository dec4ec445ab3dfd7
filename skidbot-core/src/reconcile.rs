// ABOUTME: Keeps the marker role in each group and members' role sets in line with their flags
// ABOUTME: Promotion only; the role is never removed automatically

use std::sync::Arc;

use crate::error::RoleError;
use crate::flags::FlagStore;
use crate::metrics;
use crate::traits::{GroupId, GuildApi, Role, RoleSpec, UserId};

pub const DEFAULT_MARKER_NAME: &str = "Skidder";
pub const DEFAULT_MARKER_COLOR: u32 = 0xFFFF00;
pub const DEFAULT_MARKER_REASON: &str = "Marker role for flagged members";

pub fn default_marker() -> RoleSpec {
    RoleSpec {
        name: DEFAULT_MARKER_NAME.to_string(),
        color: DEFAULT_MARKER_COLOR,
        reason: DEFAULT_MARKER_REASON.to_string(),
    }
}

/// How a single reconciliation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Granted(Role),
    AlreadyHeld(Role),
    NotFlagged,
    /// Marker role could not be resolved or created; nothing else was attempted
    RoleUnavailable,
    /// Member's role set could not be read
    MemberUnavailable,
    GrantFailed,
}

/// Flag and role state of one member, as observed by the message path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerStatus {
    pub flagged: bool,
    pub holds_role: bool,
    /// `None` when the marker role could not be resolved or created
    pub role: Option<Role>,
}

impl MarkerStatus {
    /// Whether the message path should post its reaction
    pub fn warrants_notice(&self) -> bool {
        self.flagged || self.holds_role
    }
}

pub struct RoleReconciler {
    guilds: Arc<dyn GuildApi>,
    flags: Arc<dyn FlagStore>,
    marker: RoleSpec,
}

impl RoleReconciler {
    pub fn new(guilds: Arc<dyn GuildApi>, flags: Arc<dyn FlagStore>, marker: RoleSpec) -> Self {
        Self {
            guilds,
            flags,
            marker,
        }
    }

    pub fn marker(&self) -> &RoleSpec {
        &self.marker
    }

    async fn resolve_or_create(&self, group: GroupId) -> Result<Role, RoleError> {
        let roles = self
            .guilds
            .roles(group)
            .await
            .map_err(|e| RoleError::Resolution {
                group,
                reason: format!("{:#}", e),
            })?;

        if let Some(role) = roles.into_iter().find(|r| self.marker.matches(r)) {
            return Ok(role);
        }

        let role = self
            .guilds
            .create_role(group, &self.marker)
            .await
            .map_err(|e| RoleError::Creation {
                group,
                reason: format!("{:#}", e),
            })?;
        metrics::record_role_created();
        tracing::info!(
            group_id = %group,
            role_id = %role.id,
            name = %role.name,
            "Created marker role"
        );
        Ok(role)
    }

    /// Find the marker role by name, creating it if the group has none.
    /// `None` means skip reconciliation for this event.
    pub async fn ensure_marker_role(&self, group: GroupId) -> Option<Role> {
        match self.resolve_or_create(group).await {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(error = %e, "Marker role unavailable");
                None
            }
        }
    }

    /// Grant the marker role iff the member is flagged and does not hold it yet
    pub async fn reconcile(&self, group: GroupId, user: UserId) -> ReconcileOutcome {
        let Some(role) = self.ensure_marker_role(group).await else {
            return ReconcileOutcome::RoleUnavailable;
        };

        if !self.flags.is_flagged(group, user).await {
            tracing::debug!(group_id = %group, user_id = %user, "Member not flagged");
            return ReconcileOutcome::NotFlagged;
        }

        let held = match self.guilds.member_role_ids(group, user).await {
            Ok(held) => held,
            Err(e) => {
                tracing::warn!(
                    group_id = %group,
                    user_id = %user,
                    error = format!("{:#}", e),
                    "Failed to read member roles"
                );
                return ReconcileOutcome::MemberUnavailable;
            }
        };
        if held.contains(&role.id) {
            return ReconcileOutcome::AlreadyHeld(role);
        }

        if let Err(e) = self
            .guilds
            .add_member_role(group, user, role.id, &self.marker.reason)
            .await
        {
            let err = RoleError::Grant {
                group,
                user,
                reason: format!("{:#}", e),
            };
            tracing::warn!(error = %err, "Marker role grant failed");
            return ReconcileOutcome::GrantFailed;
        }

        metrics::record_role_granted();
        tracing::info!(
            group_id = %group,
            user_id = %user,
            role_id = %role.id,
            "Granted marker role"
        );
        ReconcileOutcome::Granted(role)
    }

    /// Observe flag and role state without changing membership. The marker
    /// role is still created if missing; when it cannot be resolved the
    /// member is treated as not holding it and the flag is still read.
    pub async fn assess(&self, group: GroupId, user: UserId) -> MarkerStatus {
        let role = self.ensure_marker_role(group).await;
        let flagged = self.flags.is_flagged(group, user).await;
        let holds_role = match &role {
            Some(role) => match self.guilds.member_role_ids(group, user).await {
                Ok(held) => held.contains(&role.id),
                Err(e) => {
                    tracing::warn!(
                        group_id = %group,
                        user_id = %user,
                        error = format!("{:#}", e),
                        "Failed to read member roles"
                    );
                    false
                }
            },
            None => false,
        };

        MarkerStatus {
            flagged,
            holds_role,
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GuildFailures, MemoryFlags, MockGuilds};

    const G: GroupId = GroupId(1);
    const FLAGGED: UserId = UserId(100);
    const PLAIN: UserId = UserId(200);

    fn setup(guilds: MockGuilds) -> (Arc<MockGuilds>, RoleReconciler) {
        let guilds = Arc::new(guilds.with_member(G, FLAGGED).with_member(G, PLAIN));
        let flags = Arc::new(MemoryFlags::new().flag(FLAGGED));
        let reconciler = RoleReconciler::new(guilds.clone(), flags, default_marker());
        (guilds, reconciler)
    }

    #[tokio::test]
    async fn test_ensure_marker_role_creates_once() {
        let (guilds, reconciler) = setup(MockGuilds::new());

        let first = reconciler.ensure_marker_role(G).await.unwrap();
        let second = reconciler.ensure_marker_role(G).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(guilds.create_calls(), 1);
        assert_eq!(guilds.roles_in(G).len(), 1);
        assert_eq!(first.color, DEFAULT_MARKER_COLOR);
    }

    #[tokio::test]
    async fn test_ensure_marker_role_matches_existing_case_insensitively() {
        let (guilds, reconciler) = setup(MockGuilds::new().with_role(G, "sKiDdEr"));
        let role = reconciler.ensure_marker_role(G).await.unwrap();
        assert_eq!(role.name, "sKiDdEr");
        assert_eq!(guilds.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_marker_role_absent_on_creation_failure() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        guilds.fail(GuildFailures {
            create: true,
            ..Default::default()
        });
        assert!(reconciler.ensure_marker_role(G).await.is_none());
        assert!(guilds.roles_in(G).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_grants_flagged_member_and_is_idempotent() {
        let (guilds, reconciler) = setup(MockGuilds::new());

        let role = match reconciler.reconcile(G, FLAGGED).await {
            ReconcileOutcome::Granted(role) => role,
            other => panic!("expected a grant, got {:?}", other),
        };
        assert_eq!(guilds.member_roles(G, FLAGGED), vec![role.id]);

        assert_eq!(
            reconciler.reconcile(G, FLAGGED).await,
            ReconcileOutcome::AlreadyHeld(role.clone())
        );
        assert_eq!(guilds.member_roles(G, FLAGGED), vec![role.id]);
        assert_eq!(guilds.grant_calls(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_never_grants_unflagged_member() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        assert_eq!(reconciler.reconcile(G, PLAIN).await, ReconcileOutcome::NotFlagged);
        assert!(guilds.member_roles(G, PLAIN).is_empty());
        assert_eq!(guilds.grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_never_demotes() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        let role = reconciler.ensure_marker_role(G).await.unwrap();
        guilds.add_member_role(G, PLAIN, role.id, "manual").await.unwrap();

        assert_eq!(reconciler.reconcile(G, PLAIN).await, ReconcileOutcome::NotFlagged);
        assert_eq!(guilds.member_roles(G, PLAIN), vec![role.id]);
    }

    #[tokio::test]
    async fn test_reconcile_skips_when_role_unavailable() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        guilds.fail(GuildFailures {
            roles: true,
            ..Default::default()
        });
        assert_eq!(
            reconciler.reconcile(G, FLAGGED).await,
            ReconcileOutcome::RoleUnavailable
        );
        assert_eq!(guilds.grant_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_reports_grant_failure_without_retry() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        guilds.fail(GuildFailures {
            grant: true,
            ..Default::default()
        });
        assert_eq!(reconciler.reconcile(G, FLAGGED).await, ReconcileOutcome::GrantFailed);
        assert_eq!(guilds.grant_calls(), 1);
    }

    #[tokio::test]
    async fn test_assess_observes_without_granting() {
        let (guilds, reconciler) = setup(MockGuilds::new());

        let status = reconciler.assess(G, FLAGGED).await;
        assert!(status.flagged);
        assert!(!status.holds_role);
        assert!(status.warrants_notice());
        assert_eq!(guilds.create_calls(), 1);
        assert_eq!(guilds.grant_calls(), 0);

        let status = reconciler.assess(G, PLAIN).await;
        assert!(!status.warrants_notice());
    }

    #[tokio::test]
    async fn test_assess_counts_held_role_without_flag() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        let role = reconciler.ensure_marker_role(G).await.unwrap();
        guilds.add_member_role(G, PLAIN, role.id, "manual").await.unwrap();

        let status = reconciler.assess(G, PLAIN).await;
        assert!(!status.flagged);
        assert!(status.holds_role);
        assert!(status.warrants_notice());
    }

    #[tokio::test]
    async fn test_assess_still_reads_flag_when_role_unavailable() {
        for failures in [
            GuildFailures {
                create: true,
                ..Default::default()
            },
            GuildFailures {
                roles: true,
                ..Default::default()
            },
        ] {
            let (guilds, reconciler) = setup(MockGuilds::new());
            guilds.fail(failures);

            let status = reconciler.assess(G, FLAGGED).await;
            assert!(status.flagged);
            assert!(!status.holds_role);
            assert!(status.role.is_none());
            assert!(status.warrants_notice());
            assert_eq!(guilds.grant_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_assess_treats_unreadable_membership_as_not_held() {
        let (guilds, reconciler) = setup(MockGuilds::new());
        guilds.fail(GuildFailures {
            members: true,
            ..Default::default()
        });

        let status = reconciler.assess(G, FLAGGED).await;
        assert!(status.flagged);
        assert!(!status.holds_role);
        assert!(status.role.is_some());
    }
}
