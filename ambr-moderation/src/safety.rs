use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use ambr_shared::clients::MatchmakerApi;
use ambr_shared::errors::{CoreError, CoreResult};
use ambr_shared::types::event::{CoreEvent, EventBus};

/// Block / report actions plus the local block set every other component
/// consults.
///
/// Blocking flips the local view before the write-through returns: the
/// point of the action is user safety, so the blocked profile disappears
/// immediately even on a flaky network. Unblocking is the opposite: the
/// collaborator confirms first, then the local set follows.
pub struct SafetyDesk {
    me: Uuid,
    api: Arc<dyn MatchmakerApi>,
    events: EventBus,
    blocked: RwLock<HashSet<Uuid>>,
}

impl SafetyDesk {
    pub fn new(me: Uuid, api: Arc<dyn MatchmakerApi>, events: EventBus) -> Self {
        Self {
            me,
            api,
            events,
            blocked: RwLock::new(HashSet::new()),
        }
    }

    pub fn is_blocked(&self, user_id: Uuid) -> bool {
        self.blocked.read().contains(&user_id)
    }

    pub fn blocked(&self) -> HashSet<Uuid> {
        self.blocked.read().clone()
    }

    /// Replaces the local set with the collaborator's record.
    pub async fn sync(&self) -> CoreResult<usize> {
        let ids = self.api.blocked_users().await?;
        let count = ids.len();
        *self.blocked.write() = ids.into_iter().collect();
        Ok(count)
    }

    /// Blocks `target_id`: local view first, write-through second.
    ///
    /// If the write-through fails the local block stands and the error is
    /// returned so the caller can retry at the next action.
    pub async fn block(&self, target_id: Uuid) -> CoreResult<()> {
        if target_id == self.me {
            return Err(CoreError::validation("you cannot block yourself"));
        }
        let newly_blocked = self.blocked.write().insert(target_id);
        if newly_blocked {
            self.events.publish(CoreEvent::UserBlocked { user_id: target_id });
        }

        match self.api.block(target_id).await {
            Ok(()) => {
                tracing::info!(target = %target_id, "user blocked");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(target = %target_id, error = %err, "block write-through failed, local block stands");
                Err(err)
            }
        }
    }

    /// Lifts a block. Collaborator confirmation comes first so a failed
    /// request cannot leave the local view more permissive than the server.
    pub async fn unblock(&self, target_id: Uuid) -> CoreResult<()> {
        self.api.unblock(target_id).await?;
        self.blocked.write().remove(&target_id);
        self.events
            .publish(CoreEvent::UserUnblocked { user_id: target_id });
        tracing::info!(target = %target_id, "user unblocked");
        Ok(())
    }

    /// Records a report. Does not alter visibility by itself.
    pub async fn report(&self, target_id: Uuid, reason: &str) -> CoreResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoreError::validation("report reason must not be empty"));
        }
        if target_id == self.me {
            return Err(CoreError::validation("you cannot report yourself"));
        }
        self.api.report(target_id, reason).await?;
        tracing::info!(target = %target_id, "report submitted");
        Ok(())
    }
}
