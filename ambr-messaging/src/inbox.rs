use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use ambr_moderation::SafetyDesk;
use ambr_shared::clients::{MatchmakerApi, PrefsStore};
use ambr_shared::entitlements::EntitlementStore;
use ambr_shared::errors::{CoreError, CoreResult, ErrorCode};
use ambr_shared::types::event::EventBus;
use ambr_shared::types::matching::Match;
use ambr_shared::types::messaging::Message;

use crate::sync::ConversationSync;

/// One row of the conversation list.
#[derive(Debug, Clone)]
pub struct ConversationPreview {
    pub record: Match,
    pub last_message: Option<Message>,
    pub favorite: bool,
}

struct ConversationHandle {
    sync: Arc<ConversationSync>,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Owns the match list and the live per-match synchronizers.
///
/// Opening a conversation starts its polling loop; closing it stops the
/// timer but keeps the timeline cached so the conversation list can still
/// derive its preview. The list itself is always recomputed from the
/// local timelines, never stored, so a mid-list unsend is reflected
/// immediately. Favorites are a device-local annotation from the
/// preference store.
pub struct Inbox {
    me: Uuid,
    api: Arc<dyn MatchmakerApi>,
    entitlements: Arc<EntitlementStore>,
    events: EventBus,
    prefs: Arc<PrefsStore>,
    safety: Arc<SafetyDesk>,
    matches: Mutex<Vec<Match>>,
    conversations: DashMap<Uuid, ConversationHandle>,
    poll_interval: Duration,
}

impl Inbox {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        me: Uuid,
        api: Arc<dyn MatchmakerApi>,
        entitlements: Arc<EntitlementStore>,
        events: EventBus,
        prefs: Arc<PrefsStore>,
        safety: Arc<SafetyDesk>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            me,
            api,
            entitlements,
            events,
            prefs,
            safety,
            matches: Mutex::new(Vec::new()),
            conversations: DashMap::new(),
            poll_interval,
        }
    }

    /// Refetches the match list, dropping matches with blocked partners.
    pub async fn refresh_matches(&self) -> CoreResult<usize> {
        let list = self.api.matches().await?;
        let list: Vec<Match> = list
            .into_iter()
            .filter(|m| !self.safety.is_blocked(m.partner_of(self.me)))
            .collect();
        let count = list.len();
        *self.matches.lock() = list;
        tracing::debug!(matches = count, "match list refreshed");
        Ok(count)
    }

    pub fn matches(&self) -> Vec<Match> {
        self.matches
            .lock()
            .iter()
            .filter(|m| !self.safety.is_blocked(m.partner_of(self.me)))
            .cloned()
            .collect()
    }

    /// Opens a conversation, starting its polling loop. Reopening an
    /// already-open conversation returns the same synchronizer.
    pub fn open(&self, match_id: Uuid) -> CoreResult<Arc<ConversationSync>> {
        if let Some(mut handle) = self.conversations.get_mut(&match_id) {
            if handle.task.is_none() {
                handle.task = Some(handle.sync.clone().spawn());
            }
            return Ok(handle.sync.clone());
        }

        let known = self
            .matches
            .lock()
            .iter()
            .any(|m| m.id == match_id && !self.safety.is_blocked(m.partner_of(self.me)));
        if !known {
            return Err(CoreError::new(ErrorCode::MatchNotFound, "match not found"));
        }

        let sync = ConversationSync::new(
            match_id,
            self.me,
            self.api.clone(),
            self.entitlements.clone(),
            self.events.clone(),
            self.poll_interval,
        );
        let task = sync.clone().spawn();
        self.conversations.insert(
            match_id,
            ConversationHandle {
                sync: sync.clone(),
                task: Some(task),
            },
        );
        Ok(sync)
    }

    /// Stops the polling timer for one conversation (navigation away). The
    /// cached timeline stays for list previews.
    pub fn close(&self, match_id: Uuid) {
        if let Some(mut handle) = self.conversations.get_mut(&match_id) {
            handle.sync.stop();
            handle.task = None;
        }
    }

    /// Derives the conversation list from the per-match timelines: latest
    /// message per match, newest activity first, favorites flagged from the
    /// device store.
    pub fn conversation_list(&self) -> Vec<ConversationPreview> {
        let matches = self.matches();
        let mut previews: Vec<ConversationPreview> = matches
            .into_iter()
            .map(|record| {
                let last_message = self
                    .conversations
                    .get(&record.id)
                    .and_then(|handle| handle.sync.last_message());
                let favorite = self.prefs.is_favorite(record.id);
                ConversationPreview {
                    record,
                    last_message,
                    favorite,
                }
            })
            .collect();
        previews.sort_by_key(|p| {
            std::cmp::Reverse(
                p.last_message
                    .as_ref()
                    .map(|m| m.created_at)
                    .unwrap_or(p.record.matched_at),
            )
        });
        previews
    }

    pub fn set_favorite(&self, match_id: Uuid, favorite: bool) -> CoreResult<()> {
        self.prefs.set_favorite(match_id, favorite)
    }

    /// Tears down conversations whose partner is now blocked and hides the
    /// corresponding matches.
    pub fn purge_blocked(&self) {
        let hidden: Vec<Uuid> = self
            .matches
            .lock()
            .iter()
            .filter(|m| self.safety.is_blocked(m.partner_of(self.me)))
            .map(|m| m.id)
            .collect();
        for match_id in hidden {
            if let Some((_, handle)) = self.conversations.remove(&match_id) {
                handle.sync.stop();
            }
            self.matches.lock().retain(|m| m.id != match_id);
            tracing::info!(match_id = %match_id, "conversation hidden after block");
        }
    }

    /// Stops every polling timer without discarding cached timelines
    /// (normal shutdown).
    pub fn stop_all(&self) {
        for mut entry in self.conversations.iter_mut() {
            entry.value().sync.stop();
            entry.value_mut().task = None;
        }
    }

    /// 401-class teardown: every polling loop stops and cached match and
    /// message state is discarded; none of it is trusted across sessions.
    pub fn handle_session_expired(&self) {
        for entry in self.conversations.iter() {
            entry.value().sync.stop();
        }
        self.conversations.clear();
        self.matches.lock().clear();
        tracing::warn!("session expired, inbox cleared");
    }

    /// Number of conversations with a live polling loop (diagnostics).
    pub fn open_conversations(&self) -> usize {
        self.conversations
            .iter()
            .filter(|entry| entry.value().task.is_some())
            .count()
    }
}
