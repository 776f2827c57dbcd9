use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use ambr_shared::clients::MatchmakerApi;
use ambr_shared::entitlements::{EntitlementStore, Feature};
use ambr_shared::errors::{CoreError, CoreResult, ErrorCode};
use ambr_shared::types::event::{CoreEvent, EventBus};
use ambr_shared::types::messaging::{Message, MessageBody, OutgoingMessage};

/// Delivery state of a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Confirmed,
    Sending,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TimelineItem {
    pub message: Message,
    pub delivery: Delivery,
}

#[derive(Debug, Clone)]
struct PendingSend {
    message: Message,
    failed: bool,
}

#[derive(Default)]
struct TimelineState {
    confirmed: Vec<Message>,
    outbox: Vec<PendingSend>,
}

/// Per-match message synchronizer.
///
/// A bounded polling loop fetches the full timeline and reconciles it
/// against local state: total order by `(created_at, message_id)`, one-way
/// read transitions, optimistic sends kept as retryable drafts on failure,
/// and entitlement-gated unsend that restores the message if the delete
/// does not go through. The authenticated fetch doubles as the read
/// report: the collaborator marks the partner's unread messages read when
/// the recipient retrieves them.
pub struct ConversationSync {
    match_id: Uuid,
    me: Uuid,
    api: Arc<dyn MatchmakerApi>,
    entitlements: Arc<EntitlementStore>,
    events: EventBus,
    state: Mutex<TimelineState>,
    stop: watch::Sender<bool>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ConversationSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSync")
            .field("match_id", &self.match_id)
            .field("me", &self.me)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ConversationSync {
    pub fn new(
        match_id: Uuid,
        me: Uuid,
        api: Arc<dyn MatchmakerApi>,
        entitlements: Arc<EntitlementStore>,
        events: EventBus,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let (stop, _) = watch::channel(false);
        Arc::new(Self {
            match_id,
            me,
            api,
            entitlements,
            events,
            state: Mutex::new(TimelineState::default()),
            stop,
            poll_interval,
        })
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    /// One fetch-and-reconcile pass. Returns how many messages were new to
    /// this client.
    pub async fn poll_once(&self) -> CoreResult<usize> {
        let mut remote = match self.api.messages(self.match_id).await {
            Ok(remote) => remote,
            Err(err) => {
                if err.is_auth_expired() {
                    self.events.publish(CoreEvent::SessionExpired);
                }
                return Err(err);
            }
        };
        remote.sort_by_key(Message::sort_key);

        let now = Utc::now();
        let mut state = self.state.lock();
        let new_count = remote
            .iter()
            .filter(|m| !state.confirmed.iter().any(|c| c.id == m.id))
            .count();

        for message in &mut remote {
            // Read state never regresses, whatever the fetch says.
            if let Some(local) = state.confirmed.iter().find(|c| c.id == message.id) {
                if local.read && !message.read {
                    message.read = local.read;
                    message.read_at = local.read_at;
                }
            }
            // Incoming messages become visible with this poll, which is the
            // moment they count as read.
            if message.sender_id != self.me {
                message.mark_read(now);
            }
        }
        state.confirmed = remote;

        counter!("ambr_conversation_polls_total").increment(1);
        Ok(new_count)
    }

    /// Sends a message: validated locally, appended optimistically, and
    /// kept as a retryable draft if the write fails.
    pub async fn send(&self, body: MessageBody) -> CoreResult<Message> {
        body.validate()?;

        let local = Message {
            id: Uuid::new_v4(),
            match_id: self.match_id,
            sender_id: self.me,
            body: body.clone(),
            created_at: Utc::now(),
            read: false,
            read_at: None,
        };
        let local_id = local.id;
        self.state.lock().outbox.push(PendingSend {
            message: local,
            failed: false,
        });

        let outgoing = OutgoingMessage {
            match_id: self.match_id,
            body,
        };
        match self.api.send_message(&outgoing).await {
            Ok(confirmed) => {
                {
                    let mut state = self.state.lock();
                    state.outbox.retain(|p| p.message.id != local_id);
                    state.confirmed.push(confirmed.clone());
                    state.confirmed.sort_by_key(Message::sort_key);
                }
                counter!("ambr_messages_sent_total").increment(1);
                self.events.publish(CoreEvent::MessageSent {
                    match_id: self.match_id,
                    message_id: confirmed.id,
                });
                Ok(confirmed)
            }
            Err(err) => {
                let mut state = self.state.lock();
                if let Some(pending) = state.outbox.iter_mut().find(|p| p.message.id == local_id) {
                    pending.failed = true;
                }
                drop(state);
                tracing::warn!(match_id = %self.match_id, error = %err, "send failed, draft kept for retry");
                Err(err)
            }
        }
    }

    /// Retries a failed draft by its local id.
    pub async fn retry_send(&self, local_id: Uuid) -> CoreResult<Message> {
        let body = {
            let mut state = self.state.lock();
            let position = state
                .outbox
                .iter()
                .position(|p| p.message.id == local_id)
                .ok_or_else(|| CoreError::new(ErrorCode::MessageNotFound, "draft not found"))?;
            state.outbox.remove(position).message.body
        };
        self.send(body).await
    }

    /// Unsends one of this user's messages.
    ///
    /// Gated on the `UnsendMessage` entitlement: a denial is the upsell
    /// signal and leaves the timeline untouched. On allow the message
    /// disappears locally at once; if the delete request then fails it is
    /// restored, failure is never silently absorbed.
    pub async fn unsend(&self, message_id: Uuid) -> CoreResult<()> {
        self.entitlements
            .check(Feature::UnsendMessage)
            .into_result()?;

        let removed = {
            let mut state = self.state.lock();
            let position = state
                .confirmed
                .iter()
                .position(|m| m.id == message_id)
                .ok_or_else(|| CoreError::new(ErrorCode::MessageNotFound, "message not found"))?;
            if state.confirmed[position].sender_id != self.me {
                return Err(CoreError::new(
                    ErrorCode::Forbidden,
                    "only the sender can unsend a message",
                ));
            }
            state.confirmed.remove(position)
        };

        match self.api.delete_message(message_id).await {
            Ok(()) => {
                tracing::info!(match_id = %self.match_id, message = %message_id, "message unsent");
                Ok(())
            }
            Err(err) => {
                let mut state = self.state.lock();
                state.confirmed.push(removed);
                state.confirmed.sort_by_key(Message::sort_key);
                drop(state);
                tracing::warn!(match_id = %self.match_id, error = %err, "unsend failed, message restored");
                Err(err)
            }
        }
    }

    /// The locally rendered timeline: confirmed messages plus in-flight and
    /// failed drafts, in total order.
    pub fn timeline(&self) -> Vec<TimelineItem> {
        let state = self.state.lock();
        let mut items: Vec<TimelineItem> = state
            .confirmed
            .iter()
            .map(|m| TimelineItem {
                message: m.clone(),
                delivery: Delivery::Confirmed,
            })
            .chain(state.outbox.iter().map(|p| TimelineItem {
                message: p.message.clone(),
                delivery: if p.failed {
                    Delivery::Failed
                } else {
                    Delivery::Sending
                },
            }))
            .collect();
        items.sort_by_key(|item| item.message.sort_key());
        items
    }

    /// Latest entry, for conversation-list previews.
    pub fn last_message(&self) -> Option<Message> {
        self.timeline().pop().map(|item| item.message)
    }

    /// When the partner read one of this user's messages (Pro only).
    /// Under Free tier the flag still syncs, it just is not surfaced.
    pub fn read_receipt(&self, message_id: Uuid) -> Option<DateTime<Utc>> {
        if !self.entitlements.check(Feature::ReadReceipt).is_allowed() {
            return None;
        }
        let state = self.state.lock();
        state
            .confirmed
            .iter()
            .find(|m| m.id == message_id && m.sender_id == self.me && m.read)
            .and_then(|m| m.read_at)
    }

    /// Starts the polling loop. The loop ends on [`stop`] or when the
    /// session expires; either way no orphaned timer remains.
    ///
    /// [`stop`]: ConversationSync::stop
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let sync = self;
        let mut stop_rx = sync.stop.subscribe();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(sync.poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        match sync.poll_once().await {
                            Ok(_) => {}
                            Err(err) if err.is_auth_expired() => break,
                            Err(err) => {
                                tracing::debug!(match_id = %sync.match_id, error = %err, "poll failed, retrying next tick");
                            }
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::debug!(match_id = %sync.match_id, "conversation sync stopped");
        })
    }

    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambr_shared::clients::memory::{InMemoryApi, InMemoryWorld};
    use ambr_shared::entitlements::{SwipeQuotaLedger, Tier};
    use ambr_shared::errors::ErrorClass;
    use ambr_shared::types::profile::Profile;

    struct Pair {
        world: InMemoryWorld,
        a: Uuid,
        b: Uuid,
        match_id: Uuid,
    }

    async fn matched_pair() -> Pair {
        let world = InMemoryWorld::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        world.add_profile(Profile::bare(a, "a", 30));
        world.add_profile(Profile::bare(b, "b", 28));
        world.client(a).like(b).await.unwrap();
        let ack = world.client(b).like(a).await.unwrap();
        Pair {
            world,
            a,
            b,
            match_id: ack.match_id.unwrap(),
        }
    }

    fn sync_for(pair: &Pair, user: Uuid) -> (Arc<ConversationSync>, Arc<InMemoryApi>) {
        let api = Arc::new(pair.world.client(user));
        let ledger = Arc::new(SwipeQuotaLedger::new(50));
        let entitlements = Arc::new(EntitlementStore::new(
            api.clone(),
            ledger,
            EventBus::default(),
        ));
        let sync = ConversationSync::new(
            pair.match_id,
            user,
            api.clone(),
            entitlements,
            EventBus::default(),
            Duration::from_millis(10),
        );
        (sync, api)
    }

    fn texts(sync: &ConversationSync) -> Vec<String> {
        sync.timeline()
            .into_iter()
            .map(|item| item.message.body.preview())
            .collect()
    }

    #[tokio::test]
    async fn timeline_stays_totally_ordered() {
        let pair = matched_pair().await;
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);

        sync_a.send(MessageBody::Text("one".into())).await.unwrap();
        sync_b.send(MessageBody::Text("two".into())).await.unwrap();
        sync_a.send(MessageBody::Text("three".into())).await.unwrap();

        sync_a.poll_once().await.unwrap();
        let timeline = sync_a.timeline();
        assert_eq!(texts(&sync_a), ["one", "two", "three"]);
        let mut keys: Vec<_> = timeline.iter().map(|i| i.message.sort_key()).collect();
        let sorted = keys.clone();
        keys.sort();
        assert_eq!(keys, sorted);
    }

    #[tokio::test]
    async fn read_receipts_flow_to_a_pro_sender() {
        // Scenario: Pro user sends, the recipient's poll observes and marks
        // it read, the sender's next poll sees read + read_at.
        let pair = matched_pair().await;
        pair.world.set_tier(pair.a, Tier::Pro);
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);
        sync_a.entitlements.refresh().await.unwrap();

        let sent = sync_a.send(MessageBody::Text("evening plans?".into())).await.unwrap();
        assert!(sync_a.read_receipt(sent.id).is_none());

        sync_b.poll_once().await.unwrap();
        let seen = sync_b.timeline();
        assert!(seen[0].message.read && seen[0].message.read_at.is_some());

        sync_a.poll_once().await.unwrap();
        let receipt = sync_a.read_receipt(sent.id);
        assert!(receipt.is_some());
    }

    #[tokio::test]
    async fn read_receipts_are_hidden_from_free_senders() {
        let pair = matched_pair().await;
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);

        let sent = sync_a.send(MessageBody::Text("hey".into())).await.unwrap();
        sync_b.poll_once().await.unwrap();
        sync_a.poll_once().await.unwrap();

        // The flag synced, the surface is gated.
        assert!(sync_a.timeline()[0].message.read);
        assert!(sync_a.read_receipt(sent.id).is_none());
    }

    #[tokio::test]
    async fn read_state_never_regresses_locally() {
        let pair = matched_pair().await;
        let (sync_b, api_b) = sync_for(&pair, pair.b);
        let (sync_a, _) = sync_for(&pair, pair.a);

        sync_a.send(MessageBody::Text("hello".into())).await.unwrap();
        sync_b.poll_once().await.unwrap();
        let first_read_at = sync_b.timeline()[0].message.read_at.unwrap();

        // Whatever a later fetch claims, the local flag stands.
        api_b.fail_next(CoreError::Network("flaky".into()));
        let _ = sync_b.poll_once().await;
        sync_b.poll_once().await.unwrap();
        let message = &sync_b.timeline()[0].message;
        assert!(message.read);
        assert_eq!(message.read_at, Some(first_read_at));
    }

    #[tokio::test]
    async fn empty_messages_never_leave_the_device() {
        let pair = matched_pair().await;
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);

        let err = sync_a.send(MessageBody::Text("  ".into())).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidInput);
        assert!(sync_a.timeline().is_empty(), "no draft for invalid input");

        sync_b.poll_once().await.unwrap();
        assert!(sync_b.timeline().is_empty());
    }

    #[tokio::test]
    async fn failed_sends_stay_as_retryable_drafts() {
        let pair = matched_pair().await;
        let (sync_a, api_a) = sync_for(&pair, pair.a);

        api_a.fail_next(CoreError::Network("connection reset".into()));
        let err = sync_a.send(MessageBody::Text("did you see this?".into())).await;
        assert!(err.is_err());

        let timeline = sync_a.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].delivery, Delivery::Failed);

        // Retry delivers and the draft becomes a confirmed message.
        let draft_id = timeline[0].message.id;
        let confirmed = sync_a.retry_send(draft_id).await.unwrap();
        let timeline = sync_a.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].delivery, Delivery::Confirmed);
        assert_eq!(timeline[0].message.id, confirmed.id);
    }

    #[tokio::test]
    async fn free_tier_unsend_is_an_upsell_not_an_action() {
        // Scenario: free user attempts unsend; the message stays in both
        // timelines and the denial names the Pro requirement.
        let pair = matched_pair().await;
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);

        let sent = sync_a.send(MessageBody::Text("oops".into())).await.unwrap();
        let err = sync_a.unsend(sent.id).await.unwrap_err();
        assert_eq!(err.code(), Some(ambr_shared::ErrorCode::ProRequired));

        assert_eq!(sync_a.timeline().len(), 1);
        sync_b.poll_once().await.unwrap();
        assert_eq!(sync_b.timeline().len(), 1);
    }

    #[tokio::test]
    async fn unsend_removes_everywhere_and_restores_on_failure() {
        let pair = matched_pair().await;
        pair.world.set_tier(pair.a, Tier::Pro);
        let (sync_a, api_a) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);
        sync_a.entitlements.refresh().await.unwrap();

        let keep = sync_a.send(MessageBody::Text("keep".into())).await.unwrap();
        let gone = sync_a.send(MessageBody::Text("gone".into())).await.unwrap();

        // Failure path: local removal is undone, nothing lost silently.
        api_a.fail_next(CoreError::Timeout);
        assert!(sync_a.unsend(gone.id).await.is_err());
        assert_eq!(texts(&sync_a), ["keep", "gone"]);

        // Success path: gone locally at once, gone for the partner on poll.
        sync_a.unsend(gone.id).await.unwrap();
        assert_eq!(texts(&sync_a), ["keep"]);
        sync_b.poll_once().await.unwrap();
        assert_eq!(texts(&sync_b), ["keep"]);
        assert_eq!(sync_a.last_message().unwrap().id, keep.id);
    }

    #[tokio::test]
    async fn only_the_sender_can_unsend() {
        let pair = matched_pair().await;
        pair.world.set_tier(pair.b, Tier::Pro);
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);
        sync_b.entitlements.refresh().await.unwrap();

        let sent = sync_a.send(MessageBody::Text("mine".into())).await.unwrap();
        sync_b.poll_once().await.unwrap();

        let err = sync_b.unsend(sent.id).await.unwrap_err();
        assert_eq!(err.code(), Some(ambr_shared::ErrorCode::Forbidden));
        assert_eq!(sync_b.timeline().len(), 1);
    }

    #[tokio::test]
    async fn polling_loop_observes_messages_and_stops_cleanly() {
        let pair = matched_pair().await;
        let (sync_a, _) = sync_for(&pair, pair.a);
        let (sync_b, _) = sync_for(&pair, pair.b);

        let handle = sync_a.clone().spawn();
        sync_b.send(MessageBody::Text("ping".into())).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(texts(&sync_a), ["ping"]);

        sync_a.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop must stop when told")
            .unwrap();
    }
}
