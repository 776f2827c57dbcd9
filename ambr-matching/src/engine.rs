use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use uuid::Uuid;

use ambr_shared::clients::MatchmakerApi;
use ambr_shared::entitlements::{
    ConsumeOutcome, DenyReason, EntitlementStore, Feature, Gate, Tier,
};
use ambr_shared::errors::{CoreError, CoreResult, ErrorClass};
use ambr_shared::types::event::{CoreEvent, EventBus};
use ambr_shared::types::matching::{SwipeAck, SwipeDecision, Verdict};
use ambr_shared::types::profile::Profile;

use crate::discovery::DiscoveryFeed;

/// Where a candidate ends up after the user acts on it.
///
/// `Presented -> Deciding -> {Committed, RolledBack}`; a gate denial drops
/// back to `Presented` with the card restored and no request issued.
#[derive(Debug)]
pub enum SwipeOutcome {
    /// The collaborator acknowledged the decision (or it was already
    /// committed and the retry collapsed into it).
    Committed {
        decision: SwipeDecision,
        is_match: bool,
    },
    /// Entitlement denial before any network call; the candidate is back at
    /// the front of the deck.
    Denied { reason: DenyReason },
    /// The write failed or timed out; quota was refunded and the candidate
    /// restored.
    RolledBack { target_id: Uuid, error: CoreError },
    /// The deck is empty; nothing to decide on.
    NoCandidate,
}

/// Turns user intent on one candidate into a committed server decision.
///
/// The UI never blocks on the write: the card leaves the stack as soon as
/// the gate and ledger clear it, and a failure visibly restores it. Each
/// decision is a single idempotent request keyed by (actor, target), so a
/// retry after a timeout cannot double-consume quota or create a second
/// decision.
pub struct DecisionEngine {
    me: Uuid,
    api: Arc<dyn MatchmakerApi>,
    entitlements: Arc<EntitlementStore>,
    feed: Arc<Mutex<DiscoveryFeed>>,
    events: EventBus,
    committed: Mutex<HashMap<Uuid, (SwipeDecision, bool)>>,
    decision_timeout: Duration,
}

impl DecisionEngine {
    pub fn new(
        me: Uuid,
        api: Arc<dyn MatchmakerApi>,
        entitlements: Arc<EntitlementStore>,
        feed: Arc<Mutex<DiscoveryFeed>>,
        events: EventBus,
        decision_timeout: Duration,
    ) -> Self {
        Self {
            me,
            api,
            entitlements,
            feed,
            events,
            committed: Mutex::new(HashMap::new()),
            decision_timeout,
        }
    }

    pub fn feed(&self) -> &Arc<Mutex<DiscoveryFeed>> {
        &self.feed
    }

    /// Acts on the candidate currently at the front of the deck.
    pub async fn decide_next(&self, verdict: Verdict) -> SwipeOutcome {
        let Some(candidate) = self.feed.lock().next_candidate() else {
            return SwipeOutcome::NoCandidate;
        };
        self.decide(candidate, verdict).await
    }

    /// Runs one candidate through the decision state machine.
    pub async fn decide(&self, candidate: Profile, verdict: Verdict) -> SwipeOutcome {
        let target_id = candidate.user_id;

        // Confirmed retry of an already-committed decision: success, no
        // quota, no request.
        if let Some((decision, was_match)) = self.committed.lock().get(&target_id).cloned() {
            if decision.verdict == verdict {
                return SwipeOutcome::Committed {
                    decision,
                    is_match: was_match,
                };
            }
        }

        // Deciding: consult the gate. A denial returns the candidate to
        // Presented without any network traffic.
        if let Gate::Deny(reason) = self.entitlements.check(Feature::Swipe) {
            return self.deny(candidate, reason);
        }

        // Atomic consumption guards the final unit against rapid swipes.
        let consumed = if verdict.consumes_quota() && self.entitlements.tier() == Tier::Free {
            match self.entitlements.ledger().try_consume() {
                ConsumeOutcome::Consumed { .. } => true,
                ConsumeOutcome::Exhausted => {
                    return self.deny(candidate, DenyReason::QuotaExhausted);
                }
            }
        } else {
            false
        };

        // Optimistic point: the card has left the stack; the write is
        // bounded so it can never hang in Deciding forever.
        let attempt = tokio::time::timeout(self.decision_timeout, self.issue(target_id, verdict)).await;
        let result = match attempt {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout),
        };

        match result {
            Ok(ack) => self.commit(target_id, verdict, ack),
            Err(err) if err.class() == ErrorClass::Conflict => {
                // Already decided server-side: idempotent success, and the
                // local consumption is handed back since the collaborator
                // recorded nothing new.
                if consumed {
                    self.entitlements.ledger().refund();
                }
                self.commit(target_id, verdict, SwipeAck::default())
            }
            Err(err) => {
                if consumed {
                    self.entitlements.ledger().refund();
                }
                self.feed.lock().restore_front(candidate);
                if err.is_auth_expired() {
                    self.events.publish(CoreEvent::SessionExpired);
                }
                counter!("ambr_swipes_total", "verdict" => verdict.as_str(), "outcome" => "rolled_back")
                    .increment(1);
                tracing::warn!(target = %target_id, error = %err, "decision write failed, card restored");
                SwipeOutcome::RolledBack { target_id, error: err }
            }
        }
    }

    fn deny(&self, candidate: Profile, reason: DenyReason) -> SwipeOutcome {
        self.feed.lock().restore_front(candidate);
        if reason == DenyReason::QuotaExhausted {
            self.events.publish(CoreEvent::QuotaExhausted);
        }
        counter!("ambr_swipes_total", "verdict" => "any", "outcome" => "denied").increment(1);
        SwipeOutcome::Denied { reason }
    }

    fn commit(&self, target_id: Uuid, verdict: Verdict, ack: SwipeAck) -> SwipeOutcome {
        let decision = SwipeDecision {
            actor_id: self.me,
            target_id,
            verdict,
            created_at: Utc::now(),
        };
        // Winks never create matches; only likes run mutual-match detection.
        let is_match = verdict == Verdict::Like && ack.is_match;
        self.committed
            .lock()
            .insert(target_id, (decision.clone(), is_match));
        counter!("ambr_swipes_total", "verdict" => verdict.as_str(), "outcome" => "committed")
            .increment(1);
        if is_match {
            tracing::info!(partner = %target_id, "mutual like, match created");
            self.events
                .publish(CoreEvent::MatchCreated { partner_id: target_id });
        }
        SwipeOutcome::Committed { decision, is_match }
    }

    async fn issue(&self, target_id: Uuid, verdict: Verdict) -> CoreResult<SwipeAck> {
        match verdict {
            Verdict::Like => self.api.like(target_id).await,
            Verdict::Pass => self.api.pass(target_id).await.map(|_| SwipeAck::default()),
            Verdict::Wink => self.api.wink(target_id).await.map(|_| SwipeAck::default()),
        }
    }
}
