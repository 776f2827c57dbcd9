use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::clients::api::MatchmakerApi;
use crate::errors::CoreResult;
use crate::types::event::{CoreEvent, EventBus};

use super::gate::{self, EntitlementState, Feature, Gate, Tier};
use super::quota::SwipeQuotaLedger;

/// Process-wide entitlement singleton.
///
/// Holds the current [`EntitlementState`] (refreshed from the collaborator
/// on a cadence; tier changes are payment-driven and arrive only this way)
/// and the swipe quota ledger, and answers every feature check through the
/// gate. Presentation reads it; nothing outside the refresh path writes it.
pub struct EntitlementStore {
    api: Arc<dyn MatchmakerApi>,
    ledger: Arc<SwipeQuotaLedger>,
    events: EventBus,
    state: RwLock<EntitlementState>,
}

impl EntitlementStore {
    pub fn new(
        api: Arc<dyn MatchmakerApi>,
        ledger: Arc<SwipeQuotaLedger>,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            ledger,
            events,
            state: RwLock::new(EntitlementState::free()),
        }
    }

    pub fn tier(&self) -> Tier {
        self.state.read().tier
    }

    pub fn state(&self) -> EntitlementState {
        *self.state.read()
    }

    pub fn ledger(&self) -> &Arc<SwipeQuotaLedger> {
        &self.ledger
    }

    /// Evaluates `feature` against the live tier and quota headroom.
    pub fn check(&self, feature: Feature) -> Gate {
        gate::evaluate(feature, self.tier(), self.ledger.remaining())
    }

    /// Applies an externally observed state (status poll response).
    pub fn apply(&self, next: EntitlementState) {
        let mut state = self.state.write();
        if *state != next {
            tracing::info!(tier = ?next.tier, "entitlement state changed");
        }
        *state = next;
    }

    pub async fn refresh(&self) -> CoreResult<EntitlementState> {
        let next = self.api.subscription_status().await?;
        self.apply(next);
        Ok(next)
    }

    /// Periodic status poll. Stops itself on auth expiry after announcing
    /// `SessionExpired`; other failures are logged and retried next tick.
    pub fn spawn_refresh(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; skip it, the session already
            // refreshed once at startup.
            tick.tick().await;
            loop {
                tick.tick().await;
                match store.refresh().await {
                    Ok(_) => {}
                    Err(err) if err.is_auth_expired() => {
                        store.events.publish(CoreEvent::SessionExpired);
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "entitlement refresh failed; keeping last state");
                    }
                }
            }
        })
    }
}
