use std::collections::VecDeque;
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use ambr_moderation::SafetyDesk;
use ambr_shared::clients::{MatchmakerApi, PrefsStore};
use ambr_shared::entitlements::{EntitlementStore, Feature};
use ambr_shared::errors::CoreResult;
use ambr_shared::types::matching::DiscoveryFilters;
use ambr_shared::types::profile::Profile;

/// Holds the ranked candidate deck for the current filter set.
///
/// Every successful fetch replaces the deck wholesale and resets the cursor
/// to the front; there is no merging or diffing against the previous list,
/// and a consumed deck is only refilled by another fetch. Profiles the user
/// already decided on never come back (the collaborator filters them); the
/// controller additionally drops locally-blocked users.
pub struct DiscoveryFeed {
    api: Arc<dyn MatchmakerApi>,
    entitlements: Arc<EntitlementStore>,
    safety: Arc<SafetyDesk>,
    prefs: Arc<PrefsStore>,
    filters: DiscoveryFilters,
    deck: VecDeque<Profile>,
}

impl DiscoveryFeed {
    pub fn new(
        api: Arc<dyn MatchmakerApi>,
        entitlements: Arc<EntitlementStore>,
        safety: Arc<SafetyDesk>,
        prefs: Arc<PrefsStore>,
    ) -> Self {
        let filters = prefs.cached_filters().unwrap_or_default();
        Self {
            api,
            entitlements,
            safety,
            prefs,
            filters,
            deck: VecDeque::new(),
        }
    }

    pub fn filters(&self) -> &DiscoveryFilters {
        &self.filters
    }

    /// Validates and adopts a new filter set, caching it on the device.
    /// The deck is untouched until the next fetch.
    pub fn set_filters(&mut self, filters: DiscoveryFilters) -> CoreResult<()> {
        filters.validate()?;
        self.prefs.cache_filters(&filters)?;
        self.filters = filters;
        Ok(())
    }

    /// Fetches candidates for the current filters, replacing the deck.
    ///
    /// The availability filter is entitlement-gated before the request goes
    /// out, so a Free user pays no round trip to learn it is locked.
    pub async fn refresh(&mut self) -> CoreResult<usize> {
        self.filters.validate()?;
        if self.filters.available_now {
            self.entitlements
                .check(Feature::FilterAvailableNow)
                .into_result()?;
        }

        let profiles = self.api.discovery(&self.filters).await?;
        self.deck = profiles
            .into_iter()
            .filter(|p| !self.safety.is_blocked(p.user_id))
            .collect();
        tracing::debug!(candidates = self.deck.len(), "discovery deck replaced");
        Ok(self.deck.len())
    }

    /// Supplies the next candidate to the decision engine.
    pub fn next_candidate(&mut self) -> Option<Profile> {
        self.deck.pop_front()
    }

    pub fn peek(&self) -> Option<&Profile> {
        self.deck.front()
    }

    /// Puts a candidate back at the front after a rolled-back decision, so
    /// the card visibly returns to the top of the stack.
    pub fn restore_front(&mut self, profile: Profile) {
        self.deck.push_front(profile);
    }

    /// Drops a user from the current deck (e.g. just blocked).
    pub fn remove_user(&mut self, user_id: Uuid) {
        self.deck.retain(|p| p.user_id != user_id);
    }

    pub fn remaining(&self) -> usize {
        self.deck.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambr_shared::clients::memory::InMemoryWorld;
    use ambr_shared::entitlements::{SwipeQuotaLedger, Tier};
    use ambr_shared::errors::{ErrorClass, ErrorCode};
    use ambr_shared::types::event::EventBus;

    struct Fixture {
        world: InMemoryWorld,
        me: Uuid,
        feed: DiscoveryFeed,
        entitlements: Arc<EntitlementStore>,
    }

    fn fixture(candidates: usize) -> Fixture {
        let world = InMemoryWorld::new();
        let me = Uuid::new_v4();
        world.add_profile(Profile::bare(me, "me", 30));
        for i in 0..candidates {
            world.add_profile(Profile::bare(Uuid::new_v4(), format!("candidate{i}"), 25 + i as i32));
        }

        let api = Arc::new(world.client(me));
        let events = EventBus::default();
        let ledger = Arc::new(SwipeQuotaLedger::new(50));
        let entitlements = Arc::new(EntitlementStore::new(api.clone(), ledger, events.clone()));
        let safety = Arc::new(SafetyDesk::new(me, api.clone(), events));
        let prefs = Arc::new(PrefsStore::open(
            std::env::temp_dir().join(format!("ambr-feed-{}.json", Uuid::new_v4())),
        ));
        let feed = DiscoveryFeed::new(api, entitlements.clone(), safety, prefs);
        Fixture {
            world,
            me,
            feed,
            entitlements,
        }
    }

    #[tokio::test]
    async fn refresh_replaces_the_deck_and_resets_the_cursor() {
        let mut fx = fixture(3);
        assert_eq!(fx.feed.refresh().await.unwrap(), 3);

        let first = fx.feed.next_candidate().unwrap();
        assert_eq!(fx.feed.remaining(), 2);

        // A new fetch starts over from the full list, not the leftovers.
        assert_eq!(fx.feed.refresh().await.unwrap(), 3);
        assert_eq!(fx.feed.peek().unwrap().user_id, first.user_id);
    }

    #[tokio::test]
    async fn availability_filter_is_gated_before_any_request() {
        let mut fx = fixture(1);
        let filters = DiscoveryFilters {
            available_now: true,
            ..Default::default()
        };
        fx.feed.set_filters(filters).unwrap();

        let err = fx.feed.refresh().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ProRequired));

        // Pro unlocks the same filter set.
        fx.world.set_tier(fx.me, Tier::Pro);
        fx.entitlements.refresh().await.unwrap();
        assert!(fx.feed.refresh().await.is_ok());
    }

    #[tokio::test]
    async fn invalid_filters_never_reach_the_network() {
        let mut fx = fixture(0);
        let err = fx
            .feed
            .set_filters(DiscoveryFilters {
                min_age: Some(60),
                max_age: Some(20),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidInput);
    }

    #[tokio::test]
    async fn filters_are_cached_on_the_device() {
        let world = InMemoryWorld::new();
        let me = Uuid::new_v4();
        world.add_profile(Profile::bare(me, "me", 30));
        let api = Arc::new(world.client(me));
        let events = EventBus::default();
        let ledger = Arc::new(SwipeQuotaLedger::new(50));
        let entitlements = Arc::new(EntitlementStore::new(api.clone(), ledger, events.clone()));
        let safety = Arc::new(SafetyDesk::new(me, api.clone(), events));
        let path = std::env::temp_dir().join(format!("ambr-feed-{}.json", Uuid::new_v4()));

        let prefs = Arc::new(PrefsStore::open(&path));
        let mut feed = DiscoveryFeed::new(
            api.clone(),
            entitlements.clone(),
            safety.clone(),
            prefs,
        );
        let filters = DiscoveryFilters {
            tribe: Some("bear".into()),
            ..Default::default()
        };
        feed.set_filters(filters.clone()).unwrap();

        // A fresh feed over the same store starts from the cached filters.
        let reopened = DiscoveryFeed::new(api, entitlements, safety, Arc::new(PrefsStore::open(&path)));
        assert_eq!(reopened.filters(), &filters);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn blocked_users_never_enter_the_deck() {
        let mut fx = fixture(2);
        fx.feed.refresh().await.unwrap();
        let blocked_id = fx.feed.peek().unwrap().user_id;

        // Block locally via a fresh desk sharing the same world.
        fx.feed.safety.block(blocked_id).await.unwrap();
        fx.feed.refresh().await.unwrap();
        assert!(fx.feed.peek().is_some());
        assert_ne!(fx.feed.peek().unwrap().user_id, blocked_id);
        assert_eq!(fx.feed.remaining(), 1);
    }
}
