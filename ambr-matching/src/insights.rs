use std::sync::Arc;

use ambr_shared::clients::MatchmakerApi;
use ambr_shared::entitlements::{EntitlementStore, Feature};
use ambr_shared::errors::CoreResult;
use ambr_shared::types::profile::Profile;

/// Pro insight feeds: who liked me, who viewed my profile.
///
/// Both are gated locally so a Free user gets the upsell without a wasted
/// round trip; the collaborator enforces the same rule server-side.
pub struct InsightFeeds {
    api: Arc<dyn MatchmakerApi>,
    entitlements: Arc<EntitlementStore>,
}

impl InsightFeeds {
    pub fn new(api: Arc<dyn MatchmakerApi>, entitlements: Arc<EntitlementStore>) -> Self {
        Self { api, entitlements }
    }

    pub async fn who_liked_me(&self) -> CoreResult<Vec<Profile>> {
        self.entitlements
            .check(Feature::ViewWhoLikedMe)
            .into_result()?;
        self.api.who_liked_me().await
    }

    pub async fn who_viewed_me(&self) -> CoreResult<Vec<Profile>> {
        self.entitlements
            .check(Feature::ViewWhoViewedMe)
            .into_result()?;
        self.api.who_viewed_me().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambr_shared::clients::memory::InMemoryWorld;
    use ambr_shared::entitlements::{SwipeQuotaLedger, Tier};
    use ambr_shared::errors::ErrorCode;
    use ambr_shared::types::event::EventBus;
    use uuid::Uuid;

    #[tokio::test]
    async fn free_tier_gets_the_upsell_locally() {
        let world = InMemoryWorld::new();
        let me = Uuid::new_v4();
        let admirer = Uuid::new_v4();
        world.add_profile(Profile::bare(me, "me", 30));
        world.add_profile(Profile::bare(admirer, "admirer", 27));
        world.client(admirer).like(me).await.unwrap();

        let api = Arc::new(world.client(me));
        let ledger = Arc::new(SwipeQuotaLedger::new(50));
        let entitlements = Arc::new(EntitlementStore::new(
            api.clone(),
            ledger,
            EventBus::default(),
        ));
        let insights = InsightFeeds::new(api, entitlements.clone());

        let err = insights.who_liked_me().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ProRequired));
        let err = insights.who_viewed_me().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ProRequired));

        world.set_tier(me, Tier::Pro);
        entitlements.refresh().await.unwrap();
        let admirers = insights.who_liked_me().await.unwrap();
        assert_eq!(admirers.len(), 1);
        assert_eq!(admirers[0].user_id, admirer);
    }
}
