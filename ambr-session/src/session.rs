use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use ambr_matching::{DecisionEngine, DiscoveryFeed, InsightFeeds};
use ambr_messaging::Inbox;
use ambr_moderation::SafetyDesk;
use ambr_shared::clients::{MatchmakerApi, PrefsStore};
use ambr_shared::config::AppConfig;
use ambr_shared::entitlements::{EntitlementStore, SwipeQuotaLedger};
use ambr_shared::errors::CoreResult;
use ambr_shared::types::event::{CoreEvent, EventBus};

/// The assembled core for one signed-in user.
///
/// Owns the per-user singletons (entitlement store, quota ledger, block
/// set), the discovery/decision pipeline, the inbox, and the periodic
/// tasks: status refresh, midnight quota reset, and the event loop that
/// reacts to matches, blocks, and session expiry. Everything network-bound
/// goes through the one [`MatchmakerApi`] handle.
pub struct CoreSession {
    me: Uuid,
    api: Arc<dyn MatchmakerApi>,
    events: EventBus,
    entitlements: Arc<EntitlementStore>,
    safety: Arc<SafetyDesk>,
    feed: Arc<Mutex<DiscoveryFeed>>,
    engine: DecisionEngine,
    insights: InsightFeeds,
    inbox: Arc<Inbox>,
    prefs: Arc<PrefsStore>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl CoreSession {
    /// Builds and starts the session runtime.
    ///
    /// A failed initial status fetch is tolerated (the user starts as Free
    /// until the next poll) unless it is a 401, which means the token is
    /// already dead.
    pub async fn start(
        me: Uuid,
        api: Arc<dyn MatchmakerApi>,
        config: AppConfig,
    ) -> CoreResult<Arc<Self>> {
        let events = EventBus::default();
        let ledger = Arc::new(SwipeQuotaLedger::new(config.daily_swipe_allowance));
        let entitlements = Arc::new(EntitlementStore::new(
            api.clone(),
            ledger,
            events.clone(),
        ));
        if let Err(err) = entitlements.refresh().await {
            if err.is_auth_expired() {
                return Err(err);
            }
            tracing::warn!(error = %err, "initial status fetch failed, assuming free tier until the next poll");
        }

        let prefs = Arc::new(PrefsStore::open(&config.prefs_path));
        let safety = Arc::new(SafetyDesk::new(me, api.clone(), events.clone()));
        if let Err(err) = safety.sync().await {
            tracing::warn!(error = %err, "block list sync failed, starting empty");
        }

        let feed = Arc::new(Mutex::new(DiscoveryFeed::new(
            api.clone(),
            entitlements.clone(),
            safety.clone(),
            prefs.clone(),
        )));
        let engine = DecisionEngine::new(
            me,
            api.clone(),
            entitlements.clone(),
            feed.clone(),
            events.clone(),
            config.decision_timeout(),
        );
        let insights = InsightFeeds::new(api.clone(), entitlements.clone());
        let inbox = Arc::new(Inbox::new(
            me,
            api.clone(),
            entitlements.clone(),
            events.clone(),
            prefs.clone(),
            safety.clone(),
            config.poll_interval(),
        ));
        if let Err(err) = inbox.refresh_matches().await {
            tracing::warn!(error = %err, "initial match fetch failed");
        }

        let session = Arc::new(Self {
            me,
            api,
            events,
            entitlements,
            safety,
            feed,
            engine,
            insights,
            inbox,
            prefs,
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        });

        let tasks = vec![
            session.entitlements.ledger().clone().spawn_daily_reset(),
            session
                .entitlements
                .clone()
                .spawn_refresh(config.status_refresh_interval()),
            Self::spawn_event_loop(&session),
        ];
        *session.tasks.lock() = tasks;

        tracing::info!(user = %me, "core session started");
        Ok(session)
    }

    fn spawn_event_loop(session: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(session);
        let mut rx = session.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(session) = weak.upgrade() else { break };
                        match event {
                            CoreEvent::MatchCreated { partner_id } => {
                                if let Err(err) = session.inbox.refresh_matches().await {
                                    tracing::warn!(error = %err, "match refresh after mutual like failed");
                                }
                                tracing::info!(partner = %partner_id, "new match ready to chat");
                            }
                            CoreEvent::UserBlocked { user_id } => {
                                session.inbox.purge_blocked();
                                session.feed.lock().remove_user(user_id);
                            }
                            CoreEvent::SessionExpired => {
                                session.expire();
                                break;
                            }
                            _ => {}
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session event loop lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // --- Accessors ---

    pub fn me(&self) -> Uuid {
        self.me
    }

    pub fn api(&self) -> &Arc<dyn MatchmakerApi> {
        &self.api
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn entitlements(&self) -> &Arc<EntitlementStore> {
        &self.entitlements
    }

    pub fn feed(&self) -> &Arc<Mutex<DiscoveryFeed>> {
        &self.feed
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn insights(&self) -> &InsightFeeds {
        &self.insights
    }

    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    pub fn safety(&self) -> &Arc<SafetyDesk> {
        &self.safety
    }

    pub fn prefs(&self) -> &Arc<PrefsStore> {
        &self.prefs
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // --- Safety convenience: keep discovery and inbox in lockstep ---

    /// Blocks a user and collapses every local view of them at once, before
    /// the write-through result comes back.
    pub async fn block(&self, target_id: Uuid) -> CoreResult<()> {
        let result = self.safety.block(target_id).await;
        self.inbox.purge_blocked();
        self.feed.lock().remove_user(target_id);
        result
    }

    pub async fn unblock(&self, target_id: Uuid) -> CoreResult<()> {
        self.safety.unblock(target_id).await?;
        self.inbox.refresh_matches().await.map(|_| ())
    }

    pub async fn report(&self, target_id: Uuid, reason: &str) -> CoreResult<()> {
        self.safety.report(target_id, reason).await
    }

    // --- Teardown ---

    /// 401-class teardown: stop every synchronizer and periodic task and
    /// discard cached match/message state. The caller must re-authenticate
    /// and start a fresh session.
    pub fn expire(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inbox.handle_session_expired();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::warn!(user = %self.me, "session expired, re-authentication required");
    }

    /// Normal shutdown: stop timers, keep nothing running. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inbox.stop_all();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::info!(user = %self.me, "core session shut down");
    }
}

impl Drop for CoreSession {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
