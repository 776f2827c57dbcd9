//! In-memory collaborator used by tests across the workspace.
//!
//! Implements the `MatchmakerApi` contract with real multi-actor semantics:
//! mutual likes create exactly one match, fetching a timeline marks the
//! partner's unread messages read, deletes are sender-only and Pro-only,
//! and blocks hide profiles, discovery entries, and matches in both
//! directions. Faults can be injected per client to exercise rollback
//! paths.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::entitlements::{EntitlementState, Tier};
use crate::errors::{CoreError, CoreResult, ErrorCode};
use crate::types::matching::{DiscoveryFilters, Match, SwipeAck};
use crate::types::messaging::{Message, OutgoingMessage};
use crate::types::profile::Profile;

use super::api::MatchmakerApi;

#[derive(Default)]
struct World {
    profiles: HashMap<Uuid, Profile>,
    tiers: HashMap<Uuid, Tier>,
    likes: HashSet<(Uuid, Uuid)>,
    passes: HashSet<(Uuid, Uuid)>,
    winks: HashSet<(Uuid, Uuid)>,
    matches: Vec<Match>,
    messages: Vec<Message>,
    deleted_messages: HashSet<Uuid>,
    blocks: HashSet<(Uuid, Uuid)>,
    reports: Vec<(Uuid, Uuid, String)>,
    views: Vec<(Uuid, Uuid)>,
}

impl World {
    fn blocked_between(&self, a: Uuid, b: Uuid) -> bool {
        self.blocks.contains(&(a, b)) || self.blocks.contains(&(b, a))
    }

    fn decided(&self, actor: Uuid, target: Uuid) -> bool {
        self.likes.contains(&(actor, target))
            || self.passes.contains(&(actor, target))
            || self.winks.contains(&(actor, target))
    }

    fn match_of(&self, a: Uuid, b: Uuid) -> Option<&Match> {
        self.matches
            .iter()
            .find(|m| m.involves(a) && m.involves(b))
    }

    fn tier_of(&self, user: Uuid) -> Tier {
        self.tiers.get(&user).copied().unwrap_or(Tier::Free)
    }
}

/// Shared world state; hand out one [`InMemoryApi`] per actor.
#[derive(Clone, Default)]
pub struct InMemoryWorld {
    inner: Arc<Mutex<World>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, profile: Profile) {
        let mut world = self.inner.lock();
        world.tiers.entry(profile.user_id).or_insert(Tier::Free);
        world.profiles.insert(profile.user_id, profile);
    }

    pub fn set_tier(&self, user: Uuid, tier: Tier) {
        self.inner.lock().tiers.insert(user, tier);
    }

    pub fn client(&self, user_id: Uuid) -> InMemoryApi {
        InMemoryApi {
            user_id,
            world: self.inner.clone(),
            faults: Mutex::new(VecDeque::new()),
        }
    }

    /// The single match between two users, if any.
    pub fn match_between(&self, a: Uuid, b: Uuid) -> Option<Match> {
        self.inner.lock().match_of(a, b).cloned()
    }

    pub fn match_count(&self, a: Uuid, b: Uuid) -> usize {
        self.inner
            .lock()
            .matches
            .iter()
            .filter(|m| m.involves(a) && m.involves(b))
            .count()
    }

    /// Committed decisions by one actor, all verdicts confounded.
    pub fn decision_count(&self, actor: Uuid) -> usize {
        let world = self.inner.lock();
        world.likes.iter().filter(|(a, _)| *a == actor).count()
            + world.passes.iter().filter(|(a, _)| *a == actor).count()
            + world.winks.iter().filter(|(a, _)| *a == actor).count()
    }

    pub fn report_count(&self, target: Uuid) -> usize {
        self.inner
            .lock()
            .reports
            .iter()
            .filter(|(_, reported, _)| *reported == target)
            .count()
    }
}

/// One actor's view of the in-memory world.
pub struct InMemoryApi {
    user_id: Uuid,
    world: Arc<Mutex<World>>,
    faults: Mutex<VecDeque<CoreError>>,
}

impl InMemoryApi {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Queues an error returned by the next API call instead of executing it.
    pub fn fail_next(&self, err: CoreError) {
        self.faults.lock().push_back(err);
    }

    fn take_fault(&self) -> CoreResult<()> {
        match self.faults.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn passes_filters(profile: &Profile, filters: &DiscoveryFilters) -> bool {
    if filters.online_only && !profile.is_online {
        return false;
    }
    if let Some(min) = filters.min_age {
        if (profile.age as u32) < min {
            return false;
        }
    }
    if let Some(max) = filters.max_age {
        if (profile.age as u32) > max {
            return false;
        }
    }
    if let Some(max_km) = filters.max_distance_km {
        if let Some(distance) = profile.distance_km {
            if distance > f64::from(max_km) {
                return false;
            }
        }
    }
    if let Some(position) = &filters.position {
        if profile.position.as_ref() != Some(position) {
            return false;
        }
    }
    if let Some(tribe) = &filters.tribe {
        if profile.tribe.as_ref() != Some(tribe) {
            return false;
        }
    }
    if let Some(looking_for) = &filters.looking_for {
        if profile.looking_for.as_ref() != Some(looking_for) {
            return false;
        }
    }
    if filters.available_now && !profile.available_now {
        return false;
    }
    true
}

#[async_trait]
impl MatchmakerApi for InMemoryApi {
    async fn discovery(&self, filters: &DiscoveryFilters) -> CoreResult<Vec<Profile>> {
        self.take_fault()?;
        let world = self.world.lock();
        let me = self.user_id;
        let mut result: Vec<Profile> = world
            .profiles
            .values()
            .filter(|p| p.user_id != me)
            .filter(|p| !world.decided(me, p.user_id))
            .filter(|p| !world.blocked_between(me, p.user_id))
            .filter(|p| passes_filters(p, filters))
            .cloned()
            .collect();
        // Stable order for deterministic decks.
        result.sort_by_key(|p| p.user_id);
        for profile in &mut result {
            profile.private_photos.clear();
        }
        Ok(result)
    }

    async fn profile(&self, user_id: Uuid) -> CoreResult<Profile> {
        self.take_fault()?;
        let mut world = self.world.lock();
        if world.blocked_between(self.user_id, user_id) {
            return Err(CoreError::new(ErrorCode::ProfileNotFound, "profile not found"));
        }
        let profile = world
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| CoreError::new(ErrorCode::ProfileNotFound, "profile not found"))?;
        if world.tier_of(self.user_id) == Tier::Pro && user_id != self.user_id {
            world.views.push((self.user_id, user_id));
        }
        Ok(profile)
    }

    async fn like(&self, target_id: Uuid) -> CoreResult<SwipeAck> {
        self.take_fault()?;
        let mut world = self.world.lock();
        let me = self.user_id;
        if world.blocked_between(me, target_id) {
            return Err(CoreError::new(ErrorCode::Blocked, "interaction not available"));
        }
        if world.likes.contains(&(me, target_id)) {
            // Idempotent: the existing decision stands.
            let existing = world.match_of(me, target_id);
            return Ok(SwipeAck {
                is_match: existing.is_some(),
                match_id: existing.map(|m| m.id),
            });
        }
        world.likes.insert((me, target_id));
        if world.likes.contains(&(target_id, me)) && world.match_of(me, target_id).is_none() {
            let record = Match {
                id: Uuid::new_v4(),
                user1_id: me,
                user2_id: target_id,
                matched_at: Utc::now(),
                other_profile: None,
            };
            let id = record.id;
            world.matches.push(record);
            return Ok(SwipeAck {
                is_match: true,
                match_id: Some(id),
            });
        }
        Ok(SwipeAck::default())
    }

    async fn pass(&self, target_id: Uuid) -> CoreResult<()> {
        self.take_fault()?;
        let mut world = self.world.lock();
        world.passes.insert((self.user_id, target_id));
        Ok(())
    }

    async fn wink(&self, target_id: Uuid) -> CoreResult<()> {
        self.take_fault()?;
        let mut world = self.world.lock();
        world.winks.insert((self.user_id, target_id));
        Ok(())
    }

    async fn matches(&self) -> CoreResult<Vec<Match>> {
        self.take_fault()?;
        let world = self.world.lock();
        let me = self.user_id;
        Ok(world
            .matches
            .iter()
            .filter(|m| m.involves(me))
            .filter(|m| !world.blocked_between(m.user1_id, m.user2_id))
            .map(|m| {
                let mut record = m.clone();
                let partner = m.partner_of(me);
                record.other_profile = world.profiles.get(&partner).map(|p| {
                    let mut p = p.clone();
                    p.private_photos.clear();
                    p
                });
                record
            })
            .collect())
    }

    async fn messages(&self, match_id: Uuid) -> CoreResult<Vec<Message>> {
        self.take_fault()?;
        let mut world = self.world.lock();
        let me = self.user_id;
        let record = world
            .matches
            .iter()
            .find(|m| m.id == match_id)
            .cloned()
            .ok_or_else(|| CoreError::new(ErrorCode::MatchNotFound, "match not found"))?;
        if !record.involves(me) {
            return Err(CoreError::new(
                ErrorCode::NotMatchParticipant,
                "not a participant of this match",
            ));
        }
        if world.blocked_between(record.user1_id, record.user2_id) {
            return Err(CoreError::new(ErrorCode::MatchNotFound, "match not found"));
        }

        // The authenticated fetch is the read report: the partner's unread
        // messages become read the moment the recipient retrieves them.
        let now = Utc::now();
        for message in world
            .messages
            .iter_mut()
            .filter(|m| m.match_id == match_id && m.sender_id != me)
        {
            message.mark_read(now);
        }

        let mut timeline: Vec<Message> = world
            .messages
            .iter()
            .filter(|m| m.match_id == match_id && !world.deleted_messages.contains(&m.id))
            .cloned()
            .collect();
        timeline.sort_by_key(|m| m.sort_key());
        Ok(timeline)
    }

    async fn send_message(&self, outgoing: &OutgoingMessage) -> CoreResult<Message> {
        self.take_fault()?;
        let mut world = self.world.lock();
        let me = self.user_id;
        let record = world
            .matches
            .iter()
            .find(|m| m.id == outgoing.match_id)
            .cloned()
            .ok_or_else(|| CoreError::new(ErrorCode::MatchNotFound, "match not found"))?;
        if !record.involves(me) {
            return Err(CoreError::new(
                ErrorCode::NotMatchParticipant,
                "not a participant of this match",
            ));
        }
        if world.blocked_between(record.user1_id, record.user2_id) {
            return Err(CoreError::new(ErrorCode::Blocked, "interaction not available"));
        }
        let message = Message {
            id: Uuid::new_v4(),
            match_id: outgoing.match_id,
            sender_id: me,
            body: outgoing.body.clone(),
            created_at: Utc::now(),
            read: false,
            read_at: None,
        };
        world.messages.push(message.clone());
        Ok(message)
    }

    async fn delete_message(&self, message_id: Uuid) -> CoreResult<()> {
        self.take_fault()?;
        let mut world = self.world.lock();
        if world.tier_of(self.user_id) != Tier::Pro {
            return Err(CoreError::pro_required("unsending messages requires Pro"));
        }
        let message = world
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| CoreError::new(ErrorCode::MessageNotFound, "message not found"))?;
        if message.sender_id != self.user_id {
            return Err(CoreError::new(
                ErrorCode::Forbidden,
                "only the sender can unsend a message",
            ));
        }
        world.deleted_messages.insert(message_id);
        Ok(())
    }

    async fn subscription_status(&self) -> CoreResult<EntitlementState> {
        self.take_fault()?;
        let world = self.world.lock();
        Ok(EntitlementState {
            tier: world.tier_of(self.user_id),
        })
    }

    async fn who_liked_me(&self) -> CoreResult<Vec<Profile>> {
        self.take_fault()?;
        let world = self.world.lock();
        if world.tier_of(self.user_id) != Tier::Pro {
            return Err(CoreError::pro_required("seeing who liked you requires Pro"));
        }
        Ok(world
            .likes
            .iter()
            .filter(|(_, liked)| *liked == self.user_id)
            .filter_map(|(liker, _)| world.profiles.get(liker).cloned())
            .collect())
    }

    async fn who_viewed_me(&self) -> CoreResult<Vec<Profile>> {
        self.take_fault()?;
        let world = self.world.lock();
        if world.tier_of(self.user_id) != Tier::Pro {
            return Err(CoreError::pro_required("seeing profile views requires Pro"));
        }
        Ok(world
            .views
            .iter()
            .filter(|(_, viewed)| *viewed == self.user_id)
            .filter_map(|(viewer, _)| world.profiles.get(viewer).cloned())
            .collect())
    }

    async fn block(&self, target_id: Uuid) -> CoreResult<()> {
        self.take_fault()?;
        let mut world = self.world.lock();
        world.blocks.insert((self.user_id, target_id));
        Ok(())
    }

    async fn unblock(&self, target_id: Uuid) -> CoreResult<()> {
        self.take_fault()?;
        let mut world = self.world.lock();
        if !world.blocks.remove(&(self.user_id, target_id)) {
            return Err(CoreError::new(ErrorCode::NotFound, "block record not found"));
        }
        Ok(())
    }

    async fn report(&self, target_id: Uuid, reason: &str) -> CoreResult<()> {
        self.take_fault()?;
        if reason.trim().is_empty() {
            return Err(CoreError::validation("report reason must not be empty"));
        }
        if target_id == self.user_id {
            return Err(CoreError::new(
                ErrorCode::CannotReportSelf,
                "you cannot report yourself",
            ));
        }
        let mut world = self.world.lock();
        world
            .reports
            .push((self.user_id, target_id, reason.to_string()));
        Ok(())
    }

    async fn blocked_users(&self) -> CoreResult<Vec<Uuid>> {
        self.take_fault()?;
        let world = self.world.lock();
        Ok(world
            .blocks
            .iter()
            .filter(|(blocker, _)| *blocker == self.user_id)
            .map(|(_, blocked)| *blocked)
            .collect())
    }
}
