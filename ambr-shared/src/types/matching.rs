use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::profile::Profile;

// --- Verdict ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Like,
    Pass,
    Wink,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Pass => "pass",
            Self::Wink => "wink",
        }
    }

    /// Only committed likes and passes count against the daily allowance;
    /// winks are free actions.
    pub fn consumes_quota(&self) -> bool {
        matches!(self, Self::Like | Self::Pass)
    }
}

// --- SwipeDecision ---

/// A committed decision on one candidate. Write-once per (actor, target)
/// pair in the steady state; retries are idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwipeDecision {
    pub actor_id: Uuid,
    pub target_id: Uuid,
    pub verdict: Verdict,
    pub created_at: DateTime<Utc>,
}

/// Collaborator acknowledgement of a decision write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwipeAck {
    #[serde(default)]
    pub is_match: bool,
    #[serde(default)]
    pub match_id: Option<Uuid>,
}

// --- Match ---

/// A mutual-like relationship. Structurally immutable once created; it only
/// disappears from view when a participant blocks the other. The local
/// `favorite` flag lives in the preference store, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub matched_at: DateTime<Utc>,
    #[serde(default)]
    pub other_profile: Option<Profile>,
}

impl Match {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    pub fn partner_of(&self, user_id: Uuid) -> Uuid {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

// --- DiscoveryFilters ---

/// Filter set for a discovery fetch, combined with AND semantics.
///
/// The `available_now` filter is entitlement-gated (`FilterAvailableNow`)
/// before any request is issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_age_range"))]
pub struct DiscoveryFilters {
    #[serde(default)]
    pub online_only: bool,
    #[validate(range(min = 18, max = 99, message = "minimum age must be between 18 and 99"))]
    #[serde(default)]
    pub min_age: Option<u32>,
    #[validate(range(min = 18, max = 99, message = "maximum age must be between 18 and 99"))]
    #[serde(default)]
    pub max_age: Option<u32>,
    #[serde(default)]
    pub max_distance_km: Option<u32>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub tribe: Option<String>,
    #[serde(default)]
    pub looking_for: Option<String>,
    #[serde(default)]
    pub available_now: bool,
}

fn validate_age_range(filters: &DiscoveryFilters) -> Result<(), ValidationError> {
    if let (Some(min), Some(max)) = (filters.min_age, filters.max_age) {
        if min > max {
            return Err(ValidationError::new("age_range_inverted"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_quota_rule() {
        assert!(Verdict::Like.consumes_quota());
        assert!(Verdict::Pass.consumes_quota());
        assert!(!Verdict::Wink.consumes_quota());
    }

    #[test]
    fn match_partner_resolution() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let m = Match {
            id: Uuid::new_v4(),
            user1_id: a,
            user2_id: b,
            matched_at: Utc::now(),
            other_profile: None,
        };
        assert_eq!(m.partner_of(a), b);
        assert_eq!(m.partner_of(b), a);
        assert!(m.involves(a) && m.involves(b));
    }

    #[test]
    fn filters_validate_age_bounds() {
        let ok = DiscoveryFilters {
            min_age: Some(25),
            max_age: Some(40),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let underage = DiscoveryFilters {
            min_age: Some(16),
            ..Default::default()
        };
        assert!(underage.validate().is_err());

        let inverted = DiscoveryFilters {
            min_age: Some(40),
            max_age: Some(25),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn verdict_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Like).unwrap(), "\"like\"");
        assert_eq!(serde_json::to_string(&Verdict::Wink).unwrap(), "\"wink\"");
    }
}
