use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, ErrorCode};

/// Subscription tier, externally driven by payment events and read-only
/// inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
}

impl Default for Tier {
    fn default() -> Self {
        Self::Free
    }
}

/// Per-user entitlement snapshot from the collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementState {
    #[serde(default)]
    pub tier: Tier,
}

impl EntitlementState {
    pub fn free() -> Self {
        Self { tier: Tier::Free }
    }

    pub fn pro() -> Self {
        Self { tier: Tier::Pro }
    }

    // Derived capability set.

    pub fn unlimited_swipes(&self) -> bool {
        self.tier == Tier::Pro
    }

    pub fn read_receipts(&self) -> bool {
        self.tier == Tier::Pro
    }

    pub fn unsend_messages(&self) -> bool {
        self.tier == Tier::Pro
    }

    pub fn view_private_interactions(&self) -> bool {
        self.tier == Tier::Pro
    }
}

/// Every gated feature in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Swipe,
    ReadReceipt,
    UnsendMessage,
    ViewWhoLikedMe,
    ViewWhoViewedMe,
    FilterAvailableNow,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Swipe,
        Feature::ReadReceipt,
        Feature::UnsendMessage,
        Feature::ViewWhoLikedMe,
        Feature::ViewWhoViewedMe,
        Feature::FilterAvailableNow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swipe => "swipe",
            Self::ReadReceipt => "read_receipt",
            Self::UnsendMessage => "unsend_message",
            Self::ViewWhoLikedMe => "view_who_liked_me",
            Self::ViewWhoViewedMe => "view_who_viewed_me",
            Self::FilterAvailableNow => "filter_available_now",
        }
    }
}

/// Why a feature was denied. The two reasons require different user
/// responses: wait for the reset vs upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    QuotaExhausted,
    ProRequired,
}

impl DenyReason {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::QuotaExhausted => {
                "Daily swipe limit reached. Come back tomorrow, or go Pro for unlimited swipes."
            }
            Self::ProRequired => "This feature is part of Pro. Upgrade to unlock it.",
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::QuotaExhausted => ErrorCode::QuotaExhausted,
            Self::ProRequired => ErrorCode::ProRequired,
        }
    }

    pub fn into_error(self) -> CoreError {
        CoreError::new(self.error_code(), self.user_message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Deny(DenyReason),
}

impl Gate {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn into_result(self) -> Result<(), CoreError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason.into_error()),
        }
    }
}

/// The single entitlement rule table, total over every input combination.
///
/// Pro allows everything unconditionally. Free allows `Swipe` only while
/// the daily quota has headroom and denies every other feature. Pure
/// function, no I/O.
pub fn evaluate(feature: Feature, tier: Tier, swipes_remaining: u32) -> Gate {
    match tier {
        Tier::Pro => Gate::Allow,
        Tier::Free => match feature {
            Feature::Swipe if swipes_remaining > 0 => Gate::Allow,
            Feature::Swipe => Gate::Deny(DenyReason::QuotaExhausted),
            _ => Gate::Deny(DenyReason::ProRequired),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pro_allows_every_feature() {
        for feature in Feature::ALL {
            for remaining in [0, 1, 50] {
                assert_eq!(evaluate(feature, Tier::Pro, remaining), Gate::Allow);
            }
        }
    }

    #[test]
    fn free_swipe_follows_quota() {
        assert_eq!(evaluate(Feature::Swipe, Tier::Free, 1), Gate::Allow);
        assert_eq!(evaluate(Feature::Swipe, Tier::Free, 50), Gate::Allow);
        assert_eq!(
            evaluate(Feature::Swipe, Tier::Free, 0),
            Gate::Deny(DenyReason::QuotaExhausted)
        );
    }

    #[test]
    fn free_denies_pro_features_regardless_of_quota() {
        for feature in Feature::ALL {
            if feature == Feature::Swipe {
                continue;
            }
            for remaining in [0, 50] {
                assert_eq!(
                    evaluate(feature, Tier::Free, remaining),
                    Gate::Deny(DenyReason::ProRequired),
                    "feature {} must be Pro-only",
                    feature.as_str()
                );
            }
        }
    }

    #[test]
    fn deny_reasons_map_to_distinct_errors() {
        let quota = DenyReason::QuotaExhausted.into_error();
        let pro = DenyReason::ProRequired.into_error();
        assert_eq!(quota.code(), Some(ErrorCode::QuotaExhausted));
        assert_eq!(pro.code(), Some(ErrorCode::ProRequired));
        assert_ne!(quota.to_string(), pro.to_string());
    }

    #[test]
    fn capability_set_derives_from_tier() {
        let pro = EntitlementState::pro();
        assert!(pro.unlimited_swipes());
        assert!(pro.read_receipts());
        assert!(pro.unsend_messages());
        assert!(pro.view_private_interactions());

        let free = EntitlementState::free();
        assert!(!free.unlimited_swipes());
        assert!(!free.read_receipts());
        assert!(!free.unsend_messages());
        assert!(!free.view_private_interactions());
    }
}
