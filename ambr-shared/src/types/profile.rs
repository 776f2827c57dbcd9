use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A discoverable user profile as the collaborator returns it.
///
/// Owned and mutated only by its user; everyone else sees it read-only
/// through discovery and profile views. `private_photos` arrive empty unless
/// the viewer holds an access grant, and `distance_km` / `is_online` are
/// computed by the collaborator relative to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub age: i32,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub private_photos: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub tribe: Option<String>,
    #[serde(default)]
    pub looking_for: Option<String>,
    #[serde(default)]
    pub available_now: bool,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub distance_km: Option<f64>,
}

impl Profile {
    /// Minimal profile, handy as a test fixture base.
    pub fn bare(user_id: Uuid, username: impl Into<String>, age: i32) -> Self {
        Self {
            user_id,
            username: username.into(),
            age,
            bio: None,
            photos: Vec::new(),
            private_photos: Vec::new(),
            latitude: None,
            longitude: None,
            position: None,
            tribe: None,
            looking_for: None,
            available_now: false,
            is_online: false,
            distance_km: None,
        }
    }
}
