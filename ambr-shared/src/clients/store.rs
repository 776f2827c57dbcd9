use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};
use crate::types::matching::DiscoveryFilters;

/// Everything the device remembers on its own: the per-device favorite set
/// (match ids, never synced) and the cached discovery filter preferences.
/// Explicit schema so it is clear none of this participates in match or
/// message consistency.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Prefs {
    #[serde(default)]
    favorites: HashSet<Uuid>,
    #[serde(default)]
    filters: Option<DiscoveryFilters>,
}

/// JSON-file preference store with atomic writes (temp file + rename).
pub struct PrefsStore {
    path: PathBuf,
    prefs: RwLock<Prefs>,
}

impl PrefsStore {
    /// Opens the store at `path`, starting fresh if the file is missing or
    /// unreadable (preferences are not worth failing a session over).
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let prefs = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "preference file unreadable, starting fresh");
                Prefs::default()
            }),
            Err(_) => Prefs::default(),
        };
        Self {
            path,
            prefs: RwLock::new(prefs),
        }
    }

    pub fn is_favorite(&self, match_id: Uuid) -> bool {
        self.prefs.read().favorites.contains(&match_id)
    }

    pub fn favorites(&self) -> HashSet<Uuid> {
        self.prefs.read().favorites.clone()
    }

    pub fn set_favorite(&self, match_id: Uuid, favorite: bool) -> CoreResult<()> {
        {
            let mut prefs = self.prefs.write();
            if favorite {
                prefs.favorites.insert(match_id);
            } else {
                prefs.favorites.remove(&match_id);
            }
        }
        self.save()
    }

    pub fn cached_filters(&self) -> Option<DiscoveryFilters> {
        self.prefs.read().filters.clone()
    }

    pub fn cache_filters(&self, filters: &DiscoveryFilters) -> CoreResult<()> {
        self.prefs.write().filters = Some(filters.clone());
        self.save()
    }

    fn save(&self) -> CoreResult<()> {
        let raw = {
            let prefs = self.prefs.read();
            serde_json::to_string_pretty(&*prefs).map_err(|e| CoreError::Storage(e.to_string()))?
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| CoreError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("ambr-prefs-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn favorites_survive_reopen() {
        let path = scratch_path();
        let match_id = Uuid::new_v4();

        let store = PrefsStore::open(&path);
        assert!(!store.is_favorite(match_id));
        store.set_favorite(match_id, true).unwrap();

        let reopened = PrefsStore::open(&path);
        assert!(reopened.is_favorite(match_id));

        reopened.set_favorite(match_id, false).unwrap();
        let reopened = PrefsStore::open(&path);
        assert!(!reopened.is_favorite(match_id));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn filter_preferences_round_trip() {
        let path = scratch_path();
        let store = PrefsStore::open(&path);
        assert!(store.cached_filters().is_none());

        let filters = DiscoveryFilters {
            online_only: true,
            min_age: Some(25),
            tribe: Some("otter".into()),
            ..Default::default()
        };
        store.cache_filters(&filters).unwrap();

        let reopened = PrefsStore::open(&path);
        assert_eq!(reopened.cached_filters(), Some(filters));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let path = scratch_path();
        fs::write(&path, "{not json").unwrap();

        let store = PrefsStore::open(&path);
        assert!(store.favorites().is_empty());

        let _ = fs::remove_file(&path);
    }
}
