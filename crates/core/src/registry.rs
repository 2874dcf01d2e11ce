use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Process-lifetime map from chat user id to that user's single banned artist.
///
/// Values are stored trimmed and lowercased. A new ban for the same user
/// replaces the old one.
#[derive(Debug, Default)]
pub struct BannedArtistRegistry {
    bans: Mutex<HashMap<String, String>>,
}

impl BannedArtistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `artist` for `user_id` and returns the ban it replaced, if any.
    pub fn ban(&self, user_id: &str, artist: &str) -> Option<String> {
        let artist = normalize_artist(artist);
        self.lock().insert(user_id.to_owned(), artist)
    }

    /// First banned name (in sorted order) contained in any of `artist_names`.
    pub fn matching_ban<'a, I>(&self, artist_names: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names = artist_names.into_iter().map(str::to_lowercase).collect::<Vec<_>>();
        let mut banned = self.lock().values().cloned().collect::<Vec<_>>();
        banned.sort();
        banned.dedup();

        banned.into_iter().find(|ban| names.iter().any(|name| name.contains(ban.as_str())))
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock().iter().map(|(user, artist)| (user.clone(), artist.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds consistent string pairs.
        self.bans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn normalize_artist(artist: &str) -> String {
    artist.trim().to_lowercase()
}
