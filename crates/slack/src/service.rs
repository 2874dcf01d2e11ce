use std::sync::Arc;

use async_trait::async_trait;
use jukebot_core::{
    registry::normalize_artist, BannedArtistRegistry, CurrentTrack, PlaybackSession, SearchQuery,
    SessionSlot,
};
use tracing::{info, warn};

use crate::{
    commands::{
        parse_search_params, CommandEnvelope, CommandError, JukeboxCommandService, PlaybackControl,
    },
    messages::{self, MessagePoster},
};

/// Command handlers backed by the shared playback session and banned-artist registry.
pub struct JukeboxService {
    session: SessionSlot,
    registry: Arc<BannedArtistRegistry>,
    poster: Arc<dyn MessagePoster>,
    playlist_name: String,
}

impl JukeboxService {
    pub fn new(
        session: SessionSlot,
        registry: Arc<BannedArtistRegistry>,
        poster: Arc<dyn MessagePoster>,
        playlist_name: impl Into<String>,
    ) -> Self {
        Self { session, registry, poster, playlist_name: playlist_name.into() }
    }

    async fn reply(&self, envelope: &CommandEnvelope, text: &str) -> Result<(), CommandError> {
        self.poster.post_message(&envelope.channel_id, text).await.map_err(CommandError::from)
    }

    /// Posts on a failure path; the caller returns the original error either way.
    async fn notify(&self, envelope: &CommandEnvelope, text: &str) {
        if let Err(error) = self.reply(envelope, text).await {
            warn!(
                event_name = "egress.slack.post_failed",
                correlation_id = %envelope.correlation_id,
                error = %error,
                "failed to post failure reply"
            );
        }
    }

    async fn session(&self, envelope: &CommandEnvelope) -> Result<Arc<PlaybackSession>, CommandError> {
        match self.session.session() {
            Ok(session) => Ok(session),
            Err(error) => {
                self.notify(envelope, messages::NOT_AUTHENTICATED).await;
                Err(error.into())
            }
        }
    }
}

#[async_trait]
impl JukeboxCommandService for JukeboxService {
    async fn now_playing(&self, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        let session = self.session(envelope).await?;

        match session.api.current_track().await {
            Ok(Some(track)) => {
                self.reply(envelope, &messages::now_playing(&CurrentTrack::from(&track))).await
            }
            Ok(None) => self.reply(envelope, messages::NOTHING_PLAYING).await,
            Err(error) => {
                self.notify(envelope, messages::NOW_PLAYING_FAILED).await;
                Err(error.into())
            }
        }
    }

    async fn search(&self, text: &str, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        let params = match parse_search_params(text) {
            Ok(params) => params,
            Err(error) => {
                self.notify(envelope, &error.to_string()).await;
                return Err(error);
            }
        };
        let session = self.session(envelope).await?;

        let query = SearchQuery::new(params.artist.as_str(), params.track.as_str());
        let results = session.api.search_tracks(&query).await?;
        if results.is_empty() {
            info!(
                event_name = "command.search.no_results",
                correlation_id = %envelope.correlation_id,
                query = %query.query_string(),
                "search returned no tracks"
            );
            self.notify(envelope, &messages::no_search_results(&params.artist, &params.track))
                .await;
            return Err(CommandError::NoResults { artist: params.artist, track: params.track });
        }

        self.reply(envelope, &messages::search_results(&results)).await
    }

    async fn add_track(
        &self,
        track_id: &str,
        envelope: &CommandEnvelope,
    ) -> Result<(), CommandError> {
        let track_id = track_id.trim();
        if track_id.is_empty() {
            self.notify(envelope, messages::MISSING_TRACK_ID).await;
            return Err(CommandError::MissingTrackId);
        }
        let session = self.session(envelope).await?;

        let track = match session.api.track_details(track_id).await {
            Ok(track) => track,
            Err(source) => {
                self.notify(envelope, &messages::track_lookup_failed(track_id)).await;
                return Err(CommandError::TrackLookup { track_id: track_id.to_owned(), source });
            }
        };

        if let Some(banned) = self.registry.matching_ban(track.artists.iter().map(String::as_str)) {
            info!(
                event_name = "command.add.rejected_banned",
                correlation_id = %envelope.correlation_id,
                track_id,
                banned_artist = %banned,
                "track rejected by artist ban"
            );
            return self.reply(envelope, &messages::track_banned(track_id, &banned)).await;
        }

        let Ok(playlist) = session.target_playlist() else {
            self.notify(envelope, &messages::playlist_missing(&self.playlist_name)).await;
            return Err(CommandError::PlaylistNotFound(self.playlist_name.clone()));
        };

        match session.api.add_track_to_playlist(&playlist.id, track_id).await {
            Ok(()) => {
                info!(
                    event_name = "command.add.completed",
                    correlation_id = %envelope.correlation_id,
                    track_id,
                    playlist_id = %playlist.id,
                    "track added to playlist"
                );
                self.reply(envelope, messages::SONG_ADDED).await
            }
            Err(source) => {
                self.notify(envelope, &messages::add_failed(track_id)).await;
                Err(CommandError::AddTrack { track_id: track_id.to_owned(), source })
            }
        }
    }

    async fn ban_artist(
        &self,
        artist: &str,
        envelope: &CommandEnvelope,
    ) -> Result<(), CommandError> {
        let artist = normalize_artist(artist);
        if artist.is_empty() {
            self.notify(envelope, messages::MISSING_BAN_ARTIST).await;
            return Err(CommandError::MissingBanArtist);
        }
        let session = self.session(envelope).await?;

        let previous = self.registry.ban(&envelope.user_id, &artist);
        info!(
            event_name = "command.ban.recorded",
            correlation_id = %envelope.correlation_id,
            user_id = %envelope.user_id,
            artist = %artist,
            previous = previous.as_deref().unwrap_or("none"),
            "artist ban recorded"
        );

        let Ok(playlist) = session.target_playlist() else {
            self.notify(envelope, &messages::playlist_missing(&self.playlist_name)).await;
            return Err(CommandError::PlaylistNotFound(self.playlist_name.clone()));
        };

        let tracks = match session.api.playlist_tracks(&playlist.id).await {
            Ok(tracks) => tracks,
            Err(source) => {
                self.notify(envelope, &messages::removal_failed(&artist)).await;
                return Err(CommandError::RemoveTracks { artist, source });
            }
        };

        // Stops at the first failure; tracks already removed stay removed.
        for track in tracks.iter().filter(|track| track.has_artist_matching(&artist)) {
            if let Err(source) = session.api.remove_track_from_playlist(&playlist.id, &track.id).await
            {
                self.notify(envelope, &messages::removal_failed(&artist)).await;
                return Err(CommandError::RemoveTracks { artist, source });
            }
        }

        self.reply(envelope, &messages::artist_banned(&artist, previous.as_deref())).await
    }

    async fn playback(
        &self,
        control: PlaybackControl,
        _envelope: &CommandEnvelope,
    ) -> Result<(), CommandError> {
        let session = self.session.session()?;
        let api = &session.api;

        match control {
            PlaybackControl::Play => api.play().await?,
            PlaybackControl::Pause => api.pause().await?,
            PlaybackControl::Next => api.skip_next().await?,
            PlaybackControl::Previous => api.skip_previous().await?,
            PlaybackControl::Volume(percent) => api.set_volume(percent).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use jukebot_core::{
        BannedArtistRegistry, PlaybackApi, PlaybackDevice, PlaybackError, PlaybackSession,
        Playlist, SearchQuery, SessionSlot, TrackSummary, UserProfile,
    };

    use super::JukeboxService;
    use crate::{
        commands::{
            CommandEnvelope, CommandError, CommandOutcome, CommandRouter, JukeboxCommandService,
            PlaybackControl,
        },
        messages::{MessagePoster, PostError},
    };

    #[derive(Default)]
    struct RecordingPoster {
        posts: Mutex<Vec<(String, String)>>,
    }

    impl RecordingPoster {
        fn texts(&self) -> Vec<String> {
            self.posts.lock().expect("lock").iter().map(|(_, text)| text.clone()).collect()
        }
    }

    #[async_trait]
    impl MessagePoster for RecordingPoster {
        async fn post_message(&self, channel_id: &str, text: &str) -> Result<(), PostError> {
            self.posts.lock().expect("lock").push((channel_id.to_owned(), text.to_owned()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedApi {
        calls: Mutex<Vec<String>>,
        current: Option<TrackSummary>,
        fail_current: bool,
        search_results: Vec<TrackSummary>,
        details: Option<TrackSummary>,
        playlist: Vec<TrackSummary>,
        fail_removal_of: Option<String>,
    }

    impl ScriptedApi {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().expect("lock").push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl PlaybackApi for ScriptedApi {
        async fn play(&self) -> Result<(), PlaybackError> {
            self.record("play");
            Ok(())
        }

        async fn pause(&self) -> Result<(), PlaybackError> {
            self.record("pause");
            Err(PlaybackError::Status { status: 404, message: "No active device found".to_owned() })
        }

        async fn skip_next(&self) -> Result<(), PlaybackError> {
            self.record("next");
            Ok(())
        }

        async fn skip_previous(&self) -> Result<(), PlaybackError> {
            self.record("previous");
            Ok(())
        }

        async fn set_volume(&self, percent: u8) -> Result<(), PlaybackError> {
            self.record(format!("volume:{percent}"));
            Ok(())
        }

        async fn current_track(&self) -> Result<Option<TrackSummary>, PlaybackError> {
            self.record("current_track");
            if self.fail_current {
                return Err(PlaybackError::Transport("connection reset".to_owned()));
            }
            Ok(self.current.clone())
        }

        async fn playback_device(&self) -> Result<Option<PlaybackDevice>, PlaybackError> {
            Ok(None)
        }

        async fn search_tracks(
            &self,
            query: &SearchQuery,
        ) -> Result<Vec<TrackSummary>, PlaybackError> {
            self.record(format!("search:{}", query.query_string()));
            Ok(self.search_results.clone())
        }

        async fn track_details(&self, track_id: &str) -> Result<TrackSummary, PlaybackError> {
            self.record(format!("details:{track_id}"));
            self.details.clone().ok_or(PlaybackError::Status {
                status: 400,
                message: "invalid id".to_owned(),
            })
        }

        async fn add_track_to_playlist(
            &self,
            playlist_id: &str,
            track_id: &str,
        ) -> Result<(), PlaybackError> {
            self.record(format!("add:{playlist_id}:{track_id}"));
            Ok(())
        }

        async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackSummary>, PlaybackError> {
            self.record(format!("tracks:{playlist_id}"));
            Ok(self.playlist.clone())
        }

        async fn remove_track_from_playlist(
            &self,
            playlist_id: &str,
            track_id: &str,
        ) -> Result<(), PlaybackError> {
            self.record(format!("remove:{playlist_id}:{track_id}"));
            if self.fail_removal_of.as_deref() == Some(track_id) {
                return Err(PlaybackError::Status { status: 500, message: "boom".to_owned() });
            }
            Ok(())
        }

        async fn current_user(&self) -> Result<UserProfile, PlaybackError> {
            Ok(UserProfile { id: "dj".to_owned(), display_name: None })
        }

        async fn user_playlists(&self, _user_id: &str) -> Result<Vec<Playlist>, PlaybackError> {
            Ok(Vec::new())
        }
    }

    fn track(id: &str, name: &str, artists: &[&str], album: &str) -> TrackSummary {
        TrackSummary {
            id: id.to_owned(),
            name: name.to_owned(),
            artists: artists.iter().map(|artist| (*artist).to_owned()).collect(),
            album: album.to_owned(),
        }
    }

    fn envelope(text: &str) -> CommandEnvelope {
        CommandEnvelope {
            channel_id: "C1".to_owned(),
            user_id: "U123".to_owned(),
            text: text.to_owned(),
            correlation_id: "env-1".to_owned(),
        }
    }

    struct Harness {
        api: Arc<ScriptedApi>,
        poster: Arc<RecordingPoster>,
        registry: Arc<BannedArtistRegistry>,
        service: JukeboxService,
    }

    fn harness_with_playlist(api: ScriptedApi, playlist: Option<Playlist>) -> Harness {
        let api = Arc::new(api);
        let poster = Arc::new(RecordingPoster::default());
        let registry = Arc::new(BannedArtistRegistry::new());
        let slot = SessionSlot::new();
        slot.fill(PlaybackSession {
            api: api.clone(),
            user: UserProfile { id: "dj".to_owned(), display_name: None },
            playlist,
            playlist_name: "Office Jams".to_owned(),
        })
        .expect("fill");

        let service = JukeboxService::new(slot, registry.clone(), poster.clone(), "Office Jams");
        Harness { api, poster, registry, service }
    }

    fn harness(api: ScriptedApi) -> Harness {
        let playlist = Playlist { id: "p1".to_owned(), name: "Office Jams".to_owned() };
        harness_with_playlist(api, Some(playlist))
    }

    #[tokio::test]
    async fn now_playing_posts_first_artist_in_fixed_order() {
        let h = harness(ScriptedApi {
            current: Some(track("t1", "Ultralight Beam", &["Kanye West", "Chance"], "TLOP")),
            ..Default::default()
        });

        h.service.now_playing(&envelope("now playing")).await.expect("now playing");

        assert_eq!(h.poster.texts(), vec!["Artist: Kanye West\nTrack: Ultralight Beam\nAlbum: TLOP"]);
    }

    #[tokio::test]
    async fn now_playing_reports_failure_and_idle_player() {
        let failing = harness(ScriptedApi { fail_current: true, ..Default::default() });
        let error = failing.service.now_playing(&envelope("now playing")).await.expect_err("fails");
        assert!(matches!(error, CommandError::Playback(PlaybackError::Transport(_))));
        assert_eq!(failing.poster.texts(), vec!["Unable to get currently playing track."]);

        let idle = harness(ScriptedApi::default());
        idle.service.now_playing(&envelope("now playing")).await.expect("idle is fine");
        assert_eq!(idle.poster.texts(), vec!["Nothing is currently playing."]);
    }

    #[tokio::test]
    async fn search_without_required_key_never_calls_transport() {
        for text in ["search Track: Elephant", "search Artist: Tame Impala", "search"] {
            let h = harness(ScriptedApi::default());

            let error = h.service.search(text, &envelope(text)).await.expect_err("usage error");

            assert!(matches!(error, CommandError::MissingSearchParameter(_)));
            let texts = h.poster.texts();
            assert_eq!(texts.len(), 1);
            assert_eq!(texts[0], error.to_string());
            assert!(texts[0].contains("`@bot search Artist: Someone, Track: Some Track`"));
            assert!(h.api.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn search_builds_lowercased_query_and_reports_no_results() {
        let h = harness(ScriptedApi::default());
        let text = "search Artist: Tame Impala, Track: Elephant";

        let error = h.service.search(text, &envelope(text)).await.expect_err("no results");

        assert_eq!(h.api.calls(), vec!["search:artist:tame impala track:elephant"]);
        assert_eq!(h.poster.texts(), vec!["No results found for Artist: tame impala and Track: elephant"]);
        assert_eq!(
            error,
            CommandError::NoResults { artist: "tame impala".to_owned(), track: "elephant".to_owned() }
        );
    }

    #[tokio::test]
    async fn search_posts_all_matches_in_one_message() {
        let h = harness(ScriptedApi {
            search_results: vec![
                track("t1", "Elephant", &["Tame Impala"], "Lonerism"),
                track("t2", "Elephant (Live)", &["Tame Impala"], "Live"),
            ],
            ..Default::default()
        });
        let text = "search Artist: Tame Impala, Track: Elephant";

        h.service.search(text, &envelope(text)).await.expect("search");

        let texts = h.poster.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].find("Track ID: t1").expect("t1") < texts[0].find("Track ID: t2").expect("t2"));
    }

    #[tokio::test]
    async fn add_track_rejects_banned_artist_without_adding() {
        let h = harness(ScriptedApi {
            details: Some(track("t9", "One Dance", &["Wizkid", "DRAKE"], "Views")),
            ..Default::default()
        });
        h.registry.ban("U123", "drake");

        h.service.add_track("t9", &envelope("add t9")).await.expect("rejection is not an error");

        assert_eq!(h.api.calls(), vec!["details:t9"]);
        assert_eq!(h.poster.texts(), vec!["Unable to add TrackID: t9 as artist drake has been banned"]);
    }

    #[tokio::test]
    async fn add_track_checks_bans_from_every_user() {
        let h = harness(ScriptedApi {
            details: Some(track("t9", "Photograph", &["Nickelback"], "All the Right Reasons")),
            ..Default::default()
        });
        h.registry.ban("U999", "nickelback");

        h.service.add_track("t9", &envelope("add t9")).await.expect("rejected");
        assert!(!h.api.calls().iter().any(|call| call.starts_with("add:")));
    }

    #[tokio::test]
    async fn add_track_adds_to_target_playlist() {
        let h = harness(ScriptedApi {
            details: Some(track("t3", "Elephant", &["Tame Impala"], "Lonerism")),
            ..Default::default()
        });

        h.service.add_track(" t3 ", &envelope("add t3")).await.expect("added");

        assert_eq!(h.api.calls(), vec!["details:t3", "add:p1:t3"]);
        assert_eq!(h.poster.texts(), vec!["Song successfully added"]);
    }

    #[tokio::test]
    async fn add_track_reports_unknown_track_and_missing_playlist() {
        let unknown = harness(ScriptedApi::default());
        let error = unknown.service.add_track("nope", &envelope("add nope")).await.expect_err("lookup");
        assert!(matches!(error, CommandError::TrackLookup { .. }));
        assert_eq!(unknown.poster.texts(), vec!["Unable to get track details for TrackID: nope"]);

        let orphan = harness_with_playlist(
            ScriptedApi { details: Some(track("t3", "E", &["Tame Impala"], "L")), ..Default::default() },
            None,
        );
        let error = orphan.service.add_track("t3", &envelope("add t3")).await.expect_err("playlist");
        assert_eq!(error, CommandError::PlaylistNotFound("Office Jams".to_owned()));
        assert_eq!(
            orphan.poster.texts(),
            vec!["Unable to find playlist Office Jams for the authenticated user"]
        );

        let empty = harness(ScriptedApi::default());
        assert_eq!(
            empty.service.add_track("  ", &envelope("add")).await,
            Err(CommandError::MissingTrackId)
        );
        assert_eq!(empty.poster.texts(), vec!["Missing TrackID in add command"]);
    }

    #[tokio::test]
    async fn ban_overwrites_previous_and_removes_matching_tracks() {
        let h = harness(ScriptedApi {
            playlist: vec![
                track("t1", "Hotline Bling", &["Drake"], "Views"),
                track("t2", "Stronger", &["Kanye West"], "Graduation"),
                track("t3", "Elephant", &["Tame Impala"], "Lonerism"),
            ],
            ..Default::default()
        });

        h.service.ban_artist("drake", &envelope("ban drake")).await.expect("first ban");
        h.service.ban_artist("kanye", &envelope("ban kanye")).await.expect("second ban");

        let bans: Vec<_> = h.registry.snapshot().into_iter().collect();
        assert_eq!(bans, vec![("U123".to_owned(), "kanye".to_owned())]);
        assert_eq!(
            h.poster.texts(),
            vec![
                "Artist drake banned and all tracks removed from playlist",
                "Artist kanye banned to overwrite artist drake and all tracks removed from playlist",
            ]
        );
        assert_eq!(
            h.api.calls(),
            vec!["tracks:p1", "remove:p1:t1", "tracks:p1", "remove:p1:t2"]
        );
    }

    #[tokio::test]
    async fn ban_stops_at_first_removal_failure() {
        let h = harness(ScriptedApi {
            playlist: vec![
                track("t1", "God's Plan", &["Drake"], "Scorpion"),
                track("t2", "One Dance", &["Drake"], "Views"),
            ],
            fail_removal_of: Some("t1".to_owned()),
            ..Default::default()
        });

        let error = h.service.ban_artist("Drake", &envelope("ban Drake")).await.expect_err("fails");

        assert!(matches!(error, CommandError::RemoveTracks { ref artist, .. } if artist == "drake"));
        assert_eq!(h.api.calls(), vec!["tracks:p1", "remove:p1:t1"]);
        assert_eq!(h.poster.texts(), vec!["Unable to remove tracks by artist drake from playlist"]);
        assert_eq!(h.registry.snapshot().get("U123").map(String::as_str), Some("drake"));
    }

    #[tokio::test]
    async fn empty_ban_leaves_registry_untouched() {
        let h = harness(ScriptedApi::default());

        assert_eq!(
            h.service.ban_artist("   ", &envelope("ban")).await,
            Err(CommandError::MissingBanArtist)
        );
        assert!(h.registry.is_empty());
        assert_eq!(h.poster.texts(), vec!["Missing artist name in ban command"]);
    }

    #[tokio::test]
    async fn commands_before_login_fail_with_not_authenticated() {
        let poster = Arc::new(RecordingPoster::default());
        let registry = Arc::new(BannedArtistRegistry::new());
        let service =
            JukeboxService::new(SessionSlot::new(), registry.clone(), poster.clone(), "Office Jams");

        assert_eq!(
            service.now_playing(&envelope("now playing")).await,
            Err(CommandError::NotAuthenticated)
        );
        assert_eq!(
            service.ban_artist("drake", &envelope("ban drake")).await,
            Err(CommandError::NotAuthenticated)
        );
        assert_eq!(
            service.playback(PlaybackControl::Play, &envelope("play")).await,
            Err(CommandError::NotAuthenticated)
        );

        assert!(registry.is_empty());
        assert_eq!(
            poster.texts(),
            vec![
                "Spotify login has not completed yet. Try again shortly.",
                "Spotify login has not completed yet. Try again shortly.",
            ]
        );
    }

    #[tokio::test]
    async fn playback_controls_are_logged_not_posted() {
        let h = harness(ScriptedApi::default());
        let api = h.api.clone();
        let poster = h.poster.clone();
        let router = CommandRouter::new(h.service);

        for text in ["play", "pause", "next", "previous", "volume 25", "frobnicate"] {
            let outcome = router.route(envelope(text)).await.expect("controls never fail");
            let expected =
                if text == "frobnicate" { CommandOutcome::Ignored } else { CommandOutcome::Handled };
            assert_eq!(outcome, expected);
        }

        assert_eq!(api.calls(), vec!["play", "pause", "next", "previous", "volume:25"]);
        assert!(poster.texts().is_empty());
    }
}
