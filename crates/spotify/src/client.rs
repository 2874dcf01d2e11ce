use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jukebot_core::{
    PlaybackApi, PlaybackDevice, PlaybackError, Playlist, SearchQuery, TrackSummary, UserProfile,
};
use reqwest::{header::CONTENT_LENGTH, Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::model::{
    track_uri, AddTracksRequest, CurrentlyPlaying, ErrorEnvelope, Paging, PlayerState,
    PlaylistObject, PlaylistTrackItem, RemoveTracksRequest, SearchResponse, TrackObject, TrackUri,
    UserObject,
};
use crate::oauth::{AccessToken, AuthorizationRequest, OAuthError};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Authenticated Spotify Web API handle. Clones share one access token.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<AccessToken>>,
    refresher: Option<Arc<AuthorizationRequest>>,
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl SpotifyClient {
    pub fn new(http: Client, token: &AccessToken) -> Self {
        Self {
            http,
            base_url: API_BASE_URL.to_string(),
            token: Arc::new(RwLock::new(token.clone())),
            refresher: None,
        }
    }

    /// Lets the client renew its token with the client credentials that
    /// obtained it.
    pub fn with_refresh(mut self, authorization: AuthorizationRequest) -> Self {
        self.refresher = Some(Arc::new(authorization));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PlaybackError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| PlaybackError::InvalidRequest(format!("bad base url: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| PlaybackError::InvalidRequest("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, PlaybackError> {
        let url = self.endpoint(segments)?;
        Ok(self.http.request(method, url))
    }

    async fn bearer(&self) -> SecretString {
        let current = self.token.read().await.clone();
        if self.refresher.is_none() || !current.expires_within(REFRESH_MARGIN) {
            return current.access_token;
        }

        match self.refresh(&current.access_token).await {
            Ok(fresh) => fresh,
            Err(error) => {
                warn!(
                    event_name = "spotify.token.refresh_failed",
                    error = %error,
                    "token refresh before expiry failed; using current token"
                );
                current.access_token
            }
        }
    }

    /// Swaps `stale` for a fresh token. A request that lost the race gets the
    /// token another request already fetched.
    async fn refresh(&self, stale: &SecretString) -> Result<SecretString, OAuthError> {
        let authorization = self
            .refresher
            .as_ref()
            .ok_or_else(|| OAuthError::RefreshUnavailable("no client credentials".to_string()))?;

        let mut current = self.token.write().await;
        if current.access_token.expose_secret() != stale.expose_secret() {
            return Ok(current.access_token.clone());
        }
        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            OAuthError::RefreshUnavailable("no refresh token was issued".to_string())
        })?;

        let fresh = authorization.refresh(&self.http, &refresh_token).await?;
        info!(
            event_name = "spotify.token.refreshed",
            expires_in = ?fresh.expires_in,
            "spotify access token refreshed"
        );
        *current = fresh;
        Ok(current.access_token.clone())
    }

    async fn dispatch(
        &self,
        request: RequestBuilder,
        token: &SecretString,
    ) -> Result<Response, PlaybackError> {
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|error| PlaybackError::Transport(error.to_string()))?;
        debug!(status = %response.status(), url = %response.url(), "spotify api responded");
        Ok(response)
    }

    /// Sends with the current token. A 401 triggers one refresh and retry.
    async fn send(&self, request: RequestBuilder) -> Result<Response, PlaybackError> {
        let retry = request.try_clone();
        let token = self.bearer().await;
        let response = self.dispatch(request, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED || self.refresher.is_none() {
            return Self::check(response).await;
        }
        let Some(retry) = retry else {
            return Self::check(response).await;
        };

        match self.refresh(&token).await {
            Ok(fresh) => Self::check(self.dispatch(retry, &fresh).await?).await,
            Err(error) => {
                warn!(
                    event_name = "spotify.token.refresh_failed",
                    error = %error,
                    "token refresh after rejection failed"
                );
                Err(PlaybackError::Unauthorized)
            }
        }
    }

    async fn check(response: Response) -> Result<Response, PlaybackError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(PlaybackError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or(body);
        Err(PlaybackError::Status { status: status.as_u16(), message })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PlaybackError> {
        response.json::<T>().await.map_err(|error| PlaybackError::Decode(error.to_string()))
    }

    async fn transport_command(&self, method: Method, action: &str) -> Result<(), PlaybackError> {
        let request = self.request(method, &["me", "player", action])?.header(CONTENT_LENGTH, 0);
        self.send(request).await.map(|_| ())
    }
}

#[async_trait]
impl PlaybackApi for SpotifyClient {
    async fn play(&self) -> Result<(), PlaybackError> {
        self.transport_command(Method::PUT, "play").await
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.transport_command(Method::PUT, "pause").await
    }

    async fn skip_next(&self) -> Result<(), PlaybackError> {
        self.transport_command(Method::POST, "next").await
    }

    async fn skip_previous(&self) -> Result<(), PlaybackError> {
        self.transport_command(Method::POST, "previous").await
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PlaybackError> {
        if percent > 100 {
            return Err(PlaybackError::InvalidRequest(format!(
                "volume must be in range 0..=100, got {percent}"
            )));
        }
        let request = self
            .request(Method::PUT, &["me", "player", "volume"])?
            .query(&[("volume_percent", percent)])
            .header(CONTENT_LENGTH, 0);
        self.send(request).await.map(|_| ())
    }

    async fn current_track(&self) -> Result<Option<TrackSummary>, PlaybackError> {
        let request = self.request(Method::GET, &["me", "player", "currently-playing"])?;
        let response = self.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let playing: CurrentlyPlaying = Self::decode(response).await?;
        Ok(playing.item.and_then(TrackObject::into_summary))
    }

    async fn playback_device(&self) -> Result<Option<PlaybackDevice>, PlaybackError> {
        let response = self.send(self.request(Method::GET, &["me", "player"])?).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let state: PlayerState = Self::decode(response).await?;
        Ok(state.device.map(PlaybackDevice::from))
    }

    async fn search_tracks(&self, query: &SearchQuery) -> Result<Vec<TrackSummary>, PlaybackError> {
        let request = self
            .request(Method::GET, &["search"])?
            .query(&[("q", query.query_string().as_str()), ("type", "track")]);
        let response: SearchResponse = Self::decode(self.send(request).await?).await?;

        Ok(response
            .tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(TrackObject::into_summary)
            .collect())
    }

    async fn track_details(&self, track_id: &str) -> Result<TrackSummary, PlaybackError> {
        let request = self.request(Method::GET, &["tracks", track_id])?;
        let track: TrackObject = Self::decode(self.send(request).await?).await?;
        track
            .into_summary()
            .ok_or_else(|| PlaybackError::Decode(format!("track `{track_id}` has no id")))
    }

    async fn add_track_to_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), PlaybackError> {
        let request = self
            .request(Method::POST, &["playlists", playlist_id, "tracks"])?
            .json(&AddTracksRequest { uris: vec![track_uri(track_id)] });
        self.send(request).await.map(|_| ())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<TrackSummary>, PlaybackError> {
        let request = self.request(Method::GET, &["playlists", playlist_id, "tracks"])?;
        let page: Paging<PlaylistTrackItem> = Self::decode(self.send(request).await?).await?;

        Ok(page.items.into_iter().filter_map(|item| item.track?.into_summary()).collect())
    }

    async fn remove_track_from_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), PlaybackError> {
        let request = self
            .request(Method::DELETE, &["playlists", playlist_id, "tracks"])?
            .json(&RemoveTracksRequest { tracks: vec![TrackUri { uri: track_uri(track_id) }] });
        self.send(request).await.map(|_| ())
    }

    async fn current_user(&self) -> Result<UserProfile, PlaybackError> {
        let response = self.send(self.request(Method::GET, &["me"])?).await?;
        let user: UserObject = Self::decode(response).await?;
        Ok(user.into())
    }

    async fn user_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, PlaybackError> {
        let request = self.request(Method::GET, &["users", user_id, "playlists"])?;
        let page: Paging<PlaylistObject> = Self::decode(self.send(request).await?).await?;
        Ok(page.items.into_iter().map(Playlist::from).collect())
    }
}
