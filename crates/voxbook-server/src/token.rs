//! LiveKit join token issuance.

use crate::config::LiveKitConfig;
use livekit_api::access_token::{AccessToken, VideoGrants};
use std::time::Duration;
use thiserror::Error;
use voxbook_types::{Credential, TokenResponse};

/// Prefix of every generated room name.
pub const ROOM_PREFIX: &str = "voice-booking-session-";
/// Prefix of every generated participant identity.
pub const IDENTITY_PREFIX: &str = "user-";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("LIVEKIT_API_KEY/SECRET not set")]
    NotConfigured,

    #[error("LiveKit API error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),
}

#[derive(Debug)]
pub struct TokenIssuer {
    config: LiveKitConfig,
}

impl TokenIssuer {
    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty() && !self.config.api_secret.is_empty()
    }

    /// Issues a token for a fresh room and participant.
    ///
    /// Every call gets its own room so a new call never lands in a stale
    /// session.
    pub fn issue(&self) -> Result<TokenResponse, TokenError> {
        let room = format!("{}{}", ROOM_PREFIX, random_hex(8));
        let identity = format!("{}{}", IDENTITY_PREFIX, random_hex(4));
        let token = self.generate_join_token(&room, &identity, &identity)?;

        tracing::info!(room = %room, identity = %identity, "issued join token");

        Ok(TokenResponse {
            token: Credential::new(token),
            room: Some(room),
            identity: Some(identity),
            url: (!self.config.url.is_empty()).then(|| self.config.url.clone()),
        })
    }

    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, TokenError> {
        if !self.is_enabled() {
            return Err(TokenError::NotConfigured);
        }

        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        Ok(token.to_jwt()?)
    }
}

fn random_hex(len: usize) -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_without_credentials_fails() {
        let issuer = TokenIssuer::new(LiveKitConfig::default());
        assert!(matches!(issuer.issue(), Err(TokenError::NotConfigured)));
        assert_eq!(
            TokenError::NotConfigured.to_string(),
            "LIVEKIT_API_KEY/SECRET not set"
        );
    }

    #[test]
    fn issued_rooms_are_fresh() {
        let issuer = TokenIssuer::new(LiveKitConfig::new("", "devkey", "devsecret"));
        let first = issuer.issue().unwrap();
        let second = issuer.issue().unwrap();

        let room = first.room.clone().unwrap();
        assert!(room.starts_with(ROOM_PREFIX));
        assert_eq!(room.len(), ROOM_PREFIX.len() + 8);
        assert!(first.identity.unwrap().starts_with(IDENTITY_PREFIX));
        assert_ne!(first.room, second.room);
        assert!(first.url.is_none());
    }
}
