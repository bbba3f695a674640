use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{
    FACEBOOK_CLIENT_ID, FACEBOOK_CLIENT_SECRET, GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET,
    OKTA_CLIENT_ID, OKTA_CLIENT_SECRET, OKTA_ISSUER,
};
use super::errors::IdpError;
use crate::storage::CacheData;

/// Supported external identity providers.
///
/// Each variant carries its endpoint set and credentials; the exchange flow
/// is identical across providers apart from the profile field mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
    Okta,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Okta => "okta",
        }
    }

    pub(super) fn auth_url(&self) -> String {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            Self::Facebook => "https://www.facebook.com/v19.0/dialog/oauth".to_string(),
            Self::Okta => format!("{}/v1/authorize", OKTA_ISSUER.as_str()),
        }
    }

    pub(super) fn token_url(&self) -> String {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token".to_string(),
            Self::Facebook => "https://graph.facebook.com/v19.0/oauth/access_token".to_string(),
            Self::Okta => format!("{}/v1/token", OKTA_ISSUER.as_str()),
        }
    }

    pub(super) fn userinfo_url(&self) -> String {
        match self {
            Self::Google => "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            Self::Facebook => "https://graph.facebook.com/me?fields=id,name,email".to_string(),
            Self::Okta => format!("{}/v1/userinfo", OKTA_ISSUER.as_str()),
        }
    }

    pub(super) fn scope(&self) -> &'static str {
        match self {
            Self::Google => "openid profile email",
            Self::Facebook => "public_profile email",
            Self::Okta => "openid profile email",
        }
    }

    pub(super) fn client_id(&self) -> &'static str {
        match self {
            Self::Google => GOOGLE_CLIENT_ID.as_str(),
            Self::Facebook => FACEBOOK_CLIENT_ID.as_str(),
            Self::Okta => OKTA_CLIENT_ID.as_str(),
        }
    }

    pub(super) fn client_secret(&self) -> &'static str {
        match self {
            Self::Google => GOOGLE_CLIENT_SECRET.as_str(),
            Self::Facebook => FACEBOOK_CLIENT_SECRET.as_str(),
            Self::Okta => OKTA_CLIENT_SECRET.as_str(),
        }
    }

    /// Map a provider userinfo document to a profile.
    ///
    /// Google and Facebook identify the subject as `id`, OIDC providers as
    /// `sub`.
    pub(super) fn profile_from_userinfo(
        &self,
        userinfo: &serde_json::Value,
    ) -> Result<Profile, IdpError> {
        let subject_field = match self {
            Self::Google | Self::Facebook => "id",
            Self::Okta => "sub",
        };

        let provider_user_id = userinfo[subject_field]
            .as_str()
            .ok_or_else(|| IdpError::UserInfo(format!("Missing '{subject_field}' field")))?
            .to_string();

        let display_name = userinfo["name"]
            .as_str()
            .unwrap_or(provider_user_id.as_str())
            .to_string();

        Ok(Profile {
            provider: self.as_str().to_string(),
            provider_user_id,
            display_name,
            email: userinfo["email"].as_str().map(|s| s.to_string()),
        })
    }
}

impl std::str::FromStr for Provider {
    type Err = IdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            "okta" => Ok(Self::Okta),
            other => Err(IdpError::UnknownProvider(other.to_string())),
        }
    }
}

/// Verified identity returned by a provider after a successful exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub provider: String,
    pub provider_user_id: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// Query parameters returned by the provider's redirect
#[derive(Debug, Deserialize)]
pub struct AuthorizationArtifacts {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub(super) access_token: String,
}

/// State token cached between the authorization redirect and the callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct StoredStateToken {
    pub(super) provider: String,
    pub(super) expires_at: DateTime<Utc>,
}

impl From<StoredStateToken> for CacheData {
    fn from(data: StoredStateToken) -> Self {
        Self {
            value: serde_json::to_string(&data).expect("Failed to serialize StoredStateToken"),
        }
    }
}

impl TryFrom<CacheData> for StoredStateToken {
    type Error = IdpError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| IdpError::Storage(e.to_string()))
    }
}
