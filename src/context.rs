//! Session and settings passed explicitly to every workflow entry point.

use crate::error::GenerationError;
use crate::models::LanguageCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub language: LanguageCode,
    pub api_key: Option<String>,
}

/// Created at startup, updated on auth events, cleared on sign-out.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    session: Option<Session>,
    settings: Settings,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        AppContext {
            session: None,
            settings,
        }
    }

    /// Record a signed-in user. The display name falls back to the email's
    /// local part, then to `User`.
    pub fn sign_in(&mut self, user_id: &str, email: &str, full_name: Option<&str>) {
        let username = full_name
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());

        tracing::info!(user_id, "Session started");
        self.session = Some(Session {
            user_id: user_id.to_string(),
            email: email.to_string(),
            username,
        });
    }

    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(user_id = %session.user_id, "Session ended");
        }
        self.settings.api_key = None;
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.settings.api_key = api_key.filter(|k| !k.trim().is_empty());
    }

    pub fn set_language(&mut self, language: LanguageCode) {
        self.settings.language = language;
    }

    pub fn language(&self) -> LanguageCode {
        self.settings.language
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn require_credential(&self) -> Result<&str, GenerationError> {
        self.settings
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)
    }

    pub fn require_user(&self) -> Result<&Session, GenerationError> {
        self.session.as_ref().ok_or(GenerationError::NotSignedIn)
    }
}
