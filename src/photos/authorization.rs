/// Library access authorization
///
/// The user is asked once; the answer is stored in the catalog. When access
/// is not granted the caller shows a [`SettingsAlert`] that offers to open
/// the settings screen.
use async_trait::async_trait;
use log::{info, warn};
use rfd::{AsyncMessageDialog, MessageButtons, MessageDialogResult, MessageLevel};
use std::sync::Arc;

use super::PhotoLibrary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    NotDetermined,
    /// Access is impossible regardless of the user's answer
    Restricted,
    Denied,
    Authorized,
    /// Access granted to part of the library
    Limited,
}

impl AuthorizationStatus {
    /// Whether this status lets the app browse the library
    pub fn is_authorized(self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Authorized | AuthorizationStatus::Limited
        )
    }
}

/// Asks the user whether the app may read the library
#[async_trait]
pub trait AccessPrompt: Send + Sync {
    async fn ask(&self) -> AuthorizationStatus;
}

/// Native yes/no dialog
#[derive(Debug, Default)]
pub struct DialogPrompt;

#[async_trait]
impl AccessPrompt for DialogPrompt {
    async fn ask(&self) -> AuthorizationStatus {
        let answer = AsyncMessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title("Photo Library Access")
            .set_description("Allow Album Grid to browse the photos and videos in your library?")
            .set_buttons(MessageButtons::YesNo)
            .show()
            .await;

        match answer {
            MessageDialogResult::Yes | MessageDialogResult::Ok => AuthorizationStatus::Authorized,
            _ => AuthorizationStatus::Denied,
        }
    }
}

/// Resolve library access, asking the user if they have never answered.
///
/// Returns true for full or limited access.
pub async fn request_authorization(
    library: Arc<dyn PhotoLibrary>,
    prompt: Arc<dyn AccessPrompt>,
) -> bool {
    let mut status = library.authorization_status();

    if status == AuthorizationStatus::NotDetermined {
        status = prompt.ask().await;
        info!("Library access answered: {:?}", status);
        if let Err(e) = library.record_authorization(status) {
            warn!("Could not store library access answer: {}", e);
        }
    }

    status.is_authorized()
}

/// Actions offered when access is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    Cancel,
    OpenSettings,
}

impl AlertAction {
    pub fn label(self) -> &'static str {
        match self {
            AlertAction::Cancel => "Cancel",
            AlertAction::OpenSettings => "Open Settings",
        }
    }
}

/// Alert shown when library access was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsAlert {
    pub title: String,
    pub message: String,
}

impl SettingsAlert {
    pub fn access_denied() -> Self {
        Self {
            title: "No access to your photo library".to_string(),
            message: "You can allow access under Settings > Library Access.".to_string(),
        }
    }

    pub fn actions(&self) -> [AlertAction; 2] {
        [AlertAction::Cancel, AlertAction::OpenSettings]
    }
}
