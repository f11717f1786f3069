use tokio::sync::{broadcast, watch};

use crate::defaults::BROADCAST_CAPACITY;
use crate::model::UserProfile;

/// Where the user should be sent after an auth failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Session cleared (logout or 401).
    SignIn,
    /// Authenticated but not allowed (403).
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Pub/sub hub shared by the session, the HTTP backend and the engine.
///
/// Profile updates are last-value-only: a new subscriber sees the most
/// recent profile and every later one, intermediate values may be skipped.
/// Navigation and notices go to current subscribers only, at most once,
/// and are dropped when nobody listens.
pub struct NotifyHub {
    profile: watch::Sender<Option<UserProfile>>,
    navigation: broadcast::Sender<Navigation>,
    notices: broadcast::Sender<Notice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            profile: watch::channel(None).0,
            navigation: broadcast::channel(BROADCAST_CAPACITY).0,
            notices: broadcast::channel(BROADCAST_CAPACITY).0,
        }
    }

    pub fn subscribe_profile(&self) -> watch::Receiver<Option<UserProfile>> {
        self.profile.subscribe()
    }

    /// Replace the current profile. Works with or without listeners.
    pub fn publish_profile(&self, profile: UserProfile) {
        self.profile.send_replace(Some(profile));
    }

    pub fn latest_profile(&self) -> Option<UserProfile> {
        self.profile.borrow().clone()
    }

    pub fn subscribe_navigation(&self) -> broadcast::Receiver<Navigation> {
        self.navigation.subscribe()
    }

    pub fn navigate(&self, to: Navigation) {
        let _ = self.navigation.send(to);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.notices.send(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notice(NoticeLevel::Error, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notice(NoticeLevel::Success, message);
    }
}
