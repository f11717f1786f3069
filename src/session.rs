use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::error::ClientResult;
use crate::model::{CurrentUser, Role};
use crate::notify::{Navigation, NotifyHub};

/// The signed-in user and bearer token, shared by everything that issues requests.
///
/// Lifecycle: `init` hydrates from the persisted `currentUser` blob on start,
/// `set` stores a fresh sign-in, `clear` drops it on logout or 401.
pub struct Session {
    path: Option<PathBuf>,
    current: RwLock<Option<CurrentUser>>,
    hub: Arc<NotifyHub>,
}

impl Session {
    /// Session that never touches disk.
    pub fn in_memory(hub: Arc<NotifyHub>) -> Self {
        Self {
            path: None,
            current: RwLock::new(None),
            hub,
        }
    }

    /// Hydrate from `path`. A missing file means anonymous; a corrupt one is
    /// logged and treated as anonymous.
    pub fn init(path: Option<PathBuf>, hub: Arc<NotifyHub>) -> Self {
        let current = path.as_deref().and_then(load_user);
        if let Some(user) = &current {
            info!(user_id = user.id, "restored session for {}", user.email);
            hub.publish_profile(user.profile());
        }
        Self {
            path,
            current: RwLock::new(current),
            hub,
        }
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|u| u.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.read().as_ref().is_some_and(|u| u.role == role)
    }

    pub fn set(&self, user: CurrentUser) -> ClientResult<()> {
        if let Some(path) = &self.path {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, serde_json::to_vec(&user)?)?;
        }
        self.hub.publish_profile(user.profile());
        *self.write() = Some(user);
        Ok(())
    }

    /// Drop the user, remove the persisted blob and send listeners to sign-in.
    pub fn clear(&self) {
        let previous = self.write().take();
        if let Some(path) = &self.path
            && let Err(e) = std::fs::remove_file(path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("failed to remove session file {}: {e}", path.display());
        }
        if let Some(user) = previous {
            info!(user_id = user.id, "session cleared");
            metrics::counter!(crate::observability::SESSION_CLEARS_TOTAL).increment(1);
        }
        self.hub.navigate(Navigation::SignIn);
    }

    pub fn hub(&self) -> &Arc<NotifyHub> {
        &self.hub
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<CurrentUser>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<CurrentUser>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn load_user(path: &Path) -> Option<CurrentUser> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            debug!("no persisted session at {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("ignoring corrupt session file {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> CurrentUser {
        CurrentUser {
            id: 42,
            email: "ana@cowork.io".into(),
            name: Some("Ana".into()),
            phone: None,
            role: Role::Coworker,
            token: "tok-42".into(),
        }
    }

    #[test]
    fn init_without_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let hub = Arc::new(NotifyHub::new());
        let session = Session::init(Some(dir.path().join("missing.json")), hub);
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
    }

    #[test]
    fn set_persists_and_init_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("current_user.json");

        let session = Session::init(Some(path.clone()), Arc::new(NotifyHub::new()));
        session.set(user()).unwrap();
        assert!(path.exists());

        let hub = Arc::new(NotifyHub::new());
        let restored = Session::init(Some(path), hub.clone());
        assert_eq!(restored.current_user(), Some(user()));
        assert!(restored.has_role(Role::Coworker));
        assert_eq!(hub.latest_profile().unwrap().id, 42);
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_user.json");
        std::fs::write(&path, b"{not json").unwrap();

        let session = Session::init(Some(path), Arc::new(NotifyHub::new()));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn clear_removes_file_and_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_user.json");
        let hub = Arc::new(NotifyHub::new());
        let session = Session::init(Some(path.clone()), hub.clone());
        session.set(user()).unwrap();

        let mut nav = hub.subscribe_navigation();
        session.clear();

        assert!(!path.exists());
        assert!(!session.is_authenticated());
        assert_eq!(nav.recv().await.unwrap(), Navigation::SignIn);
    }
}
