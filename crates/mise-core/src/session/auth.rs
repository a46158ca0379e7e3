use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::PageSession;

/// Holder of the bearer credential.
///
/// Where the token is persisted is up to the front end. The core only reads
/// it and listens for the session ending.
#[derive(Debug)]
pub struct AuthSession {
    token: RwLock<Option<String>>,
    ended: watch::Sender<bool>,
}

impl AuthSession {
    pub fn new(token: Option<String>) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            token: RwLock::new(token),
            ended,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        self.ended.send_replace(false);
    }

    /// Drop the credential and tell every subscriber the session is over.
    pub fn end(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.ended.send_replace(true);
        tracing::info!("auth session ended");
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }
}

/// Close `session` once `auth` ends. Must be called inside a tokio runtime.
pub fn close_on_session_end(session: Arc<PageSession>, auth: &AuthSession) -> JoinHandle<()> {
    let mut ended = auth.subscribe();
    tokio::spawn(async move {
        // A dropped sender also means nobody can authenticate this session.
        let _ = ended.wait_for(|ended| *ended).await;
        session.close();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_end() {
        let auth = AuthSession::new(None);
        assert!(!auth.is_authenticated());
        auth.set_token("abc".into());
        assert_eq!(auth.token().as_deref(), Some("abc"));

        let rx = auth.subscribe();
        auth.end();
        assert!(*rx.borrow());
        assert!(auth.token().is_none());
    }
}
