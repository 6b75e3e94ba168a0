use crate::models::Identity;
use crate::storage::{clear_session_storage, load_session_from_storage, save_token_to_storage, save_user_to_storage};
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Session {
    pub token: Option<String>,
    pub user: Option<Identity>,
}

/// Process-wide auth session, passed by handle to whoever needs it.
///
/// Writes happen only on login (`sign_in`/`set_user`) and on logout or a
/// 401 response (`clear`). When `persistent`, every write is mirrored to
/// localStorage so a reload keeps the user signed in.
#[derive(Clone, Debug, Default)]
pub(crate) struct SessionStore {
    inner: Arc<RwLock<Session>>,
    persistent: bool,
}

impl SessionStore {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistent() -> Self {
        let (token, user) = load_session_from_storage();
        Self {
            inner: Arc::new(RwLock::new(Session { token, user })),
            persistent: true,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().ok().and_then(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<Identity> {
        self.inner.read().ok().and_then(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn sign_in(&self, token: String) {
        if token.trim().is_empty() {
            return;
        }
        if let Ok(mut s) = self.inner.write() {
            s.token = Some(token.clone());
            s.user = None;
        }
        if self.persistent {
            save_token_to_storage(&token);
        }
    }

    pub fn set_user(&self, user: Identity) {
        if self.persistent {
            save_user_to_storage(&user);
        }
        if let Ok(mut s) = self.inner.write() {
            s.user = Some(user);
        }
    }

    /// Drop token and identity. Returns whether a token was present.
    pub fn clear(&self) -> bool {
        let had_token = match self.inner.write() {
            Ok(mut s) => {
                let had = s.token.is_some();
                *s = Session::default();
                had
            }
            Err(_) => false,
        };
        if self.persistent {
            clear_session_storage();
        }
        if had_token {
            tracing::info!("session cleared");
        }
        had_token
    }

    /// Whether two handles share the same underlying session.
    #[cfg(test)]
    pub fn same_as(&self, other: &SessionStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
