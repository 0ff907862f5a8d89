use serde::{Deserialize, Serialize};

use crate::error::{GateError, StoreError};
use crate::models::UserId;
use crate::storage::{save_json, KeyValueStore, AUTH_KEY};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub logged_in: bool,
    pub email: Option<String>,
}

/// Decides who a login attempt belongs to.
pub trait AuthPolicy {
    fn authenticate(&self) -> Result<UserId, GateError>;
}

/// Accepts every login and hands out one configured student identity.
#[derive(Debug, Clone)]
pub struct StubPolicy {
    email: String,
}

impl StubPolicy {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

impl AuthPolicy for StubPolicy {
    fn authenticate(&self) -> Result<UserId, GateError> {
        Ok(self.email.clone())
    }
}

/// Proof that a user is logged in. Mutating commands require one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user_id: UserId,
}

impl SessionContext {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

pub struct SessionStore<S: KeyValueStore> {
    storage: S,
    policy: Box<dyn AuthPolicy>,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(storage: S, policy: Box<dyn AuthPolicy>) -> Self {
        Self { storage, policy }
    }

    pub fn state(&self) -> Result<AuthState, StoreError> {
        match self.storage.get(AUTH_KEY)? {
            None => Ok(AuthState::default()),
            Some(raw) => {
                let state: Option<AuthState> =
                    serde_json::from_str(&raw).map_err(|e| StoreError::CorruptState {
                        key: AUTH_KEY.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(state.unwrap_or_default())
            }
        }
    }

    pub fn login(&mut self) -> Result<SessionContext, GateError> {
        let user_id = self.policy.authenticate()?;
        self.write(&AuthState {
            logged_in: true,
            email: Some(user_id.clone()),
        })?;
        tracing::info!(user = %user_id, "logged in");
        Ok(SessionContext { user_id })
    }

    pub fn logout(&mut self) -> Result<(), StoreError> {
        self.write(&AuthState::default())?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Logs out when a session is active, logs in otherwise.
    pub fn toggle(&mut self) -> Result<AuthState, GateError> {
        if self.state()?.logged_in {
            self.logout()?;
        } else {
            self.login()?;
        }
        Ok(self.state()?)
    }

    pub fn context(&self) -> Result<SessionContext, GateError> {
        match self.state()? {
            AuthState {
                logged_in: true,
                email: Some(user_id),
            } => Ok(SessionContext { user_id }),
            _ => Err(GateError::Unauthenticated),
        }
    }

    fn write(&mut self, state: &AuthState) -> Result<(), StoreError> {
        save_json(&mut self.storage, AUTH_KEY, state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn sessions() -> SessionStore<MemoryStore> {
        SessionStore::new(MemoryStore::new(), Box::new(StubPolicy::new("s@student.letovo.ru")))
    }

    #[test]
    fn starts_logged_out() {
        let store = sessions();
        assert_eq!(store.state().unwrap(), AuthState::default());
        assert!(matches!(store.context(), Err(GateError::Unauthenticated)));
    }

    #[test]
    fn toggle_flips_between_states() {
        let mut store = sessions();
        let state = store.toggle().unwrap();
        assert!(state.logged_in);
        assert_eq!(store.context().unwrap().user_id(), "s@student.letovo.ru");

        let state = store.toggle().unwrap();
        assert!(!state.logged_in);
        assert_eq!(state.email, None);
        assert!(store.context().is_err());
    }

    #[test]
    fn reads_the_null_blob_as_logged_out() {
        let mut storage = MemoryStore::new();
        storage.set(AUTH_KEY, "null").unwrap();
        let store = SessionStore::new(storage, Box::new(StubPolicy::new("x")));
        assert!(!store.state().unwrap().logged_in);
    }

    struct DenyAll;

    impl AuthPolicy for DenyAll {
        fn authenticate(&self) -> Result<UserId, GateError> {
            Err(GateError::Unauthenticated)
        }
    }

    #[test]
    fn policy_can_refuse_logins() {
        let mut store = SessionStore::new(MemoryStore::new(), Box::new(DenyAll));
        assert!(store.login().is_err());
        assert!(!store.state().unwrap().logged_in);
    }
}
