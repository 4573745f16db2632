#![forbid(unsafe_code)]

//! Demo sign-in against two built-in accounts, with the signed-in user kept
//! in the key-value store between runs.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskdeckError};
use crate::store::{self, KeyValueStore, SESSION_KEY};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "ROLE_MEMBER")]
    Member,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub name: String,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

struct Account {
    email: &'static str,
    password: &'static str,
    id: &'static str,
    role: Role,
    name: &'static str,
}

const ACCOUNTS: [Account; 2] = [
    Account {
        email: "admin@taskmanager.com",
        password: "admin123",
        id: "1",
        role: Role::Admin,
        name: "Admin User",
    },
    Account {
        email: "user@taskmanager.com",
        password: "user123",
        id: "2",
        role: Role::Member,
        name: "Regular User",
    },
];

#[derive(Debug, Clone, Default)]
pub struct MockAuthService {
    latency: Duration,
}

impl MockAuthService {
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        self.pause(self.latency).await;
        ACCOUNTS
            .iter()
            .find(|a| a.email == email.trim() && a.password == password)
            .map(|a| User {
                id: a.id.to_owned(),
                email: a.email.to_owned(),
                role: a.role,
                name: a.name.to_owned(),
            })
            .ok_or(TaskdeckError::InvalidCredentials)
    }

    pub async fn logout(&self) {
        self.pause(self.latency / 2).await;
    }

    async fn pause(&self, d: Duration) {
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

pub struct Session {
    auth: MockAuthService,
    store: Arc<dyn KeyValueStore>,
    user: Option<User>,
}

impl Session {
    #[must_use]
    pub fn new(auth: MockAuthService, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            auth,
            store,
            user: None,
        }
    }

    /// Picks up the user saved by an earlier login, if any.
    pub async fn restore(&mut self) {
        match store::get_json::<User>(self.store.as_ref(), SESSION_KEY).await {
            Ok(user) => self.user = user,
            Err(err) => tracing::warn!(error = %err, "failed to load user session"),
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User> {
        let user = self.auth.login(email, password).await?;
        self.user = Some(user.clone());
        store::set_json(self.store.as_ref(), SESSION_KEY, &user).await?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    pub async fn logout(&mut self) {
        self.auth.logout().await;
        self.user = None;
        if let Err(err) = self.store.remove(SESSION_KEY).await {
            tracing::warn!(error = %err, "failed to logout");
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(TaskdeckError::NotSignedIn)
    }

    pub fn require_admin(&self) -> Result<&User> {
        let user = self.require_user()?;
        if !user.is_admin() {
            return Err(TaskdeckError::NotAuthorized);
        }
        Ok(user)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn known_credentials_map_to_fixed_users() {
        let auth = MockAuthService::default();
        let admin = auth.login("admin@taskmanager.com", "admin123").await.unwrap();
        assert_eq!(admin.id, "1");
        assert!(admin.is_admin());

        let member = auth.login("user@taskmanager.com", "user123").await.unwrap();
        assert_eq!(member.role, Role::Member);

        assert!(matches!(
            auth.login("user@taskmanager.com", "admin123").await,
            Err(TaskdeckError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn session_persists_until_logout() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut session = Session::new(MockAuthService::default(), store.clone());
        session.restore().await;
        assert!(!session.is_authenticated());
        assert!(matches!(session.require_user(), Err(TaskdeckError::NotSignedIn)));

        session
            .login("user@taskmanager.com", "user123")
            .await
            .unwrap();
        assert!(!session.is_admin());
        assert!(matches!(session.require_admin(), Err(TaskdeckError::NotAuthorized)));

        let mut next = Session::new(MockAuthService::default(), store.clone());
        next.restore().await;
        assert_eq!(next.user().map(|u| u.id.as_str()), Some("2"));

        next.logout().await;
        let mut after = Session::new(MockAuthService::default(), store);
        after.restore().await;
        assert!(after.user().is_none());
    }

    #[test]
    fn roles_use_stored_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ROLE_ADMIN\"");
    }
}
