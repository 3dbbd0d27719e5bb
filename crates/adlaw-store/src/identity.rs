//! Sessions and the signed-in account.

use serde::Deserialize;
use tracing::info;

use crate::{BackendClient, StoreError};

/// The signed-in account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
}

/// A created session; the token goes into `ADLAW_SESSION` for later runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

pub struct IdentityClient {
    backend: BackendClient,
}

impl IdentityClient {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Create a session from credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        info!(email = %email, "creating session");
        let resp = self
            .backend
            .post("/sessions")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let resp = BackendClient::check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Delete the current session.
    pub async fn logout(&self) -> Result<(), StoreError> {
        self.backend.require_session()?;
        info!("deleting current session");
        let resp = self.backend.delete("/sessions/current").send().await?;
        BackendClient::check(resp).await?;
        Ok(())
    }

    /// Fetch the signed-in account.
    pub async fn current_user(&self) -> Result<User, StoreError> {
        self.backend.require_session()?;
        let resp = self.backend.get("/account").send().await?;
        let resp = BackendClient::check(resp).await?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_parses_from_wire_shape() {
        let json = r#"{ "token": "tok-abc", "userId": "u42" }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.token, "tok-abc");
        assert_eq!(session.user_id, "u42");
    }

    #[test]
    fn user_parses_without_optional_username() {
        let json = r#"{ "id": "u42", "email": "ops@example.com" }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u42");
        assert!(user.username.is_empty());
    }

    #[tokio::test]
    async fn identity_calls_without_session_fail_fast() {
        let identity = IdentityClient::new(BackendClient::new("http://localhost:4000".into()));
        // No network involved: the preflight rejects before sending.
        let err = identity.current_user().await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthenticated));
    }
}
