//! Upstream session management.
//!
//! Owns the credential lifecycle: `NoCredential -> Valid -> Expired ->
//! Valid` (after renewal). The in-memory current credential sits behind a
//! mutex so concurrent callers serialize on adoption; the persisted store
//! is the convergence point across processes (last writer wins), and a
//! redundant login under a race is accepted wasted work.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use docket_core::{Clock, Credential, LoginStatus};
use docket_storage::CredentialStore;

use crate::client::UpstreamClient;
use crate::config::UpstreamConfig;
use crate::error::{LookupError, LookupResult};

/// Header carrying the auth token on authenticated calls.
const AUTH_KEY_HEADER: HeaderName = HeaderName::from_static("authkey");
/// Header carrying the session token on authenticated calls.
const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("sessionid");

/// Manages the upstream auth/session credential pair.
pub struct SessionManager {
    config: UpstreamConfig,
    client: Arc<UpstreamClient>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    /// Credential currently held by this process. Single writer at a time;
    /// all access goes through the operations below.
    current: tokio::sync::Mutex<Option<Credential>>,
}

impl SessionManager {
    /// Creates a session manager with injected collaborators.
    #[must_use]
    pub fn new(
        config: UpstreamConfig,
        client: Arc<UpstreamClient>,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            clock,
            current: tokio::sync::Mutex::new(None),
        }
    }

    /// Obtains a usable credential.
    ///
    /// Unless `force` is set, a persisted non-expired credential is adopted
    /// without contacting the upstream. Otherwise the login endpoint is
    /// called; on success the fresh credential is persisted best-effort
    /// (a storage failure is logged and swallowed — the in-memory session
    /// stays usable) and adopted as current.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Upstream`] on transport or decode failure and
    /// [`LookupError::Unauthorized`] when the upstream rejects the login or
    /// omits the expected tokens.
    pub async fn login(&self, force: bool) -> LookupResult<Credential> {
        if !force {
            match self.store.find_valid(&self.config.username).await {
                Ok(Some(credential)) => {
                    debug!(subject = %self.config.username, "adopting persisted credential");
                    *self.current.lock().await = Some(credential.clone());
                    return Ok(credential);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "credential lookup failed, logging in afresh");
                }
            }
        }

        info!(subject = %self.config.username, "logging in upstream");
        let body = json!({
            "username": self.config.username,
            "password": self.config.password,
        });
        let envelope = self
            .client
            .post(&self.config.login_path, HeaderMap::new(), &body)
            .await?;

        if !envelope.is_success() {
            return Err(LookupError::unauthorized(format!(
                "login rejected (code {}): {}",
                envelope.code,
                envelope.message_or_default()
            )));
        }

        let data = envelope.data.unwrap_or(Value::Null);
        let auth_key = data.get("authKey").and_then(Value::as_str);
        let session_id = data.get("sessionId").and_then(Value::as_str);
        let (Some(auth_key), Some(session_id)) = (auth_key, session_id) else {
            return Err(LookupError::unauthorized(
                "login response missing authKey or sessionId",
            ));
        };

        let credential = Credential {
            subject: self.config.username.clone(),
            secret: self.config.password.clone(),
            auth_key: auth_key.to_string(),
            session_id: session_id.to_string(),
            expires_at: self.clock.now() + self.config.session_ttl(),
        };

        // Best-effort persistence: a successful login must not be
        // invalidated by a failure to durably cache it.
        if let Err(e) = self.store.save(&credential).await {
            warn!(error = %e, "failed to persist credential, keeping in-memory session");
        }

        *self.current.lock().await = Some(credential.clone());
        info!(subject = %credential.subject, expires_at = %credential.expires_at, "login succeeded");
        Ok(credential)
    }

    /// Returns the header set for authenticated upstream calls: the static
    /// defaults plus the current auth and session tokens.
    ///
    /// Logs in first when no credential is held or `force_login` is set.
    ///
    /// # Errors
    ///
    /// Propagates the login failure when no credential can be obtained.
    pub async fn auth_headers(&self, force_login: bool) -> LookupResult<HeaderMap> {
        if force_login || self.current.lock().await.is_none() {
            self.login(force_login).await?;
        }

        let guard = self.current.lock().await;
        let credential = guard
            .as_ref()
            .ok_or_else(|| LookupError::unauthorized("no credential held after login"))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTH_KEY_HEADER,
            HeaderValue::from_str(&credential.auth_key)
                .map_err(|_| LookupError::unauthorized("auth token is not a valid header value"))?,
        );
        headers.insert(
            SESSION_ID_HEADER,
            HeaderValue::from_str(&credential.session_id).map_err(|_| {
                LookupError::unauthorized("session token is not a valid header value")
            })?,
        );
        Ok(headers)
    }

    /// Makes sure a usable credential is held, renewing if the persisted
    /// one has expired. Returns whether one is now held.
    ///
    /// A failing credential-store lookup falls back to a forced re-login
    /// rather than surfacing the storage error.
    pub async fn ensure_valid(&self) -> bool {
        match self.store.find_valid(&self.config.username).await {
            Ok(Some(credential)) => {
                let mut current = self.current.lock().await;
                if current.is_none() {
                    debug!("loading persisted credential into memory");
                    *current = Some(credential);
                }
                true
            }
            Ok(None) => {
                info!("persisted credential expired or absent, re-logging in");
                self.login(true).await.is_ok()
            }
            Err(e) => {
                warn!(error = %e, "credential check failed, re-logging in");
                self.login(true).await.is_ok()
            }
        }
    }

    /// Read-only login state report. Derived from persisted state; does
    /// not mutate the in-memory credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store fails.
    pub async fn status(&self) -> LookupResult<LoginStatus> {
        let persisted = self.store.find_valid(&self.config.username).await?;
        let now = self.clock.now();
        Ok(LoginStatus {
            subject: self.config.username.clone(),
            logged_in: persisted.is_some(),
            has_valid_session: self.current.lock().await.is_some(),
            expires_at: persisted.as_ref().map(|c| c.expires_at),
            remaining_hours: persisted
                .as_ref()
                .map_or(0.0, |c| c.remaining_hours(now)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docket_core::ManualClock;
    use docket_storage::{InMemoryCredentialStore, StorageError, StorageResult};
    use time::macros::datetime;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: time::OffsetDateTime = datetime!(2025-06-01 8:00 UTC);

    fn manager(
        base_url: &str,
        store: Arc<dyn CredentialStore>,
        clock: Arc<ManualClock>,
    ) -> SessionManager {
        let config = UpstreamConfig::new(base_url, "worker", "pw");
        let client = Arc::new(UpstreamClient::new(&config).unwrap());
        SessionManager::new(config, client, store, clock)
    }

    fn login_success() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "message": "ok",
            "data": {"authKey": "ak-1", "sessionId": "sid-1"}
        }))
    }

    #[tokio::test]
    async fn login_adopts_persisted_credential_without_upstream_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/login"))
            .respond_with(login_success())
            .expect(0)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        store
            .save(&Credential {
                subject: "worker".into(),
                secret: "pw".into(),
                auth_key: "persisted-ak".into(),
                session_id: "persisted-sid".into(),
                expires_at: NOW + time::Duration::hours(5),
            })
            .await
            .unwrap();

        let manager = manager(&server.uri(), store, clock);
        let credential = manager.login(false).await.unwrap();
        assert_eq!(credential.auth_key, "persisted-ak");
    }

    #[tokio::test]
    async fn expired_persisted_credential_triggers_exactly_one_relogin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/login"))
            .and(body_partial_json(serde_json::json!({"username": "worker"})))
            .respond_with(login_success())
            .expect(1)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        store
            .save(&Credential {
                subject: "worker".into(),
                secret: "pw".into(),
                auth_key: "stale-ak".into(),
                session_id: "stale-sid".into(),
                expires_at: NOW - time::Duration::hours(1),
            })
            .await
            .unwrap();

        let manager = manager(&server.uri(), store.clone(), clock);
        assert!(manager.ensure_valid().await);

        // The stale row was replaced with a fresh expiry.
        let fresh = store.find_valid("worker").await.unwrap().unwrap();
        assert_eq!(fresh.auth_key, "ak-1");
        assert_eq!(fresh.expires_at, NOW + time::Duration::hours(10));
    }

    #[tokio::test]
    async fn valid_persisted_credential_needs_no_upstream_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/login"))
            .respond_with(login_success())
            .expect(0)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        store
            .save(&Credential {
                subject: "worker".into(),
                secret: "pw".into(),
                auth_key: "live-ak".into(),
                session_id: "live-sid".into(),
                expires_at: NOW + time::Duration::hours(9),
            })
            .await
            .unwrap();

        let manager = manager(&server.uri(), store, clock);
        assert!(manager.ensure_valid().await);
        let headers = manager.auth_headers(false).await.unwrap();
        assert_eq!(headers.get("authkey").unwrap(), "live-ak");
        assert_eq!(headers.get("sessionid").unwrap(), "live-sid");
    }

    #[tokio::test]
    async fn rejected_login_is_a_typed_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 401,
                "message": "bad password",
                "data": null
            })))
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        let manager = manager(&server.uri(), store, clock);

        let err = manager.login(true).await.unwrap_err();
        assert!(matches!(err, LookupError::Unauthorized { .. }));
        assert!(err.to_string().contains("bad password"));
    }

    #[tokio::test]
    async fn login_response_without_tokens_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 200,
                "message": "ok",
                "data": {"authKey": "ak-only"}
            })))
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        let manager = manager(&server.uri(), store, clock);

        let err = manager.login(true).await.unwrap_err();
        assert!(matches!(err, LookupError::Unauthorized { .. }));
    }

    /// Store whose saves always fail, for the swallow-on-persist contract.
    struct WriteFailingStore;

    #[async_trait]
    impl CredentialStore for WriteFailingStore {
        async fn find_valid(&self, _subject: &str) -> StorageResult<Option<Credential>> {
            Ok(None)
        }

        async fn save(&self, _credential: &Credential) -> StorageResult<()> {
            Err(StorageError::connection("database is down"))
        }
    }

    #[tokio::test]
    async fn persistence_failure_does_not_fail_the_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/login"))
            .respond_with(login_success())
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(NOW));
        let manager = manager(&server.uri(), Arc::new(WriteFailingStore), clock);

        let credential = manager.login(true).await.unwrap();
        assert_eq!(credential.auth_key, "ak-1");
        // The in-memory session stays usable.
        let headers = manager.auth_headers(false).await.unwrap();
        assert_eq!(headers.get("authkey").unwrap(), "ak-1");
    }

    #[tokio::test]
    async fn status_reports_persisted_state_without_mutating() {
        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        store
            .save(&Credential {
                subject: "worker".into(),
                secret: "pw".into(),
                auth_key: "ak".into(),
                session_id: "sid".into(),
                expires_at: NOW + time::Duration::minutes(90),
            })
            .await
            .unwrap();

        let manager = manager("http://localhost:1", store, clock);
        let status = manager.status().await.unwrap();
        assert!(status.logged_in);
        assert!(!status.has_valid_session);
        assert_eq!(status.remaining_hours, 1.5);
        assert_eq!(status.expires_at, Some(NOW + time::Duration::minutes(90)));
    }
}
