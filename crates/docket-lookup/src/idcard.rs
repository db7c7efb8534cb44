//! Identity-card record lookups.
//!
//! Same cache-aside shape as the company lookups, keyed by id number. The
//! upstream payload is cached verbatim; there is no filtering step because
//! an id number identifies at most one person.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use docket_storage::TtlCache;

use crate::client::UpstreamClient;
use crate::config::UpstreamConfig;
use crate::error::{LookupError, LookupResult};
use crate::session::SessionManager;
use crate::types::LookupSource;

/// Result of an identity-card lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum IdCardOutcome {
    /// A record came back, from cache or upstream.
    Found {
        source: LookupSource,
        record: Value,
    },
    /// The upstream answered success but had no data for the id number.
    /// Not cached.
    Absent,
}

/// Cache-aside identity lookup over the upstream query endpoint.
pub struct IdCardQuery {
    session: Arc<SessionManager>,
    client: Arc<UpstreamClient>,
    cache: Arc<dyn TtlCache>,
    config: UpstreamConfig,
}

impl IdCardQuery {
    /// Creates a query component with injected collaborators. `cache` must
    /// be the id-card namespace.
    #[must_use]
    pub fn new(
        session: Arc<SessionManager>,
        client: Arc<UpstreamClient>,
        cache: Arc<dyn TtlCache>,
        config: UpstreamConfig,
    ) -> Self {
        Self {
            session,
            client,
            cache,
            config,
        }
    }

    /// Looks up an identity record by id number.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Unauthorized`] when no session can be
    /// established, [`LookupError::Upstream`] on transport/decode failures
    /// or a non-success envelope, and [`LookupError::Storage`] when the
    /// cache fails.
    pub async fn query(&self, id_number: &str) -> LookupResult<IdCardOutcome> {
        if let Some(record) = self.cache.get(id_number).await? {
            debug!(id_number, "id card lookup served from cache");
            return Ok(IdCardOutcome::Found {
                source: LookupSource::Cache,
                record,
            });
        }

        if !self.session.ensure_valid().await {
            return Err(LookupError::unauthorized(
                "could not establish an upstream session",
            ));
        }
        let headers = self.session.auth_headers(false).await?;

        info!(id_number, "querying id card upstream");
        let envelope = self
            .client
            .post(
                &self.config.idcard_path,
                headers,
                &json!({ "idNumber": id_number }),
            )
            .await?;
        if !envelope.is_success() {
            return Err(LookupError::upstream(format!(
                "id card query rejected (code {}): {}",
                envelope.code,
                envelope.message_or_default()
            )));
        }

        let record = match envelope.data {
            Some(record) if !record.is_null() => record,
            _ => {
                info!(id_number, "no id card record found");
                return Ok(IdCardOutcome::Absent);
            }
        };

        self.cache
            .put(id_number, &record, self.config.cache_ttl())
            .await?;
        info!(id_number, "id card lookup cached");

        Ok(IdCardOutcome::Found {
            source: LookupSource::Api,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::{Credential, ManualClock};
    use docket_storage::{CredentialStore, InMemoryCredentialStore, InMemoryTtlCache};
    use serde_json::json;
    use time::macros::datetime;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: time::OffsetDateTime = datetime!(2025-06-01 8:00 UTC);

    struct Fixture {
        query: IdCardQuery,
        cache: Arc<InMemoryTtlCache>,
    }

    async fn fixture(server: &MockServer) -> Fixture {
        let clock = Arc::new(ManualClock::new(NOW));
        let config = UpstreamConfig::new(server.uri(), "worker", "pw");
        let client = Arc::new(UpstreamClient::new(&config).unwrap());
        let store = Arc::new(InMemoryCredentialStore::new(clock.clone()));
        store
            .save(&Credential {
                subject: "worker".into(),
                secret: "pw".into(),
                auth_key: "ak".into(),
                session_id: "sid".into(),
                expires_at: NOW + time::Duration::hours(5),
            })
            .await
            .unwrap();
        let session = Arc::new(SessionManager::new(
            config.clone(),
            client.clone(),
            store,
            clock,
        ));
        let cache = Arc::new(InMemoryTtlCache::new(Arc::new(ManualClock::new(NOW))));
        Fixture {
            query: IdCardQuery::new(session, client, cache.clone(), config),
            cache,
        }
    }

    #[tokio::test]
    async fn lookup_hits_upstream_once_then_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/idcard"))
            .and(header("authkey", "ak"))
            .and(header("sessionid", "sid"))
            .and(body_partial_json(json!({"idNumber": "110101199001011234"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "message": "ok",
                "data": {"name": "Jane Roe", "idNumber": "110101199001011234"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server).await;

        let first = fx.query.query("110101199001011234").await.unwrap();
        let IdCardOutcome::Found { source, record } = first else {
            panic!("expected a found outcome");
        };
        assert_eq!(source, LookupSource::Api);
        assert_eq!(record["name"], "Jane Roe");

        let second = fx.query.query("110101199001011234").await.unwrap();
        let IdCardOutcome::Found { source, record } = second else {
            panic!("expected a found outcome");
        };
        assert_eq!(source, LookupSource::Cache);
        assert_eq!(record["name"], "Jane Roe");
    }

    #[tokio::test]
    async fn absent_record_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/idcard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "message": "ok",
                "data": null
            })))
            .expect(2)
            .mount(&server)
            .await;

        let fx = fixture(&server).await;
        for _ in 0..2 {
            let outcome = fx.query.query("110101199001011234").await.unwrap();
            assert_eq!(outcome, IdCardOutcome::Absent);
        }
        assert!(fx.cache.get("110101199001011234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upstream_rejection_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/api/idcard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 403,
                "message": "quota exceeded",
                "data": null
            })))
            .mount(&server)
            .await;

        let fx = fixture(&server).await;
        let err = fx.query.query("110101199001011234").await.unwrap_err();
        assert!(matches!(err, LookupError::Upstream { .. }));
    }
}
