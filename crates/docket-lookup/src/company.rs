//! Company record lookups.
//!
//! Cache-aside over the company namespace: a cache hit answers without any
//! upstream traffic; a miss authenticates, queries the upstream endpoint,
//! filters by company name, and caches non-empty results for the configured
//! TTL. Concurrent misses for the same name each call upstream and each
//! upsert the cache — accepted wasted work, the writes are idempotent.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

use docket_storage::TtlCache;

use crate::client::UpstreamClient;
use crate::config::UpstreamConfig;
use crate::error::{LookupError, LookupResult};
use crate::session::SessionManager;
use crate::types::LookupSource;

/// Record field holding the company name; the filter target.
const NAME_FIELD: &str = "name";

/// Record field holding the establishment date as a millisecond epoch.
const ESTABLISH_DATE_FIELD: &str = "establishDate";

/// Upstream field codes and their human-readable labels, in display order.
const FIELD_LABELS: &[(&str, &str)] = &[
    (NAME_FIELD, "Company name"),
    ("creditCode", "Unified social credit code"),
    ("regNumber", "Business registration number"),
    ("legalPerson", "Legal representative"),
    ("companyType", "Company type"),
    ("enterpriseType", "Enterprise type"),
    ("industryName", "Industry"),
    ("regAddress", "Registered address"),
    ("businessAddress", "Business address"),
    (ESTABLISH_DATE_FIELD, "Established"),
    ("openingDate", "Business term start"),
    ("closingDate", "Business term end"),
    ("registerState", "Registration status"),
    ("regCapital", "Registered capital"),
    ("phone", "Company phone"),
    ("issuingAuthority", "Issuing authority"),
    ("establishMode", "Establishment mode"),
];

/// Result of a company lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanyOutcome {
    /// Matching records were found (in cache or upstream).
    Found {
        source: LookupSource,
        records: Vec<Value>,
        /// How many records the upstream returned before filtering. Equals
        /// `matched_count` for cache hits.
        total_count: usize,
        matched_count: usize,
    },
    /// The upstream answered but no record matched the name filter.
    /// Not cached.
    NotFound {
        /// Raw upstream record count.
        total_count: usize,
    },
}

/// Result of a batch company lookup.
#[derive(Debug)]
pub struct CompanyBatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// Per-name outcomes in input order.
    pub results: Vec<(String, LookupResult<CompanyOutcome>)>,
}

/// Cache-aside company lookup over the upstream query endpoint.
pub struct CompanyQuery {
    session: Arc<SessionManager>,
    client: Arc<UpstreamClient>,
    cache: Arc<dyn TtlCache>,
    config: UpstreamConfig,
}

impl CompanyQuery {
    /// Creates a query component with injected collaborators. `cache` must
    /// be the company namespace.
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

    /// Looks up company records by name.
    ///
    /// `exact_match` keeps only records whose name equals `name`; otherwise
    /// records whose name contains `name` as a substring are kept.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Unauthorized`] when no session can be
    /// established, [`LookupError::Upstream`] on transport/decode failures
    /// or a non-success envelope, and [`LookupError::Storage`] when the
    /// cache fails.
    pub async fn query(&self, name: &str, exact_match: bool) -> LookupResult<CompanyOutcome> {
        if let Some(payload) = self.cache.get(name).await? {
            debug!(name, "company lookup served from cache");
            let records = match payload {
                Value::Array(records) => records,
                other => vec![other],
            };
            let count = records.len();
            return Ok(CompanyOutcome::Found {
                source: LookupSource::Cache,
                records,
                total_count: count,
                matched_count: count,
            });
        }

        if !self.session.ensure_valid().await {
            return Err(LookupError::unauthorized(
                "could not establish an upstream session",
            ));
        }
        let headers = self.session.auth_headers(false).await?;

        info!(name, exact_match, "querying company upstream");
        let envelope = self
            .client
            .post(&self.config.company_path, headers, &json!({ "name": name }))
            .await?;
        if !envelope.is_success() {
            return Err(LookupError::upstream(format!(
                "company query rejected (code {}): {}",
                envelope.code,
                envelope.message_or_default()
            )));
        }

        let raw = match envelope.data {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        };
        let total_count = raw.len();

        let matches_name = |record: &Value| {
            record
                .get(NAME_FIELD)
                .and_then(Value::as_str)
                .is_some_and(|candidate| {
                    if exact_match {
                        candidate == name
                    } else {
                        candidate.contains(name)
                    }
                })
        };
        let filtered: Vec<Value> = raw.into_iter().filter(|r| matches_name(r)).collect();

        if filtered.is_empty() {
            info!(name, total_count, "no company record matched");
            return Ok(CompanyOutcome::NotFound { total_count });
        }

        let matched_count = filtered.len();
        self.cache
            .put(name, &Value::Array(filtered.clone()), self.config.cache_ttl())
            .await?;
        info!(name, total_count, matched_count, "company lookup cached");

        Ok(CompanyOutcome::Found {
            source: LookupSource::Api,
            records: filtered,
            total_count,
            matched_count,
        })
    }

    /// Looks up several companies sequentially, tallying outcomes.
    /// A `NotFound` outcome counts as a failure, matching the single-lookup
    /// semantics of "nothing usable came back".
    pub async fn query_many(&self, names: &[String], exact_match: bool) -> CompanyBatchOutcome {
        let mut outcome = CompanyBatchOutcome {
            succeeded: 0,
            failed: 0,
            results: Vec::with_capacity(names.len()),
        };
        for name in names {
            let result = self.query(name, exact_match).await;
            match &result {
                Ok(CompanyOutcome::Found { .. }) => outcome.succeeded += 1,
                _ => outcome.failed += 1,
            }
            outcome.results.push((name.clone(), result));
        }
        outcome
    }
}

/// Formats a raw company record for display.
///
/// Maps known upstream field codes to labels, converts a millisecond-epoch
/// establishment date to a calendar date string, and omits absent fields
/// entirely rather than defaulting them.
#[must_use]
pub fn format_company(record: &Value) -> Map<String, Value> {
    let mut formatted = Map::new();
    for (code, label) in FIELD_LABELS {
        let Some(value) = record.get(*code) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let value = if *code == ESTABLISH_DATE_FIELD {
            millis_to_date(value).unwrap_or_else(|| value.clone())
        } else {
            value.clone()
        };
        formatted.insert((*label).to_string(), value);
    }
    formatted
}

/// Converts a millisecond epoch value to a `YYYY-MM-DD` date string.
/// Non-numeric or out-of-range values yield `None` and are passed through
/// unchanged by the caller.
fn millis_to_date(value: &Value) -> Option<Value> {
    let millis = value.as_i64()?;
    let datetime = OffsetDateTime::from_unix_timestamp(millis / 1000).ok()?;
    let date = datetime
        .format(format_description!("[year]-[month]-[day]"))
        .ok()?;
    Some(Value::String(date))
}
