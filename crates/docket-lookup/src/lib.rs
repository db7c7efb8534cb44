//! Upstream lookup proxy for the docket case intake service.
//!
//! Talks to the third-party data-sharing API:
//!
//! - [`SessionManager`] — obtains, persists, and renews the auth/session
//!   token pair used by every authenticated call
//! - [`CompanyQuery`] / [`IdCardQuery`] — cache-aside lookups of company
//!   and idcard records over a [`docket_storage::TtlCache`]
//!
//! Every upstream response uses the `{code, message, data}` envelope; calls
//! have a fixed 30-second timeout and surface typed [`LookupError`]s.

pub mod client;
pub mod company;
pub mod config;
pub mod error;
pub mod idcard;
pub mod session;
pub mod types;

pub use client::{ApiEnvelope, UpstreamClient};
pub use company::{CompanyBatchOutcome, CompanyOutcome, CompanyQuery, format_company};
pub use config::UpstreamConfig;
pub use error::{LookupError, LookupResult};
pub use idcard::{IdCardOutcome, IdCardQuery};
pub use session::SessionManager;
pub use types::LookupSource;
