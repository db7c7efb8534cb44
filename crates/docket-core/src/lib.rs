//! Core domain types for the docket case intake service.
//!
//! This crate defines the composite case model (case, applicants,
//! arbitration requests, respondents, evidence), the upstream credential
//! record, and the injectable clock used by every expiry computation.
//! Storage traits live in `docket-storage`; backends and the upstream
//! lookup proxy build on both.

pub mod case;
pub mod clock;
pub mod credential;

pub use case::{
    ApplicantDraft, ApplicantRecord, ArbitrationRequestDraft, ArbitrationRequestRecord,
    CaseDraft, CasePage, CaseRecord, CaseStatus, CaseSummary, CompositeCase, EvidenceDraft,
    EvidenceRecord, RespondentDraft, RespondentRecord, SaveMode, split_page_range,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{Credential, LoginStatus};
