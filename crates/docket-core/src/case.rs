//! Composite case model.
//!
//! A case is one parent row plus four owned collections: applicants (each
//! with nested arbitration requests), respondents, and evidence. Drafts are
//! what callers submit; records are what the repository reads back. Sibling
//! rows inside a collection are keyed by a caller-assigned `seq_no`, which
//! is also how evidence references its applicant at the input boundary,
//! before generated ids exist.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// Drafts (write side)
// =============================================================================

/// A full case as submitted for create or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseDraft {
    /// Receipt number, unique among active cases.
    pub receipt_number: String,
    /// Applicants with their nested arbitration requests. At least one
    /// applicant is required.
    pub applicants: Vec<ApplicantDraft>,
    pub respondents: Vec<RespondentDraft>,
    pub evidence: Vec<EvidenceDraft>,
}

/// Applicant input, owned by the submitted case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantDraft {
    /// Caller-assigned ordering key, unique within the case.
    pub seq_no: i32,
    pub name: String,
    pub gender: Option<String>,
    pub nation: Option<String>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub id_card: Option<String>,
    pub employment_date: Option<String>,
    pub work_location: Option<String>,
    pub monthly_salary: Option<String>,
    pub facts_reasons: Option<String>,
    /// Arbitration requests raised by this applicant.
    pub requests: Vec<ArbitrationRequestDraft>,
}

/// Arbitration request input, nested under one applicant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRequestDraft {
    pub seq_no: i32,
    pub content: String,
}

/// Respondent input, owned by the submitted case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RespondentDraft {
    pub seq_no: i32,
    pub name: String,
    pub legal_person: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub unified_code: Option<String>,
}

/// Evidence input. May reference an applicant of the same case by `seq_no`;
/// the repository resolves that to the generated applicant id at write time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDraft {
    pub seq_no: i32,
    pub name: String,
    pub source: Option<String>,
    pub purpose: Option<String>,
    /// Raw `"start-end"` page range as entered by the caller.
    pub page_range: Option<String>,
    /// Weak reference to an applicant of this case, by its `seq_no`.
    pub applicant_seq_no: Option<i32>,
}

/// Whether a save creates a new case or fully replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SaveMode {
    Create,
    /// Update requires an explicit target case id.
    Update { case_id: i64 },
}

/// Splits a `"start-end"` page range into separate bounds.
///
/// Only strings containing a dash are split; the end segment may be missing
/// (`"5-"` yields a start and no end). Anything else, including a bare page
/// number, yields no bounds — the raw string is still stored verbatim.
#[must_use]
pub fn split_page_range(range: &str) -> (Option<String>, Option<String>) {
    match range.split_once('-') {
        Some((start, end)) => {
            let start = (!start.is_empty()).then(|| start.to_string());
            let end = (!end.is_empty()).then(|| end.to_string());
            (start, end)
        }
        None => (None, None),
    }
}

// =============================================================================
// Records (read side)
// =============================================================================

/// Lifecycle state of a case. Deleted cases stay in storage but are excluded
/// from every active-only read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Active,
    Deleted,
}

impl CaseStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    /// Parses the storage representation. Unknown values map to `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Case parent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: i64,
    pub receipt_number: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub status: CaseStatus,
}

/// Applicant row with its nested arbitration requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub id: i64,
    pub case_id: i64,
    pub seq_no: i32,
    pub name: String,
    pub gender: Option<String>,
    pub nation: Option<String>,
    pub birth_date: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub id_card: Option<String>,
    pub employment_date: Option<String>,
    pub work_location: Option<String>,
    pub monthly_salary: Option<String>,
    pub facts_reasons: Option<String>,
    pub requests: Vec<ArbitrationRequestRecord>,
}

/// Arbitration request row. `case_id` is denormalized so case-scoped
/// queries do not need to join through applicants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRequestRecord {
    pub id: i64,
    pub applicant_id: i64,
    pub case_id: i64,
    pub seq_no: i32,
    pub content: String,
}

/// Respondent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondentRecord {
    pub id: i64,
    pub case_id: i64,
    pub seq_no: i32,
    pub name: String,
    pub legal_person: Option<String>,
    pub position: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub unified_code: Option<String>,
}

/// Evidence row. The applicant reference is surfaced as the owning
/// applicant's `seq_no`, matching the input boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: i64,
    pub case_id: i64,
    pub seq_no: i32,
    pub name: String,
    pub source: Option<String>,
    pub purpose: Option<String>,
    pub page_start: Option<String>,
    pub page_end: Option<String>,
    pub page_range: Option<String>,
    pub applicant_seq_no: Option<i32>,
}

/// A case with its full set of children, treated as one logical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeCase {
    pub case: CaseRecord,
    pub applicants: Vec<ApplicantRecord>,
    pub respondents: Vec<RespondentRecord>,
    pub evidence: Vec<EvidenceRecord>,
}

/// One row of the paginated case list, with aggregate child counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: i64,
    pub receipt_number: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub applicant_count: i64,
    pub respondent_count: i64,
    pub evidence_count: i64,
    /// Applicant names joined in `seq_no` order; `None` when the case has
    /// no applicants (not reachable through the save path).
    pub applicant_names: Option<String>,
}

/// A page of case summaries plus the total number of active cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasePage {
    pub items: Vec<CaseSummary>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_range_splits_both_bounds() {
        assert_eq!(
            split_page_range("5-10"),
            (Some("5".to_string()), Some("10".to_string()))
        );
    }

    #[test]
    fn page_range_tolerates_missing_end() {
        assert_eq!(split_page_range("5-"), (Some("5".to_string()), None));
    }

    #[test]
    fn page_range_without_dash_yields_no_bounds() {
        assert_eq!(split_page_range("5"), (None, None));
        assert_eq!(split_page_range(""), (None, None));
    }

    #[test]
    fn case_status_round_trips() {
        assert_eq!(CaseStatus::parse("active"), Some(CaseStatus::Active));
        assert_eq!(CaseStatus::parse("deleted"), Some(CaseStatus::Deleted));
        assert_eq!(CaseStatus::parse("archived"), None);
        assert_eq!(CaseStatus::Active.as_str(), "active");
    }
}
