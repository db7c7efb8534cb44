//! Case repository trait and draft validation.
//!
//! The repository persists a composite case — parent row plus applicants,
//! arbitration requests, respondents, and evidence — as one transaction.
//! Updates are full-replace: existing children are deleted and the submitted
//! set reinserted, never diffed.

use async_trait::async_trait;
use std::collections::HashSet;

use docket_core::{CaseDraft, CasePage, CompositeCase, SaveMode};

use crate::error::CaseError;

/// Storage trait for composite-case persistence.
///
/// All mutating operations are atomic: on any failure the whole operation
/// rolls back and no partially-applied case is ever observable.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Creates or fully replaces a case, returning its id.
    ///
    /// The draft is validated before any write. Create mode rejects an
    /// active duplicate receipt number; update mode requires the target case
    /// to exist and be active, and re-checks the receipt number when it
    /// changes. Evidence referencing an applicant `seq_no` that is not part
    /// of this save aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Validation`], [`CaseError::DuplicateReceipt`],
    /// [`CaseError::NotFound`], or [`CaseError::Storage`].
    async fn save(&self, draft: &CaseDraft, mode: SaveMode) -> Result<i64, CaseError>;

    /// Loads the active case with `case_id` and all of its children,
    /// ordered by `seq_no`. Returns `None` for absent or deleted cases.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_by_id(&self, case_id: i64) -> Result<Option<CompositeCase>, CaseError>;

    /// Same composite load, keyed by receipt number. Only active cases are
    /// considered.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_receipt(&self, receipt_number: &str)
    -> Result<Option<CompositeCase>, CaseError>;

    /// Returns one page of active cases, newest first, with aggregate child
    /// counts, plus the total number of active cases. Pages are 1-based.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self, page: u32, page_size: u32) -> Result<CasePage, CaseError>;

    /// Marks an active case as deleted. Children stay in place but become
    /// unreachable through the active-only read paths.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::NotFound`] when the case is absent or already
    /// deleted.
    async fn soft_delete(&self, case_id: i64) -> Result<(), CaseError>;
}

/// Validates a draft before any write is opened.
///
/// Checks: non-empty receipt number, at least one applicant, and unique
/// `seq_no` values within each collection (duplicates would corrupt the
/// evidence-to-applicant mapping).
///
/// # Errors
///
/// Returns [`CaseError::Validation`] describing the first problem found.
pub fn validate_draft(draft: &CaseDraft) -> Result<(), CaseError> {
    if draft.receipt_number.trim().is_empty() {
        return Err(CaseError::validation("receipt number must not be empty"));
    }
    if draft.applicants.is_empty() {
        return Err(CaseError::validation("at least one applicant is required"));
    }

    let mut seen = HashSet::new();
    for applicant in &draft.applicants {
        if !seen.insert(applicant.seq_no) {
            return Err(CaseError::validation(format!(
                "duplicate applicant seq_no {}",
                applicant.seq_no
            )));
        }
        let mut request_seen = HashSet::new();
        for request in &applicant.requests {
            if !request_seen.insert(request.seq_no) {
                return Err(CaseError::validation(format!(
                    "duplicate request seq_no {} for applicant {}",
                    request.seq_no, applicant.seq_no
                )));
            }
        }
    }

    let mut seen = HashSet::new();
    for respondent in &draft.respondents {
        if !seen.insert(respondent.seq_no) {
            return Err(CaseError::validation(format!(
                "duplicate respondent seq_no {}",
                respondent.seq_no
            )));
        }
    }

    let mut seen = HashSet::new();
    for evidence in &draft.evidence {
        if !seen.insert(evidence.seq_no) {
            return Err(CaseError::validation(format!(
                "duplicate evidence seq_no {}",
                evidence.seq_no
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::{ApplicantDraft, ArbitrationRequestDraft, EvidenceDraft};

    fn applicant(seq_no: i32, name: &str) -> ApplicantDraft {
        ApplicantDraft {
            seq_no,
            name: name.into(),
            ..Default::default()
        }
    }

    fn draft_with_one_applicant() -> CaseDraft {
        CaseDraft {
            receipt_number: "R1".into(),
            applicants: vec![applicant(1, "Zhang")],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_minimal_draft() {
        assert!(validate_draft(&draft_with_one_applicant()).is_ok());
    }

    #[test]
    fn rejects_blank_receipt() {
        let mut draft = draft_with_one_applicant();
        draft.receipt_number = "   ".into();
        let err = validate_draft(&draft).unwrap_err();
        assert!(matches!(err, CaseError::Validation { .. }));
    }

    #[test]
    fn rejects_empty_applicants() {
        let mut draft = draft_with_one_applicant();
        draft.applicants.clear();
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn rejects_duplicate_applicant_seq_no() {
        let mut draft = draft_with_one_applicant();
        draft.applicants.push(applicant(1, "Li"));
        let err = validate_draft(&draft).unwrap_err();
        assert!(err.to_string().contains("duplicate applicant seq_no 1"));
    }

    #[test]
    fn rejects_duplicate_request_seq_no_within_applicant() {
        let mut draft = draft_with_one_applicant();
        draft.applicants[0].requests = vec![
            ArbitrationRequestDraft {
                seq_no: 1,
                content: "back pay".into(),
            },
            ArbitrationRequestDraft {
                seq_no: 1,
                content: "compensation".into(),
            },
        ];
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn rejects_duplicate_evidence_seq_no() {
        let mut draft = draft_with_one_applicant();
        draft.evidence = vec![
            EvidenceDraft {
                seq_no: 2,
                name: "contract".into(),
                ..Default::default()
            },
            EvidenceDraft {
                seq_no: 2,
                name: "payslip".into(),
                ..Default::default()
            },
        ];
        assert!(validate_draft(&draft).is_err());
    }
}
