//! Composite-case persistence backed by PostgreSQL.
//!
//! `save` runs as a single transaction: parent-row handling, full-replace
//! of children on update, applicant inserts that build the `seq_no` to
//! generated-id map, and evidence inserts that resolve their applicant
//! reference through that map. Any failure at any step rolls the whole
//! transaction back.
//!
//! The duplicate-receipt check is application-level for a friendly error;
//! the partial unique index on active receipt numbers is the actual
//! guarantee under concurrent writers, and a unique violation raised by it
//! surfaces as the same conflict error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgTransaction};
use time::OffsetDateTime;
use tracing::{debug, info};

use docket_core::{
    ApplicantRecord, ArbitrationRequestRecord, CaseDraft, CasePage, CaseRecord, CaseStatus,
    CaseSummary, Clock, CompositeCase, EvidenceRecord, RespondentRecord, SaveMode,
    split_page_range,
};
use docket_storage::{CaseError, CaseRepository, StorageError, validate_draft};

use crate::error::{is_unique_violation, map_sqlx_error};

/// PostgreSQL-backed [`CaseRepository`].
pub struct PgCaseRepository {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgCaseRepository {
    /// Creates a repository over `pool`.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Create-mode parent handling: reject an active duplicate receipt,
    /// then insert the new case row.
    async fn insert_case(
        tx: &mut PgTransaction<'_>,
        receipt_number: &str,
        now: OffsetDateTime,
    ) -> Result<i64, CaseError> {
        let existing: Option<(i64,)> =
            query_as("SELECT id FROM cases WHERE receipt_number = $1 AND status = 'active'")
                .bind(receipt_number)
                .fetch_optional(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
        if existing.is_some() {
            return Err(CaseError::duplicate_receipt(receipt_number));
        }

        let row: (i64,) = query_as(
            r"
            INSERT INTO cases (receipt_number, created_at, updated_at)
            VALUES ($1, $2, $2)
            RETURNING id
            ",
        )
        .bind(receipt_number)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            // Lost a check-then-insert race; the partial index is the backstop.
            if is_unique_violation(&e) {
                CaseError::duplicate_receipt(receipt_number)
            } else {
                CaseError::Storage(map_sqlx_error(e))
            }
        })?;

        Ok(row.0)
    }

    /// Update-mode parent handling: verify the case is active, re-check the
    /// receipt number when it changes, bump the timestamp, then drop all
    /// children in dependency order for reinsertion.
    async fn replace_case(
        tx: &mut PgTransaction<'_>,
        case_id: i64,
        receipt_number: &str,
        now: OffsetDateTime,
    ) -> Result<(), CaseError> {
        let existing: Option<(i64, String)> =
            query_as("SELECT id, receipt_number FROM cases WHERE id = $1 AND status = 'active'")
                .bind(case_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
        let Some((_, stored_receipt)) = existing else {
            return Err(CaseError::not_found(format!(
                "no active case with id {case_id}"
            )));
        };

        if receipt_number != stored_receipt {
            let collision: Option<(i64,)> = query_as(
                "SELECT id FROM cases WHERE receipt_number = $1 AND status = 'active' AND id != $2",
            )
            .bind(receipt_number)
            .bind(case_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
            if collision.is_some() {
                return Err(CaseError::duplicate_receipt(receipt_number));
            }
        }

        query("UPDATE cases SET receipt_number = $1, updated_at = $2 WHERE id = $3")
            .bind(receipt_number)
            .bind(now)
            .bind(case_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CaseError::duplicate_receipt(receipt_number)
                } else {
                    CaseError::Storage(map_sqlx_error(e))
                }
            })?;

        // Full-replace: children are deleted in dependency order and
        // reinserted from the draft.
        for table in ["arbitration_requests", "evidence", "respondents", "applicants"] {
            query(&format!("DELETE FROM {table} WHERE case_id = $1"))
                .bind(case_id)
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        Ok(())
    }

    async fn insert_children(
        tx: &mut PgTransaction<'_>,
        case_id: i64,
        draft: &CaseDraft,
    ) -> Result<(), CaseError> {
        // Applicants first, capturing seq_no -> generated id for the
        // evidence references below.
        let mut applicant_ids: HashMap<i32, i64> = HashMap::new();
        for applicant in &draft.applicants {
            let row: (i64,) = query_as(
                r"
                INSERT INTO applicants (
                    case_id, seq_no, name, gender, nation, birth_date,
                    address, phone, id_card, employment_date, work_location,
                    monthly_salary, facts_reasons
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id
                ",
            )
            .bind(case_id)
            .bind(applicant.seq_no)
            .bind(&applicant.name)
            .bind(&applicant.gender)
            .bind(&applicant.nation)
            .bind(&applicant.birth_date)
            .bind(&applicant.address)
            .bind(&applicant.phone)
            .bind(&applicant.id_card)
            .bind(&applicant.employment_date)
            .bind(&applicant.work_location)
            .bind(&applicant.monthly_salary)
            .bind(&applicant.facts_reasons)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
            let applicant_id = row.0;
            applicant_ids.insert(applicant.seq_no, applicant_id);

            for request in &applicant.requests {
                query(
                    r"
                    INSERT INTO arbitration_requests (applicant_id, case_id, seq_no, content)
                    VALUES ($1, $2, $3, $4)
                    ",
                )
                .bind(applicant_id)
                .bind(case_id)
                .bind(request.seq_no)
                .bind(&request.content)
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
            }
        }

        for respondent in &draft.respondents {
            query(
                r"
                INSERT INTO respondents (
                    case_id, seq_no, name, legal_person, position,
                    address, phone, unified_code
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(case_id)
            .bind(respondent.seq_no)
            .bind(&respondent.name)
            .bind(&respondent.legal_person)
            .bind(&respondent.position)
            .bind(&respondent.address)
            .bind(&respondent.phone)
            .bind(&respondent.unified_code)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        for evidence in &draft.evidence {
            let (page_start, page_end) = evidence
                .page_range
                .as_deref()
                .map_or((None, None), split_page_range);

            // The reference is by business key; it must resolve against the
            // applicants of this very save.
            let applicant_id = match evidence.applicant_seq_no {
                Some(seq_no) => Some(*applicant_ids.get(&seq_no).ok_or_else(|| {
                    CaseError::validation(format!(
                        "evidence \"{}\" references applicant seq_no {seq_no}, \
                         which does not exist in this case",
                        evidence.name
                    ))
                })?),
                None => None,
            };

            query(
                r"
                INSERT INTO evidence (
                    case_id, applicant_id, seq_no, name, source, purpose,
                    page_start, page_end, page_range
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(case_id)
            .bind(applicant_id)
            .bind(evidence.seq_no)
            .bind(&evidence.name)
            .bind(&evidence.source)
            .bind(&evidence.purpose)
            .bind(&page_start)
            .bind(&page_end)
            .bind(&evidence.page_range)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        Ok(())
    }

    /// Loads the children of `case` and assembles the composite.
    async fn load_composite(&self, case: CaseRecord) -> Result<CompositeCase, CaseError> {
        let case_id = case.id;

        type ApplicantRow = (
            i64,
            i64,
            i32,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        );
        let applicant_rows: Vec<ApplicantRow> = query_as(
            r"
            SELECT id, case_id, seq_no, name, gender, nation, birth_date,
                   address, phone, id_card, employment_date, work_location,
                   monthly_salary, facts_reasons
            FROM applicants
            WHERE case_id = $1
            ORDER BY seq_no
            ",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let request_rows: Vec<(i64, i64, i64, i32, String)> = query_as(
            r"
            SELECT id, applicant_id, case_id, seq_no, content
            FROM arbitration_requests
            WHERE case_id = $1
            ORDER BY seq_no
            ",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut requests_by_applicant: HashMap<i64, Vec<ArbitrationRequestRecord>> = HashMap::new();
        for (id, applicant_id, case_id, seq_no, content) in request_rows {
            requests_by_applicant
                .entry(applicant_id)
                .or_default()
                .push(ArbitrationRequestRecord {
                    id,
                    applicant_id,
                    case_id,
                    seq_no,
                    content,
                });
        }

        let applicants = applicant_rows
            .into_iter()
            .map(
                |(
                    id,
                    case_id,
                    seq_no,
                    name,
                    gender,
                    nation,
                    birth_date,
                    address,
                    phone,
                    id_card,
                    employment_date,
                    work_location,
                    monthly_salary,
                    facts_reasons,
                )| ApplicantRecord {
                    id,
                    case_id,
                    seq_no,
                    name,
                    gender,
                    nation,
                    birth_date,
                    address,
                    phone,
                    id_card,
                    employment_date,
                    work_location,
                    monthly_salary,
                    facts_reasons,
                    requests: requests_by_applicant.remove(&id).unwrap_or_default(),
                },
            )
            .collect();

        type RespondentRow = (
            i64,
            i64,
            i32,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        );
        let respondent_rows: Vec<RespondentRow> = query_as(
            r"
            SELECT id, case_id, seq_no, name, legal_person, position,
                   address, phone, unified_code
            FROM respondents
            WHERE case_id = $1
            ORDER BY seq_no
            ",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let respondents = respondent_rows
            .into_iter()
            .map(
                |(id, case_id, seq_no, name, legal_person, position, address, phone, unified_code)| {
                    RespondentRecord {
                        id,
                        case_id,
                        seq_no,
                        name,
                        legal_person,
                        position,
                        address,
                        phone,
                        unified_code,
                    }
                },
            )
            .collect();

        type EvidenceRow = (
            i64,
            i64,
            i32,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<i32>,
        );
        let evidence_rows: Vec<EvidenceRow> = query_as(
            r"
            SELECT e.id, e.case_id, e.seq_no, e.name, e.source, e.purpose,
                   e.page_start, e.page_end, e.page_range, a.seq_no
            FROM evidence e
            LEFT JOIN applicants a ON e.applicant_id = a.id
            WHERE e.case_id = $1
            ORDER BY e.seq_no
            ",
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let evidence = evidence_rows
            .into_iter()
            .map(
                |(
                    id,
                    case_id,
                    seq_no,
                    name,
                    source,
                    purpose,
                    page_start,
                    page_end,
                    page_range,
                    applicant_seq_no,
                )| EvidenceRecord {
                    id,
                    case_id,
                    seq_no,
                    name,
                    source,
                    purpose,
                    page_start,
                    page_end,
                    page_range,
                    applicant_seq_no,
                },
            )
            .collect();

        Ok(CompositeCase {
            case,
            applicants,
            respondents,
            evidence,
        })
    }

    async fn fetch_active_case(
        &self,
        where_clause: &str,
        bind: CaseKey<'_>,
    ) -> Result<Option<CaseRecord>, CaseError> {
        let sql = format!(
            "SELECT id, receipt_number, created_at, updated_at, status \
             FROM cases WHERE {where_clause} AND status = 'active'"
        );
        let mut q = query_as(&sql);
        q = match bind {
            CaseKey::Id(id) => q.bind(id),
            CaseKey::Receipt(receipt) => q.bind(receipt),
        };
        let row: Option<(i64, String, OffsetDateTime, OffsetDateTime, String)> = q
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|(id, receipt_number, created_at, updated_at, status)| {
            let status = CaseStatus::parse(&status).ok_or_else(|| {
                CaseError::Storage(StorageError::internal(format!(
                    "unknown case status {status:?} for case {id}"
                )))
            })?;
            Ok(CaseRecord {
                id,
                receipt_number,
                created_at,
                updated_at,
                status,
            })
        })
        .transpose()
    }
}

enum CaseKey<'a> {
    Id(i64),
    Receipt(&'a str),
}

#[async_trait]
impl CaseRepository for PgCaseRepository {
    async fn save(&self, draft: &CaseDraft, mode: SaveMode) -> Result<i64, CaseError> {
        validate_draft(draft)?;
        let now = self.clock.now();

        // Dropping the transaction on any error path rolls everything back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CaseError::Storage(map_sqlx_error(e)))?;

        let case_id = match mode {
            SaveMode::Create => Self::insert_case(&mut tx, &draft.receipt_number, now).await?,
            SaveMode::Update { case_id } => {
                Self::replace_case(&mut tx, case_id, &draft.receipt_number, now).await?;
                case_id
            }
        };

        Self::insert_children(&mut tx, case_id, draft).await?;

        tx.commit()
            .await
            .map_err(|e| CaseError::Storage(map_sqlx_error(e)))?;

        info!(
            case_id,
            receipt_number = %draft.receipt_number,
            applicants = draft.applicants.len(),
            respondents = draft.respondents.len(),
            evidence = draft.evidence.len(),
            "saved case"
        );
        Ok(case_id)
    }

    async fn get_by_id(&self, case_id: i64) -> Result<Option<CompositeCase>, CaseError> {
        match self.fetch_active_case("id = $1", CaseKey::Id(case_id)).await? {
            Some(case) => Ok(Some(self.load_composite(case).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_receipt(
        &self,
        receipt_number: &str,
    ) -> Result<Option<CompositeCase>, CaseError> {
        let case = self
            .fetch_active_case("receipt_number = $1", CaseKey::Receipt(receipt_number))
            .await?;
        match case {
            Some(case) => Ok(Some(self.load_composite(case).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<CasePage, CaseError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);

        type SummaryRow = (
            i64,
            String,
            OffsetDateTime,
            OffsetDateTime,
            i64,
            i64,
            i64,
            Option<String>,
        );
        let rows: Vec<SummaryRow> = query_as(
            r"
            SELECT c.id, c.receipt_number, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM applicants a WHERE a.case_id = c.id),
                   (SELECT COUNT(*) FROM respondents r WHERE r.case_id = c.id),
                   (SELECT COUNT(*) FROM evidence e WHERE e.case_id = c.id),
                   (SELECT string_agg(a.name, ', ' ORDER BY a.seq_no)
                    FROM applicants a WHERE a.case_id = c.id)
            FROM cases c
            WHERE c.status = 'active'
            ORDER BY c.created_at DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let total: (i64,) = query_as("SELECT COUNT(*) FROM cases WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let items = rows
            .into_iter()
            .map(
                |(
                    id,
                    receipt_number,
                    created_at,
                    updated_at,
                    applicant_count,
                    respondent_count,
                    evidence_count,
                    applicant_names,
                )| CaseSummary {
                    id,
                    receipt_number,
                    created_at,
                    updated_at,
                    applicant_count,
                    respondent_count,
                    evidence_count,
                    applicant_names,
                },
            )
            .collect();

        Ok(CasePage {
            items,
            total: total.0,
        })
    }

    async fn soft_delete(&self, case_id: i64) -> Result<(), CaseError> {
        let updated = query(
            "UPDATE cases SET status = 'deleted', updated_at = $1 \
             WHERE id = $2 AND status = 'active'",
        )
        .bind(self.clock.now())
        .bind(case_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .rows_affected();

        if updated == 0 {
            return Err(CaseError::not_found(format!(
                "no active case with id {case_id}"
            )));
        }
        debug!(case_id, "case soft-deleted");
        Ok(())
    }
}
