//! Performance-to-customer association.
//!
//! A new performance record is linked to a customer by, in order:
//! 1. an explicit customer id;
//! 2. a unique name + birthday match;
//! 3. a name match: none creates a customer, one links, several need a
//!    human decision.
//!
//! Single-record flows return `NeedsDisambiguation` so the caller can ask.
//! Batch imports never stop for that: the record stays unlinked and is
//! counted as skipped.

use chrono::Utc;
use serde::Serialize;

use crate::db::CrmDb;
use crate::error::CrmError;
use crate::types::{Customer, PerformanceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationMode {
    /// The only record being processed; ambiguity is surfaced to the user.
    Single,
    /// Part of a larger import; ambiguity is skipped and counted.
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssociationOutcome {
    Linked {
        customer_id: String,
        created_customer: bool,
    },
    NeedsDisambiguation {
        candidates: Vec<Customer>,
    },
    Skipped {
        candidate_count: usize,
    },
}

impl AssociationOutcome {
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            AssociationOutcome::Linked { customer_id, .. } => Some(customer_id),
            _ => None,
        }
    }
}

fn link(
    db: &CrmDb,
    record: &PerformanceRecord,
    customer_id: &str,
    created_customer: bool,
) -> Result<AssociationOutcome, CrmError> {
    if !db.set_performance_customer(&record.id, Some(customer_id))? {
        return Err(CrmError::not_found("PerformanceRecord", record.id.clone()));
    }
    log::debug!(
        "Linked performance record {} to customer {}",
        record.id,
        customer_id
    );
    Ok(AssociationOutcome::Linked {
        customer_id: customer_id.to_string(),
        created_customer,
    })
}

fn create_customer_for(
    db: &CrmDb,
    record: &PerformanceRecord,
    inferred_type: Option<&str>,
) -> Result<Customer, CrmError> {
    let mut customer = Customer::new(record.contractor_name.trim(), Utc::now());
    customer.birthday = record.dob;
    customer.customer_type = inferred_type.map(str::to_string);
    db.upsert_customer(&customer)?;
    log::info!(
        "Created customer '{}' ({}) from performance record {}",
        customer.name,
        customer.id,
        record.id
    );
    Ok(customer)
}

/// Association against an already stored record, inside the caller's transaction.
pub(crate) fn associate_in(
    db: &CrmDb,
    record: &PerformanceRecord,
    customer_id: Option<&str>,
    inferred_type: Option<&str>,
    mode: AssociationMode,
) -> Result<AssociationOutcome, CrmError> {
    if let Some(id) = customer_id {
        if db.get_customer(id)?.is_none() {
            return Err(CrmError::not_found("Customer", id));
        }
        return link(db, record, id, false);
    }

    let name = record.contractor_name.trim();
    if name.is_empty() {
        return Err(CrmError::Validation(
            "Performance record has no contractor name".into(),
        ));
    }

    if let Some(dob) = record.dob {
        let exact = db.find_customers_by_name_and_birthday(name, dob)?;
        if let [only] = exact.as_slice() {
            return link(db, record, &only.id, false);
        }
    }

    let matches = db.find_customers_by_name(name)?;
    match matches.len() {
        0 => {
            let customer = create_customer_for(db, record, inferred_type)?;
            link(db, record, &customer.id, true)
        }
        1 => link(db, record, &matches[0].id, false),
        n => match mode {
            AssociationMode::Single => Ok(AssociationOutcome::NeedsDisambiguation {
                candidates: matches,
            }),
            AssociationMode::Batch => {
                log::info!(
                    "Skipped association of {}: {} customers named '{}'",
                    record.id,
                    n,
                    name
                );
                Ok(AssociationOutcome::Skipped { candidate_count: n })
            }
        },
    }
}

/// Link a stored record to a customer.
pub fn associate_performance_record(
    db: &CrmDb,
    record: &PerformanceRecord,
    customer_id: Option<&str>,
    inferred_type: Option<&str>,
    mode: AssociationMode,
) -> Result<AssociationOutcome, CrmError> {
    db.with_transaction(|tx| associate_in(tx, record, customer_id, inferred_type, mode))
}

/// Store a single new record and associate it.
pub fn record_performance(
    db: &CrmDb,
    record: PerformanceRecord,
    customer_id: Option<&str>,
    inferred_type: Option<&str>,
) -> Result<(PerformanceRecord, AssociationOutcome), CrmError> {
    db.with_transaction(|tx| {
        tx.insert_performance_record(&record)?;
        let outcome = associate_in(tx, &record, customer_id, inferred_type, AssociationMode::Single)?;
        let mut stored = record;
        stored.customer_id = outcome.customer_id().map(str::to_string);
        Ok((stored, outcome))
    })
}

/// A single imported record that needs the user to pick a customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisambiguationRequest {
    pub record: PerformanceRecord,
    pub candidates: Vec<Customer>,
}

/// Counts reported at the end of an import.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAssociationReport {
    pub imported: usize,
    pub linked: usize,
    pub created: usize,
    pub skipped: usize,
    /// Set only when the import held exactly one ambiguous record.
    pub pending: Option<DisambiguationRequest>,
}

/// Import records and associate each. A one-record import behaves like the
/// single-record flow; anything larger never blocks.
pub fn import_performance_records(
    db: &CrmDb,
    records: Vec<PerformanceRecord>,
    inferred_type: Option<&str>,
) -> Result<BatchAssociationReport, CrmError> {
    let mode = if records.len() == 1 {
        AssociationMode::Single
    } else {
        AssociationMode::Batch
    };

    let report = db.with_transaction(|tx| {
        let mut report = BatchAssociationReport::default();
        for mut record in records {
            let customer_id = record.customer_id.take();
            tx.insert_performance_record(&record)?;
            report.imported += 1;

            match associate_in(tx, &record, customer_id.as_deref(), inferred_type, mode)? {
                AssociationOutcome::Linked {
                    created_customer, ..
                } => {
                    report.linked += 1;
                    if created_customer {
                        report.created += 1;
                    }
                }
                AssociationOutcome::NeedsDisambiguation { candidates } => {
                    report.pending = Some(DisambiguationRequest { record, candidates });
                }
                AssociationOutcome::Skipped { .. } => report.skipped += 1,
            }
        }
        Ok::<_, CrmError>(report)
    })?;

    log::info!(
        "Imported {} performance records: {} linked ({} new customers), {} skipped",
        report.imported,
        report.linked,
        report.created,
        report.skipped
    );
    Ok(report)
}

/// Records a batch import left unlinked, each with the customers sharing its
/// name. Feed the user's pick to [`resolve_disambiguation`].
pub fn pending_associations(db: &CrmDb) -> Result<Vec<DisambiguationRequest>, CrmError> {
    let mut out = Vec::new();
    for record in db.get_unassociated_performance_records()? {
        let candidates = db.find_customers_by_name(record.contractor_name.trim())?;
        out.push(DisambiguationRequest { record, candidates });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisambiguationChoice {
    Existing(String),
    CreateNew,
}

/// Finish a single-record prompt.
pub fn resolve_disambiguation(
    db: &CrmDb,
    record_id: &str,
    choice: DisambiguationChoice,
    inferred_type: Option<&str>,
) -> Result<AssociationOutcome, CrmError> {
    db.with_transaction(|tx| {
        let record = tx
            .get_performance_record(record_id)?
            .ok_or_else(|| CrmError::not_found("PerformanceRecord", record_id))?;
        match choice {
            DisambiguationChoice::Existing(customer_id) => {
                associate_in(tx, &record, Some(&customer_id), inferred_type, AssociationMode::Single)
            }
            DisambiguationChoice::CreateNew => {
                let customer = create_customer_for(tx, &record, inferred_type)?;
                link(tx, &record, &customer.id, true)
            }
        }
    })
}
