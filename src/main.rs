//! Command-line front end for the agent CRM store.
//!
//! ```text
//! agent-crm [agenda [days]]     upcoming appointments (default 7 days)
//! agent-crm review              past appointments still scheduled
//! agent-crm pending             performance records waiting for a customer
//! agent-crm export <file>       write a JSON backup
//! agent-crm import <file>       replace the store with a JSON backup
//! agent-crm backup <file>       hot copy of the SQLite database
//! ```

use std::path::Path;
use std::process::ExitCode;

use chrono::{Duration, Local};

use agent_crm_lib::appointments::agenda;
use agent_crm_lib::db_backup;
use agent_crm_lib::performance::pending_associations;
use agent_crm_lib::state::{data_dir, load_config, SessionState};
use agent_crm_lib::{CrmDb, CrmError, CrmErrorPayload};

fn run(args: &[String]) -> Result<(), CrmError> {
    let config = load_config()?;
    let db = CrmDb::open(Some(&data_dir(&config)?))?;
    let session = SessionState::new(config);
    let today = Local::now().date_naive();

    match args.first().map(String::as_str).unwrap_or("agenda") {
        "agenda" => {
            let days: i64 = match args.get(1) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| CrmError::Validation(format!("Invalid day count: {raw}")))?,
                None => 7,
            };
            let to = today + Duration::days(days.max(1) - 1);
            for occ in agenda(&db, today, to, None)? {
                let base = occ.base();
                println!(
                    "{} {}  [{}] {}{}",
                    occ.date(),
                    occ.time().format("%H:%M"),
                    base.meeting_type,
                    base.display_name(),
                    if occ.is_recurring() { " (반복)" } else { "" }
                );
            }
        }
        "review" => match session.check_reconciliation(&db, today)? {
            Some(items) => {
                for appt in items {
                    println!(
                        "{} {}  [{}] {}  {}",
                        appt.date,
                        appt.time.format("%H:%M"),
                        appt.meeting_type,
                        appt.display_name(),
                        appt.id
                    );
                }
            }
            None => println!("No past appointments need review."),
        },
        "pending" => {
            for request in pending_associations(&db)? {
                let record = &request.record;
                println!(
                    "{}  {} {}  {}  ({} candidates)",
                    record.application_date,
                    record.contractor_name,
                    record.insurance_company,
                    record.id,
                    request.candidates.len()
                );
            }
        }
        "export" => {
            let path = args
                .get(1)
                .ok_or_else(|| CrmError::Validation("export needs a file path".into()))?;
            let json = db_backup::export_backup_json(&db)?;
            std::fs::write(path, json)
                .map_err(|e| CrmError::Backup(format!("Failed to write {}: {}", path, e)))?;
            println!("Exported to {path}");
        }
        "import" => {
            let path = args
                .get(1)
                .ok_or_else(|| CrmError::Validation("import needs a file path".into()))?;
            let json = std::fs::read_to_string(path)
                .map_err(|e| CrmError::Backup(format!("Failed to read {}: {}", path, e)))?;
            let summary = db_backup::import_backup_json(&db, &json)?;
            println!(
                "Imported {} appointments, {} customers, {} performance records",
                summary.appointments, summary.customers, summary.performance_records
            );
        }
        "backup" => {
            let path = args
                .get(1)
                .ok_or_else(|| CrmError::Validation("backup needs a file path".into()))?;
            let written = db_backup::backup_database_to(&db, Path::new(path))?;
            println!("Database copied to {}", written.display());
        }
        other => {
            return Err(CrmError::Validation(format!("Unknown command: {other}")));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = CrmErrorPayload::from(&err);
            log::error!("{}", payload.message);
            eprintln!("{}\n{}", payload.message, payload.recovery_suggestion);
            ExitCode::FAILURE
        }
    }
}
