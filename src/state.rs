//! Configuration loading and per-session state.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::db::CrmDb;
use crate::error::CrmError;
use crate::reconcile::ReconciliationGate;
use crate::types::{Appointment, AppointmentStatus, CrmConfig};
use crate::wizard::{WizardEffects, WizardKind, WizardOrigin, WizardSession};

/// `~/.agent-crm`
pub fn app_dir() -> Result<PathBuf, CrmError> {
    let home = dirs::home_dir().ok_or_else(|| CrmError::Config("Could not find home directory".into()))?;
    Ok(home.join(".agent-crm"))
}

pub fn config_path() -> Result<PathBuf, CrmError> {
    Ok(app_dir()?.join("config.json"))
}

/// Load `~/.agent-crm/config.json`. A missing file yields the defaults.
pub fn load_config() -> Result<CrmConfig, CrmError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<CrmConfig, CrmError> {
    if !path.exists() {
        log::debug!("No config at {}; using defaults", path.display());
        return Ok(CrmConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| CrmError::Config(format!("Failed to read config: {}", e)))?;
    let config: CrmConfig = serde_json::from_str(&content)
        .map_err(|e| CrmError::Config(format!("Failed to parse config: {}", e)))?;

    if config.follow_up_offset_days < 0 || config.reschedule_offset_days < 0 {
        return Err(CrmError::Config("Offsets must not be negative".into()));
    }
    Ok(config)
}

/// Write the config, creating the directory if needed.
pub fn save_config_to(path: &Path, config: &CrmConfig) -> Result<(), CrmError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| CrmError::Config(format!("Failed to create config dir: {}", e)))?;
        }
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| CrmError::Config(format!("Failed to serialize config: {}", e)))?;
    fs::write(path, content).map_err(|e| CrmError::Config(format!("Failed to write config: {}", e)))
}

/// Directory holding the database: the configured one, else `~/.agent-crm`.
pub fn data_dir(config: &CrmConfig) -> Result<PathBuf, CrmError> {
    match config.data_dir.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => app_dir(),
    }
}

/// State that lives for one app session.
pub struct SessionState {
    pub config: CrmConfig,
    reconciliation: Mutex<ReconciliationGate>,
    open_wizards: Mutex<HashSet<WizardKey>>,
}

/// Appointment id plus, for a series, the occurrence being completed.
type WizardKey = (String, Option<NaiveDate>);

fn wizard_key(origin: &WizardOrigin) -> WizardKey {
    let occurrence = origin
        .occurrence_date
        .filter(|_| origin.appointment.is_recurring());
    (origin.appointment_id().to_string(), occurrence)
}

impl SessionState {
    pub fn new(config: CrmConfig) -> Self {
        Self {
            config,
            reconciliation: Mutex::new(ReconciliationGate::new()),
            open_wizards: Mutex::new(HashSet::new()),
        }
    }

    /// Past-due review list, returned at most once per session.
    pub fn check_reconciliation(
        &self,
        db: &CrmDb,
        today: NaiveDate,
    ) -> Result<Option<Vec<Appointment>>, CrmError> {
        if self.reconciliation.lock().has_been_shown() {
            return Ok(None);
        }
        let scheduled = db.get_appointments_by_status(AppointmentStatus::Scheduled)?;
        Ok(self.reconciliation.lock().check(&scheduled, today))
    }

    /// Open a wizard. Only one wizard per origin may be open; each
    /// occurrence of a series is its own origin.
    pub fn open_wizard(&self, kind: WizardKind, origin: WizardOrigin) -> Result<WizardSession, CrmError> {
        let key = wizard_key(&origin);
        let session = WizardSession::new(kind, origin)?;
        let mut open = self.open_wizards.lock();
        if open.contains(&key) {
            let label = match key.1 {
                Some(date) => format!("{}@{}", key.0, date),
                None => key.0,
            };
            return Err(CrmError::WizardAlreadyOpen(label));
        }
        log::debug!("Opened {} wizard for {} ({:?})", kind, key.0, key.1);
        open.insert(key);
        Ok(session)
    }

    /// Cancel: nothing is written.
    pub fn close_wizard(&self, session: WizardSession) {
        self.open_wizards.lock().remove(&wizard_key(session.origin()));
    }

    /// Whether a wizard is open for the appointment, or for that one
    /// occurrence when `occurrence_date` is given.
    pub fn is_wizard_open(&self, appointment_id: &str, occurrence_date: Option<NaiveDate>) -> bool {
        let key = (appointment_id.to_string(), occurrence_date);
        self.open_wizards.lock().contains(&key)
    }

    /// Commit and close. On failure the wizard stays open for a retry.
    pub fn commit_wizard(&self, db: &CrmDb, session: &WizardSession) -> Result<WizardEffects, CrmError> {
        let effects = session.commit(db)?;
        self.open_wizards.lock().remove(&wizard_key(session.origin()));
        Ok(effects)
    }
}
