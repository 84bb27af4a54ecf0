//! Engine settings

use serde::{Deserialize, Serialize};

use core_kernel::{CoreError, Timezone};

/// Tunable knobs of the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Timezone that decides "today" for due dates
    pub timezone: Timezone,
    /// Day of month installments fall due, clamped in short months
    pub installment_due_day: u32,
    /// How many code suffixes to try before giving up
    pub max_code_attempts: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            timezone: Timezone::default(),
            installment_due_day: 30,
            max_code_attempts: 999,
        }
    }
}

impl LedgerSettings {
    /// Checks that every knob is in range
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=31).contains(&self.installment_due_day) {
            return Err(CoreError::configuration(format!(
                "installment_due_day must be between 1 and 31, got {}",
                self.installment_due_day
            )));
        }
        // Suffixes are three digits
        if !(1..=999).contains(&self.max_code_attempts) {
            return Err(CoreError::configuration(format!(
                "max_code_attempts must be between 1 and 999, got {}",
                self.max_code_attempts
            )));
        }
        Ok(())
    }
}
