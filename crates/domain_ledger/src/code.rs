//! Student code generation
//!
//! A student code looks like `2025-I-Engineering-JUPE-001`: admission name,
//! area name, the first two letters of the first and last name, and a
//! three-digit counter that makes it unique. Codes are claimed inside the
//! transaction that creates the enrollment.

use tracing::{debug, warn};

use core_kernel::EnrollmentId;

use crate::error::LedgerError;
use crate::ports::{CodeAssignment, LedgerTransaction};

/// Builds and claims unique student codes
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    max_attempts: u32,
}

impl CodeGenerator {
    /// Creates a generator that gives up after `max_attempts` suffixes
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Builds the code base `{admission}-{area}-{FFLL}`
    ///
    /// Inputs are trimmed and runs of whitespace become a single `-`.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first empty component.
    pub fn base_code(
        admission_name: &str,
        area_name: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<String, LedgerError> {
        let admission = required("admission_name", admission_name)?;
        let area = required("area_name", area_name)?;
        let first = required("first_name", first_name)?;
        let last = required("last_name", last_name)?;

        let initials = format!("{}{}", initials(first), initials(last));
        let raw = format!("{}-{}-{}", admission, area, initials);
        Ok(raw.split_whitespace().collect::<Vec<_>>().join("-"))
    }

    /// The candidate code for a 1-based counter
    pub fn candidate(base: &str, counter: u32) -> String {
        format!("{}-{:03}", base, counter)
    }

    /// Claims the first free code for `base` and stores it on the enrollment
    ///
    /// Each counter is probed first; a probe that finds the code free can
    /// still lose to a concurrent writer, in which case the next counter is
    /// tried.
    ///
    /// # Errors
    ///
    /// Returns a conflict carrying the last attempted code once every counter
    /// up to the bound is taken.
    pub async fn assign(
        &self,
        tx: &mut dyn LedgerTransaction,
        enrollment_id: EnrollmentId,
        base: &str,
    ) -> Result<String, LedgerError> {
        let mut last_attempt = None;

        for counter in 1..=self.max_attempts {
            let code = Self::candidate(base, counter);

            if tx.code_exists(&code).await? {
                debug!(code = %code, "Student code in use, trying next suffix");
                last_attempt = Some(code);
                continue;
            }

            match tx.assign_code(enrollment_id, &code).await? {
                CodeAssignment::Assigned => {
                    debug!(code = %code, enrollment_id = %enrollment_id, "Student code assigned");
                    return Ok(code);
                }
                CodeAssignment::Taken => {
                    warn!(code = %code, "Student code claimed concurrently, retrying with next suffix");
                    last_attempt = Some(code);
                }
            }
        }

        let last = last_attempt.unwrap_or_else(|| base.to_string());
        Err(LedgerError::conflict(
            last.clone(),
            format!("no free student code after {} attempts, last tried {}", self.max_attempts, last),
        ))
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, LedgerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(field, "must not be empty"));
    }
    Ok(trimmed)
}

fn initials(name: &str) -> String {
    name.chars().take(2).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_code_format() {
        let base = CodeGenerator::base_code("2025-I", "Engineering", "juan", "perez").unwrap();
        assert_eq!(base, "2025-I-Engineering-JUPE");
    }

    #[test]
    fn test_base_code_replaces_whitespace_runs() {
        let base = CodeGenerator::base_code(" Admission  2025 ", "Health   Sciences", "Ana", "Lopez").unwrap();
        assert_eq!(base, "Admission-2025-Health-Sciences-ANLO");
    }

    #[test]
    fn test_base_code_single_letter_name() {
        let base = CodeGenerator::base_code("ADM", "AREA", "J", "li").unwrap();
        assert_eq!(base, "ADM-AREA-JLI");
    }

    #[test]
    fn test_base_code_rejects_empty_component() {
        let err = CodeGenerator::base_code("ADM", "  ", "Ana", "Lopez").unwrap_err();
        assert!(matches!(err, LedgerError::Validation { ref field, .. } if field == "area_name"));
        assert!(CodeGenerator::base_code("ADM", "AREA", "Ana", "").is_err());
    }

    #[test]
    fn test_candidate_zero_pads() {
        assert_eq!(CodeGenerator::candidate("A-B-CCDD", 1), "A-B-CCDD-001");
        assert_eq!(CodeGenerator::candidate("A-B-CCDD", 42), "A-B-CCDD-042");
        assert_eq!(CodeGenerator::candidate("A-B-CCDD", 999), "A-B-CCDD-999");
    }
}
