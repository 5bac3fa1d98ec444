//! Validators and validation results.
//!
//! A validator inspects the candidate read state after the integrity check
//! and before announcement. A validator that *returns* a failure is
//! `Failed`; a validator that panics is recorded as `Error` with the
//! captured panic message. `Error` always carries a cause.

use hollow_read::ReadStateEngine;
use rustc_hash::FxHashMap;

/// The type of a validation result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationResultType {
    /// The validation passed.
    Passed,
    /// The validation ran and failed.
    Failed,
    /// The validator itself failed and could not perform the validation.
    Error,
}

/// The outcome of one validator run.
#[derive(Clone, Debug)]
pub struct ValidationResult {
    pub name: String,
    pub result_type: ValidationResultType,
    pub message: Option<String>,
    pub details: FxHashMap<String, String>,
}

impl ValidationResult {
    /// A passing result.
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result_type: ValidationResultType::Passed,
            message: None,
            details: FxHashMap::default(),
        }
    }

    /// A failing result with its reason.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result_type: ValidationResultType::Failed,
            message: Some(message.into()),
            details: FxHashMap::default(),
        }
    }

    /// An error result; the cause is mandatory.
    pub fn error(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result_type: ValidationResultType::Error,
            message: Some(cause.into()),
            details: FxHashMap::default(),
        }
    }

    /// Attach a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// True when the result passed.
    pub fn is_passed(&self) -> bool {
        self.result_type == ValidationResultType::Passed
    }
}

/// The overall status of one cycle's validator runs, in execution order.
#[derive(Clone, Debug)]
pub struct ValidationStatus {
    passed: bool,
    results: Vec<ValidationResult>,
}

impl ValidationStatus {
    /// Aggregate results; passes iff every result passed.
    pub fn new(results: Vec<ValidationResult>) -> Self {
        let passed = results.iter().all(ValidationResult::is_passed);
        Self { passed, results }
    }

    /// True when every result passed.
    pub fn is_passed(&self) -> bool {
        self.passed
    }

    /// Individual results in execution order.
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }
}

/// A validator of candidate read states.
pub trait Validator: Send + Sync {
    /// The validator's name, carried on its results.
    fn name(&self) -> String;

    /// Inspect the candidate state. Panics are captured by the caller and
    /// recorded as [`ValidationResultType::Error`].
    fn validate(&self, read_state: &ReadStateEngine) -> ValidationResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_passes_iff_all_passed() {
        let all = ValidationStatus::new(vec![
            ValidationResult::passed("a"),
            ValidationResult::passed("b"),
        ]);
        assert!(all.is_passed());

        let mixed = ValidationStatus::new(vec![
            ValidationResult::passed("a"),
            ValidationResult::failed("b", "bad"),
        ]);
        assert!(!mixed.is_passed());

        let errored = ValidationStatus::new(vec![ValidationResult::error("a", "boom")]);
        assert!(!errored.is_passed());

        assert!(ValidationStatus::new(Vec::new()).is_passed());
    }

    #[test]
    fn error_results_carry_their_cause() {
        let r = ValidationResult::error("v", "panicked");
        assert_eq!(r.message.as_deref(), Some("panicked"));
        assert_eq!(r.result_type, ValidationResultType::Error);
    }
}
