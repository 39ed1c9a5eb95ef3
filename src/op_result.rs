use jiff::Timestamp;
use std::path::PathBuf;

/// Outcome record for one attempted operation (bagging, validation).
///
/// Content and structural problems accumulate in `errors` as ordered,
/// human-readable strings; the run succeeded iff that list is empty and no
/// runtime failure aborted it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationResult {
    pub operation: String,
    pub provider: String,
    /// Produced bag path (bagging) or inspected bag path (validation)
    pub filepath: Option<PathBuf>,
    pub filesize: u64,
    pub attempt_number: u32,
    pub started: Option<Timestamp>,
    pub completed: Option<Timestamp>,
    pub succeeded: bool,
    pub errors: Vec<String>,
    pub info: Vec<String>,
    pub warnings: Vec<String>,
}

impl OperationResult {
    pub fn new(operation: &str, provider: &str) -> Self {
        Self {
            operation: operation.to_string(),
            provider: provider.to_string(),
            attempt_number: 1,
            ..Self::default()
        }
    }

    /// Mark the start of an attempt.
    pub fn start(&mut self) {
        self.started = Some(Timestamp::now());
    }

    /// Mark the attempt finished; success requires an empty error list.
    pub fn finish(&mut self) {
        self.completed = Some(Timestamp::now());
        self.succeeded = self.errors.is_empty();
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn add_info(&mut self, message: impl Into<String>) {
        self.info.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Clear everything except operation, provider and attempt number.
    /// The retrying caller bumps the attempt count itself.
    pub fn reset(&mut self) {
        let operation = std::mem::take(&mut self.operation);
        let provider = std::mem::take(&mut self.provider);
        let attempt_number = self.attempt_number;
        *self = Self {
            operation,
            provider,
            attempt_number,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finish_requires_no_errors() {
        let mut result = OperationResult::new("bagging", "bagit_engine");
        result.start();
        result.finish();
        assert!(result.succeeded);
        assert!(result.started.is_some());
        assert!(result.completed.is_some());

        let mut result = OperationResult::new("bagging", "bagit_engine");
        result.start();
        result.add_error("disk full");
        result.finish();
        assert!(!result.succeeded);
    }

    #[test]
    fn reset_keeps_identity_and_attempt_number() {
        let mut result = OperationResult::new("validation", "bagit_engine");
        result.start();
        result.attempt_number = 3;
        result.filepath = Some(PathBuf::from("/tmp/bag.tar"));
        result.filesize = 1024;
        result.add_error("checksum mismatch");
        result.finish();

        result.reset();
        assert_eq!(result.operation, "validation");
        assert_eq!(result.provider, "bagit_engine");
        assert_eq!(result.attempt_number, 3);
        assert_eq!(result.filepath, None);
        assert_eq!(result.filesize, 0);
        assert!(result.errors.is_empty());
        assert!(result.started.is_none());
        assert!(!result.succeeded);
    }
}
