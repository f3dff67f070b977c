use std::error::Error;
use std::fmt::{Display, Formatter};

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Exit code for a batch where every fixture passed or was skipped.
pub const EXIT_PASSED: i32 = 0;
/// Exit code for a batch with at least one failed fixture, or a cancelled batch.
pub const EXIT_FAILED: i32 = 1;
/// Exit code for a harness-level fatal error detected before any fixture ran.
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarnessErrorCategory {
    InputValidation,
    IoSystem,
    Internal,
}

impl HarnessErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidationError",
            Self::IoSystem => "IoSystemError",
            Self::Internal => "InternalError",
        }
    }

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation | Self::IoSystem | Self::Internal => EXIT_FATAL,
        }
    }
}

/// A condition that aborts the whole run before any fixture is processed.
///
/// Per-fixture problems never take this shape; the runner folds them into the
/// fixture's verdict instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessError {
    category: HarnessErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl HarnessError {
    pub fn new(
        category: HarnessErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HarnessErrorCategory::InputValidation, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HarnessErrorCategory::IoSystem, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HarnessErrorCategory::Internal, placeholder, message)
    }

    pub const fn category(&self) -> HarnessErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for HarnessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for HarnessError {}

#[cfg(test)]
mod tests {
    use super::{EXIT_FATAL, HarnessError, HarnessErrorCategory};

    #[test]
    fn every_fatal_category_exits_with_two() {
        for category in [
            HarnessErrorCategory::InputValidation,
            HarnessErrorCategory::IoSystem,
            HarnessErrorCategory::Internal,
        ] {
            assert_eq!(category.exit_code(), EXIT_FATAL);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = HarnessError::io_system(
            "IO.FIXTURE_ROOT",
            "fixture root 'corpus' does not exist",
        );

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [IO.FIXTURE_ROOT] fixture root 'corpus' does not exist"
        );
        assert_eq!(error.fatal_exit_line(), "FATAL EXIT CODE: 2");
        assert_eq!(
            error.to_string(),
            "IoSystemError [IO.FIXTURE_ROOT] fixture root 'corpus' does not exist"
        );
    }
}
