use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SpectroResult<T> = Result<T, SpectroError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectroErrorCategory {
    Success,
    AcquisitionError,
    ValidationError,
    NumericalError,
    ConfigurationError,
    IoSystemError,
    InternalError,
}

impl SpectroErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::AcquisitionError => 2,
            Self::ValidationError => 3,
            Self::NumericalError => 4,
            Self::ConfigurationError => 5,
            Self::IoSystemError => 6,
            Self::InternalError => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::AcquisitionError => "AcquisitionError",
            Self::ValidationError => "ValidationError",
            Self::NumericalError => "NumericalError",
            Self::ConfigurationError => "ConfigurationError",
            Self::IoSystemError => "IoSystemError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl Display for SpectroErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Crate-wide error carrying a category, a stable dotted placeholder such as
/// `NUMERIC.BASELINE` and a human readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectroError {
    category: SpectroErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl SpectroError {
    pub fn new(
        category: SpectroErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn acquisition(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::AcquisitionError, placeholder, message)
    }

    pub fn validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::ValidationError, placeholder, message)
    }

    pub fn numerical(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::NumericalError, placeholder, message)
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::ConfigurationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> SpectroErrorCategory {
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
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for SpectroError {
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

impl Error for SpectroError {}

#[cfg(test)]
mod tests {
    use super::{SpectroError, SpectroErrorCategory};

    #[test]
    fn exit_mapping_is_stable() {
        let cases = [
            (SpectroErrorCategory::Success, 0, "Success"),
            (SpectroErrorCategory::AcquisitionError, 2, "AcquisitionError"),
            (SpectroErrorCategory::ValidationError, 3, "ValidationError"),
            (SpectroErrorCategory::NumericalError, 4, "NumericalError"),
            (
                SpectroErrorCategory::ConfigurationError,
                5,
                "ConfigurationError",
            ),
            (SpectroErrorCategory::IoSystemError, 6, "IoSystemError"),
            (SpectroErrorCategory::InternalError, 7, "InternalError"),
        ];

        for (category, exit_code, name) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.as_str(), name);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = SpectroError::numerical(
            "NUMERIC.BASELINE",
            "penalized system is not positive definite at row 3",
        );

        assert_eq!(error.exit_code(), 4);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [NUMERIC.BASELINE] penalized system is not positive definite at row 3"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 4")
        );
    }

    #[test]
    fn success_category_has_no_fatal_line() {
        let info = SpectroError::new(SpectroErrorCategory::Success, "RUN.DONE", "ok");
        assert_eq!(info.diagnostic_line(), "INFO: [RUN.DONE] ok");
        assert!(info.fatal_exit_line().is_none());
    }
}
