use std::error::Error;
use std::fmt::{Display, Formatter};

pub type HafxResult<T> = Result<T, HafxError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HafxErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl HafxErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HafxErrorKind {
    InvalidTable,
    Extrapolation,
    ResolutionModel,
    MissingConfiguration,
    NotSimulated,
    MissingSpectrum,
    InvalidInput,
    InvalidRecord,
    Io,
    Internal,
}

impl HafxErrorKind {
    pub const fn category(self) -> HafxErrorCategory {
        match self {
            Self::InvalidTable
            | Self::MissingConfiguration
            | Self::MissingSpectrum
            | Self::InvalidInput
            | Self::InvalidRecord => HafxErrorCategory::InputValidationError,
            Self::Io => HafxErrorCategory::IoSystemError,
            Self::Extrapolation | Self::ResolutionModel | Self::NotSimulated => {
                HafxErrorCategory::ComputationError
            }
            Self::Internal => HafxErrorCategory::InternalError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HafxError {
    kind: HafxErrorKind,
    placeholder: &'static str,
    message: String,
}

impl HafxError {
    pub fn new(kind: HafxErrorKind, placeholder: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            placeholder,
            message: message.into(),
        }
    }

    pub fn invalid_table(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::InvalidTable, placeholder, message)
    }

    pub fn extrapolation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::Extrapolation, placeholder, message)
    }

    pub fn resolution_model(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::ResolutionModel, placeholder, message)
    }

    pub fn missing_configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::MissingConfiguration, placeholder, message)
    }

    pub fn not_simulated(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::NotSimulated, placeholder, message)
    }

    pub fn missing_spectrum(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::MissingSpectrum, placeholder, message)
    }

    pub fn invalid_input(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::InvalidInput, placeholder, message)
    }

    pub fn invalid_record(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::InvalidRecord, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::Io, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(HafxErrorKind::Internal, placeholder, message)
    }

    pub const fn kind(&self) -> HafxErrorKind {
        self.kind
    }

    pub const fn category(&self) -> HafxErrorCategory {
        self.kind.category()
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.kind.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for HafxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category().as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for HafxError {}
