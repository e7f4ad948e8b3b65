use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("Workbook write error: {0}")]
    WorkbookError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Source is missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Unsupported source '{path}': {reason}")]
    UnsupportedSource { path: String, reason: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Notification to {recipient} failed: {message}")]
    NotificationError { recipient: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Processing,
    Output,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::CsvError(_)
            | EtlError::SpreadsheetError(_)
            | EtlError::MissingColumns { .. }
            | EtlError::UnsupportedSource { .. } => ErrorCategory::Source,
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                ErrorCategory::Processing
            }
            EtlError::ZipError(_)
            | EtlError::WorkbookError(_)
            | EtlError::IoError(_)
            | EtlError::SerializationError(_) => ErrorCategory::Output,
            EtlError::ApiError(_) | EtlError::NotificationError { .. } => ErrorCategory::Delivery,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單筆通知失敗可以重試，不影響資料
            EtlError::ApiError(_) | EtlError::NotificationError { .. } => ErrorSeverity::Medium,
            EtlError::IoError(_) | EtlError::ZipError(_) | EtlError::WorkbookError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                "Check that the input file exists and the path in [source] is correct".to_string()
            }
            EtlError::IoError(_) => {
                "Check file permissions and free disk space for the output directory".to_string()
            }
            EtlError::CsvError(_) => {
                "Make sure the source file is valid CSV/TSV with a header row".to_string()
            }
            EtlError::SpreadsheetError(_) => {
                "Make sure the workbook opens in Excel and its first sheet has a header row"
                    .to_string()
            }
            EtlError::MissingColumns { .. } => {
                "Add the missing columns or map them with [extract.field_mapping]".to_string()
            }
            EtlError::UnsupportedSource { .. } => {
                "Convert the source to .csv, .tsv, .xlsx or .xls".to_string()
            }
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => {
                "Review the TOML configuration file and environment variables".to_string()
            }
            EtlError::ApiError(_) | EtlError::NotificationError { .. } => {
                "Check connectivity to the notification transport and retry".to_string()
            }
            EtlError::ZipError(_) | EtlError::WorkbookError(_) | EtlError::SerializationError(_) => {
                "Check the output directory and try again".to_string()
            }
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                "Inspect the input data; run with --verbose for details".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Source => format!("Could not read birthday data: {}", self),
            ErrorCategory::Processing => format!("Could not process birthday data: {}", self),
            ErrorCategory::Output => format!("Could not write results: {}", self),
            ErrorCategory::Delivery => format!("Could not deliver notification: {}", self),
        }
    }

    /// 依嚴重程度決定程序結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
