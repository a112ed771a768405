// Autobuild Error Types
// Shared by the publisher, run monitor, proxy server and CLI

use thiserror::Error;

/// Autobuild Error
#[derive(Error, Debug)]
pub enum AutobuildError {
    /// A required input is missing or malformed (no network call was made)
    #[error("{message}")]
    Validation { message: String },

    /// The uploaded bytes could not be parsed or rebuilt as a ZIP archive
    #[error("Invalid archive: {message}")]
    ArchiveFormat { message: String },

    /// GitHub refused to create the release
    #[error("Failed to create release: {message}")]
    ReleaseCreation { message: String },

    /// GitHub refused the asset upload
    #[error("Failed to upload asset: {status} {reason} - {body}")]
    AssetUpload {
        status: u16,
        reason: String,
        body: String,
    },

    /// GitHub refused the workflow dispatch
    #[error("Failed to trigger workflow: {message}")]
    Dispatch { message: String },

    /// The workflow run could not be located or fetched
    #[error("Failed to fetch workflow runs: {message}")]
    RunLookup { message: String },

    /// The artifact listing request failed
    #[error("Failed to list artifacts: {message}")]
    ArtifactList { message: String },

    /// The artifact archive could not be downloaded
    #[error("Failed to download: {status}")]
    ArtifactDownload { status: u16 },

    /// The upload proxy answered with an error
    #[error("{message}")]
    Proxy { message: String },

    /// Remote host unreachable
    #[error("Cannot connect to {host}: {message}")]
    ConnectionFailed { host: String, message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Credential store could not be read or written
    #[error("Credential store error: {message}")]
    CredentialStore { message: String },

    /// Another publish/dispatch is already in flight for this session
    #[error("Another task is already being submitted")]
    Busy,

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Result type for autobuild operations
pub type AutobuildResult<T> = Result<T, AutobuildError>;

/// Error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutobuildErrorCode {
    Validation,
    ArchiveFormat,
    ReleaseCreation,
    AssetUpload,
    Dispatch,
    RunLookup,
    ArtifactList,
    ArtifactDownload,
    Proxy,
    ConnectionFailed,
    Config,
    CredentialStore,
    Busy,
    IoError,
    NetworkError,
    ParseError,
}

impl AutobuildErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutobuildErrorCode::Validation => "AUTOBUILD_VALIDATION",
            AutobuildErrorCode::ArchiveFormat => "AUTOBUILD_ARCHIVE_FORMAT",
            AutobuildErrorCode::ReleaseCreation => "AUTOBUILD_RELEASE_CREATION_FAILED",
            AutobuildErrorCode::AssetUpload => "AUTOBUILD_ASSET_UPLOAD_FAILED",
            AutobuildErrorCode::Dispatch => "AUTOBUILD_DISPATCH_FAILED",
            AutobuildErrorCode::RunLookup => "AUTOBUILD_RUN_LOOKUP_FAILED",
            AutobuildErrorCode::ArtifactList => "AUTOBUILD_ARTIFACT_LIST_FAILED",
            AutobuildErrorCode::ArtifactDownload => "AUTOBUILD_ARTIFACT_DOWNLOAD_FAILED",
            AutobuildErrorCode::Proxy => "AUTOBUILD_PROXY_ERROR",
            AutobuildErrorCode::ConnectionFailed => "AUTOBUILD_CONNECTION_FAILED",
            AutobuildErrorCode::Config => "AUTOBUILD_INVALID_CONFIG",
            AutobuildErrorCode::CredentialStore => "AUTOBUILD_CREDENTIAL_STORE",
            AutobuildErrorCode::Busy => "AUTOBUILD_BUSY",
            AutobuildErrorCode::IoError => "AUTOBUILD_IO_ERROR",
            AutobuildErrorCode::NetworkError => "AUTOBUILD_NETWORK_ERROR",
            AutobuildErrorCode::ParseError => "AUTOBUILD_PARSE_ERROR",
        }
    }
}

impl AutobuildError {
    pub fn code(&self) -> AutobuildErrorCode {
        match self {
            AutobuildError::Validation { .. } => AutobuildErrorCode::Validation,
            AutobuildError::ArchiveFormat { .. } => AutobuildErrorCode::ArchiveFormat,
            AutobuildError::ReleaseCreation { .. } => AutobuildErrorCode::ReleaseCreation,
            AutobuildError::AssetUpload { .. } => AutobuildErrorCode::AssetUpload,
            AutobuildError::Dispatch { .. } => AutobuildErrorCode::Dispatch,
            AutobuildError::RunLookup { .. } => AutobuildErrorCode::RunLookup,
            AutobuildError::ArtifactList { .. } => AutobuildErrorCode::ArtifactList,
            AutobuildError::ArtifactDownload { .. } => AutobuildErrorCode::ArtifactDownload,
            AutobuildError::Proxy { .. } => AutobuildErrorCode::Proxy,
            AutobuildError::ConnectionFailed { .. } => AutobuildErrorCode::ConnectionFailed,
            AutobuildError::Config { .. } => AutobuildErrorCode::Config,
            AutobuildError::CredentialStore { .. } => AutobuildErrorCode::CredentialStore,
            AutobuildError::Busy => AutobuildErrorCode::Busy,
            AutobuildError::IoError(_) => AutobuildErrorCode::IoError,
            AutobuildError::NetworkError(_) => AutobuildErrorCode::NetworkError,
            AutobuildError::ParseError(_) => AutobuildErrorCode::ParseError,
        }
    }

    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        AutobuildError::Validation {
            message: message.into(),
        }
    }

    /// True for errors raised before any request left the process
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            AutobuildError::Validation { .. } | AutobuildError::Busy | AutobuildError::Config { .. }
        )
    }
}

impl From<AutobuildError> for String {
    fn from(err: AutobuildError) -> Self {
        err.to_string()
    }
}
