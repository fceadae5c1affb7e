use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// This type wraps the error kinds of the individual pipeline stages and
/// provides a single error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExportError {
    /// Feature retrieval errors.
    Fetch(FetchError),

    /// Payload parsing errors.
    Parse(ParseError),

    /// Reprojection errors.
    Geometry(GeometryError),

    /// Output encoding errors.
    Serialization(SerializationError),

    /// Artifact save errors.
    Artifact(ArtifactError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Feature retrieval errors.
#[derive(Debug)]
pub enum FetchError {
    /// The service URL could not be parsed.
    InvalidUrl(String),

    /// The HTTP request could not be completed.
    Request(String),

    /// The request did not finish within the configured timeout.
    Timeout,

    /// The service answered with a non-success status.
    Status { status: u16, url: String },

    /// The service answered with an OWS exception report instead of features.
    ServiceException(String),

    /// Paging went back to an earlier page while features were still missing.
    PagingIgnored { offset: u64 },
}

/// Payload parsing errors.
#[derive(Debug)]
pub enum ParseError {
    /// The payload is not valid JSON or does not match the GeoJSON shapes.
    InvalidJson(String),

    /// The payload is JSON but not a FeatureCollection.
    NotAFeatureCollection(String),
}

/// Reprojection errors.
#[derive(Debug)]
pub enum GeometryError {
    /// A position holds fewer than two ordinates.
    InvalidPosition { index: usize, len: usize },

    /// A position holds a NaN or infinite ordinate.
    NonFiniteCoordinate { index: usize },

    /// No transform is known for the reference system.
    UnsupportedCrs(String),

    /// The coordinate transform rejected a position.
    TransformFailed(String),
}

/// Output encoding errors.
#[derive(Debug)]
pub enum SerializationError {
    /// GeoJSON encoding failed.
    Json(String),

    /// Delimited-text encoding failed.
    Tabular(String),
}

/// Artifact save errors.
#[derive(Debug)]
pub enum ArtifactError {
    /// The filename is empty or would escape the download directory.
    InvalidFilename(String),

    /// Writing the artifact failed.
    WriteFailed(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Fetch(e) => write!(f, "Fetch error: {e}"),
            ExportError::Parse(e) => write!(f, "Parse error: {e}"),
            ExportError::Geometry(e) => write!(f, "Geometry error: {e}"),
            ExportError::Serialization(e) => write!(f, "Serialization error: {e}"),
            ExportError::Artifact(e) => write!(f, "Export error: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidUrl(url) => write!(f, "Invalid service URL: {url}"),
            FetchError::Request(msg) => write!(f, "Request failed: {msg}"),
            FetchError::Timeout => write!(f, "Request timed out"),
            FetchError::Status { status, url } => {
                write!(f, "Service returned HTTP {status} for {url}")
            }
            FetchError::ServiceException(msg) => write!(f, "Service exception: {msg}"),
            FetchError::PagingIgnored { offset } => write!(
                f,
                "Service ignored startIndex at offset {offset}, the layer cannot be retrieved completely"
            ),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidJson(msg) => write!(f, "Invalid GeoJSON: {msg}"),
            ParseError::NotAFeatureCollection(kind) => {
                write!(f, "Expected a FeatureCollection, found '{kind}'")
            }
        }
    }
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::InvalidPosition { index, len } => {
                write!(f, "Position #{index} has {len} ordinate(s), expected at least 2")
            }
            GeometryError::NonFiniteCoordinate { index } => {
                write!(f, "Position #{index} has a non-finite ordinate")
            }
            GeometryError::UnsupportedCrs(code) => {
                write!(f, "Unsupported reference system: {code}")
            }
            GeometryError::TransformFailed(msg) => write!(f, "Transform failed: {msg}"),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::Json(msg) => write!(f, "GeoJSON encoding failed: {msg}"),
            SerializationError::Tabular(msg) => write!(f, "CSV encoding failed: {msg}"),
        }
    }
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::InvalidFilename(name) => write!(f, "Invalid filename: '{name}'"),
            ArtifactError::WriteFailed(msg) => write!(f, "Failed to save file: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {}
impl std::error::Error for FetchError {}
impl std::error::Error for ParseError {}
impl std::error::Error for GeometryError {}
impl std::error::Error for SerializationError {}
impl std::error::Error for ArtifactError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<FetchError> for ExportError {
    fn from(err: FetchError) -> Self {
        ExportError::Fetch(err)
    }
}

impl From<ParseError> for ExportError {
    fn from(err: ParseError) -> Self {
        ExportError::Parse(err)
    }
}

impl From<GeometryError> for ExportError {
    fn from(err: GeometryError) -> Self {
        ExportError::Geometry(err)
    }
}

impl From<SerializationError> for ExportError {
    fn from(err: SerializationError) -> Self {
        ExportError::Serialization(err)
    }
}

impl From<ArtifactError> for ExportError {
    fn from(err: ArtifactError) -> Self {
        ExportError::Artifact(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        ExportError::Fetch(err.into())
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err: ExportError = FetchError::Status {
            status: 503,
            url: "https://example.org/wfs".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Fetch error: Service returned HTTP 503 for https://example.org/wfs"
        );
    }

    #[test]
    fn test_geometry_error_display() {
        let err = GeometryError::InvalidPosition { index: 3, len: 1 };
        assert_eq!(
            err.to_string(),
            "Position #3 has 1 ordinate(s), expected at least 2"
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: ExportError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ExportError::Io(_)));
    }
}
