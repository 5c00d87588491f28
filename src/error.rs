use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PassesError>;

#[derive(Error, Debug)]
pub enum PassesError {
    #[error("cannot {action} {}: {source}", .path.display())]
    File {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {context}: {message}")]
    Parse { context: String, message: String },

    #[error("fetching pass catalog: {0}")]
    Network(#[from] NetworkError),

    #[error("track {} contains no points", .path.display())]
    EmptyTrack { path: PathBuf },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no elevation for placemark '{placemark}': {reason}")]
    ElevationParse { placemark: String, reason: String },
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl PassesError {
    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        PassesError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn file(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PassesError::File {
            action,
            path: path.into(),
            source,
        }
    }

    /// Appends where the malformed input came from to a `Parse` error's context.
    /// Other variants pass through unchanged.
    pub fn located(self, origin: impl Display) -> Self {
        match self {
            PassesError::Parse { context, message } => PassesError::Parse {
                context: format!("{context} {origin}"),
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_names_path_and_action() {
        let err = PassesError::file(
            "read",
            "/no/such/track.gpx",
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cannot read"), "got {msg}");
        assert!(msg.contains("/no/such/track.gpx"), "got {msg}");
    }

    #[test]
    fn test_located_adds_origin_to_parse_errors_only() {
        let err = PassesError::parse("catalog", "unexpected end of document")
            .located("from https://westra.ru/passes/kml/passes.php?BBOX=1,2,3,4");
        assert_eq!(
            err.to_string(),
            "malformed catalog from https://westra.ru/passes/kml/passes.php?BBOX=1,2,3,4: unexpected end of document"
        );

        let err = PassesError::InvalidArgument("offset".to_string()).located("from nowhere");
        assert_eq!(err.to_string(), "invalid argument: offset");
    }

    #[test]
    fn test_network_error_converts_into_passes_error() {
        let err: PassesError = NetworkError::HttpStatus {
            url: "https://example.org/x".to_string(),
            status: 404,
        }
        .into();
        assert!(matches!(
            err,
            PassesError::Network(NetworkError::HttpStatus { status: 404, .. })
        ));
        assert!(err.to_string().contains("HTTP 404"));
    }
}
