use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while enriching points.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The input file or one of its points is unusable.
    #[error("Invalid input: {message}")]
    Input { message: String },

    #[error("Request to the archive API failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// The archive API answered with a non-success status.
    #[error("Archive API request failed with status {status}: {reason}")]
    Api { status: u16, reason: String },

    #[error("Malformed archive response: {message}")]
    MalformedResponse { message: String },

    /// No usable daily values for a statistic.
    #[error("No {variable} values between {start_date} and {end_date}")]
    EmptySeries {
        variable: &'static str,
        start_date: String,
        end_date: String,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnrichError {
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn cache<E: std::fmt::Display>(err: E) -> Self {
        Self::Cache(err.to_string())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure belongs to a single point rather than the whole run.
    ///
    /// Input and cache failures are never per-point.
    pub fn is_point_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Api { .. }
                | Self::MalformedResponse { .. }
                | Self::EmptySeries { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_mentions_status_and_reason() {
        let err = EnrichError::Api {
            status: 400,
            reason: "Parameter 'start_date' is out of range".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn only_fetch_failures_are_point_failures() {
        assert!(EnrichError::malformed("no daily block").is_point_failure());
        assert!(
            EnrichError::EmptySeries {
                variable: "rain_sum",
                start_date: "2024-03-01".into(),
                end_date: "2024-03-31".into(),
            }
            .is_point_failure()
        );
        assert!(!EnrichError::input("lat missing").is_point_failure());
        assert!(!EnrichError::cache("store closed").is_point_failure());
    }

    #[test]
    fn io_error_names_the_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = EnrichError::io("points.json", source);
        assert!(err.to_string().contains("points.json"));
    }
}
