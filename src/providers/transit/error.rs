use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("No journey options returned")]
    NoJourney,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_api_error() {
        let err = TransitError::ApiError("HTTP error: 503".into());
        assert_eq!(err.to_string(), "API error: HTTP error: 503");
    }

    #[test]
    fn error_display_parse_error() {
        let err = TransitError::ParseError("missing field `trips`".into());
        assert_eq!(err.to_string(), "Parse error: missing field `trips`");
    }

    #[test]
    fn error_display_no_journey() {
        let err = TransitError::NoJourney;
        assert_eq!(err.to_string(), "No journey options returned");
    }
}
