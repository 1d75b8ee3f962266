//! Status code classification used while finalizing a response.

use http::StatusCode;

/// Statuses whose responses must not carry a body.
pub fn is_empty_body(status: StatusCode) -> bool {
    matches!(status.as_u16(), 204 | 205 | 304)
}

/// Statuses a redirect keeps instead of falling back to `302 Found`.
pub fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 300 | 301 | 302 | 303 | 305 | 307 | 308)
}

/// The canonical reason phrase, or an empty string for unknown codes.
pub fn message(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_class() {
        assert!(is_empty_body(StatusCode::NO_CONTENT));
        assert!(is_empty_body(StatusCode::RESET_CONTENT));
        assert!(is_empty_body(StatusCode::NOT_MODIFIED));
        assert!(!is_empty_body(StatusCode::OK));
        assert!(!is_empty_body(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_redirect_class() {
        assert!(is_redirect(StatusCode::MOVED_PERMANENTLY));
        assert!(is_redirect(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_redirect(StatusCode::NOT_MODIFIED));
        assert!(!is_redirect(StatusCode::OK));
    }

    #[test]
    fn test_message() {
        assert_eq!(message(StatusCode::NOT_FOUND), "Not Found");
        assert_eq!(message(StatusCode::from_u16(599).unwrap()), "");
    }
}
