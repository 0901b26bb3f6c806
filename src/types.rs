/// Terminal outcome of one queued request, keyed by its id.
///
/// Failures are carried as data: `success == false` with either a non-zero
/// `http_code` (status outside `[200, 400)`) or `http_code == 0` and a
/// populated `error` (no response was ever received).
#[derive(Clone, Debug, PartialEq)]
pub struct CallResult {
    /// A response was received and its status fell in `[200, 400)`.
    pub success: bool,
    /// HTTP status code, `0` when no response was received.
    pub http_code: u16,
    /// Raw response payload, empty when none.
    pub body: String,
    /// Transport or validation error description, empty on success and on
    /// plain HTTP-status failures.
    pub error: String,
    /// Wall-clock seconds from the first attempt to the terminal outcome,
    /// retries and retry delays included.
    pub duration_secs: f64,
}

impl CallResult {
    pub(crate) fn from_response(http_code: u16, body: String, duration_secs: f64) -> Self {
        Self {
            success: (200..400).contains(&http_code),
            http_code,
            body,
            error: String::new(),
            duration_secs,
        }
    }

    pub(crate) fn from_error(error: String, duration_secs: f64) -> Self {
        Self {
            success: false,
            http_code: 0,
            body: String::new(),
            error,
            duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CallResult;

    #[test]
    fn success_tracks_the_status_range() {
        assert!(CallResult::from_response(200, String::new(), 0.1).success);
        assert!(CallResult::from_response(302, String::new(), 0.1).success);
        assert!(!CallResult::from_response(404, String::new(), 0.1).success);
        assert!(!CallResult::from_response(500, String::new(), 0.1).success);
    }

    #[test]
    fn error_results_have_no_status() {
        let result = CallResult::from_error("dns failure".to_owned(), 0.2);
        assert!(!result.success);
        assert_eq!(result.http_code, 0);
        assert!(result.body.is_empty());
        assert_eq!(result.error, "dns failure");
    }
}
