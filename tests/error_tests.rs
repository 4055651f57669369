//! Tests for the error system.

use concierge::error::*;
use pretty_assertions::assert_eq;

#[test]
fn error_api_creation() {
    let err = ConciergeError::api(404, "Not found");
    assert!(matches!(&err, ConciergeError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "API error (status 404): Not found");
}

#[test]
fn tool_errors_display_only_their_message() {
    let err = ConciergeError::tool("parse_date", "Could not parse date: 'someday'");
    assert_eq!(err.to_string(), "Could not parse date: 'someday'");
    assert!(err.is_tool_scoped());
    assert_eq!(
        ConciergeError::ToolNotFound("send_email".into()).to_string(),
        "Tool 'send_email' not found"
    );
}

#[test]
fn into_upstream_wraps_once() {
    let err = ConciergeError::api(503, "busy").into_upstream();
    assert!(matches!(&err, ConciergeError::Upstream(m) if m == "API error (status 503): busy"));

    let again = err.into_upstream();
    assert!(matches!(&again, ConciergeError::Upstream(m) if m == "API error (status 503): busy"));
    assert!(!again.is_tool_scoped());
}

#[test]
fn error_helper_mappings_are_stable_for_major_variants() {
    struct Case {
        error: ConciergeError,
        expected_category: ErrorCategory,
        expected_retryable: bool,
        expected_recovery: RecoverySuggestion,
    }

    let network_error = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    let io_error = std::io::Error::new(std::io::ErrorKind::Other, "disk");
    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        Case {
            error: ConciergeError::Authentication("bad-key".to_string()),
            expected_category: ErrorCategory::Authentication,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckCredentials,
        },
        Case {
            error: ConciergeError::RateLimited {
                retry_after_ms: Some(1000),
            },
            expected_category: ErrorCategory::RateLimit,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: ConciergeError::Timeout(5000),
            expected_category: ErrorCategory::Timeout,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::IncreaseTimeout,
        },
        Case {
            error: ConciergeError::Configuration("bad-config".to_string()),
            expected_category: ErrorCategory::Configuration,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: ConciergeError::Network(network_error),
            expected_category: ErrorCategory::Network,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: ConciergeError::Serialization(serde_error),
            expected_category: ErrorCategory::Serialization,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: ConciergeError::tool("tool-a", "failed"),
            expected_category: ErrorCategory::ToolExecution,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckToolImplementation,
        },
        Case {
            error: ConciergeError::ToolNotFound("missing".to_string()),
            expected_category: ErrorCategory::ToolExecution,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckToolImplementation,
        },
        Case {
            error: ConciergeError::api(401, "Unauthorized"),
            expected_category: ErrorCategory::Authentication,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckCredentials,
        },
        Case {
            error: ConciergeError::api(429, "Rate limited"),
            expected_category: ErrorCategory::RateLimit,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: ConciergeError::api(503, "Server unavailable"),
            expected_category: ErrorCategory::Server,
            expected_retryable: true,
            expected_recovery: RecoverySuggestion::RetryWithBackoff,
        },
        Case {
            error: ConciergeError::api(418, "Teapot"),
            expected_category: ErrorCategory::Api,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: ConciergeError::Io(io_error),
            expected_category: ErrorCategory::Persistence,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckStorage,
        },
        Case {
            error: ConciergeError::Persistence {
                path: "history.json".to_string(),
                message: "read-only".to_string(),
            },
            expected_category: ErrorCategory::Persistence,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::CheckStorage,
        },
        Case {
            error: ConciergeError::Stream("stream-error".to_string()),
            expected_category: ErrorCategory::Upstream,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: ConciergeError::Upstream("closed".to_string()),
            expected_category: ErrorCategory::Upstream,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: ConciergeError::UnsupportedOperation("unsupported".to_string()),
            expected_category: ErrorCategory::Unknown,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
        Case {
            error: ConciergeError::InvalidArgument("bad-arg".to_string()),
            expected_category: ErrorCategory::Unknown,
            expected_retryable: false,
            expected_recovery: RecoverySuggestion::ContactSupport,
        },
    ];

    for case in cases {
        assert_eq!(case.error.category(), case.expected_category, "{}", case.error);
        assert_eq!(case.error.is_retryable(), case.expected_retryable, "{}", case.error);
        assert_eq!(case.error.recovery_suggestion(), case.expected_recovery, "{}", case.error);
    }
}

#[test]
fn persistence_warning_names_the_path() {
    let warning = PersistenceWarning::new("/tmp/history.json", "permission denied");
    assert_eq!(warning.to_string(), "/tmp/history.json: permission denied");
}
