use reqwest::StatusCode;
use research_api::error::parse_error_message;
use research_api::ApiError;

#[test]
fn status_taxonomy_maps_known_codes() {
    assert!(matches!(
        ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"detail":"Not authenticated"}"#),
        ApiError::Unauthorized(ref message) if message == "Not authenticated"
    ));
    assert!(matches!(
        ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
        ApiError::RateLimited(ref message) if message == "Too Many Requests"
    ));
    assert!(matches!(
        ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail":"Conversation not found"}"#),
        ApiError::NotFound(_)
    ));

    let server = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
    assert_eq!(server.status(), Some(StatusCode::BAD_GATEWAY));
    assert_eq!(server.to_string(), "HTTP 502 Bad Gateway upstream down");
}

#[test]
fn error_message_prefers_detail_then_error_then_raw_body() {
    let status = StatusCode::UNPROCESSABLE_ENTITY;
    assert_eq!(
        parse_error_message(status, r#"{"detail":"topic too short"}"#),
        "topic too short"
    );
    assert_eq!(
        parse_error_message(status, r#"{"error":"Internal server error","message":"boom"}"#),
        "Internal server error"
    );
    assert_eq!(
        parse_error_message(status, r#"{"detail":[{"loc":["body","topic"]}]}"#),
        r#"[{"loc":["body","topic"]}]"#
    );
    assert_eq!(parse_error_message(status, "plain failure"), "plain failure");
    assert_eq!(parse_error_message(status, "   "), "Unprocessable Entity");
}

#[test]
fn user_messages_guide_recovery() {
    assert!(ApiError::MissingAccessToken.is_auth());
    assert_eq!(
        ApiError::Unauthorized(String::new()).user_message(),
        "Authentication required. Please sign in and try again."
    );
    assert_eq!(
        ApiError::RateLimited(String::new()).user_message(),
        "Rate limit exceeded. Please wait a moment and try again."
    );
    assert!(ApiError::Stream("reset".to_string())
        .user_message()
        .starts_with("Request failed:"));
}
