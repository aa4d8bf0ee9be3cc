//! Content-hash contract: determinism, tamper evidence, round-trips.

use serde_json::json;
use tibet_core::{Token, TokenParams, TokenState};

fn rich_token() -> Token {
    let mut params = TokenParams::new(
        "tibet_rich",
        "api_call",
        "2026-08-07T09:30:00.000000Z",
        "jis:humotica:gateway",
    );
    params.erin = json!({
        "endpoint": "/users",
        "method": "GET",
        "nested": {"page": 2, "filters": ["active", "admin"]},
    });
    params.eraan = vec!["jis:humotica:user_service".into(), "req-42".into()];
    params.eromheen.insert("ip".into(), json!("192.168.1.1"));
    params.eromheen.insert("session".into(), json!("abc123"));
    params.erachter = "fetch user list for admin dashboard".into();
    params.parent_id = Some("tibet_parent".into());
    params.state = TokenState::Classified;
    Token::new(params).expect("token")
}

#[test]
fn identical_fields_identical_digest() {
    assert_eq!(rich_token().content_hash, rich_token().content_hash);
}

#[test]
fn every_semantic_field_feeds_the_hash() {
    let base = rich_token();

    let variations: Vec<Box<dyn Fn(&mut Token)>> = vec![
        Box::new(|t| t.token_id.push('x')),
        Box::new(|t| t.action.push('x')),
        Box::new(|t| t.timestamp.push('x')),
        Box::new(|t| t.actor.push('x')),
        Box::new(|t| t.erin = json!({"changed": true})),
        Box::new(|t| t.eraan.push("extra".into())),
        Box::new(|t| {
            t.eromheen.insert("extra".into(), json!(1));
        }),
        Box::new(|t| t.erachter.push('x')),
        Box::new(|t| t.parent_id = None),
        Box::new(|t| t.state = TokenState::Resolved),
    ];

    for mutate in variations {
        let mut tampered = base.clone();
        mutate(&mut tampered);
        assert!(
            !tampered.verify(),
            "mutation left verification intact: {tampered:?}"
        );
    }
}

#[test]
fn signature_does_not_feed_the_hash() {
    let mut token = rich_token();
    assert!(token.verify());
    token.signature = Some("whatever-external-scheme".into());
    assert!(token.verify());
}

#[test]
fn reconstruction_restores_validity() {
    let token = rich_token();
    let line = token.to_json().expect("serialize");

    let mut tampered = token.clone();
    tampered.actor = "jis:humotica:intruder".into();
    assert!(!tampered.verify());

    let restored = Token::from_json(&line).expect("deserialize");
    assert!(restored.verify());
    assert_eq!(restored, token);
}

#[test]
fn round_trip_with_null_payload() {
    let token = Token::new(TokenParams::new(
        "tibet_bare",
        "ping",
        "2026-08-07T09:31:00Z",
        "jis:tibet:probe",
    ))
    .expect("token");

    let restored = Token::from_json(&token.to_json().unwrap()).unwrap();
    assert_eq!(restored, token);
    assert!(restored.erin.is_null());
    assert!(restored.verify());
}

#[test]
fn serialized_form_is_stable_across_runs() {
    let a = rich_token().to_json().unwrap();
    let b = rich_token().to_json().unwrap();
    assert_eq!(a, b);
    // single line, object keys sorted
    assert!(!a.contains('\n'));
    let action_pos = a.find("\"action\"").unwrap();
    let token_id_pos = a.find("\"token_id\"").unwrap();
    assert!(action_pos < token_id_pos);
}

#[test]
fn malformed_input_fails_decode() {
    assert!(Token::from_json("{not json").is_err());
    assert!(Token::from_json(r#"{"token_id": "x"}"#).is_err());
}
