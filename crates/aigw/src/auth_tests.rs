use serde_json::json;

use super::*;
use crate::host::HeaderSnapshot;

fn snapshot(pairs: &[(&str, &str)]) -> HeaderSnapshot {
	pairs
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect()
}

#[test]
fn api_key_default_header() {
	let cfg: AuthConfig = serde_json::from_value(json!({ "apiKey": { "key": "sk-test" } })).unwrap();
	let handler = build(&cfg);
	let out = handler.inject(&snapshot(&[]), b"").unwrap();
	assert_eq!(out, vec![("x-api-key".to_string(), "sk-test".to_string())]);
}

#[test]
fn api_key_custom_header() {
	let cfg: AuthConfig =
		serde_json::from_value(json!({ "apiKey": { "header": "x-goog-api-key", "key": "k" } }))
			.unwrap();
	let out = build(&cfg).inject(&snapshot(&[]), b"").unwrap();
	assert_eq!(out[0].0, "x-goog-api-key");
}

#[test]
fn bearer_token() {
	let cfg: AuthConfig = serde_json::from_value(json!({ "bearer": { "token": "tok" } })).unwrap();
	let out = build(&cfg).inject(&snapshot(&[]), b"").unwrap();
	assert_eq!(
		out,
		vec![("authorization".to_string(), "Bearer tok".to_string())]
	);
}

#[test]
fn azure_api_key() {
	let cfg: AuthConfig = serde_json::from_value(json!({ "azureApiKey": { "key": "az" } })).unwrap();
	let out = build(&cfg).inject(&snapshot(&[]), b"").unwrap();
	assert_eq!(out, vec![("api-key".to_string(), "az".to_string())]);
}

#[test]
fn aws_sigv4_signs_body() {
	let cfg: AuthConfig = serde_json::from_value(json!({ "aws": {
		"accessKeyId": "AKIDEXAMPLE",
		"secretAccessKey": "secret",
		"region": "us-west-2",
		"service": "bedrock"
	} }))
	.unwrap();
	let headers = snapshot(&[
		(":method", "POST"),
		(":path", "/model/claude/converse"),
		(":authority", "bedrock-runtime.us-west-2.amazonaws.com"),
		("content-type", "application/json"),
	]);
	let out = build(&cfg)
		.inject(&headers, br#"{"messages":[]}"#)
		.unwrap();

	let auth = out
		.iter()
		.find(|(k, _)| k == "authorization")
		.expect("authorization header");
	assert!(auth.1.starts_with("AWS4-HMAC-SHA256"));
	assert!(auth.1.contains("us-west-2/bedrock/aws4_request"));
	assert!(out.iter().any(|(k, _)| k == "x-amz-date"));

	// Different bodies must produce different signatures (the body hash is
	// part of the canonical request).
	let out2 = build(&cfg).inject(&headers, br#"{"messages":[1]}"#).unwrap();
	let auth2 = out2.iter().find(|(k, _)| k == "authorization").unwrap();
	assert_ne!(auth.1, auth2.1);
}

#[test]
fn aws_session_token_header() {
	let cfg: AuthConfig = serde_json::from_value(json!({ "aws": {
		"accessKeyId": "AKIDEXAMPLE",
		"secretAccessKey": "secret",
		"sessionToken": "session",
		"region": "us-east-1",
		"service": "bedrock"
	} }))
	.unwrap();
	let headers = snapshot(&[(":path", "/"), (":authority", "example.amazonaws.com")]);
	let out = build(&cfg).inject(&headers, b"{}").unwrap();
	assert!(out.iter().any(|(k, _)| k == "x-amz-security-token"));
}
