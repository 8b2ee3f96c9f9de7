use super::*;
use crate::config::{DeclaredModel, EndpointPrefixes};
use crate::llm::Operation;

#[test]
fn default_table_resolves_known_paths() {
	let table = build_path_table("/", &EndpointPrefixes::default());
	assert_eq!(
		lookup(&table, "/v1/chat/completions"),
		Some(Operation::ChatCompletions)
	);
	assert_eq!(lookup(&table, "/v1/completions"), Some(Operation::Completions));
	assert_eq!(lookup(&table, "/v1/embeddings"), Some(Operation::Embeddings));
	assert_eq!(
		lookup(&table, "/v1/images/generations"),
		Some(Operation::ImageGeneration)
	);
	assert_eq!(lookup(&table, "/v1/responses"), Some(Operation::Responses));
	assert_eq!(lookup(&table, "/v1/models"), Some(Operation::Models));
	assert_eq!(lookup(&table, "/v1/messages"), Some(Operation::Messages));
	assert_eq!(lookup(&table, "/v1/rerank"), Some(Operation::Rerank));
	assert_eq!(lookup(&table, "/v2/other"), None);
}

#[test]
fn query_string_is_ignored() {
	let table = build_path_table("/", &EndpointPrefixes::default());
	assert_eq!(
		lookup(&table, "/v1/chat/completions?debug=1"),
		Some(Operation::ChatCompletions)
	);
}

#[test]
fn prefixes_compose() {
	let prefixes = EndpointPrefixes {
		openai: "/openai".to_string(),
		anthropic: "/anthropic".to_string(),
		cohere: "/cohere".to_string(),
	};
	let table = build_path_table("/gw", &prefixes);
	assert_eq!(
		lookup(&table, "/gw/openai/v1/chat/completions"),
		Some(Operation::ChatCompletions)
	);
	assert_eq!(
		lookup(&table, "/gw/anthropic/v1/messages"),
		Some(Operation::Messages)
	);
	assert_eq!(lookup(&table, "/gw/cohere/v1/rerank"), Some(Operation::Rerank));
	// Unprefixed forms no longer resolve.
	assert_eq!(lookup(&table, "/v1/chat/completions"), None);
}

#[test]
fn models_listing_shape() {
	let models = vec![DeclaredModel {
		name: "m1".to_string(),
		owned_by: "ai-eg".to_string(),
		created_at: 1700000000,
	}];
	let body = models_response(&models);
	let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(
		v,
		serde_json::json!({
			"object": "list",
			"data": [{
				"id": "m1",
				"object": "model",
				"owned_by": "ai-eg",
				"created": 1700000000u64
			}]
		})
	);
}
