use serde_json::json;

use super::*;
use crate::llm::types::RequestEntity;

#[test]
fn token_usage_override_replaces_present_slots() {
	let mut usage = TokenUsage {
		input: Some(10),
		cached_input: Some(2),
		output: Some(1),
		..Default::default()
	};
	usage.override_with(&TokenUsage {
		output: Some(5),
		total: Some(15),
		..Default::default()
	});
	// Absent slots in the update leave the existing values alone.
	assert_eq!(usage.input, Some(10));
	assert_eq!(usage.cached_input, Some(2));
	assert_eq!(usage.output, Some(5));
	assert_eq!(usage.total, Some(15));
}

#[test]
fn token_usage_total_falls_back_to_sum() {
	let usage = TokenUsage {
		input: Some(7),
		output: Some(3),
		..Default::default()
	};
	assert_eq!(usage.total_tokens(), 10);

	let explicit = TokenUsage {
		input: Some(7),
		output: Some(3),
		total: Some(99),
		..Default::default()
	};
	assert_eq!(explicit.total_tokens(), 99);
}

#[test]
fn operation_names() {
	assert_eq!(Operation::ChatCompletions.name(), "chat");
	assert_eq!(Operation::Messages.name(), "messages");
	assert_eq!(Operation::Completions.name(), "completion");
	assert_eq!(Operation::Embeddings.name(), "embedding");
	assert_eq!(Operation::ImageGeneration.name(), "image-generation");
	assert_eq!(Operation::Rerank.name(), "rerank");
	assert_eq!(Operation::Responses.name(), "responses");
}

#[test]
fn schema_deserialization() {
	let s: Schema = serde_json::from_value(json!({ "name": "OpenAI" })).unwrap();
	assert_eq!(s, Schema::OpenAI { version: None });
	assert_eq!(s.system_name(), "openai");

	let s: Schema =
		serde_json::from_value(json!({ "name": "AzureOpenAI", "version": "2024-02-01" })).unwrap();
	assert_eq!(s.system_name(), "azure.openai");

	let s: Schema = serde_json::from_value(json!({
		"name": "GCPVertexAI", "project_id": "p", "region": "us-central1"
	}))
	.unwrap();
	assert_eq!(s.system_name(), "gcp.vertex_ai");

	let s: Schema = serde_json::from_value(json!({
		"name": "GCPAnthropic", "project_id": "p", "region": "us-east5"
	}))
	.unwrap();
	assert_eq!(s.system_name(), "gcp.anthropic");

	assert!(serde_json::from_value::<Schema>(json!({ "name": "NotAThing" })).is_err());
}

#[test]
fn parse_request_extracts_model_and_stream() {
	let raw = serde_json::to_vec(&json!({
		"model": "gpt-4o",
		"messages": [{ "role": "user", "content": "hi" }],
		"stream": true
	}))
	.unwrap();
	let parsed = types::parse_request(Operation::ChatCompletions, &raw, false).unwrap();
	assert_eq!(parsed.model, "gpt-4o");
	assert!(parsed.stream);
	assert!(parsed.mutated.is_none());
}

#[test]
fn parse_request_forces_usage_for_cost_accounting() {
	let raw = serde_json::to_vec(&json!({
		"model": "gpt-4o",
		"messages": [{ "role": "user", "content": "hi" }],
		"stream": true
	}))
	.unwrap();
	let parsed = types::parse_request(Operation::ChatCompletions, &raw, true).unwrap();
	let mutated = parsed.mutated.expect("body must be rewritten");
	let v: serde_json::Value = serde_json::from_slice(&mutated).unwrap();
	assert_eq!(v["stream_options"]["include_usage"], true);
	// Non-streaming requests are left alone even with costs configured.
	let raw = serde_json::to_vec(&json!({
		"model": "gpt-4o",
		"messages": [{ "role": "user", "content": "hi" }]
	}))
	.unwrap();
	let parsed = types::parse_request(Operation::ChatCompletions, &raw, true).unwrap();
	assert!(parsed.mutated.is_none());
}

#[test]
fn parse_request_rejects_missing_model() {
	let raw = serde_json::to_vec(&json!({ "messages": [] })).unwrap();
	let err = types::parse_request(Operation::ChatCompletions, &raw, false).unwrap_err();
	assert!(matches!(err, AIError::MissingField(_)));
}

#[test]
fn parse_request_rejects_empty_body() {
	assert!(matches!(
		types::parse_request(Operation::ChatCompletions, b"", false),
		Err(AIError::RequestParsing(_))
	));
	assert!(matches!(
		types::parse_request(Operation::Messages, b"", false),
		Err(AIError::RequestParsing(_))
	));
}

#[test]
fn loose_request_round_trips_unknown_fields() {
	let raw = json!({
		"model": "gpt-4o",
		"messages": [{ "role": "user", "content": "hi" }],
		"logit_bias": { "50256": -100 },
		"seed": 42
	});
	let req: types::completions::Request = serde_json::from_value(raw.clone()).unwrap();
	let back: serde_json::Value =
		serde_json::from_slice(&RequestEntity::serialize(&req).unwrap()).unwrap();
	assert_eq!(back, raw);
}

#[test]
fn serialize_with_model_rewrites_only_model() {
	let raw = json!({
		"model": "gpt-4o",
		"messages": [{ "role": "user", "content": "hi" }],
		"seed": 7
	});
	let req: types::completions::Request = serde_json::from_value(raw).unwrap();
	let out = req.serialize_with_model("gpt-4o-mini").unwrap();
	let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["model"], "gpt-4o-mini");
	assert_eq!(v["seed"], 7);
}

#[test]
fn vertex_paths() {
	assert_eq!(
		vertex::gemini_path("proj", "us-central1", "gemini-2.0-flash", false),
		"/v1/projects/proj/locations/us-central1/publishers/google/models/gemini-2.0-flash:generateContent"
	);
	assert_eq!(
		vertex::gemini_path("proj", "us-central1", "gemini-2.0-flash", true),
		"/v1/projects/proj/locations/us-central1/publishers/google/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
	);
	assert_eq!(
		vertex::anthropic_path("proj", "us-east5", "claude-sonnet", true),
		"/v1/projects/proj/locations/us-east5/publishers/anthropic/models/claude-sonnet:streamRawPredict"
	);
}

#[test]
fn azure_paths() {
	assert_eq!(
		azureopenai::path(Operation::ChatCompletions, "gpt-4o", "v1"),
		"/openai/v1/chat/completions"
	);
	assert_eq!(
		azureopenai::path(Operation::ChatCompletions, "gpt-4o", "2024-02-01"),
		"/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
	);
	assert_eq!(
		azureopenai::path(Operation::Embeddings, "ada", "2024-02-01"),
		"/openai/deployments/ada/embeddings?api-version=2024-02-01"
	);
}
