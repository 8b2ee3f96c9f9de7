//! Path-based endpoint dispatch and the locally served model listing.

use std::collections::HashMap;

use serde_json::json;

use crate::config::{DeclaredModel, EndpointPrefixes};
use crate::llm::Operation;

/// Precompute the full path → operation table from the configured prefixes.
pub fn build_path_table(
	root_prefix: &str,
	prefixes: &EndpointPrefixes,
) -> HashMap<String, Operation> {
	let root = root_prefix.trim_end_matches('/');
	let join = |vendor: &str, suffix: &str| format!("{root}{vendor}{suffix}");

	let mut table = HashMap::new();
	let openai = prefixes.openai.trim_end_matches('/');
	table.insert(
		join(openai, "/v1/chat/completions"),
		Operation::ChatCompletions,
	);
	table.insert(join(openai, "/v1/completions"), Operation::Completions);
	table.insert(join(openai, "/v1/embeddings"), Operation::Embeddings);
	table.insert(
		join(openai, "/v1/images/generations"),
		Operation::ImageGeneration,
	);
	table.insert(join(openai, "/v1/responses"), Operation::Responses);
	table.insert(join(openai, "/v1/models"), Operation::Models);

	let anthropic = prefixes.anthropic.trim_end_matches('/');
	table.insert(join(anthropic, "/v1/messages"), Operation::Messages);

	let cohere = prefixes.cohere.trim_end_matches('/');
	table.insert(join(cohere, "/v1/rerank"), Operation::Rerank);

	table
}

/// Resolve a `:path` value, ignoring any query string.
pub fn lookup(table: &HashMap<String, Operation>, path: &str) -> Option<Operation> {
	let path = path.split('?').next().unwrap_or(path);
	table.get(path).copied()
}

/// Serialize the declared models in the OpenAI list shape.
pub fn models_response(models: &[DeclaredModel]) -> Vec<u8> {
	let data: Vec<_> = models
		.iter()
		.map(|m| {
			json!({
				"id": m.name,
				"object": "model",
				"owned_by": m.owned_by,
				"created": m.created_at,
			})
		})
		.collect();
	serde_json::to_vec(&json!({ "object": "list", "data": data }))
		.expect("static model listing serializes")
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
