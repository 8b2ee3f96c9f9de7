//! Header and body mutation rules applied on top of the translator output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::llm::AIError;

/// Upper bound on the total number of JSON-patch operations one backend may
/// configure across all schema keys.
pub const MAX_PATCH_COUNT: usize = 64;

/// Schema key matching any backend schema.
pub const ANY_SCHEMA: &str = "ANY";

/// One header mutation. `value` sets a literal; `restore_original` re-applies
/// the value the downstream client sent (snapshotted before translation);
/// `remove` deletes the header. `retry_only` rules apply only on retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HeaderMutationRule {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub restore_original: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub remove: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub retry_only: bool,
}

/// One body mutation: a regex search/replace or an RFC-6902 patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyMutationRule {
	Regex {
		#[serde(with = "serde_regex")]
		pattern: regex::Regex,
		replace: String,
	},
	JsonPatch {
		patch: json_patch::Patch,
	},
}

/// Apply body mutation rules in order. Regex rules operate on the raw bytes;
/// patch rules require the body to be valid JSON.
pub fn apply_body_mutations(rules: &[BodyMutationRule], body: Vec<u8>) -> Result<Vec<u8>, AIError> {
	let mut body = body;
	for rule in rules {
		match rule {
			BodyMutationRule::Regex { pattern, replace } => {
				let text = String::from_utf8(body)
					.map_err(|_| AIError::Mutation("body is not valid utf-8".to_string()))?;
				body = pattern
					.replace_all(&text, replace.as_str())
					.into_owned()
					.into_bytes();
			},
			BodyMutationRule::JsonPatch { patch } => {
				let mut value: serde_json::Value = serde_json::from_slice(&body)
					.map_err(|e| AIError::Mutation(format!("body is not valid JSON: {e}")))?;
				json_patch::patch(&mut value, patch)
					.map_err(|e| AIError::Mutation(format!("patch failed: {e}")))?;
				body = serde_json::to_vec(&value)
					.map_err(|e| AIError::Mutation(format!("re-serialize failed: {e}")))?;
			},
		}
	}
	Ok(body)
}

/// JSON patches keyed by backend schema name (or [`ANY_SCHEMA`]), validated
/// at config load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaPatches(IndexMap<String, json_patch::Patch>);

/// Validate a raw patch collection: the total operation count must not
/// exceed [`MAX_PATCH_COUNT`], and every key must be `ANY` or a declared
/// schema name.
pub fn validate_patches(
	raw: IndexMap<String, json_patch::Patch>,
	known_schemas: &[&str],
) -> anyhow::Result<SchemaPatches> {
	let total: usize = raw.values().map(|p| p.0.len()).sum();
	if total > MAX_PATCH_COUNT {
		anyhow::bail!("patch collection has {total} operations, maximum is {MAX_PATCH_COUNT}");
	}
	for key in raw.keys() {
		if key != ANY_SCHEMA && !known_schemas.contains(&key.as_str()) {
			anyhow::bail!("patch schema key {key:?} is neither {ANY_SCHEMA:?} nor a known schema");
		}
	}
	Ok(SchemaPatches(raw))
}

/// The validated collection, unchanged from what [`validate_patches`]
/// accepted.
pub fn extract_patches(p: &SchemaPatches) -> &IndexMap<String, json_patch::Patch> {
	&p.0
}

impl SchemaPatches {
	/// The patches that apply to the given backend schema.
	pub fn for_schema<'a>(&'a self, schema: &str) -> Vec<&'a json_patch::Patch> {
		self
			.0
			.iter()
			.filter(|(k, _)| k.as_str() == ANY_SCHEMA || k.as_str() == schema)
			.map(|(_, v)| v)
			.collect()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Apply the matching patches to a JSON body.
	pub fn apply(&self, schema: &str, body: Vec<u8>) -> Result<Vec<u8>, AIError> {
		let patches = self.for_schema(schema);
		if patches.is_empty() {
			return Ok(body);
		}
		let mut value: serde_json::Value = serde_json::from_slice(&body)
			.map_err(|e| AIError::Mutation(format!("body is not valid JSON: {e}")))?;
		for patch in patches {
			json_patch::patch(&mut value, patch)
				.map_err(|e| AIError::Mutation(format!("patch failed: {e}")))?;
		}
		serde_json::to_vec(&value).map_err(|e| AIError::Mutation(format!("re-serialize failed: {e}")))
	}
}

#[cfg(test)]
#[path = "mutation_tests.rs"]
mod tests;
