use indexmap::IndexMap;
use serde_json::json;

use super::*;

fn patch(ops: serde_json::Value) -> json_patch::Patch {
	serde_json::from_value(ops).unwrap()
}

#[test]
fn regex_replace() {
	let rules: Vec<BodyMutationRule> = serde_json::from_value(json!([
		{ "regex": { "pattern": "gpt-4o", "replace": "gpt-4o-mini" } }
	]))
	.unwrap();
	let out = apply_body_mutations(&rules, b"{\"model\":\"gpt-4o\"}".to_vec()).unwrap();
	assert_eq!(out, b"{\"model\":\"gpt-4o-mini\"}");
}

#[test]
fn json_patch_rule() {
	let rules: Vec<BodyMutationRule> = serde_json::from_value(json!([
		{ "jsonPatch": { "patch": [
			{ "op": "add", "path": "/temperature", "value": 0.5 }
		] } }
	]))
	.unwrap();
	let out = apply_body_mutations(&rules, b"{\"model\":\"m\"}".to_vec()).unwrap();
	let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["temperature"], 0.5);
	assert_eq!(v["model"], "m");
}

#[test]
fn json_patch_on_non_json_fails() {
	let rules: Vec<BodyMutationRule> = serde_json::from_value(json!([
		{ "jsonPatch": { "patch": [{ "op": "remove", "path": "/x" }] } }
	]))
	.unwrap();
	assert!(apply_body_mutations(&rules, b"not json".to_vec()).is_err());
}

#[test]
fn validate_accepts_known_keys() {
	let mut raw = IndexMap::new();
	raw.insert(
		"ANY".to_string(),
		patch(json!([{ "op": "add", "path": "/a", "value": 1 }])),
	);
	raw.insert(
		"OpenAI".to_string(),
		patch(json!([{ "op": "remove", "path": "/b" }])),
	);
	let validated = validate_patches(raw.clone(), &["OpenAI", "Anthropic"]).unwrap();
	// Extraction round-trips what validation accepted.
	assert_eq!(
		serde_json::to_value(extract_patches(&validated)).unwrap(),
		serde_json::to_value(&raw).unwrap()
	);
}

#[test]
fn validate_rejects_unknown_schema_key() {
	let mut raw = IndexMap::new();
	raw.insert(
		"NotASchema".to_string(),
		patch(json!([{ "op": "add", "path": "/a", "value": 1 }])),
	);
	assert!(validate_patches(raw, &["OpenAI"]).is_err());
}

#[test]
fn validate_rejects_too_many_operations() {
	let ops: Vec<_> = (0..=MAX_PATCH_COUNT)
		.map(|i| json!({ "op": "add", "path": format!("/k{i}"), "value": i }))
		.collect();
	let mut raw = IndexMap::new();
	raw.insert("ANY".to_string(), patch(json!(ops)));
	assert!(validate_patches(raw, &[]).is_err());
}

#[test]
fn schema_patch_selection() {
	let mut raw = IndexMap::new();
	raw.insert(
		"ANY".to_string(),
		patch(json!([{ "op": "add", "path": "/any", "value": true }])),
	);
	raw.insert(
		"Anthropic".to_string(),
		patch(json!([{ "op": "add", "path": "/anthropic", "value": true }])),
	);
	let p = validate_patches(raw, &["Anthropic"]).unwrap();

	let out = p.apply("OpenAI", b"{}".to_vec()).unwrap();
	let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v, json!({ "any": true }));

	let out = p.apply("Anthropic", b"{}".to_vec()).unwrap();
	let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v, json!({ "any": true, "anthropic": true }));
}

#[test]
fn header_rule_parsing() {
	let rules: Vec<HeaderMutationRule> = serde_json::from_value(json!([
		{ "name": "x-api-version", "value": "2" },
		{ "name": "x-internal", "remove": true },
		{ "name": "authorization", "restoreOriginal": true, "retryOnly": true }
	]))
	.unwrap();
	assert_eq!(rules.len(), 3);
	assert!(rules[1].remove);
	assert!(rules[2].retry_only && rules[2].restore_original);
}
