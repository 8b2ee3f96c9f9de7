use super::*;

const BASIC_CONFIG: &str = r#"
backends:
  - name: openai-primary
    schema:
      name: OpenAI
    auth:
      bearer:
        token: sk-test
  - name: anthropic-backup
    schema:
      name: Anthropic
    modelNameOverride: claude-3-5-haiku
    headerMutations:
      - name: x-team
        value: platform
models:
  - name: m1
    ownedBy: ai-eg
    createdAt: 1700000000
requestCosts:
  - kind: input
    metadataKey: input_cost
  - kind: cel-expression
    metadataKey: custom_cost
    expression: "input * 2 + output"
"#;

#[test]
fn load_config_builds_snapshot() {
	let receiver = ConfigReceiver::new();
	receiver.load_config(BASIC_CONFIG).unwrap();
	let cfg = receiver.snapshot();
	assert_eq!(cfg.backends.len(), 2);
	let anthropic = &cfg.backends["anthropic-backup"];
	assert_eq!(
		anthropic.model_name_override.as_deref(),
		Some("claude-3-5-haiku")
	);
	assert_eq!(anthropic.header_mutations.len(), 1);
	assert!(cfg.backends["openai-primary"].auth.is_some());
	assert_eq!(cfg.declared_models[0].name, "m1");
	assert_eq!(cfg.request_costs.len(), 2);
	assert!(cfg.request_costs[1].expression.is_some());
}

#[test]
fn load_config_rejects_bad_cel() {
	let receiver = ConfigReceiver::new();
	let raw = r#"
requestCosts:
  - kind: cel-expression
    metadataKey: broken
    expression: "input +"
"#;
	assert!(receiver.load_config(raw).is_err());
}

#[test]
fn load_config_requires_expression_for_cel_kind() {
	let receiver = ConfigReceiver::new();
	let raw = r#"
requestCosts:
  - kind: cel-expression
    metadataKey: missing
"#;
	assert!(receiver.load_config(raw).is_err());
}

#[test]
fn snapshots_survive_reload() {
	let receiver = ConfigReceiver::new();
	receiver.load_config(BASIC_CONFIG).unwrap();
	let before = receiver.snapshot();
	receiver.load_config("backends: []").unwrap();
	// The captured snapshot still sees the pre-swap backends.
	assert_eq!(before.backends.len(), 2);
	assert!(receiver.snapshot().backends.is_empty());
}

#[test]
fn header_attribute_mapping_parses() {
	let m = parse_header_attribute_mapping("x-team:team,x-user-id:user").unwrap();
	assert_eq!(
		m,
		vec![
			("x-team".to_string(), "team".to_string()),
			("x-user-id".to_string(), "user".to_string())
		]
	);
	assert!(parse_header_attribute_mapping("").unwrap().is_empty());
}

#[test]
fn header_attribute_mapping_rejects_malformed() {
	// Missing separator.
	assert!(parse_header_attribute_mapping("x-team").is_err());
	// Empty parts.
	assert!(parse_header_attribute_mapping("x-team:").is_err());
	assert!(parse_header_attribute_mapping(":label").is_err());
	// Trailing entry.
	assert!(parse_header_attribute_mapping("x-team:team,").is_err());
	// Duplicate header.
	assert!(parse_header_attribute_mapping("x-a:one,x-a:two").is_err());
}

#[test]
fn endpoint_prefixes_parse() {
	let p = parse_endpoint_prefixes("openai:/openai,anthropic:/anthropic").unwrap();
	assert_eq!(p.openai, "/openai");
	assert_eq!(p.anthropic, "/anthropic");
	assert_eq!(p.cohere, "");
	assert!(parse_endpoint_prefixes("bogus:/x").is_err());
}

#[test]
fn env_config_from_env() {
	let vars = |name: &str| match name {
		"ROOT_PREFIX" => Some("/gateway".to_string()),
		"METRICS_REQUEST_HEADER_ATTRIBUTES" => Some("x-team:team".to_string()),
		_ => None,
	};
	let cfg = EnvConfig::from_env(vars).unwrap();
	assert_eq!(cfg.root_prefix, "/gateway");
	assert_eq!(cfg.metrics_header_attributes.len(), 1);
	assert!(cfg.tracing_header_attributes.is_empty());
}

#[test]
fn backend_patch_validation_runs_at_load() {
	let receiver = ConfigReceiver::new();
	let raw = r#"
backends:
  - name: patched
    schema:
      name: OpenAI
    patches:
      NotASchema:
        - op: add
          path: /x
          value: 1
"#;
	let err = receiver.load_config(raw).unwrap_err();
	assert!(err.to_string().contains("NotASchema"));
}
