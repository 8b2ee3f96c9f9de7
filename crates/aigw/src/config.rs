//! Runtime configuration and the process-wide environment.
//!
//! `RawConfig` is what the external watcher hands us; `RuntimeConfig` is the
//! compiled, immutable snapshot the filters capture. Snapshots are published
//! with an atomic pointer swap, so a reload never mutates an in-flight
//! request: each router filter pins the pointer it saw at construction.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthConfig, BackendAuth};
use crate::cel;
use crate::dispatch;
use crate::llm::{Operation, Schema};
use crate::mutation::{BodyMutationRule, HeaderMutationRule, SchemaPatches, validate_patches};
use crate::registry::FilterRegistry;
use crate::telemetry::metrics::Metrics;
use crate::telemetry::trc;

/// Schema names accepted as JSON-patch keys.
pub const KNOWN_SCHEMAS: &[&str] = &[
	"OpenAI",
	"AzureOpenAI",
	"Anthropic",
	"GCPVertexAI",
	"GCPAnthropic",
	"Cohere",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
	#[serde(default)]
	pub backends: Vec<RawBackend>,
	#[serde(default)]
	pub models: Vec<DeclaredModel>,
	#[serde(default)]
	pub request_costs: Vec<RequestCostConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawBackend {
	pub name: String,
	pub schema: Schema,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model_name_override: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub header_mutations: Vec<HeaderMutationRule>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub body_mutations: Vec<BodyMutationRule>,
	/// Applied instead of `body_mutations` on retry attempts.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub retry_body_mutations: Vec<BodyMutationRule>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		with = "serde_yaml::with::singleton_map"
	)]
	pub auth: Option<AuthConfig>,
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub patches: IndexMap<String, json_patch::Patch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeclaredModel {
	pub name: String,
	pub owned_by: String,
	pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostKind {
	Input,
	CachedInput,
	Output,
	Total,
	CelExpression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestCostConfig {
	pub kind: CostKind,
	pub metadata_key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expression: Option<String>,
}

/// A compiled cost rule.
#[derive(Debug)]
pub struct RequestCost {
	pub kind: CostKind,
	pub metadata_key: String,
	pub expression: Option<cel::Expression>,
}

/// A compiled backend entry.
pub struct RuntimeBackend {
	pub name: String,
	pub schema: Schema,
	pub model_name_override: Option<String>,
	pub header_mutations: Vec<HeaderMutationRule>,
	pub body_mutations: Vec<BodyMutationRule>,
	pub retry_body_mutations: Vec<BodyMutationRule>,
	pub patches: SchemaPatches,
	pub auth: Option<Arc<dyn BackendAuth>>,
}

impl std::fmt::Debug for RuntimeBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RuntimeBackend")
			.field("name", &self.name)
			.field("schema", &self.schema)
			.field("model_name_override", &self.model_name_override)
			.finish()
	}
}

/// The immutable per-reload snapshot.
#[derive(Debug, Default)]
pub struct RuntimeConfig {
	pub backends: HashMap<String, Arc<RuntimeBackend>>,
	pub declared_models: Vec<DeclaredModel>,
	pub request_costs: Vec<RequestCost>,
}

impl RuntimeConfig {
	pub fn build(raw: RawConfig) -> anyhow::Result<Self> {
		let mut backends = HashMap::with_capacity(raw.backends.len());
		for b in raw.backends {
			let patches = validate_patches(b.patches, KNOWN_SCHEMAS)
				.map_err(|e| anyhow::anyhow!("backend {}: {e}", b.name))?;
			let auth = b.auth.as_ref().map(auth::build);
			backends.insert(
				b.name.clone(),
				Arc::new(RuntimeBackend {
					name: b.name,
					schema: b.schema,
					model_name_override: b.model_name_override,
					header_mutations: b.header_mutations,
					body_mutations: b.body_mutations,
					retry_body_mutations: b.retry_body_mutations,
					patches,
					auth,
				}),
			);
		}
		let mut request_costs = Vec::with_capacity(raw.request_costs.len());
		for c in raw.request_costs {
			let expression = match (c.kind, &c.expression) {
				(CostKind::CelExpression, Some(src)) => Some(cel::Expression::new(src)?),
				(CostKind::CelExpression, None) => {
					anyhow::bail!("request cost {} requires an expression", c.metadata_key)
				},
				_ => None,
			};
			request_costs.push(RequestCost {
				kind: c.kind,
				metadata_key: c.metadata_key,
				expression,
			});
		}
		Ok(Self {
			backends,
			declared_models: raw.models,
			request_costs,
		})
	}
}

/// Holds the current snapshot and performs the atomic swap on reload.
pub struct ConfigReceiver {
	current: ArcSwap<RuntimeConfig>,
}

impl Default for ConfigReceiver {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigReceiver {
	pub fn new() -> Self {
		Self {
			current: ArcSwap::from_pointee(RuntimeConfig::default()),
		}
	}

	/// Parse and publish a new configuration. Outstanding requests keep the
	/// snapshot they captured.
	pub fn load_config(&self, raw: &str) -> anyhow::Result<()> {
		let raw: RawConfig = serde_yaml::from_str(raw)?;
		let built = RuntimeConfig::build(raw)?;
		self.current.store(Arc::new(built));
		Ok(())
	}

	pub fn snapshot(&self) -> Arc<RuntimeConfig> {
		self.current.load_full()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointPrefixes {
	pub openai: String,
	pub anthropic: String,
	pub cohere: String,
}

/// Static environment inputs, usually parsed from process env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
	pub root_prefix: String,
	pub endpoint_prefixes: EndpointPrefixes,
	pub metrics_header_attributes: Vec<(String, String)>,
	pub tracing_header_attributes: Vec<(String, String)>,
}

impl EnvConfig {
	/// Read the well-known environment variables through `lookup`.
	pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
		let root_prefix = lookup("ROOT_PREFIX").unwrap_or_else(|| "/".to_string());
		let endpoint_prefixes = match lookup("ENDPOINT_PREFIXES") {
			Some(raw) => parse_endpoint_prefixes(&raw)?,
			None => EndpointPrefixes::default(),
		};
		let metrics_header_attributes = match lookup("METRICS_REQUEST_HEADER_ATTRIBUTES") {
			Some(raw) => parse_header_attribute_mapping(&raw)?,
			None => Vec::new(),
		};
		let tracing_header_attributes = match lookup("TRACING_REQUEST_HEADER_ATTRIBUTES") {
			Some(raw) => parse_header_attribute_mapping(&raw)?,
			None => Vec::new(),
		};
		Ok(Self {
			root_prefix,
			endpoint_prefixes,
			metrics_header_attributes,
			tracing_header_attributes,
		})
	}
}

/// Parse `header:label,header:label`. Empty input means no mapping; empty
/// parts, trailing separators and duplicate headers are configuration
/// errors.
pub fn parse_header_attribute_mapping(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
	if raw.is_empty() {
		return Ok(Vec::new());
	}
	let mut out = Vec::new();
	for entry in raw.split(',') {
		let Some((header, label)) = entry.split_once(':') else {
			anyhow::bail!("invalid header attribute mapping entry {entry:?}");
		};
		if header.is_empty() || label.is_empty() {
			anyhow::bail!("invalid header attribute mapping entry {entry:?}");
		}
		let header = header.to_ascii_lowercase();
		if out.iter().any(|(h, _)| h == &header) {
			anyhow::bail!("duplicate header {header:?} in attribute mapping");
		}
		out.push((header, label.to_string()));
	}
	Ok(out)
}

/// Parse `vendor:prefix,vendor:prefix` with vendors openai, anthropic and
/// cohere.
pub fn parse_endpoint_prefixes(raw: &str) -> anyhow::Result<EndpointPrefixes> {
	let mut prefixes = EndpointPrefixes::default();
	if raw.is_empty() {
		return Ok(prefixes);
	}
	for entry in raw.split(',') {
		let Some((vendor, prefix)) = entry.split_once(':') else {
			anyhow::bail!("invalid endpoint prefix entry {entry:?}");
		};
		match vendor {
			"openai" => prefixes.openai = prefix.to_string(),
			"anthropic" => prefixes.anthropic = prefix.to_string(),
			"cohere" => prefixes.cohere = prefix.to_string(),
			other => anyhow::bail!("unknown endpoint prefix vendor {other:?}"),
		}
	}
	Ok(prefixes)
}

/// Process-wide environment: everything set once at init and shared by all
/// filters.
pub struct Env {
	pub paths: HashMap<String, Operation>,
	pub metrics: Metrics,
	pub tracer: Option<trc::Tracer>,
	pub metrics_header_attributes: Vec<(String, String)>,
	pub tracing_header_attributes: Vec<(String, String)>,
	pub registry: FilterRegistry,
	pub config: ConfigReceiver,
}

impl Env {
	pub fn new(
		cfg: EnvConfig,
		meter: &opentelemetry::metrics::Meter,
		tracer: Option<trc::Tracer>,
	) -> Arc<Self> {
		Arc::new(Self {
			paths: dispatch::build_path_table(&cfg.root_prefix, &cfg.endpoint_prefixes),
			metrics: Metrics::new(meter),
			tracer,
			metrics_header_attributes: cfg.metrics_header_attributes,
			tracing_header_attributes: cfg.tracing_header_attributes,
			registry: FilterRegistry::new(),
			config: ConfigReceiver::new(),
		})
	}
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
