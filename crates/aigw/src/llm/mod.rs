//! LLM domain model: operations, backend schemas, token accounting and the
//! translation error taxonomy.

use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod azureopenai;
pub mod cohere;
pub mod conversion;
pub mod openai;
pub mod translator;
pub mod types;
pub mod vertex;

/// The semantic category of a request, derived from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
	/// OpenAI /v1/chat/completions
	ChatCompletions,
	/// OpenAI /v1/completions (legacy text completion)
	Completions,
	/// OpenAI /v1/embeddings
	Embeddings,
	/// OpenAI /v1/images/generations
	ImageGeneration,
	/// Cohere /v1/rerank
	Rerank,
	/// Anthropic /v1/messages
	Messages,
	/// OpenAI /v1/responses
	Responses,
	/// OpenAI /v1/models (answered locally, never proxied)
	Models,
}

impl Operation {
	/// Value for the `gen_ai.operation.name` attribute.
	pub fn name(&self) -> &'static str {
		match self {
			Operation::ChatCompletions => "chat",
			Operation::Completions => "completion",
			Operation::Embeddings => "embedding",
			Operation::ImageGeneration => "image-generation",
			Operation::Rerank => "rerank",
			Operation::Messages => "messages",
			Operation::Responses => "responses",
			Operation::Models => "models",
		}
	}
}

/// The wire API an upstream backend speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "PascalCase")]
pub enum Schema {
	#[serde(rename = "OpenAI")]
	OpenAI {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		version: Option<String>,
	},
	#[serde(rename = "AzureOpenAI")]
	AzureOpenAI { version: String },
	Anthropic {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		version: Option<String>,
	},
	#[serde(rename = "GCPVertexAI")]
	GCPVertexAI { project_id: String, region: String },
	#[serde(rename = "GCPAnthropic")]
	GCPAnthropic {
		project_id: String,
		region: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		version: Option<String>,
	},
	Cohere {},
}

impl Schema {
	/// Value for the `gen_ai.system` attribute.
	pub fn system_name(&self) -> &'static str {
		match self {
			Schema::OpenAI { .. } => openai::NAME,
			Schema::AzureOpenAI { .. } => azureopenai::NAME,
			Schema::Anthropic { .. } => anthropic::NAME,
			Schema::GCPVertexAI { .. } => vertex::NAME,
			Schema::GCPAnthropic { .. } => vertex::ANTHROPIC_NAME,
			Schema::Cohere {} => cohere::NAME,
		}
	}
}

/// Token counts parsed out of a response. Each slot is optional: providers
/// surface different subsets, and streaming responses fill them in over
/// time. Counts are always cumulative, never incremental.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
	pub input: Option<u64>,
	pub cached_input: Option<u64>,
	pub cache_creation_input: Option<u64>,
	pub output: Option<u64>,
	pub total: Option<u64>,
}

impl TokenUsage {
	/// Replace every slot that is present in `new`, keeping the rest.
	pub fn override_with(&mut self, new: &TokenUsage) {
		if new.input.is_some() {
			self.input = new.input;
		}
		if new.cached_input.is_some() {
			self.cached_input = new.cached_input;
		}
		if new.cache_creation_input.is_some() {
			self.cache_creation_input = new.cache_creation_input;
		}
		if new.output.is_some() {
			self.output = new.output;
		}
		if new.total.is_some() {
			self.total = new.total;
		}
	}

	/// The stored total when the provider surfaced one, otherwise the sum of
	/// input and output.
	pub fn total_tokens(&self) -> u64 {
		self
			.total
			.unwrap_or_else(|| self.input.unwrap_or(0) + self.output.unwrap_or(0))
	}
}

#[derive(thiserror::Error, Debug)]
pub enum AIError {
	#[error("missing field: {0}")]
	MissingField(String),
	#[error("unknown backend: {0}")]
	UnknownBackend(String),
	#[error("unsupported conversion to {0}")]
	UnsupportedConversion(String),
	#[error("failed to parse request: {0}")]
	RequestParsing(serde_json::Error),
	#[error("failed to marshal request: {0}")]
	RequestMarshal(serde_json::Error),
	#[error("failed to parse response: {0}")]
	ResponseParsing(serde_json::Error),
	#[error("failed to marshal response: {0}")]
	ResponseMarshal(serde_json::Error),
	#[error("{provider} stream error: {kind} - {message}")]
	StreamError {
		provider: &'static str,
		kind: String,
		message: String,
	},
	#[error(transparent)]
	Decompression(#[from] crate::compression::Error),
	#[error("backend auth failed: {0}")]
	Auth(anyhow::Error),
	#[error("cost expression failed: {0}")]
	CostEvaluation(#[from] crate::cel::Error),
	#[error("body mutation failed: {0}")]
	Mutation(String),
	#[error("{0}")]
	Internal(String),
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
