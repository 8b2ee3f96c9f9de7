//! Per-(operation × backend-schema) translators.
//!
//! A translator owns the request rewrite, the response rewrite (buffered or
//! chunk-by-chunk for streams) and the error rewrite for one upstream
//! attempt. Translators are stateless across attempts modulo the retry flag:
//! a fresh translator is constructed per upstream leg, and `request_body`
//! must produce the same output for the same inputs.

use crate::host::HeaderSnapshot;
use crate::llm::types::RequestEntity;
use crate::llm::{AIError, Operation, Schema, TokenUsage};

mod anthropic;
mod gcp;
mod openai;

pub use anthropic::{AnthropicTranslator, MessagesPassthrough, MessagesToOpenAI};
pub use gcp::GeminiTranslator;
pub use openai::{AzureOpenAITranslator, OpenAIPassthrough};

/// A header to set (`Some`) or remove (`None`) on the proxied message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderUpdate {
	pub name: String,
	pub value: Option<String>,
}

impl HeaderUpdate {
	pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: Some(value.into()),
		}
	}

	pub fn remove(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: None,
		}
	}
}

#[derive(Debug, Default)]
pub struct RequestTransform {
	pub headers: Vec<HeaderUpdate>,
	/// Replacement request body; `None` leaves the buffered body untouched.
	pub body: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct ResponseTransform {
	pub headers: Vec<HeaderUpdate>,
	/// Replacement bytes. For streams this replaces only the received chunk.
	pub body: Option<Vec<u8>>,
	/// Cumulative usage totals parsed so far (streams) or the final totals
	/// (buffered responses).
	pub usage: TokenUsage,
	/// Cumulative output tokens for latency accounting; may be estimated.
	pub output_tokens_estimate: u64,
	pub response_model: Option<String>,
}

pub trait Translator: Send {
	/// Rewrite the buffered request body. Must not mutate the entity; with
	/// `force_mutation` (retries, parser-mutated bodies) a replacement body
	/// MUST be produced even if it would otherwise pass through.
	fn request_body(
		&mut self,
		entity: &dyn RequestEntity,
		force_mutation: bool,
	) -> Result<RequestTransform, AIError>;

	fn response_headers(&mut self, headers: &HeaderSnapshot) -> Result<Vec<HeaderUpdate>, AIError>;

	/// Rewrite response bytes. Buffered responses arrive as one call with
	/// `end_of_stream`; streams arrive chunk-by-chunk, already decoded.
	fn response_body(
		&mut self,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError>;

	/// Rewrite a non-2xx upstream body into the client's error schema.
	fn response_error(&mut self, status: u16, body: &[u8]) -> Result<ResponseTransform, AIError>;
}

/// Select the translator for an operation and backend schema.
///
/// `needs_usage_accounting` is set when request costs are configured, in
/// which case streaming requests translated to OpenAI-shaped backends must
/// opt into usage reporting.
pub fn new_translator(
	op: Operation,
	schema: &Schema,
	model_override: Option<&str>,
	needs_usage_accounting: bool,
) -> Result<Box<dyn Translator>, AIError> {
	let model_override = model_override.map(str::to_string);
	match (op, schema) {
		// OpenAI-shaped surfaces onto an OpenAI-compatible backend.
		(
			Operation::ChatCompletions
			| Operation::Completions
			| Operation::Embeddings
			| Operation::ImageGeneration
			| Operation::Responses,
			Schema::OpenAI { version },
		) => Ok(Box::new(OpenAIPassthrough::new(
			op,
			model_override,
			version.as_deref(),
		))),
		(
			Operation::ChatCompletions | Operation::Embeddings | Operation::Responses,
			Schema::AzureOpenAI { version },
		) => Ok(Box::new(AzureOpenAITranslator::new(
			op,
			model_override,
			version.clone(),
		))),
		(Operation::ChatCompletions, Schema::Anthropic { version }) => Ok(Box::new(
			AnthropicTranslator::direct(model_override, version.clone()),
		)),
		(
			Operation::ChatCompletions,
			Schema::GCPAnthropic {
				project_id,
				region,
				version,
			},
		) => Ok(Box::new(AnthropicTranslator::gcp(
			model_override,
			project_id.clone(),
			region.clone(),
			version.clone(),
		))),
		(Operation::ChatCompletions, Schema::GCPVertexAI { project_id, region }) => Ok(Box::new(
			GeminiTranslator::new(model_override, project_id.clone(), region.clone()),
		)),
		(Operation::Messages, Schema::Anthropic { version }) => Ok(Box::new(
			MessagesPassthrough::direct(model_override, version.clone()),
		)),
		(
			Operation::Messages,
			Schema::GCPAnthropic {
				project_id,
				region,
				version,
			},
		) => Ok(Box::new(MessagesPassthrough::gcp(
			model_override,
			project_id.clone(),
			region.clone(),
			version.clone(),
		))),
		(Operation::Messages, Schema::OpenAI { version }) => Ok(Box::new(MessagesToOpenAI::new(
			model_override,
			version.as_deref(),
			needs_usage_accounting,
		))),
		(Operation::Rerank, Schema::Cohere {}) => Ok(Box::new(OpenAIPassthrough::rerank(
			model_override,
		))),
		(op, schema) => Err(AIError::UnsupportedConversion(format!(
			"{:?} on backend schema {}",
			op,
			schema.system_name()
		))),
	}
}

#[cfg(test)]
#[path = "translator_tests.rs"]
mod tests;
