//! Wire entities for the supported API surfaces.
//!
//! Each schema gets a loose struct that round-trips unknown fields through a
//! flattened `rest` value, plus (where conversion needs it) a `typed`
//! submodule with the fully structured view. The loose form is what the
//! filter parses and re-serializes; the typed form is what the conversion
//! code manipulates.

use crate::llm::{AIError, Operation};

pub mod completions;
pub mod embeddings;
pub mod gemini;
pub mod images;
pub mod legacycompletions;
pub mod messages;
pub mod rerank;
pub mod responses;

/// Abstraction over the per-endpoint request formats, giving the filter
/// uniform access to the model name, the streaming flag and the outbound
/// serializations a translator may need.
pub trait RequestEntity: Send + std::fmt::Debug {
	fn model(&self) -> Option<&str>;
	fn set_model(&mut self, model: &str);
	fn stream(&self) -> bool {
		false
	}
	/// Ensure a streaming response will carry usage totals
	/// (`stream_options.include_usage` for OpenAI-shaped requests).
	/// Returns true when the body was changed.
	fn force_stream_usage(&mut self) -> bool {
		false
	}
	fn message_count(&self) -> usize {
		0
	}
	fn tool_count(&self) -> usize {
		0
	}

	/// Re-serialize the (possibly mutated) entity.
	fn serialize(&self) -> Result<Vec<u8>, AIError>;
	/// Serialize with the model field replaced.
	fn serialize_with_model(&self, model: &str) -> Result<Vec<u8>, AIError>;

	fn to_openai_chat(&self, _model: &str) -> Result<Vec<u8>, AIError> {
		Err(AIError::UnsupportedConversion(
			"openai chat completions".to_string(),
		))
	}
	fn to_anthropic(&self, _model: &str) -> Result<Vec<u8>, AIError> {
		Err(AIError::UnsupportedConversion(
			"anthropic messages".to_string(),
		))
	}
	fn to_gemini(&self, _model: &str) -> Result<Vec<u8>, AIError> {
		Err(AIError::UnsupportedConversion(
			"gemini generateContent".to_string(),
		))
	}
}

/// Outcome of parsing a request body for one operation.
#[derive(Debug)]
pub struct ParsedRequest {
	pub model: String,
	pub entity: Box<dyn RequestEntity>,
	pub stream: bool,
	/// Set when the parser had to mutate the body (for example to force
	/// `stream_options.include_usage` so costs can be accounted).
	pub mutated: Option<Vec<u8>>,
}

/// Parse the buffered request body for the operation.
///
/// `need_cost_accounting` is true when any request cost is configured; in
/// that case streaming OpenAI-shaped requests are rewritten to include usage
/// in the final stream event.
pub fn parse_request(
	op: Operation,
	raw: &[u8],
	need_cost_accounting: bool,
) -> Result<ParsedRequest, AIError> {
	fn finish<E: RequestEntity + 'static>(
		mut entity: E,
		need_cost_accounting: bool,
	) -> Result<ParsedRequest, AIError> {
		let model = entity
			.model()
			.ok_or_else(|| AIError::MissingField("model not specified".to_string()))?
			.to_string();
		let stream = entity.stream();
		let mutated = if need_cost_accounting && stream && entity.force_stream_usage() {
			Some(entity.serialize()?)
		} else {
			None
		};
		Ok(ParsedRequest {
			model,
			entity: Box::new(entity),
			stream,
			mutated,
		})
	}

	match op {
		Operation::ChatCompletions => finish(
			serde_json::from_slice::<completions::Request>(raw).map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::Completions => finish(
			serde_json::from_slice::<legacycompletions::Request>(raw)
				.map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::Embeddings => finish(
			serde_json::from_slice::<embeddings::Request>(raw).map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::ImageGeneration => finish(
			serde_json::from_slice::<images::Request>(raw).map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::Rerank => finish(
			serde_json::from_slice::<rerank::Request>(raw).map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::Messages => finish(
			serde_json::from_slice::<messages::Request>(raw).map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::Responses => finish(
			serde_json::from_slice::<responses::Request>(raw).map_err(AIError::RequestParsing)?,
			need_cost_accounting,
		),
		Operation::Models => Err(AIError::Internal(
			"models endpoint does not read a body".to_string(),
		)),
	}
}
