//! Pure schema conversion between the supported wire formats.
//!
//! Each module is named for the TARGET format and contains `from_<source>`
//! submodules with the request, response, error and stream translations.

use rand::Rng;

use crate::llm::TokenUsage;

pub mod completions;
pub mod gemini;
pub mod messages;

/// One step of a streaming conversion: the bytes to forward, the cumulative
/// token usage reported so far, and the response model once known.
#[derive(Debug, Default)]
pub struct StreamStep {
	pub out: Vec<u8>,
	/// Cumulative totals parsed from the stream. Never decreases.
	pub usage: TokenUsage,
	/// Cumulative output tokens, falling back to a per-chunk estimate for
	/// providers that only report usage at end-of-stream. Used for latency
	/// accounting only.
	pub output_tokens_estimate: u64,
	pub response_model: Option<String>,
}

pub fn generate_anthropic_message_id() -> String {
	format!("msg_{:024x}", rand::rng().random::<u128>() >> 32)
}

pub fn generate_chat_id() -> String {
	format!("chatcmpl-{:016x}", rand::rng().random::<u64>())
}

pub fn generate_tool_call_id() -> String {
	format!("call_{:016x}", rand::rng().random::<u64>())
}

/// OpenAI error envelope `error.type` for a plain-text upstream error.
pub fn openai_error_type(status: u16) -> &'static str {
	match status {
		400 => "invalid_request_error",
		401 => "authentication_error",
		403 => "permission_error",
		404 => "not_found_error",
		429 => "rate_limit_error",
		503 => "service_unavailable_error",
		_ => "api_error",
	}
}

/// Anthropic error envelope `error.type` for a plain-text upstream error.
pub fn anthropic_error_type(status: u16) -> &'static str {
	match status {
		400 => "invalid_request_error",
		401 => "authentication_error",
		403 => "permission_error",
		404 => "not_found_error",
		413 => "request_too_large",
		429 => "rate_limit_error",
		503 | 529 => "overloaded_error",
		_ => "api_error",
	}
}
