//! OpenAI Responses wire types.

use serde::{Deserialize, Serialize};

use crate::llm::types::RequestEntity;
use crate::llm::{AIError, TokenUsage};

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub input: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Response {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage: Option<Usage>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Usage {
	#[serde(default)]
	pub input_tokens: u64,
	#[serde(default)]
	pub output_tokens: u64,
	#[serde(default)]
	pub total_tokens: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub input_tokens_details: Option<InputTokensDetails>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct InputTokensDetails {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cached_tokens: Option<u64>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

impl Usage {
	pub fn token_usage(&self) -> TokenUsage {
		TokenUsage {
			input: Some(self.input_tokens),
			cached_input: self
				.input_tokens_details
				.as_ref()
				.and_then(|d| d.cached_tokens),
			cache_creation_input: None,
			output: Some(self.output_tokens),
			total: Some(self.total_tokens),
		}
	}
}

/// Loose view of a Responses stream event; we only care about the terminal
/// `response.completed` event, which carries the final usage.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct StreamEvent {
	pub r#type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub response: Option<Response>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

impl RequestEntity for Request {
	fn model(&self) -> Option<&str> {
		self.model.as_deref()
	}

	fn set_model(&mut self, model: &str) {
		self.model = Some(model.to_string());
	}

	fn stream(&self) -> bool {
		self.stream.unwrap_or_default()
	}

	fn serialize(&self) -> Result<Vec<u8>, AIError> {
		serde_json::to_vec(self).map_err(AIError::RequestMarshal)
	}

	fn serialize_with_model(&self, model: &str) -> Result<Vec<u8>, AIError> {
		let mut req = self.clone();
		req.model = Some(model.to_string());
		serde_json::to_vec(&req).map_err(AIError::RequestMarshal)
	}
}
