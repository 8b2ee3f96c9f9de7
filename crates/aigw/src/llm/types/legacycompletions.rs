//! OpenAI legacy Completions wire types.

use serde::{Deserialize, Serialize};

use crate::llm::types::RequestEntity;
use crate::llm::types::completions::{StreamOptions, Usage};
use crate::llm::AIError;

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub prompt: serde_json::Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream_options: Option<StreamOptions>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

/// Shared by the buffered response and the stream chunks; both carry
/// `choices` plus an optional `usage`.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Response {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage: Option<Usage>,
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

	fn force_stream_usage(&mut self) -> bool {
		match &mut self.stream_options {
			Some(opts) if opts.include_usage => false,
			Some(opts) => {
				opts.include_usage = true;
				true
			},
			None => {
				self.stream_options = Some(StreamOptions {
					include_usage: true,
					rest: serde_json::Value::Object(Default::default()),
				});
				true
			},
		}
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
