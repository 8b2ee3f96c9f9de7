//! OpenAI Embeddings wire types.

use serde::{Deserialize, Serialize};

use crate::llm::types::RequestEntity;
use crate::llm::{AIError, TokenUsage};

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub input: serde_json::Value,
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
	pub prompt_tokens: u64,
	#[serde(default)]
	pub total_tokens: u64,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

impl Usage {
	pub fn token_usage(&self) -> TokenUsage {
		TokenUsage {
			input: Some(self.prompt_tokens),
			total: Some(self.total_tokens),
			..Default::default()
		}
	}
}

impl RequestEntity for Request {
	fn model(&self) -> Option<&str> {
		self.model.as_deref()
	}

	fn set_model(&mut self, model: &str) {
		self.model = Some(model.to_string());
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
