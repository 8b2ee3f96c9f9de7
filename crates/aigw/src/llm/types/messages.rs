//! Anthropic Messages wire types.

use serde::{Deserialize, Serialize};

use crate::llm::types::RequestEntity;
use crate::llm::{AIError, TokenUsage, conversion};

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub messages: Vec<RequestMessage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub system: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tools: Option<Vec<serde_json::Value>>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct RequestMessage {
	pub role: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<serde_json::Value>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Response {
	pub model: String,
	pub usage: Usage,
	#[serde(default)]
	pub content: Vec<serde_json::Value>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Usage {
	#[serde(default)]
	pub input_tokens: u64,
	#[serde(default)]
	pub output_tokens: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_creation_input_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_read_input_tokens: Option<u64>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

impl Usage {
	/// The Messages API defines only input/output; the total slot stays
	/// empty so derived totals are never double counted downstream.
	pub fn token_usage(&self) -> TokenUsage {
		TokenUsage {
			input: Some(self.input_tokens),
			cached_input: self.cache_read_input_tokens,
			cache_creation_input: self.cache_creation_input_tokens,
			output: Some(self.output_tokens),
			total: None,
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

	fn stream(&self) -> bool {
		self.stream.unwrap_or_default()
	}

	fn message_count(&self) -> usize {
		self.messages.len()
	}

	fn tool_count(&self) -> usize {
		self.tools.as_ref().map(Vec::len).unwrap_or_default()
	}

	fn serialize(&self) -> Result<Vec<u8>, AIError> {
		serde_json::to_vec(self).map_err(AIError::RequestMarshal)
	}

	fn serialize_with_model(&self, model: &str) -> Result<Vec<u8>, AIError> {
		let mut req = self.clone();
		req.model = Some(model.to_string());
		serde_json::to_vec(&req).map_err(AIError::RequestMarshal)
	}

	fn to_openai_chat(&self, model: &str) -> Result<Vec<u8>, AIError> {
		conversion::completions::from_messages::translate(self, model)
	}

	fn to_anthropic(&self, model: &str) -> Result<Vec<u8>, AIError> {
		self.serialize_with_model(model)
	}
}

// 'typed' provides the fully structured view the conversion code works with.
pub mod typed {
	use serde::{Deserialize, Deserializer, Serialize};
	use serde_json::Value;

	#[derive(Copy, Clone, Deserialize, Serialize, Debug, PartialEq, Eq, Default)]
	#[serde(rename_all = "snake_case")]
	pub enum Role {
		#[default]
		User,
		Assistant,
	}

	#[derive(Clone, Deserialize, Serialize, Debug)]
	pub struct ContentTextBlock {
		pub text: String,
	}

	#[derive(Clone, Deserialize, Serialize, Debug)]
	#[serde(rename_all = "snake_case", tag = "type")]
	pub enum ContentBlock {
		Text(ContentTextBlock),
		Thinking {
			thinking: String,
			#[serde(default)]
			signature: String,
		},
		ToolUse {
			id: String,
			name: String,
			input: Value,
		},
		ToolResult {
			tool_use_id: String,
			content: ToolResultContent,
			#[serde(skip_serializing_if = "Option::is_none")]
			is_error: Option<bool>,
		},
		// There are many more block kinds; the ones we do not translate are
		// accepted without failing.
		#[serde(other)]
		Unknown,
	}

	#[derive(Debug, Serialize, Deserialize, Clone)]
	#[serde(untagged)]
	pub enum ToolResultContent {
		Text(String),
		Array(Vec<Value>),
	}

	impl ToolResultContent {
		pub fn text(&self) -> String {
			match self {
				ToolResultContent::Text(t) => t.clone(),
				ToolResultContent::Array(parts) => parts
					.iter()
					.filter_map(|p| p.get("text").and_then(Value::as_str))
					.collect::<Vec<_>>()
					.join("\n"),
			}
		}
	}

	#[derive(Clone, Deserialize, Serialize, Debug)]
	pub struct Message {
		pub role: Role,
		#[serde(deserialize_with = "deserialize_content")]
		pub content: Vec<ContentBlock>,
	}

	// Content may be a bare string or an array of blocks.
	fn deserialize_content<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
	where
		D: Deserializer<'de>,
	{
		use serde::de::Error;

		let value = Value::deserialize(deserializer)?;
		match value {
			Value::String(text) => Ok(vec![ContentBlock::Text(ContentTextBlock { text })]),
			Value::Array(_) => Vec::<ContentBlock>::deserialize(value).map_err(D::Error::custom),
			_ => Err(D::Error::custom(
				"content must be either a string or an array",
			)),
		}
	}

	/// System prompt: a bare string or an array of text blocks.
	#[derive(Clone, Debug, Serialize, Deserialize)]
	#[serde(untagged)]
	pub enum SystemPrompt {
		Text(String),
		Blocks(Vec<SystemContentBlock>),
	}

	#[derive(Clone, Debug, Serialize, Deserialize)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum SystemContentBlock {
		Text { text: String },
	}

	#[derive(Deserialize, Serialize, Default, Debug)]
	pub struct Request {
		pub messages: Vec<Message>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub system: Option<SystemPrompt>,
		pub model: String,
		/// The maximum number of tokens to generate before stopping.
		/// Required by the API.
		pub max_tokens: u64,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		pub stop_sequences: Vec<String>,
		#[serde(default, skip_serializing_if = "std::ops::Not::not")]
		pub stream: bool,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub temperature: Option<f64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_p: Option<f64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_k: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tools: Option<Vec<Tool>>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_choice: Option<ToolChoice>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub metadata: Option<Metadata>,
	}

	/// Response body for the Messages API.
	#[derive(Debug, Serialize, Deserialize, Clone)]
	pub struct MessagesResponse {
		pub id: String,
		pub r#type: String,
		pub role: Role,
		pub content: Vec<ContentBlock>,
		pub model: String,
		pub stop_reason: Option<StopReason>,
		pub stop_sequence: Option<String>,
		pub usage: Usage,
	}

	#[derive(Clone, Serialize, Deserialize, Debug)]
	#[serde(rename_all = "snake_case", tag = "type")]
	pub enum MessagesStreamEvent {
		MessageStart {
			message: MessagesResponse,
		},
		ContentBlockStart {
			index: usize,
			content_block: ContentBlock,
		},
		ContentBlockDelta {
			index: usize,
			delta: ContentBlockDelta,
		},
		ContentBlockStop {
			index: usize,
		},
		MessageDelta {
			delta: MessageDelta,
			usage: MessageDeltaUsage,
		},
		MessageStop,
		Ping,
		Error {
			error: MessagesError,
		},
	}

	impl MessagesStreamEvent {
		/// The SSE `event:` name for this event type.
		pub fn event_name(&self) -> &'static str {
			match self {
				Self::MessageStart { .. } => "message_start",
				Self::ContentBlockStart { .. } => "content_block_start",
				Self::ContentBlockDelta { .. } => "content_block_delta",
				Self::ContentBlockStop { .. } => "content_block_stop",
				Self::MessageDelta { .. } => "message_delta",
				Self::MessageStop => "message_stop",
				Self::Ping => "ping",
				Self::Error { .. } => "error",
			}
		}
	}

	#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
	#[serde(rename_all = "snake_case", tag = "type")]
	#[allow(clippy::enum_variant_names)]
	pub enum ContentBlockDelta {
		TextDelta {
			text: String,
		},
		InputJsonDelta {
			partial_json: String,
		},
		ThinkingDelta {
			thinking: String,
		},
		SignatureDelta {
			signature: String,
		},
		#[serde(other)]
		Unknown,
	}

	#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Default)]
	pub struct MessageDeltaUsage {
		/// Cumulative output tokens.
		pub output_tokens: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub input_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_creation_input_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_read_input_tokens: Option<u64>,
	}

	#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
	pub struct MessageDelta {
		pub stop_reason: Option<StopReason>,
		pub stop_sequence: Option<String>,
	}

	#[derive(Debug, Deserialize, Serialize, Clone)]
	pub struct MessagesErrorResponse {
		pub r#type: String,
		pub error: MessagesError,
	}

	#[derive(Debug, Deserialize, Serialize, Clone)]
	pub struct MessagesError {
		pub r#type: String,
		pub message: String,
	}

	#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
	#[serde(rename_all = "snake_case")]
	pub enum StopReason {
		EndTurn,
		MaxTokens,
		StopSequence,
		ToolUse,
		Refusal,
		PauseTurn,
		ModelContextWindowExceeded,
	}

	#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
	pub struct Usage {
		pub input_tokens: u64,
		pub output_tokens: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_creation_input_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cache_read_input_tokens: Option<u64>,
	}

	#[derive(Debug, Serialize, Deserialize, Clone)]
	pub struct Tool {
		pub name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub description: Option<String>,
		pub input_schema: Value,
	}

	#[derive(Debug, Serialize, Deserialize, Clone)]
	#[serde(tag = "type", rename_all = "snake_case")]
	pub enum ToolChoice {
		Auto,
		Any,
		Tool { name: String },
		None,
	}

	#[derive(Debug, Serialize, Deserialize, Default, Clone)]
	pub struct Metadata {
		#[serde(flatten)]
		pub fields: std::collections::HashMap<String, String>,
	}
}
