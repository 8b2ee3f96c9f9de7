//! OpenAI Chat Completions wire types.

use serde::{Deserialize, Serialize};

use crate::llm::types::RequestEntity;
use crate::llm::{AIError, TokenUsage, conversion};

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct Request {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	pub messages: Vec<RequestMessage>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream_options: Option<StreamOptions>,
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
pub struct StreamOptions {
	#[serde(default)]
	pub include_usage: bool,
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
	pub completion_tokens: u64,
	#[serde(default)]
	pub total_tokens: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prompt_tokens_details: Option<PromptTokensDetails>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct PromptTokensDetails {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cached_tokens: Option<u64>,
	#[serde(flatten, default)]
	pub rest: serde_json::Value,
}

impl Usage {
	pub fn token_usage(&self) -> TokenUsage {
		TokenUsage {
			input: Some(self.prompt_tokens),
			cached_input: self
				.prompt_tokens_details
				.as_ref()
				.and_then(|d| d.cached_tokens),
			cache_creation_input: None,
			output: Some(self.completion_tokens),
			total: Some(self.total_tokens),
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

	fn to_anthropic(&self, model: &str) -> Result<Vec<u8>, AIError> {
		conversion::messages::from_completions::translate(self, model)
	}

	fn to_gemini(&self, model: &str) -> Result<Vec<u8>, AIError> {
		conversion::gemini::from_completions::translate(self, model)
	}
}

// 'typed' provides the fully structured view the conversion code works with.
pub mod typed {
	use serde::{Deserialize, Serialize};
	use serde_json::Value;

	pub const SYSTEM_ROLE: &str = "system";
	pub const DEVELOPER_ROLE: &str = "developer";
	pub const USER_ROLE: &str = "user";
	pub const ASSISTANT_ROLE: &str = "assistant";
	pub const TOOL_ROLE: &str = "tool";

	#[derive(Debug, Deserialize, Clone, Serialize, Default)]
	pub struct Request {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub model: Option<String>,
		#[serde(default)]
		pub messages: Vec<RequestMessage>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub max_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub max_completion_tokens: Option<u64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub temperature: Option<f64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub top_p: Option<f64>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stop: Option<Stop>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stream: Option<bool>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub stream_options: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tools: Option<Vec<Tool>>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_choice: Option<ToolChoiceOption>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub user: Option<String>,
	}

	impl Request {
		/// The effective completion budget; `max_tokens` is the deprecated
		/// spelling.
		pub fn max_tokens(&self) -> Option<u64> {
			self.max_completion_tokens.or(self.max_tokens)
		}

		pub fn stop_sequences(&self) -> Vec<String> {
			match &self.stop {
				Some(Stop::String(s)) => vec![s.clone()],
				Some(Stop::StringArray(v)) => v.clone(),
				None => Vec::new(),
			}
		}
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct RequestMessage {
		pub role: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub content: Option<MessageContent>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_calls: Option<Vec<MessageToolCall>>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_call_id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
	}

	impl RequestMessage {
		/// Flatten the content to text; array parts are joined.
		pub fn text(&self) -> Option<String> {
			match &self.content {
				Some(MessageContent::Text(t)) => Some(t.clone()),
				Some(MessageContent::Parts(parts)) => {
					let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
					if texts.is_empty() {
						None
					} else {
						Some(texts.join("\n"))
					}
				},
				None => None,
			}
		}
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(untagged)]
	pub enum MessageContent {
		Text(String),
		Parts(Vec<ContentPart>),
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ContentPart {
		pub r#type: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub text: Option<String>,
		#[serde(flatten, default)]
		pub rest: Value,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(untagged)]
	pub enum Stop {
		String(String),
		StringArray(Vec<String>),
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct Tool {
		pub r#type: String,
		pub function: FunctionObject,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionObject {
		pub name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub description: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub parameters: Option<Value>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	#[serde(untagged)]
	pub enum ToolChoiceOption {
		Mode(String),
		Named(NamedToolChoice),
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct NamedToolChoice {
		pub r#type: String,
		pub function: FunctionName,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionName {
		pub name: String,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct MessageToolCall {
		pub id: String,
		pub r#type: String,
		pub function: FunctionCall,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionCall {
		pub name: String,
		pub arguments: String,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct Response {
		pub id: String,
		pub object: String,
		pub created: u64,
		pub model: String,
		pub choices: Vec<ChatChoice>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub usage: Option<Usage>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ChatChoice {
		pub index: u32,
		pub message: ResponseMessage,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub finish_reason: Option<FinishReason>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ResponseMessage {
		pub role: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub content: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_calls: Option<Vec<MessageToolCall>>,
	}

	#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq)]
	#[serde(rename_all = "snake_case")]
	pub enum FinishReason {
		Stop,
		Length,
		ToolCalls,
		ContentFilter,
		FunctionCall,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct Usage {
		pub prompt_tokens: u64,
		pub completion_tokens: u64,
		pub total_tokens: u64,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub prompt_tokens_details: Option<PromptTokensDetails>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct PromptTokensDetails {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub cached_tokens: Option<u64>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct StreamResponse {
		pub id: String,
		pub object: String,
		pub created: u64,
		pub model: String,
		pub choices: Vec<ChatChoiceStream>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub usage: Option<Usage>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ChatChoiceStream {
		pub index: u32,
		pub delta: StreamResponseDelta,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub finish_reason: Option<FinishReason>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize, Default)]
	pub struct StreamResponseDelta {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub role: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub content: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub tool_calls: Option<Vec<ToolCallChunk>>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ToolCallChunk {
		pub index: u32,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub id: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub r#type: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub function: Option<FunctionCallStream>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct FunctionCallStream {
		#[serde(skip_serializing_if = "Option::is_none")]
		pub name: Option<String>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub arguments: Option<String>,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ErrorResponse {
		pub error: ErrorBody,
	}

	#[derive(Debug, Deserialize, Clone, Serialize)]
	pub struct ErrorBody {
		pub r#type: String,
		pub message: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub param: Option<Value>,
		#[serde(skip_serializing_if = "Option::is_none")]
		pub code: Option<Value>,
	}
}
