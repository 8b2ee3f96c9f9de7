//! Gemini `generateContent` wire types (Vertex AI surface).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::TokenUsage;

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub system_instruction: Option<Content>,
	pub contents: Vec<Content>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tools: Option<Vec<Tool>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_config: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct Content {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	#[serde(default)]
	pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub function_call: Option<FunctionCall>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub function_response: Option<FunctionResponse>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct FunctionCall {
	pub name: String,
	#[serde(default)]
	pub args: Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct FunctionResponse {
	pub name: String,
	pub response: Value,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
	pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct FunctionDeclaration {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parameters: Option<Value>,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_output_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stop_sequences: Option<Vec<String>>,
}

/// Both the buffered response and each SSE frame of a streamed response.
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub candidates: Option<Vec<Candidate>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usage_metadata: Option<UsageMetadata>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<Content>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub finish_reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub index: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Copy, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prompt_token_count: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub candidates_token_count: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_token_count: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cached_content_token_count: Option<u64>,
}

impl UsageMetadata {
	pub fn token_usage(&self) -> TokenUsage {
		TokenUsage {
			input: self.prompt_token_count,
			cached_input: self.cached_content_token_count,
			cache_creation_input: None,
			output: self.candidates_token_count,
			total: self.total_token_count,
		}
	}
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ErrorResponse {
	pub error: ErrorBody,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ErrorBody {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<u32>,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
}
