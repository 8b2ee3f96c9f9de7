//! Conversions targeting the Anthropic Messages format.

use crate::llm::TokenUsage;
use crate::llm::types::messages::typed as messages;

/// Anthropic requires `max_tokens`; OpenAI requests may omit a budget.
pub const DEFAULT_MAX_TOKENS: u64 = 4096;

pub fn usage_tokens(u: &messages::Usage) -> TokenUsage {
	// The Messages API defines only input/output; a total would be derived
	// and recording it would double count, so the slot stays empty.
	TokenUsage {
		input: Some(u.input_tokens),
		cached_input: u.cache_read_input_tokens,
		cache_creation_input: u.cache_creation_input_tokens,
		output: Some(u.output_tokens),
		total: None,
	}
}

pub mod from_completions {
	use std::collections::HashMap;

	use bytes::BytesMut;
	use itertools::Itertools;
	use serde_json::Value;

	use super::DEFAULT_MAX_TOKENS;
	use crate::json;
	use crate::llm::conversion::{StreamStep, generate_chat_id, openai_error_type};
	use crate::llm::types::completions::typed as completions;
	use crate::llm::types::messages::typed as messages;
	use crate::llm::{AIError, TokenUsage, types};
	use crate::sse;

	/// Translate an OpenAI chat completions request to an Anthropic messages
	/// request.
	pub fn translate(req: &types::completions::Request, model: &str) -> Result<Vec<u8>, AIError> {
		let typed =
			json::convert::<_, completions::Request>(req).map_err(AIError::RequestMarshal)?;
		let xlated = translate_internal(typed, model.to_string());
		serde_json::to_vec(&xlated).map_err(AIError::RequestMarshal)
	}

	fn translate_internal(req: completions::Request, model: String) -> messages::Request {
		let max_tokens = req.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS);
		let stop_sequences = req.stop_sequences();

		// Anthropic has all system prompts in a single field. Join them.
		let system = req
			.messages
			.iter()
			.filter(|m| is_system_role(&m.role))
			.filter_map(|m| m.text())
			.join("\n");

		let mut msgs: Vec<messages::Message> = Vec::new();
		for msg in req.messages.iter().filter(|m| !is_system_role(&m.role)) {
			match msg.role.as_str() {
				completions::ASSISTANT_ROLE => {
					let mut content = Vec::new();
					if let Some(text) = msg.text() {
						content.push(messages::ContentBlock::Text(messages::ContentTextBlock {
							text,
						}));
					}
					for tc in msg.tool_calls.iter().flatten() {
						content.push(messages::ContentBlock::ToolUse {
							id: tc.id.clone(),
							name: tc.function.name.clone(),
							input: serde_json::from_str(&tc.function.arguments)
								.unwrap_or_else(|_| Value::Object(Default::default())),
						});
					}
					if !content.is_empty() {
						msgs.push(messages::Message {
							role: messages::Role::Assistant,
							content,
						});
					}
				},
				completions::TOOL_ROLE => {
					// Tool results live in user-role messages on the
					// Anthropic side.
					msgs.push(messages::Message {
						role: messages::Role::User,
						content: vec![messages::ContentBlock::ToolResult {
							tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
							content: messages::ToolResultContent::Text(
								msg.text().unwrap_or_default(),
							),
							is_error: None,
						}],
					});
				},
				_ => {
					if let Some(text) = msg.text() {
						msgs.push(messages::Message {
							role: messages::Role::User,
							content: vec![messages::ContentBlock::Text(
								messages::ContentTextBlock { text },
							)],
						});
					}
				},
			}
		}

		let tools = req.tools.as_ref().map(|tools| {
			tools
				.iter()
				.filter(|t| t.r#type == "function")
				.map(|t| messages::Tool {
					name: t.function.name.clone(),
					description: t.function.description.clone(),
					input_schema: t
						.function
						.parameters
						.clone()
						.unwrap_or_else(|| Value::Object(Default::default())),
				})
				.collect::<Vec<_>>()
		});

		let tool_choice = req.tool_choice.as_ref().and_then(|choice| match choice {
			completions::ToolChoiceOption::Mode(mode) => match mode.as_str() {
				"auto" => Some(messages::ToolChoice::Auto),
				"required" => Some(messages::ToolChoice::Any),
				"none" => Some(messages::ToolChoice::None),
				_ => None,
			},
			completions::ToolChoiceOption::Named(named) => Some(messages::ToolChoice::Tool {
				name: named.function.name.clone(),
			}),
		});

		let metadata = req.user.clone().map(|user| messages::Metadata {
			fields: HashMap::from([("user_id".to_string(), user)]),
		});

		messages::Request {
			messages: msgs,
			system: if system.is_empty() {
				None
			} else {
				Some(messages::SystemPrompt::Text(system))
			},
			model,
			max_tokens,
			stop_sequences,
			stream: req.stream.unwrap_or(false),
			temperature: req.temperature,
			top_p: req.top_p,
			top_k: None, // OpenAI has no top_k
			tools,
			tool_choice,
			metadata,
		}
	}

	fn is_system_role(role: &str) -> bool {
		role == completions::SYSTEM_ROLE || role == completions::DEVELOPER_ROLE
	}

	/// Translate an Anthropic messages response to an OpenAI chat completion.
	pub fn translate_response(bytes: &[u8]) -> Result<(Vec<u8>, TokenUsage, String), AIError> {
		let resp = serde_json::from_slice::<messages::MessagesResponse>(bytes)
			.map_err(AIError::ResponseParsing)?;
		let usage = super::usage_tokens(&resp.usage);
		let model = resp.model.clone();
		let openai = translate_response_internal(resp);
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok((body, usage, model))
	}

	fn translate_response_internal(resp: messages::MessagesResponse) -> completions::Response {
		let mut tool_calls: Vec<completions::MessageToolCall> = Vec::new();
		let mut content = None;
		for block in resp.content {
			match block {
				messages::ContentBlock::Text(messages::ContentTextBlock { text }) => {
					content = Some(text)
				},
				messages::ContentBlock::ToolUse { id, name, input } => {
					let Ok(args) = serde_json::to_string(&input) else {
						continue;
					};
					tool_calls.push(completions::MessageToolCall {
						id,
						r#type: "function".to_string(),
						function: completions::FunctionCall {
							name,
							arguments: args,
						},
					});
				},
				// Tool results belong on the request path; thinking has no
				// OpenAI counterpart.
				_ => continue,
			}
		}
		let message = completions::ResponseMessage {
			role: completions::ASSISTANT_ROLE.to_string(),
			content,
			tool_calls: if tool_calls.is_empty() {
				None
			} else {
				Some(tool_calls)
			},
		};
		let finish_reason = resp.stop_reason.as_ref().map(super::translate_stop_reason);
		let usage = completions::Usage {
			prompt_tokens: resp.usage.input_tokens,
			completion_tokens: resp.usage.output_tokens,
			total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
			prompt_tokens_details: resp.usage.cache_read_input_tokens.map(|cached| {
				completions::PromptTokensDetails {
					cached_tokens: Some(cached),
				}
			}),
		};
		completions::Response {
			id: resp.id,
			object: "chat.completion".to_string(),
			// Anthropic responses carry no timestamp; stamp "now".
			created: chrono::Utc::now().timestamp() as u64,
			model: resp.model,
			choices: vec![completions::ChatChoice {
				index: 0,
				message,
				finish_reason,
			}],
			usage: Some(usage),
		}
	}

	/// Rewrite an Anthropic error body into the OpenAI error envelope.
	pub fn translate_error(status: u16, bytes: &[u8]) -> Result<Vec<u8>, AIError> {
		let (kind, message) =
			match serde_json::from_slice::<messages::MessagesErrorResponse>(bytes) {
				Ok(res) => {
					let kind = match res.error.r#type.as_str() {
						"overloaded_error" => "service_unavailable_error".to_string(),
						other => other.to_string(),
					};
					(kind, res.error.message)
				},
				// Plain-text upstream error: classify by HTTP status.
				Err(_) => (
					openai_error_type(status).to_string(),
					String::from_utf8_lossy(bytes).to_string(),
				),
			};
		let m = completions::ErrorResponse {
			error: completions::ErrorBody {
				r#type: kind,
				message,
				param: None,
				code: None,
			},
		};
		serde_json::to_vec(&m).map_err(AIError::ResponseMarshal)
	}

	struct ToolCallState {
		id: String,
		name: String,
		openai_index: u32,
		sent_header: bool,
	}

	/// Stateful Anthropic → OpenAI stream converter.
	///
	/// Consumes Anthropic `message_start`/`content_block_*`/`message_delta`/
	/// `message_stop` events and emits `chat.completion.chunk` frames,
	/// terminating with a usage-bearing chunk and `data: [DONE]`.
	pub struct TranslateStream {
		reader: sse::EventReader,
		message_id: Option<String>,
		model: String,
		created: u64,
		usage: messages::Usage,
		stop_reason: Option<messages::StopReason>,
		tool_calls: HashMap<usize, ToolCallState>,
		next_tool_index: u32,
		output_estimate: u64,
		done: bool,
	}

	impl TranslateStream {
		pub fn new(request_model: &str) -> Self {
			Self {
				reader: sse::EventReader::new(),
				message_id: None,
				model: request_model.to_string(),
				created: chrono::Utc::now().timestamp() as u64,
				usage: messages::Usage::default(),
				stop_reason: None,
				tool_calls: HashMap::new(),
				next_tool_index: 0,
				output_estimate: 0,
				done: false,
			}
		}

		pub fn push(&mut self, chunk: &[u8], end_of_stream: bool) -> Result<StreamStep, AIError> {
			self.reader.push(chunk);
			let mut out = BytesMut::new();
			while let Some(ev) = self.reader.next_event() {
				self.handle_event(&ev, &mut out)?;
			}
			if end_of_stream {
				if let Some(ev) = self.reader.take_remainder() {
					// A truncated trailing event is dropped silently.
					let _ = self.handle_event(&ev, &mut out);
				}
				self.finalize(&mut out)?;
			}
			Ok(StreamStep {
				out: out.to_vec(),
				usage: super::usage_tokens(&self.usage),
				output_tokens_estimate: self.usage.output_tokens.max(self.output_estimate),
				response_model: Some(self.model.clone()),
			})
		}

		fn handle_event(&mut self, ev: &sse::Event, out: &mut BytesMut) -> Result<(), AIError> {
			let Ok(event) = serde_json::from_str::<messages::MessagesStreamEvent>(&ev.data) else {
				// Unknown event shapes flow through unconverted streams all
				// the time; skip rather than kill the response mid-flight.
				tracing::debug!(data = %ev.data, "unparseable anthropic stream event");
				return Ok(());
			};
			match event {
				messages::MessagesStreamEvent::MessageStart { message } => {
					self.message_id = Some(message.id);
					self.model = message.model;
					self.usage = message.usage;
				},
				messages::MessagesStreamEvent::ContentBlockStart {
					index,
					content_block,
				} => {
					if let messages::ContentBlock::ToolUse { id, name, .. } = content_block {
						let openai_index = self.next_tool_index;
						self.next_tool_index += 1;
						self.tool_calls.insert(
							index,
							ToolCallState {
								id,
								name,
								openai_index,
								sent_header: false,
							},
						);
					}
					// The first delta carries the OpenAI tool-call header.
				},
				messages::MessagesStreamEvent::ContentBlockDelta { index, delta } => {
					match delta {
						messages::ContentBlockDelta::TextDelta { text } => {
							self.output_estimate += 1;
							let chunk = self.mk_chunk(
								completions::StreamResponseDelta {
									content: Some(text),
									..Default::default()
								},
								None,
							);
							self.emit(out, &chunk)?;
						},
						messages::ContentBlockDelta::InputJsonDelta { partial_json } => {
							let Some(tc) = self.tool_calls.get_mut(&index) else {
								return Ok(());
							};
							self.output_estimate += 1;
							let first = !tc.sent_header;
							tc.sent_header = true;
							let tool_chunk = completions::ToolCallChunk {
								index: tc.openai_index,
								id: first.then(|| tc.id.clone()),
								r#type: first.then(|| "function".to_string()),
								function: Some(completions::FunctionCallStream {
									name: first.then(|| tc.name.clone()),
									arguments: Some(partial_json),
								}),
							};
							let chunk = self.mk_chunk(
								completions::StreamResponseDelta {
									tool_calls: Some(vec![tool_chunk]),
									..Default::default()
								},
								None,
							);
							self.emit(out, &chunk)?;
						},
						// Thinking and signature deltas have no chunk shape
						// on the OpenAI side.
						_ => {},
					}
				},
				messages::MessagesStreamEvent::ContentBlockStop { index } => {
					self.tool_calls.remove(&index);
				},
				messages::MessagesStreamEvent::MessageDelta { delta, usage } => {
					if delta.stop_reason.is_some() {
						self.stop_reason = delta.stop_reason;
					}
					self.usage.output_tokens = usage.output_tokens;
					if let Some(i) = usage.input_tokens {
						self.usage.input_tokens = i;
					}
					if usage.cache_read_input_tokens.is_some() {
						self.usage.cache_read_input_tokens = usage.cache_read_input_tokens;
					}
					if usage.cache_creation_input_tokens.is_some() {
						self.usage.cache_creation_input_tokens = usage.cache_creation_input_tokens;
					}
				},
				messages::MessagesStreamEvent::MessageStop => {
					let finish = self
						.stop_reason
						.as_ref()
						.map(super::translate_stop_reason)
						.unwrap_or(completions::FinishReason::Stop);
					let mut chunk = self.mk_chunk(Default::default(), None);
					chunk.choices[0].finish_reason = Some(finish);
					self.emit(out, &chunk)?;
				},
				messages::MessagesStreamEvent::Ping => {},
				messages::MessagesStreamEvent::Error { error } => {
					return Err(AIError::StreamError {
						provider: "anthropic",
						kind: error.r#type,
						message: error.message,
					});
				},
			}
			Ok(())
		}

		fn finalize(&mut self, out: &mut BytesMut) -> Result<(), AIError> {
			if self.done {
				return Ok(());
			}
			self.done = true;
			let usage = completions::Usage {
				prompt_tokens: self.usage.input_tokens,
				completion_tokens: self.usage.output_tokens,
				total_tokens: self.usage.input_tokens + self.usage.output_tokens,
				prompt_tokens_details: self.usage.cache_read_input_tokens.map(|cached| {
					completions::PromptTokensDetails {
						cached_tokens: Some(cached),
					}
				}),
			};
			let mut chunk = self.mk_chunk(Default::default(), Some(usage));
			chunk.choices = vec![];
			self.emit(out, &chunk)?;
			sse::write_done_frame(out);
			Ok(())
		}

		fn mk_chunk(
			&self,
			delta: completions::StreamResponseDelta,
			usage: Option<completions::Usage>,
		) -> completions::StreamResponse {
			completions::StreamResponse {
				id: self
					.message_id
					.clone()
					.unwrap_or_else(|| generate_chat_id()),
				object: "chat.completion.chunk".to_string(),
				created: self.created,
				model: self.model.clone(),
				choices: vec![completions::ChatChoiceStream {
					index: 0,
					delta,
					finish_reason: None,
				}],
				usage,
			}
		}

		fn emit(
			&self,
			out: &mut BytesMut,
			chunk: &completions::StreamResponse,
		) -> Result<(), AIError> {
			let json = serde_json::to_vec(chunk).map_err(AIError::ResponseMarshal)?;
			sse::write_data_frame(out, &json);
			Ok(())
		}
	}
}

/// Map an Anthropic stop reason to the OpenAI finish reason.
pub fn translate_stop_reason(
	reason: &messages::StopReason,
) -> crate::llm::types::completions::typed::FinishReason {
	use crate::llm::types::completions::typed::FinishReason;
	match reason {
		messages::StopReason::EndTurn => FinishReason::Stop,
		messages::StopReason::MaxTokens => FinishReason::Length,
		messages::StopReason::StopSequence => FinishReason::Stop,
		messages::StopReason::ToolUse => FinishReason::ToolCalls,
		messages::StopReason::Refusal => FinishReason::ContentFilter,
		messages::StopReason::PauseTurn => FinishReason::Stop,
		messages::StopReason::ModelContextWindowExceeded => FinishReason::Length,
	}
}

/// Usage scan for passthrough Anthropic streams: bytes flow unchanged, token
/// totals and the provider model are parsed on the side.
pub struct PassthroughScan {
	reader: crate::sse::EventReader,
	usage: messages::Usage,
	model: Option<String>,
	output_estimate: u64,
}

impl Default for PassthroughScan {
	fn default() -> Self {
		Self::new()
	}
}

impl PassthroughScan {
	pub fn new() -> Self {
		Self {
			reader: crate::sse::EventReader::new(),
			usage: messages::Usage::default(),
			model: None,
			output_estimate: 0,
		}
	}

	pub fn push(&mut self, chunk: &[u8], end_of_stream: bool) -> super::StreamStep {
		self.reader.push(chunk);
		loop {
			let ev = match self.reader.next_event() {
				Some(ev) => ev,
				None if end_of_stream => match self.reader.take_remainder() {
					Some(ev) => ev,
					None => break,
				},
				None => break,
			};
			let Ok(event) = serde_json::from_str::<messages::MessagesStreamEvent>(&ev.data) else {
				continue;
			};
			match event {
				messages::MessagesStreamEvent::MessageStart { message } => {
					self.usage = message.usage;
					self.model = Some(message.model);
				},
				messages::MessagesStreamEvent::ContentBlockDelta { .. } => {
					self.output_estimate += 1;
				},
				messages::MessagesStreamEvent::MessageDelta { usage, .. } => {
					self.usage.output_tokens = usage.output_tokens;
					if let Some(i) = usage.input_tokens {
						self.usage.input_tokens = i;
					}
					if usage.cache_read_input_tokens.is_some() {
						self.usage.cache_read_input_tokens = usage.cache_read_input_tokens;
					}
					if usage.cache_creation_input_tokens.is_some() {
						self.usage.cache_creation_input_tokens = usage.cache_creation_input_tokens;
					}
				},
				_ => {},
			}
		}
		super::StreamStep {
			out: chunk.to_vec(),
			usage: usage_tokens(&self.usage),
			output_tokens_estimate: self.usage.output_tokens.max(self.output_estimate),
			response_model: self.model.clone(),
		}
	}
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
