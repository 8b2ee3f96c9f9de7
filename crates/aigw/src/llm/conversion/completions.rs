//! Conversions targeting the OpenAI Chat Completions format.

use crate::llm::TokenUsage;
use crate::llm::types::completions::typed as completions;

pub fn usage_tokens(u: &completions::Usage) -> TokenUsage {
	TokenUsage {
		input: Some(u.prompt_tokens),
		cached_input: u
			.prompt_tokens_details
			.as_ref()
			.and_then(|d| d.cached_tokens),
		cache_creation_input: None,
		output: Some(u.completion_tokens),
		total: Some(u.total_tokens),
	}
}

/// Map an OpenAI finish reason to the Anthropic stop reason.
pub fn translate_finish_reason(
	reason: &completions::FinishReason,
) -> crate::llm::types::messages::typed::StopReason {
	use crate::llm::types::messages::typed::StopReason;
	match reason {
		completions::FinishReason::Stop => StopReason::EndTurn,
		completions::FinishReason::Length => StopReason::MaxTokens,
		completions::FinishReason::ToolCalls => StopReason::ToolUse,
		completions::FinishReason::ContentFilter => StopReason::Refusal,
		completions::FinishReason::FunctionCall => StopReason::ToolUse,
	}
}

pub mod from_messages {
	use bytes::BytesMut;
	use serde_json::Value;

	use crate::json;
	use crate::llm::conversion::{
		StreamStep, anthropic_error_type, generate_anthropic_message_id,
	};
	use crate::llm::types::completions::typed as completions;
	use crate::llm::types::messages::typed as messages;
	use crate::llm::{AIError, TokenUsage, types};
	use crate::sse;

	/// Translate an Anthropic messages request to an OpenAI chat completions
	/// request.
	pub fn translate(req: &types::messages::Request, model: &str) -> Result<Vec<u8>, AIError> {
		let typed = json::convert::<_, messages::Request>(req).map_err(AIError::RequestMarshal)?;
		let xlated = translate_internal(typed, model.to_string());
		serde_json::to_vec(&xlated).map_err(AIError::RequestMarshal)
	}

	fn translate_internal(req: messages::Request, model: String) -> completions::Request {
		let mut msgs: Vec<completions::RequestMessage> = Vec::new();

		if let Some(system) = req.system {
			let system_text = match system {
				messages::SystemPrompt::Text(text) => text,
				messages::SystemPrompt::Blocks(blocks) => blocks
					.into_iter()
					.map(|b| match b {
						messages::SystemContentBlock::Text { text } => text,
					})
					.collect::<Vec<_>>()
					.join("\n"),
			};
			msgs.push(completions::RequestMessage {
				role: completions::SYSTEM_ROLE.to_string(),
				content: Some(completions::MessageContent::Text(system_text)),
				tool_calls: None,
				tool_call_id: None,
				name: None,
			});
		}

		for msg in req.messages {
			match msg.role {
				messages::Role::User => {
					let mut user_text = String::new();
					for block in msg.content {
						match block {
							messages::ContentBlock::Text(messages::ContentTextBlock { text }) => {
								if !user_text.is_empty() {
									user_text.push('\n');
								}
								user_text.push_str(&text);
							},
							messages::ContentBlock::ToolResult {
								tool_use_id,
								content,
								..
							} => {
								msgs.push(completions::RequestMessage {
									role: completions::TOOL_ROLE.to_string(),
									content: Some(completions::MessageContent::Text(
										content.text(),
									)),
									tool_calls: None,
									tool_call_id: Some(tool_use_id),
									name: None,
								});
							},
							// Images and other block kinds have no plain-text
							// mapping here.
							_ => {},
						}
					}
					if !user_text.is_empty() {
						msgs.push(completions::RequestMessage {
							role: completions::USER_ROLE.to_string(),
							content: Some(completions::MessageContent::Text(user_text)),
							tool_calls: None,
							tool_call_id: None,
							name: None,
						});
					}
				},
				messages::Role::Assistant => {
					let mut assistant_text = None;
					let mut tool_calls: Vec<completions::MessageToolCall> = Vec::new();
					for block in msg.content {
						match block {
							messages::ContentBlock::Text(messages::ContentTextBlock { text }) => {
								assistant_text = Some(text);
							},
							messages::ContentBlock::ToolUse { id, name, input } => {
								tool_calls.push(completions::MessageToolCall {
									id,
									r#type: "function".to_string(),
									function: completions::FunctionCall {
										name,
										arguments: serde_json::to_string(&input)
											.unwrap_or_default(),
									},
								});
							},
							_ => {},
						}
					}
					if assistant_text.is_some() || !tool_calls.is_empty() {
						msgs.push(completions::RequestMessage {
							role: completions::ASSISTANT_ROLE.to_string(),
							content: assistant_text.map(completions::MessageContent::Text),
							tool_calls: if tool_calls.is_empty() {
								None
							} else {
								Some(tool_calls)
							},
							tool_call_id: None,
							name: None,
						});
					}
				},
			}
		}

		let tools: Vec<completions::Tool> = req
			.tools
			.into_iter()
			.flatten()
			.map(|tool| completions::Tool {
				r#type: "function".to_string(),
				function: completions::FunctionObject {
					name: tool.name,
					description: tool.description,
					parameters: Some(tool.input_schema),
				},
			})
			.collect();

		let tool_choice = req.tool_choice.map(|choice| match choice {
			messages::ToolChoice::Auto => {
				completions::ToolChoiceOption::Mode("auto".to_string())
			},
			messages::ToolChoice::Any => {
				completions::ToolChoiceOption::Mode("required".to_string())
			},
			messages::ToolChoice::None => {
				completions::ToolChoiceOption::Mode("none".to_string())
			},
			messages::ToolChoice::Tool { name } => {
				completions::ToolChoiceOption::Named(completions::NamedToolChoice {
					r#type: "function".to_string(),
					function: completions::FunctionName { name },
				})
			},
		});

		let user = req
			.metadata
			.as_ref()
			.and_then(|m| m.fields.get("user_id").cloned());

		completions::Request {
			model: Some(model),
			messages: msgs,
			max_tokens: None,
			max_completion_tokens: Some(req.max_tokens),
			temperature: req.temperature,
			top_p: req.top_p,
			stop: if req.stop_sequences.is_empty() {
				None
			} else {
				Some(completions::Stop::StringArray(req.stop_sequences))
			},
			stream: Some(req.stream),
			stream_options: None,
			tools: if tools.is_empty() { None } else { Some(tools) },
			tool_choice,
			user,
		}
	}

	/// Translate an OpenAI chat completion response to an Anthropic messages
	/// response.
	pub fn translate_response(bytes: &[u8]) -> Result<(Vec<u8>, TokenUsage, String), AIError> {
		let resp = serde_json::from_slice::<completions::Response>(bytes)
			.map_err(AIError::ResponseParsing)?;
		let usage = resp
			.usage
			.as_ref()
			.map(super::usage_tokens)
			.unwrap_or_default();
		let model = resp.model.clone();
		let anthropic = translate_response_internal(resp);
		let body = serde_json::to_vec(&anthropic).map_err(AIError::ResponseMarshal)?;
		Ok((body, usage, model))
	}

	fn translate_response_internal(resp: completions::Response) -> messages::MessagesResponse {
		let mut content = Vec::new();
		let mut stop_reason = None;
		if let Some(choice) = resp.choices.into_iter().next() {
			if let Some(text) = choice.message.content
				&& !text.is_empty()
			{
				content.push(messages::ContentBlock::Text(messages::ContentTextBlock {
					text,
				}));
			}
			for tc in choice.message.tool_calls.into_iter().flatten() {
				content.push(messages::ContentBlock::ToolUse {
					id: tc.id,
					name: tc.function.name,
					input: serde_json::from_str(&tc.function.arguments)
						.unwrap_or_else(|_| Value::Object(Default::default())),
				});
			}
			stop_reason = choice
				.finish_reason
				.as_ref()
				.map(super::translate_finish_reason);
		}
		let usage = resp.usage.unwrap_or(completions::Usage {
			prompt_tokens: 0,
			completion_tokens: 0,
			total_tokens: 0,
			prompt_tokens_details: None,
		});
		messages::MessagesResponse {
			id: resp.id,
			r#type: "message".to_string(),
			role: messages::Role::Assistant,
			content,
			model: resp.model,
			stop_reason,
			stop_sequence: None,
			usage: messages::Usage {
				input_tokens: usage.prompt_tokens,
				output_tokens: usage.completion_tokens,
				cache_creation_input_tokens: None,
				cache_read_input_tokens: usage
					.prompt_tokens_details
					.as_ref()
					.and_then(|d| d.cached_tokens),
			},
		}
	}

	/// Rewrite an OpenAI error body into the Anthropic error envelope.
	pub fn translate_error(status: u16, bytes: &[u8]) -> Result<Vec<u8>, AIError> {
		let (kind, message) = match serde_json::from_slice::<completions::ErrorResponse>(bytes) {
			Ok(res) => {
				let kind = match res.error.r#type.as_str() {
					"service_unavailable_error" => "overloaded_error".to_string(),
					other => other.to_string(),
				};
				(kind, res.error.message)
			},
			Err(_) => (
				anthropic_error_type(status).to_string(),
				String::from_utf8_lossy(bytes).to_string(),
			),
		};
		let m = messages::MessagesErrorResponse {
			r#type: "error".to_string(),
			error: messages::MessagesError {
				r#type: kind,
				message,
			},
		};
		serde_json::to_vec(&m).map_err(AIError::ResponseMarshal)
	}

	#[derive(Clone, Copy, PartialEq, Eq)]
	enum OpenBlock {
		Text,
		Tool(u32),
	}

	/// Stateful OpenAI → Anthropic stream converter.
	///
	/// Exactly one content block is open at a time; switching between text
	/// and tool-call deltas closes the previous block. The closing event
	/// sequence is emitted exactly once, whether triggered by the usage-only
	/// chunk, the `[DONE]` sentinel or end-of-stream.
	pub struct TranslateStream {
		reader: sse::EventReader,
		message_id: String,
		model: String,
		message_started: bool,
		open_block: Option<OpenBlock>,
		block_index: usize,
		closing_emitted: bool,
		stop_reason: Option<messages::StopReason>,
		usage: messages::Usage,
		output_estimate: u64,
	}

	impl TranslateStream {
		pub fn new(request_model: &str) -> Self {
			Self {
				reader: sse::EventReader::new(),
				message_id: generate_anthropic_message_id(),
				model: request_model.to_string(),
				message_started: false,
				open_block: None,
				block_index: 0,
				closing_emitted: false,
				stop_reason: None,
				usage: messages::Usage::default(),
				output_estimate: 0,
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
					let _ = self.handle_event(&ev, &mut out);
				}
				self.emit_closing(&mut out)?;
			}
			Ok(StreamStep {
				out: out.to_vec(),
				usage: crate::llm::conversion::messages::usage_tokens(&self.usage),
				output_tokens_estimate: self.usage.output_tokens.max(self.output_estimate),
				response_model: Some(self.model.clone()),
			})
		}

		fn handle_event(&mut self, ev: &sse::Event, out: &mut BytesMut) -> Result<(), AIError> {
			if ev.is_done() {
				return self.emit_closing(out);
			}
			let Ok(chunk) = serde_json::from_str::<completions::StreamResponse>(&ev.data) else {
				tracing::debug!(data = %ev.data, "unparseable openai stream chunk");
				return Ok(());
			};
			if !chunk.model.is_empty() {
				self.model = chunk.model.clone();
			}
			if let Some(u) = &chunk.usage {
				self.usage.input_tokens = u.prompt_tokens;
				self.usage.output_tokens = u.completion_tokens;
				self.usage.cache_read_input_tokens =
					u.prompt_tokens_details.as_ref().and_then(|d| d.cached_tokens);
			}
			// The usage-only chunk (empty choices) is one of the terminal
			// signals.
			if chunk.choices.is_empty() {
				if chunk.usage.is_some() {
					self.emit_closing(out)?;
				}
				return Ok(());
			}
			let choice = &chunk.choices[0];
			if let Some(fr) = &choice.finish_reason {
				self.stop_reason = Some(super::translate_finish_reason(fr));
			}
			if let Some(text) = &choice.delta.content
				&& !text.is_empty()
			{
				self.ensure_message_start(out)?;
				self.ensure_text_block(out)?;
				self.output_estimate += 1;
				self.emit_event(
					out,
					&messages::MessagesStreamEvent::ContentBlockDelta {
						index: self.block_index,
						delta: messages::ContentBlockDelta::TextDelta { text: text.clone() },
					},
				)?;
			}
			for tc in choice.delta.tool_calls.iter().flatten() {
				self.ensure_message_start(out)?;
				self.ensure_tool_block(out, tc)?;
				if let Some(args) = tc.function.as_ref().and_then(|f| f.arguments.as_ref())
					&& !args.is_empty()
				{
					self.output_estimate += 1;
					self.emit_event(
						out,
						&messages::MessagesStreamEvent::ContentBlockDelta {
							index: self.block_index,
							delta: messages::ContentBlockDelta::InputJsonDelta {
								partial_json: args.clone(),
							},
						},
					)?;
				}
			}
			Ok(())
		}

		fn ensure_message_start(&mut self, out: &mut BytesMut) -> Result<(), AIError> {
			if self.message_started {
				return Ok(());
			}
			self.message_started = true;
			self.emit_event(
				out,
				&messages::MessagesStreamEvent::MessageStart {
					message: messages::MessagesResponse {
						id: self.message_id.clone(),
						r#type: "message".to_string(),
						role: messages::Role::Assistant,
						content: vec![],
						model: self.model.clone(),
						stop_reason: None,
						stop_sequence: None,
						usage: messages::Usage::default(),
					},
				},
			)
		}

		fn ensure_text_block(&mut self, out: &mut BytesMut) -> Result<(), AIError> {
			if self.open_block == Some(OpenBlock::Text) {
				return Ok(());
			}
			self.close_open_block(out)?;
			self.open_block = Some(OpenBlock::Text);
			self.emit_event(
				out,
				&messages::MessagesStreamEvent::ContentBlockStart {
					index: self.block_index,
					content_block: messages::ContentBlock::Text(messages::ContentTextBlock {
						text: String::new(),
					}),
				},
			)
		}

		fn ensure_tool_block(
			&mut self,
			out: &mut BytesMut,
			tc: &completions::ToolCallChunk,
		) -> Result<(), AIError> {
			if self.open_block == Some(OpenBlock::Tool(tc.index)) {
				return Ok(());
			}
			self.close_open_block(out)?;
			self.open_block = Some(OpenBlock::Tool(tc.index));
			let id = tc
				.id
				.clone()
				.unwrap_or_else(crate::llm::conversion::generate_tool_call_id);
			let name = tc
				.function
				.as_ref()
				.and_then(|f| f.name.clone())
				.unwrap_or_default();
			self.emit_event(
				out,
				&messages::MessagesStreamEvent::ContentBlockStart {
					index: self.block_index,
					content_block: messages::ContentBlock::ToolUse {
						id,
						name,
						input: Value::Object(Default::default()),
					},
				},
			)
		}

		fn close_open_block(&mut self, out: &mut BytesMut) -> Result<(), AIError> {
			if self.open_block.take().is_none() {
				return Ok(());
			}
			self.emit_event(
				out,
				&messages::MessagesStreamEvent::ContentBlockStop {
					index: self.block_index,
				},
			)?;
			self.block_index += 1;
			Ok(())
		}

		fn emit_closing(&mut self, out: &mut BytesMut) -> Result<(), AIError> {
			if self.closing_emitted {
				return Ok(());
			}
			self.closing_emitted = true;
			self.ensure_message_start(out)?;
			self.close_open_block(out)?;
			self.emit_event(
				out,
				&messages::MessagesStreamEvent::MessageDelta {
					delta: messages::MessageDelta {
						stop_reason: Some(
							self.stop_reason.unwrap_or(messages::StopReason::EndTurn),
						),
						stop_sequence: None,
					},
					usage: messages::MessageDeltaUsage {
						output_tokens: self.usage.output_tokens,
						input_tokens: Some(self.usage.input_tokens),
						cache_creation_input_tokens: None,
						cache_read_input_tokens: self.usage.cache_read_input_tokens,
					},
				},
			)?;
			self.emit_event(out, &messages::MessagesStreamEvent::MessageStop)
		}

		fn emit_event(
			&self,
			out: &mut BytesMut,
			event: &messages::MessagesStreamEvent,
		) -> Result<(), AIError> {
			let json = serde_json::to_vec(event).map_err(AIError::ResponseMarshal)?;
			sse::write_named_frame(out, event.event_name(), &json);
			Ok(())
		}
	}
}

/// Usage scan for passthrough OpenAI chat streams.
pub struct PassthroughScan {
	reader: crate::sse::EventReader,
	usage: TokenUsage,
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
			usage: TokenUsage::default(),
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
			if ev.is_done() {
				continue;
			}
			let Ok(frame) = serde_json::from_str::<completions::StreamResponse>(&ev.data) else {
				continue;
			};
			if self.model.is_none() && !frame.model.is_empty() {
				self.model = Some(frame.model.clone());
			}
			if frame
				.choices
				.first()
				.and_then(|c| c.delta.content.as_deref())
				.is_some_and(|c| !c.is_empty())
			{
				self.output_estimate += 1;
			}
			if let Some(u) = &frame.usage {
				self.usage.override_with(&usage_tokens(u));
			}
		}
		super::StreamStep {
			out: chunk.to_vec(),
			usage: self.usage,
			output_tokens_estimate: self.usage.output.unwrap_or(0).max(self.output_estimate),
			response_model: self.model.clone(),
		}
	}
}

#[cfg(test)]
#[path = "completions_tests.rs"]
mod tests;
