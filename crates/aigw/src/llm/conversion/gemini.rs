//! Conversions targeting the Gemini `generateContent` format.

pub mod from_completions {
	use std::collections::HashMap;

	use bytes::BytesMut;
	use serde_json::Value;

	use crate::json;
	use crate::llm::conversion::{
		StreamStep, generate_chat_id, generate_tool_call_id, openai_error_type,
	};
	use crate::llm::types::completions::typed as completions;
	use crate::llm::types::gemini;
	use crate::llm::{AIError, TokenUsage, types};
	use crate::sse;

	/// Translate an OpenAI chat completions request to a Gemini
	/// `generateContent` request. The model is carried in the path, not the
	/// body.
	pub fn translate(req: &types::completions::Request, _model: &str) -> Result<Vec<u8>, AIError> {
		let typed =
			json::convert::<_, completions::Request>(req).map_err(AIError::RequestMarshal)?;
		let xlated = translate_internal(typed);
		serde_json::to_vec(&xlated).map_err(AIError::RequestMarshal)
	}

	fn translate_internal(req: completions::Request) -> gemini::GenerateContentRequest {
		let mut system_parts: Vec<gemini::Part> = Vec::new();
		let mut contents: Vec<gemini::Content> = Vec::new();
		// Tool responses must name the function they answer; remember the
		// name behind each tool-call id.
		let mut call_names: HashMap<String, String> = HashMap::new();

		for msg in &req.messages {
			match msg.role.as_str() {
				completions::SYSTEM_ROLE | completions::DEVELOPER_ROLE => {
					if let Some(text) = msg.text() {
						system_parts.push(gemini::Part {
							text: Some(text),
							..Default::default()
						});
					}
				},
				completions::ASSISTANT_ROLE => {
					let mut parts = Vec::new();
					if let Some(text) = msg.text() {
						parts.push(gemini::Part {
							text: Some(text),
							..Default::default()
						});
					}
					for tc in msg.tool_calls.iter().flatten() {
						call_names.insert(tc.id.clone(), tc.function.name.clone());
						parts.push(gemini::Part {
							function_call: Some(gemini::FunctionCall {
								name: tc.function.name.clone(),
								args: serde_json::from_str(&tc.function.arguments)
									.unwrap_or_else(|_| Value::Object(Default::default())),
							}),
							..Default::default()
						});
					}
					if !parts.is_empty() {
						contents.push(gemini::Content {
							role: Some("model".to_string()),
							parts,
						});
					}
				},
				completions::TOOL_ROLE => {
					let name = msg
						.tool_call_id
						.as_ref()
						.and_then(|id| call_names.get(id).cloned())
						.or_else(|| msg.tool_call_id.clone())
						.unwrap_or_default();
					let response = msg
						.text()
						.and_then(|t| serde_json::from_str(&t).ok())
						.unwrap_or_else(|| {
							serde_json::json!({ "result": msg.text().unwrap_or_default() })
						});
					contents.push(gemini::Content {
						role: Some("user".to_string()),
						parts: vec![gemini::Part {
							function_response: Some(gemini::FunctionResponse { name, response }),
							..Default::default()
						}],
					});
				},
				_ => {
					if let Some(text) = msg.text() {
						contents.push(gemini::Content {
							role: Some("user".to_string()),
							parts: vec![gemini::Part {
								text: Some(text),
								..Default::default()
							}],
						});
					}
				},
			}
		}

		let tools = req.tools.as_ref().map(|tools| {
			vec![gemini::Tool {
				function_declarations: tools
					.iter()
					.filter(|t| t.r#type == "function")
					.map(|t| gemini::FunctionDeclaration {
						name: t.function.name.clone(),
						description: t.function.description.clone(),
						parameters: t.function.parameters.clone(),
					})
					.collect(),
			}]
		});

		let stops = req.stop_sequences();
		let generation_config = gemini::GenerationConfig {
			temperature: req.temperature,
			top_p: req.top_p,
			max_output_tokens: req.max_tokens(),
			stop_sequences: if stops.is_empty() { None } else { Some(stops) },
		};

		gemini::GenerateContentRequest {
			system_instruction: if system_parts.is_empty() {
				None
			} else {
				Some(gemini::Content {
					role: None,
					parts: system_parts,
				})
			},
			contents,
			tools,
			tool_config: None,
			generation_config: Some(generation_config),
		}
	}

	/// Translate a Gemini response to an OpenAI chat completion.
	pub fn translate_response(
		bytes: &[u8],
		request_model: &str,
	) -> Result<(Vec<u8>, TokenUsage, String), AIError> {
		let resp = serde_json::from_slice::<gemini::GenerateContentResponse>(bytes)
			.map_err(AIError::ResponseParsing)?;
		let usage = resp
			.usage_metadata
			.map(|u| u.token_usage())
			.unwrap_or_default();
		let model = resp
			.model_version
			.clone()
			.unwrap_or_else(|| request_model.to_string());

		let mut choices = Vec::new();
		for (i, candidate) in resp.candidates.into_iter().flatten().enumerate() {
			let mut content: Option<String> = None;
			let mut tool_calls = Vec::new();
			for part in candidate.content.iter().flat_map(|c| c.parts.iter()) {
				if let Some(text) = &part.text {
					match &mut content {
						Some(c) => c.push_str(text),
						None => content = Some(text.clone()),
					}
				}
				if let Some(fc) = &part.function_call {
					tool_calls.push(completions::MessageToolCall {
						id: generate_tool_call_id(),
						r#type: "function".to_string(),
						function: completions::FunctionCall {
							name: fc.name.clone(),
							arguments: serde_json::to_string(&fc.args).unwrap_or_default(),
						},
					});
				}
			}
			let finish_reason = if !tool_calls.is_empty() {
				Some(completions::FinishReason::ToolCalls)
			} else {
				candidate.finish_reason.as_deref().map(translate_finish_reason)
			};
			choices.push(completions::ChatChoice {
				index: i as u32,
				message: completions::ResponseMessage {
					role: completions::ASSISTANT_ROLE.to_string(),
					content,
					tool_calls: if tool_calls.is_empty() {
						None
					} else {
						Some(tool_calls)
					},
				},
				finish_reason,
			});
		}

		let openai = completions::Response {
			id: generate_chat_id(),
			object: "chat.completion".to_string(),
			created: chrono::Utc::now().timestamp() as u64,
			model: model.clone(),
			choices,
			usage: Some(completions::Usage {
				prompt_tokens: usage.input.unwrap_or(0),
				completion_tokens: usage.output.unwrap_or(0),
				total_tokens: usage.total_tokens(),
				prompt_tokens_details: usage.cached_input.map(|cached| {
					completions::PromptTokensDetails {
						cached_tokens: Some(cached),
					}
				}),
			}),
		};
		let body = serde_json::to_vec(&openai).map_err(AIError::ResponseMarshal)?;
		Ok((body, usage, model))
	}

	pub fn translate_finish_reason(reason: &str) -> completions::FinishReason {
		match reason {
			"STOP" => completions::FinishReason::Stop,
			"MAX_TOKENS" => completions::FinishReason::Length,
			"SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" => {
				completions::FinishReason::ContentFilter
			},
			_ => completions::FinishReason::Stop,
		}
	}

	/// Rewrite a Gemini error body into the OpenAI error envelope.
	pub fn translate_error(status: u16, bytes: &[u8]) -> Result<Vec<u8>, AIError> {
		let (kind, message) = match serde_json::from_slice::<gemini::ErrorResponse>(bytes) {
			Ok(res) => {
				let status = res.error.code.map(|c| c as u16).unwrap_or(status);
				(openai_error_type(status).to_string(), res.error.message)
			},
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
		/// Accumulated argument text; emitted fragments are cut from here so
		/// the receiver always sees contiguous pieces of one buffer.
		args: String,
		sent_header: bool,
	}

	/// Stateful Gemini → OpenAI stream converter.
	///
	/// Gemini streams whole `GenerateContentResponse` frames over SSE; each
	/// becomes at most one `chat.completion.chunk`. A logical tool call is
	/// identified by its content-part position within the candidate (Gemini
	/// has no explicit call index), so a call continued across frames keeps
	/// its `tool_calls[i].index` and its argument buffer.
	pub struct TranslateStream {
		reader: sse::EventReader,
		id: String,
		created: u64,
		model: String,
		usage: TokenUsage,
		tool_calls: HashMap<u32, ToolCallState>,
		output_estimate: u64,
		finish_emitted: bool,
		done: bool,
	}

	impl TranslateStream {
		pub fn new(request_model: &str) -> Self {
			Self {
				reader: sse::EventReader::new(),
				id: generate_chat_id(),
				created: chrono::Utc::now().timestamp() as u64,
				model: request_model.to_string(),
				usage: TokenUsage::default(),
				tool_calls: HashMap::new(),
				output_estimate: 0,
				finish_emitted: false,
				done: false,
			}
		}

		pub fn push(&mut self, chunk: &[u8], end_of_stream: bool) -> Result<StreamStep, AIError> {
			self.reader.push(chunk);
			let mut out = BytesMut::new();
			while let Some(ev) = self.reader.next_event() {
				self.handle_frame(&ev, &mut out)?;
			}
			if end_of_stream {
				if let Some(ev) = self.reader.take_remainder() {
					let _ = self.handle_frame(&ev, &mut out);
				}
				self.finalize(&mut out)?;
			}
			Ok(StreamStep {
				out: out.to_vec(),
				usage: self.usage,
				output_tokens_estimate: self.usage.output.unwrap_or(0).max(self.output_estimate),
				response_model: Some(self.model.clone()),
			})
		}

		fn handle_frame(&mut self, ev: &sse::Event, out: &mut BytesMut) -> Result<(), AIError> {
			let Ok(frame) = serde_json::from_str::<gemini::GenerateContentResponse>(&ev.data)
			else {
				tracing::debug!(data = %ev.data, "unparseable gemini stream frame");
				return Ok(());
			};
			if let Some(v) = frame.model_version {
				self.model = v;
			}
			if let Some(u) = frame.usage_metadata {
				self.usage.override_with(&u.token_usage());
			}
			let Some(candidate) = frame.candidates.into_iter().flatten().next() else {
				return Ok(());
			};

			let mut delta = completions::StreamResponseDelta::default();
			let mut tool_chunks = Vec::new();
			// Positional within this frame's candidate; the same logical call
			// continued in a later frame lands on the same index.
			let mut call_ordinal: u32 = 0;
			for part in candidate.content.iter().flat_map(|c| c.parts.iter()) {
				if let Some(text) = &part.text
					&& !text.is_empty()
				{
					self.output_estimate += 1;
					match &mut delta.content {
						Some(c) => c.push_str(text),
						None => delta.content = Some(text.clone()),
					}
				}
				if let Some(fc) = &part.function_call {
					let index = call_ordinal;
					call_ordinal += 1;
					let fragment = serde_json::to_string(&fc.args).unwrap_or_default();
					let state = self.tool_calls.entry(index).or_insert_with(|| ToolCallState {
						id: generate_tool_call_id(),
						name: fc.name.clone(),
						args: String::new(),
						sent_header: false,
					});
					let offset = state.args.len();
					state.args.push_str(&fragment);
					let first = !state.sent_header;
					state.sent_header = true;
					self.output_estimate += 1;
					tool_chunks.push(completions::ToolCallChunk {
						index,
						id: first.then(|| state.id.clone()),
						r#type: first.then(|| "function".to_string()),
						function: Some(completions::FunctionCallStream {
							name: first.then(|| state.name.clone()),
							arguments: Some(state.args[offset..].to_string()),
						}),
					});
				}
			}
			if !tool_chunks.is_empty() {
				delta.tool_calls = Some(tool_chunks);
			}

			let finish_reason = if !self.tool_calls.is_empty() && candidate.finish_reason.is_some()
			{
				Some(completions::FinishReason::ToolCalls)
			} else {
				candidate
					.finish_reason
					.as_deref()
					.map(translate_finish_reason)
			};
			let has_delta = delta.content.is_some() || delta.tool_calls.is_some();
			if !has_delta && finish_reason.is_none() {
				return Ok(());
			}
			if finish_reason.is_some() {
				self.finish_emitted = true;
			}
			let chunk = completions::StreamResponse {
				id: self.id.clone(),
				object: "chat.completion.chunk".to_string(),
				created: self.created,
				model: self.model.clone(),
				choices: vec![completions::ChatChoiceStream {
					index: 0,
					delta,
					finish_reason,
				}],
				usage: None,
			};
			let json = serde_json::to_vec(&chunk).map_err(AIError::ResponseMarshal)?;
			sse::write_data_frame(out, &json);
			Ok(())
		}

		fn finalize(&mut self, out: &mut BytesMut) -> Result<(), AIError> {
			if self.done {
				return Ok(());
			}
			self.done = true;
			if !self.finish_emitted {
				let chunk = completions::StreamResponse {
					id: self.id.clone(),
					object: "chat.completion.chunk".to_string(),
					created: self.created,
					model: self.model.clone(),
					choices: vec![completions::ChatChoiceStream {
						index: 0,
						delta: Default::default(),
						finish_reason: Some(completions::FinishReason::Stop),
					}],
					usage: None,
				};
				let json = serde_json::to_vec(&chunk).map_err(AIError::ResponseMarshal)?;
				sse::write_data_frame(out, &json);
			}
			let usage_chunk = completions::StreamResponse {
				id: self.id.clone(),
				object: "chat.completion.chunk".to_string(),
				created: self.created,
				model: self.model.clone(),
				choices: vec![],
				usage: Some(completions::Usage {
					prompt_tokens: self.usage.input.unwrap_or(0),
					completion_tokens: self.usage.output.unwrap_or(0),
					total_tokens: self.usage.total_tokens(),
					prompt_tokens_details: self.usage.cached_input.map(|cached| {
						completions::PromptTokensDetails {
							cached_tokens: Some(cached),
						}
					}),
				}),
			};
			let json = serde_json::to_vec(&usage_chunk).map_err(AIError::ResponseMarshal)?;
			sse::write_data_frame(out, &json);
			sse::write_done_frame(out);
			Ok(())
		}
	}
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
