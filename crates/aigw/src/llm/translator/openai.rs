//! Translators for OpenAI-compatible and Cohere backends (passthrough
//! bodies, optional model rewrite and path placement).

use super::{HeaderUpdate, RequestTransform, ResponseTransform, Translator};
use crate::host::HeaderSnapshot;
use crate::llm::conversion::completions::PassthroughScan;
use crate::llm::conversion::openai_error_type;
use crate::llm::types::completions::typed as completions;
use crate::llm::types::RequestEntity;
use crate::llm::{AIError, Operation, TokenUsage, cohere, openai, types};

/// `openai::path` with the leading `v1` swapped for a configured version
/// prefix.
fn versioned_path(op: Operation, version: Option<&str>) -> String {
	let base = openai::path(op);
	match version {
		Some(v) => format!("/{}{}", v.trim_matches('/'), &base[3..]),
		None => base.to_string(),
	}
}

enum StreamScan {
	None,
	Chat(PassthroughScan),
	Sse(SseUsageScan),
}

pub struct OpenAIPassthrough {
	op: Operation,
	model_override: Option<String>,
	path: String,
	streaming: bool,
	scan: StreamScan,
}

impl OpenAIPassthrough {
	pub fn new(op: Operation, model_override: Option<String>, version: Option<&str>) -> Self {
		Self {
			op,
			model_override,
			path: versioned_path(op, version),
			streaming: false,
			scan: StreamScan::None,
		}
	}

	pub fn rerank(model_override: Option<String>) -> Self {
		Self {
			op: Operation::Rerank,
			model_override,
			path: cohere::RERANK_PATH.to_string(),
			streaming: false,
			scan: StreamScan::None,
		}
	}

	/// Extract usage/model from the full buffered response for this
	/// operation.
	fn buffered_usage(&self, body: &[u8]) -> (TokenUsage, Option<String>) {
		match self.op {
			Operation::ChatCompletions => {
				match serde_json::from_slice::<types::completions::Response>(body) {
					Ok(r) => (
						r.usage.as_ref().map(|u| u.token_usage()).unwrap_or_default(),
						r.model,
					),
					Err(_) => (TokenUsage::default(), None),
				}
			},
			Operation::Completions => {
				match serde_json::from_slice::<types::legacycompletions::Response>(body) {
					Ok(r) => (
						r.usage.as_ref().map(|u| u.token_usage()).unwrap_or_default(),
						r.model,
					),
					Err(_) => (TokenUsage::default(), None),
				}
			},
			Operation::Embeddings => {
				match serde_json::from_slice::<types::embeddings::Response>(body) {
					Ok(r) => (
						r.usage.as_ref().map(|u| u.token_usage()).unwrap_or_default(),
						r.model,
					),
					Err(_) => (TokenUsage::default(), None),
				}
			},
			Operation::ImageGeneration => {
				match serde_json::from_slice::<types::images::Response>(body) {
					Ok(r) => (
						r.usage.as_ref().map(|u| u.token_usage()).unwrap_or_default(),
						None,
					),
					Err(_) => (TokenUsage::default(), None),
				}
			},
			Operation::Rerank => match serde_json::from_slice::<types::rerank::Response>(body) {
				Ok(r) => (r.token_usage(), None),
				Err(_) => (TokenUsage::default(), None),
			},
			Operation::Responses => {
				match serde_json::from_slice::<types::responses::Response>(body) {
					Ok(r) => (
						r.usage.as_ref().map(|u| u.token_usage()).unwrap_or_default(),
						r.model,
					),
					Err(_) => (TokenUsage::default(), None),
				}
			},
			_ => (TokenUsage::default(), None),
		}
	}
}

impl Translator for OpenAIPassthrough {
	fn request_body(
		&mut self,
		entity: &dyn RequestEntity,
		force_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		self.streaming = entity.stream();
		if self.streaming {
			self.scan = match self.op {
				Operation::ChatCompletions => StreamScan::Chat(PassthroughScan::new()),
				Operation::Completions => StreamScan::Sse(SseUsageScan::legacy()),
				Operation::Responses => StreamScan::Sse(SseUsageScan::responses()),
				_ => StreamScan::None,
			};
		}
		let body = match (&self.model_override, force_mutation) {
			(Some(model), _) => Some(entity.serialize_with_model(model)?),
			(None, true) => Some(entity.serialize()?),
			(None, false) => None,
		};
		Ok(RequestTransform {
			headers: vec![HeaderUpdate::set(":path", self.path.clone())],
			body,
		})
	}

	fn response_headers(&mut self, _: &HeaderSnapshot) -> Result<Vec<HeaderUpdate>, AIError> {
		Ok(vec![])
	}

	fn response_body(
		&mut self,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		if self.streaming {
			let step = match &mut self.scan {
				StreamScan::Chat(scan) => scan.push(chunk, end_of_stream),
				StreamScan::Sse(scan) => scan.push(chunk, end_of_stream),
				StreamScan::None => Default::default(),
			};
			return Ok(ResponseTransform {
				headers: vec![],
				body: None,
				usage: step.usage,
				output_tokens_estimate: step.output_tokens_estimate,
				response_model: step.response_model,
			});
		}
		let (usage, model) = self.buffered_usage(chunk);
		Ok(ResponseTransform {
			headers: vec![],
			body: None,
			usage,
			output_tokens_estimate: usage.output.unwrap_or(0),
			response_model: model,
		})
	}

	fn response_error(&mut self, status: u16, body: &[u8]) -> Result<ResponseTransform, AIError> {
		// The upstream already speaks the client's schema; only plain-text
		// errors need wrapping.
		if serde_json::from_slice::<completions::ErrorResponse>(body).is_ok() {
			return Ok(ResponseTransform::default());
		}
		let envelope = completions::ErrorResponse {
			error: completions::ErrorBody {
				r#type: openai_error_type(status).to_string(),
				message: String::from_utf8_lossy(body).to_string(),
				param: None,
				code: None,
			},
		};
		Ok(ResponseTransform {
			body: Some(serde_json::to_vec(&envelope).map_err(AIError::ResponseMarshal)?),
			..Default::default()
		})
	}
}

pub struct AzureOpenAITranslator {
	op: Operation,
	model_override: Option<String>,
	api_version: String,
	inner: OpenAIPassthrough,
}

impl AzureOpenAITranslator {
	pub fn new(op: Operation, model_override: Option<String>, api_version: String) -> Self {
		Self {
			op,
			model_override: model_override.clone(),
			api_version,
			inner: OpenAIPassthrough::new(op, model_override, None),
		}
	}
}

impl Translator for AzureOpenAITranslator {
	fn request_body(
		&mut self,
		entity: &dyn RequestEntity,
		force_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let mut transform = self.inner.request_body(entity, force_mutation)?;
		// Azure routes by deployment, which is the (post-override) model.
		let deployment = self
			.model_override
			.clone()
			.or_else(|| entity.model().map(str::to_string))
			.unwrap_or_default();
		let path = crate::llm::azureopenai::path(self.op, &deployment, &self.api_version);
		transform.headers = vec![HeaderUpdate::set(":path", path)];
		Ok(transform)
	}

	fn response_headers(&mut self, headers: &HeaderSnapshot) -> Result<Vec<HeaderUpdate>, AIError> {
		self.inner.response_headers(headers)
	}

	fn response_body(
		&mut self,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<ResponseTransform, AIError> {
		self.inner.response_body(chunk, end_of_stream)
	}

	fn response_error(&mut self, status: u16, body: &[u8]) -> Result<ResponseTransform, AIError> {
		self.inner.response_error(status, body)
	}
}

/// Usage scan over OpenAI-shaped SSE streams whose frames are not chat
/// chunks: legacy completions and the Responses API.
pub struct SseUsageScan {
	reader: crate::sse::EventReader,
	kind: ScanKind,
	usage: TokenUsage,
	model: Option<String>,
	frames_seen: u64,
}

enum ScanKind {
	Legacy,
	Responses,
}

impl SseUsageScan {
	fn legacy() -> Self {
		Self {
			reader: crate::sse::EventReader::new(),
			kind: ScanKind::Legacy,
			usage: TokenUsage::default(),
			model: None,
			frames_seen: 0,
		}
	}

	fn responses() -> Self {
		Self {
			reader: crate::sse::EventReader::new(),
			kind: ScanKind::Responses,
			usage: TokenUsage::default(),
			model: None,
			frames_seen: 0,
		}
	}

	fn push(&mut self, chunk: &[u8], end_of_stream: bool) -> crate::llm::conversion::StreamStep {
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
			match self.kind {
				ScanKind::Legacy => {
					let Ok(frame) =
						serde_json::from_str::<types::legacycompletions::Response>(&ev.data)
					else {
						continue;
					};
					self.frames_seen += 1;
					if self.model.is_none() {
						self.model = frame.model;
					}
					if let Some(u) = &frame.usage {
						self.usage.override_with(&u.token_usage());
					}
				},
				ScanKind::Responses => {
					let Ok(frame) = serde_json::from_str::<types::responses::StreamEvent>(&ev.data)
					else {
						continue;
					};
					if frame.r#type == "response.output_text.delta" {
						self.frames_seen += 1;
					}
					if let Some(resp) = &frame.response {
						if self.model.is_none() {
							self.model = resp.model.clone();
						}
						if let Some(u) = &resp.usage {
							self.usage.override_with(&u.token_usage());
						}
					}
				},
			}
		}
		crate::llm::conversion::StreamStep {
			out: chunk.to_vec(),
			usage: self.usage,
			output_tokens_estimate: self.usage.output.unwrap_or(0).max(self.frames_seen),
			response_model: self.model.clone(),
		}
	}
}
