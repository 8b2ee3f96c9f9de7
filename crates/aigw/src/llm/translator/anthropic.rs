//! Translators bridging the chat-completions and messages surfaces to
//! Anthropic-schema backends (direct or published on Vertex), plus the
//! messages surface onto OpenAI-compatible backends.

use serde_json::{Map, Value};

use super::{HeaderUpdate, RequestTransform, ResponseTransform, Translator};
use crate::host::HeaderSnapshot;
use crate::llm::conversion::{completions as to_completions, messages as to_messages};
use crate::llm::types::RequestEntity;
use crate::llm::{AIError, anthropic, types, vertex};

enum Target {
	Direct { version: String },
	Gcp { project_id: String, region: String, version: String },
}

impl Target {
	fn path(&self, model: &str, streaming: bool) -> String {
		match self {
			Target::Direct { .. } => anthropic::DEFAULT_PATH.to_string(),
			Target::Gcp {
				project_id, region, ..
			} => vertex::anthropic_path(project_id, region, model, streaming),
		}
	}

	fn request_headers(&self, model: &str, streaming: bool) -> Vec<HeaderUpdate> {
		let mut headers = vec![HeaderUpdate::set(":path", self.path(model, streaming))];
		if let Target::Direct { version } = self {
			headers.push(HeaderUpdate::set(anthropic::VERSION_HEADER, version.clone()));
		}
		headers
	}

	/// Vertex-published Anthropic models replace the body's `model` with an
	/// `anthropic_version` field; the model lives in the path.
	fn prepare_body(&self, body: Vec<u8>) -> Result<Vec<u8>, AIError> {
		match self {
			Target::Direct { .. } => Ok(body),
			Target::Gcp { version, .. } => {
				let mut map: Map<String, Value> =
					serde_json::from_slice(&body).map_err(AIError::RequestMarshal)?;
				map.insert(
					"anthropic_version".to_string(),
					Value::String(version.clone()),
				);
				map.remove("model");
				serde_json::to_vec(&map).map_err(AIError::RequestMarshal)
			},
		}
	}
}

/// Chat-completions client, Anthropic-schema backend.
pub struct AnthropicTranslator {
	model_override: Option<String>,
	target: Target,
	streaming: bool,
	stream: Option<to_messages::from_completions::TranslateStream>,
}

impl AnthropicTranslator {
	pub fn direct(model_override: Option<String>, version: Option<String>) -> Self {
		Self {
			model_override,
			target: Target::Direct {
				version: version.unwrap_or_else(|| anthropic::DEFAULT_VERSION.to_string()),
			},
			streaming: false,
			stream: None,
		}
	}

	pub fn gcp(
		model_override: Option<String>,
		project_id: String,
		region: String,
		version: Option<String>,
	) -> Self {
		Self {
			model_override,
			target: Target::Gcp {
				project_id,
				region,
				version: version.unwrap_or_else(|| vertex::ANTHROPIC_VERSION.to_string()),
			},
			streaming: false,
			stream: None,
		}
	}
}

impl Translator for AnthropicTranslator {
	fn request_body(
		&mut self,
		entity: &dyn RequestEntity,
		_force_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let model = self
			.model_override
			.clone()
			.or_else(|| entity.model().map(str::to_string))
			.unwrap_or_default();
		self.streaming = entity.stream();
		if self.streaming {
			self.stream = Some(to_messages::from_completions::TranslateStream::new(&model));
		}
		let body = self.target.prepare_body(entity.to_anthropic(&model)?)?;
		Ok(RequestTransform {
			headers: self.target.request_headers(&model, self.streaming),
			body: Some(body),
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
		if let Some(stream) = &mut self.stream {
			let step = stream.push(chunk, end_of_stream)?;
			return Ok(ResponseTransform {
				headers: vec![],
				body: Some(step.out),
				usage: step.usage,
				output_tokens_estimate: step.output_tokens_estimate,
				response_model: step.response_model,
			});
		}
		let (body, usage, model) = to_messages::from_completions::translate_response(chunk)?;
		Ok(ResponseTransform {
			headers: vec![],
			body: Some(body),
			usage,
			output_tokens_estimate: usage.output.unwrap_or(0),
			response_model: Some(model),
		})
	}

	fn response_error(&mut self, status: u16, body: &[u8]) -> Result<ResponseTransform, AIError> {
		Ok(ResponseTransform {
			body: Some(to_messages::from_completions::translate_error(status, body)?),
			..Default::default()
		})
	}
}

/// Messages client, Anthropic-schema backend.
pub struct MessagesPassthrough {
	model_override: Option<String>,
	target: Target,
	streaming: bool,
	scan: Option<to_messages::PassthroughScan>,
}

impl MessagesPassthrough {
	pub fn direct(model_override: Option<String>, version: Option<String>) -> Self {
		Self {
			model_override,
			target: Target::Direct {
				version: version.unwrap_or_else(|| anthropic::DEFAULT_VERSION.to_string()),
			},
			streaming: false,
			scan: None,
		}
	}

	pub fn gcp(
		model_override: Option<String>,
		project_id: String,
		region: String,
		version: Option<String>,
	) -> Self {
		Self {
			model_override,
			target: Target::Gcp {
				project_id,
				region,
				version: version.unwrap_or_else(|| vertex::ANTHROPIC_VERSION.to_string()),
			},
			streaming: false,
			scan: None,
		}
	}
}

impl Translator for MessagesPassthrough {
	fn request_body(
		&mut self,
		entity: &dyn RequestEntity,
		force_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let model = self
			.model_override
			.clone()
			.or_else(|| entity.model().map(str::to_string))
			.unwrap_or_default();
		self.streaming = entity.stream();
		if self.streaming {
			self.scan = Some(to_messages::PassthroughScan::new());
		}
		let body = match &self.target {
			// Vertex needs the body rewritten in every case.
			Target::Gcp { .. } => Some(self.target.prepare_body(entity.serialize()?)?),
			Target::Direct { .. } => match (&self.model_override, force_mutation) {
				(Some(model), _) => Some(entity.serialize_with_model(model)?),
				(None, true) => Some(entity.serialize()?),
				(None, false) => None,
			},
		};
		Ok(RequestTransform {
			headers: self.target.request_headers(&model, self.streaming),
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
		if let Some(scan) = &mut self.scan {
			let step = scan.push(chunk, end_of_stream);
			return Ok(ResponseTransform {
				headers: vec![],
				body: None,
				usage: step.usage,
				output_tokens_estimate: step.output_tokens_estimate,
				response_model: step.response_model,
			});
		}
		match serde_json::from_slice::<types::messages::Response>(chunk) {
			Ok(resp) => Ok(ResponseTransform {
				headers: vec![],
				body: None,
				usage: resp.usage.token_usage(),
				output_tokens_estimate: resp.usage.output_tokens,
				response_model: Some(resp.model),
			}),
			Err(e) => Err(AIError::ResponseParsing(e)),
		}
	}

	fn response_error(&mut self, status: u16, body: &[u8]) -> Result<ResponseTransform, AIError> {
		// Already the client's schema unless the upstream answered with
		// plain text.
		if serde_json::from_slice::<types::messages::typed::MessagesErrorResponse>(body).is_ok() {
			return Ok(ResponseTransform::default());
		}
		Ok(ResponseTransform {
			body: Some(to_completions::from_messages::translate_error(status, body)?),
			..Default::default()
		})
	}
}

/// Messages client, OpenAI-compatible backend.
pub struct MessagesToOpenAI {
	model_override: Option<String>,
	path: String,
	needs_usage_accounting: bool,
	streaming: bool,
	stream: Option<to_completions::from_messages::TranslateStream>,
}

impl MessagesToOpenAI {
	pub fn new(
		model_override: Option<String>,
		version: Option<&str>,
		needs_usage_accounting: bool,
	) -> Self {
		let path = match version {
			Some(v) => format!("/{}/chat/completions", v.trim_matches('/')),
			None => "/v1/chat/completions".to_string(),
		};
		Self {
			model_override,
			path,
			needs_usage_accounting,
			streaming: false,
			stream: None,
		}
	}
}

impl Translator for MessagesToOpenAI {
	fn request_body(
		&mut self,
		entity: &dyn RequestEntity,
		_force_mutation: bool,
	) -> Result<RequestTransform, AIError> {
		let model = self
			.model_override
			.clone()
			.or_else(|| entity.model().map(str::to_string))
			.unwrap_or_default();
		self.streaming = entity.stream();
		let mut body = entity.to_openai_chat(&model)?;
		if self.streaming {
			self.stream = Some(to_completions::from_messages::TranslateStream::new(&model));
			if self.needs_usage_accounting {
				// The OpenAI backend only reports usage on streams that ask
				// for it.
				let mut map: Map<String, Value> =
					serde_json::from_slice(&body).map_err(AIError::RequestMarshal)?;
				map.insert(
					"stream_options".to_string(),
					serde_json::json!({ "include_usage": true }),
				);
				body = serde_json::to_vec(&map).map_err(AIError::RequestMarshal)?;
			}
		}
		Ok(RequestTransform {
			headers: vec![HeaderUpdate::set(":path", self.path.clone())],
			body: Some(body),
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
		if let Some(stream) = &mut self.stream {
			let step = stream.push(chunk, end_of_stream)?;
			return Ok(ResponseTransform {
				headers: vec![],
				body: Some(step.out),
				usage: step.usage,
				output_tokens_estimate: step.output_tokens_estimate,
				response_model: step.response_model,
			});
		}
		let (body, usage, model) = to_completions::from_messages::translate_response(chunk)?;
		Ok(ResponseTransform {
			headers: vec![],
			body: Some(body),
			usage,
			output_tokens_estimate: usage.output.unwrap_or(0),
			response_model: Some(model),
		})
	}

	fn response_error(&mut self, status: u16, body: &[u8]) -> Result<ResponseTransform, AIError> {
		Ok(ResponseTransform {
			body: Some(to_completions::from_messages::translate_error(status, body)?),
			..Default::default()
		})
	}
}
