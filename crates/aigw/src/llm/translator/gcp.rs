//! Chat-completions client, Gemini backend on Vertex AI.

use super::{HeaderUpdate, RequestTransform, ResponseTransform, Translator};
use crate::host::HeaderSnapshot;
use crate::llm::conversion::gemini::from_completions;
use crate::llm::types::RequestEntity;
use crate::llm::{AIError, vertex};

pub struct GeminiTranslator {
	model_override: Option<String>,
	project_id: String,
	region: String,
	request_model: String,
	streaming: bool,
	stream: Option<from_completions::TranslateStream>,
}

impl GeminiTranslator {
	pub fn new(model_override: Option<String>, project_id: String, region: String) -> Self {
		Self {
			model_override,
			project_id,
			region,
			request_model: String::new(),
			streaming: false,
			stream: None,
		}
	}
}

impl Translator for GeminiTranslator {
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
		self.request_model = model.clone();
		self.streaming = entity.stream();
		if self.streaming {
			self.stream = Some(from_completions::TranslateStream::new(&model));
		}
		let body = entity.to_gemini(&model)?;
		let path = vertex::gemini_path(&self.project_id, &self.region, &model, self.streaming);
		Ok(RequestTransform {
			headers: vec![HeaderUpdate::set(":path", path)],
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
		let (body, usage, model) =
			from_completions::translate_response(chunk, &self.request_model)?;
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
			body: Some(from_completions::translate_error(status, body)?),
			..Default::default()
		})
	}
}
