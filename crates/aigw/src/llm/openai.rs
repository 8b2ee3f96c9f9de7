use crate::llm::Operation;

pub const NAME: &str = "openai";

/// Default upstream path for each operation on an OpenAI-compatible backend.
pub fn path(op: Operation) -> &'static str {
	match op {
		Operation::Responses => "/v1/responses",
		Operation::Embeddings => "/v1/embeddings",
		Operation::Completions => "/v1/completions",
		Operation::ImageGeneration => "/v1/images/generations",
		_ => "/v1/chat/completions",
	}
}
