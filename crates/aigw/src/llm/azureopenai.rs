use crate::llm::Operation;

pub const NAME: &str = "azure.openai";

/// Azure addresses models as deployments. Recent API versions expose an
/// OpenAI-compatible `/openai/v1` surface; dated versions use the
/// deployment-scoped form with an explicit `api-version` query parameter.
pub fn path(op: Operation, deployment: &str, api_version: &str) -> String {
	let t = match op {
		Operation::Embeddings => "embeddings",
		Operation::Responses => "responses",
		_ => "chat/completions",
	};
	if api_version == "v1" {
		format!("/openai/v1/{t}")
	} else if api_version == "preview" {
		format!("/openai/v1/{t}?api-version=preview")
	} else {
		format!("/openai/deployments/{deployment}/{t}?api-version={api_version}")
	}
}
