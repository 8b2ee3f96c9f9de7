pub const NAME: &str = "gcp.vertex_ai";
pub const ANTHROPIC_NAME: &str = "gcp.anthropic";

/// The `anthropic_version` body field Vertex requires in place of a model.
pub const ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

/// Path for Gemini models behind the Vertex `generateContent` surface.
pub fn gemini_path(project_id: &str, region: &str, model: &str, streaming: bool) -> String {
	let verb = if streaming {
		"streamGenerateContent?alt=sse"
	} else {
		"generateContent"
	};
	format!(
		"/v1/projects/{project_id}/locations/{region}/publishers/google/models/{model}:{verb}"
	)
}

/// Path for Anthropic models published on Vertex.
pub fn anthropic_path(project_id: &str, region: &str, model: &str, streaming: bool) -> String {
	let verb = if streaming {
		"streamRawPredict"
	} else {
		"rawPredict"
	};
	format!(
		"/v1/projects/{project_id}/locations/{region}/publishers/anthropic/models/{model}:{verb}"
	)
}
