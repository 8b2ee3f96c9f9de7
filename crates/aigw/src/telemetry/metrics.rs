//! OTEL GenAI semantic-convention metrics.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Histogram, Meter};

use crate::llm::{Operation, TokenUsage};

const TOKEN_USAGE_BOUNDARIES: &[f64] = &[
	1.0, 4.0, 16.0, 64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0, 1048576.0, 4194304.0,
	16777216.0, 67108864.0,
];
const DURATION_BOUNDARIES: &[f64] = &[
	0.01, 0.02, 0.04, 0.08, 0.16, 0.32, 0.64, 1.28, 2.56, 5.12, 10.24, 20.48, 40.96, 81.92,
];
const TTFT_BOUNDARIES: &[f64] = &[
	0.001, 0.005, 0.01, 0.02, 0.04, 0.06, 0.08, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];
const TPOT_BOUNDARIES: &[f64] = &[
	0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.4, 0.5, 0.75, 1.0, 2.5,
];

/// The four GenAI instruments, one set per operation.
pub struct OperationMetrics {
	operation: &'static str,
	token_usage: Histogram<u64>,
	request_duration: Histogram<f64>,
	time_to_first_token: Histogram<f64>,
	time_per_output_token: Histogram<f64>,
}

impl OperationMetrics {
	fn new(meter: &Meter, operation: &'static str) -> Arc<Self> {
		Arc::new(Self {
			operation,
			token_usage: meter
				.u64_histogram("gen_ai.client.token.usage")
				.with_description("Number of tokens processed")
				.with_unit("{token}")
				.with_boundaries(TOKEN_USAGE_BOUNDARIES.to_vec())
				.build(),
			request_duration: meter
				.f64_histogram("gen_ai.server.request.duration")
				.with_description("Time spent processing the request")
				.with_unit("s")
				.with_boundaries(DURATION_BOUNDARIES.to_vec())
				.build(),
			time_to_first_token: meter
				.f64_histogram("gen_ai.server.time_to_first_token")
				.with_description("Time until the first output token was seen")
				.with_unit("s")
				.with_boundaries(TTFT_BOUNDARIES.to_vec())
				.build(),
			time_per_output_token: meter
				.f64_histogram("gen_ai.server.time_per_output_token")
				.with_description("Mean inter-token latency over the stream")
				.with_unit("s")
				.with_boundaries(TPOT_BOUNDARIES.to_vec())
				.build(),
		})
	}
}

/// One [`OperationMetrics`] per operation, created once at startup.
pub struct Metrics {
	chat: Arc<OperationMetrics>,
	completion: Arc<OperationMetrics>,
	embedding: Arc<OperationMetrics>,
	image_generation: Arc<OperationMetrics>,
	rerank: Arc<OperationMetrics>,
	messages: Arc<OperationMetrics>,
	responses: Arc<OperationMetrics>,
}

impl Metrics {
	pub fn new(meter: &Meter) -> Self {
		Self {
			chat: OperationMetrics::new(meter, Operation::ChatCompletions.name()),
			completion: OperationMetrics::new(meter, Operation::Completions.name()),
			embedding: OperationMetrics::new(meter, Operation::Embeddings.name()),
			image_generation: OperationMetrics::new(meter, Operation::ImageGeneration.name()),
			rerank: OperationMetrics::new(meter, Operation::Rerank.name()),
			messages: OperationMetrics::new(meter, Operation::Messages.name()),
			responses: OperationMetrics::new(meter, Operation::Responses.name()),
		}
	}

	pub fn for_operation(&self, op: Operation) -> Arc<OperationMetrics> {
		match op {
			Operation::ChatCompletions | Operation::Models => self.chat.clone(),
			Operation::Completions => self.completion.clone(),
			Operation::Embeddings => self.embedding.clone(),
			Operation::ImageGeneration => self.image_generation.clone(),
			Operation::Rerank => self.rerank.clone(),
			Operation::Messages => self.messages.clone(),
			Operation::Responses => self.responses.clone(),
		}
	}
}

/// Per-request recorder. Owns the timing state for streaming latency
/// accounting and guards the one-completion-per-request invariant.
pub struct GenAI {
	m: Arc<OperationMetrics>,
	system: &'static str,
	backend_name: String,
	original_model: String,
	request_model: String,
	response_model: Option<String>,
	header_labels: Vec<KeyValue>,
	request_start: Instant,
	first_token: Option<Instant>,
	max_output_tokens: u64,
	ttft: Option<f64>,
	itl: Option<f64>,
	completion_recorded: bool,
}

impl GenAI {
	pub fn new(m: Arc<OperationMetrics>, system: &'static str, backend_name: String) -> Self {
		Self {
			m,
			system,
			backend_name,
			original_model: String::new(),
			request_model: String::new(),
			response_model: None,
			header_labels: Vec::new(),
			request_start: Instant::now(),
			first_token: None,
			max_output_tokens: 0,
			ttft: None,
			itl: None,
			completion_recorded: false,
		}
	}

	/// Mark the start of the upstream request and reset streaming state.
	/// Called once per attempt.
	pub fn start_request(&mut self) {
		self.request_start = Instant::now();
		self.first_token = None;
		self.max_output_tokens = 0;
		self.ttft = None;
		self.itl = None;
	}

	pub fn set_original_model(&mut self, model: &str) {
		self.original_model = model.to_string();
	}

	pub fn set_request_model(&mut self, model: &str) {
		self.request_model = model.to_string();
	}

	pub fn set_response_model(&mut self, model: &str) {
		if !model.is_empty() {
			self.response_model = Some(model.to_string());
		}
	}

	/// Attributes derived from configured request headers.
	pub fn set_header_labels(&mut self, labels: Vec<(String, String)>) {
		self.header_labels = labels
			.into_iter()
			.map(|(k, v)| KeyValue::new(k, v))
			.collect();
	}

	pub fn original_model(&self) -> &str {
		&self.original_model
	}

	fn base_attributes(&self, success: bool) -> Vec<KeyValue> {
		let mut attrs = vec![
			KeyValue::new("gen_ai.operation.name", self.m.operation),
			KeyValue::new("gen_ai.system", self.system),
			KeyValue::new("gen_ai.request.model", self.request_model.clone()),
			KeyValue::new(
				"gen_ai.response.model",
				self
					.response_model
					.clone()
					.unwrap_or_else(|| self.request_model.clone()),
			),
		];
		attrs.extend(self.header_labels.iter().cloned());
		if !success {
			// Per semantic convention the attribute is omitted entirely on
			// success.
			attrs.push(KeyValue::new("error.type", "_OTHER"));
		}
		attrs
	}

	/// Record per-type token counts. The `total` slot is only recorded when
	/// the provider surfaced an explicit total; derived totals would double
	/// count input and output.
	pub fn record_token_usage(&self, usage: &TokenUsage) {
		let attrs = self.base_attributes(true);
		let with_type = |t: &'static str| {
			let mut a = attrs.clone();
			a.push(KeyValue::new("gen_ai.token.type", t));
			a
		};
		if let Some(v) = usage.input {
			self.m.token_usage.record(v, &with_type("input"));
		}
		if let Some(v) = usage.cached_input {
			self.m.token_usage.record(v, &with_type("cached-input"));
		}
		if let Some(v) = usage.output {
			self.m.token_usage.record(v, &with_type("output"));
		}
		if let Some(v) = usage.total {
			self.m.token_usage.record(v, &with_type("total"));
		}
	}

	/// Streaming latency accounting, called once per response chunk with the
	/// cumulative output-token count.
	pub fn record_token_latency(&mut self, cumulative_output_tokens: u64, end_of_stream: bool) {
		// Cumulative counts never decrease; keep the max seen.
		self.max_output_tokens = self.max_output_tokens.max(cumulative_output_tokens);
		if self.first_token.is_none() && cumulative_output_tokens > 0 {
			let now = Instant::now();
			self.first_token = Some(now);
			let ttft = now.duration_since(self.request_start).as_secs_f64();
			self.ttft = Some(ttft);
			self
				.m
				.time_to_first_token
				.record(ttft, &self.base_attributes(true));
		}
		if end_of_stream
			&& self.max_output_tokens >= 2
			&& let Some(first) = self.first_token
		{
			let elapsed = first.elapsed().as_secs_f64();
			let itl = elapsed / (self.max_output_tokens - 1) as f64;
			self.itl = Some(itl);
			self
				.m
				.time_per_output_token
				.record(itl, &self.base_attributes(true));
		}
	}

	/// Record the request duration. Exactly once per attempt, on every
	/// terminal path.
	pub fn record_request_completion(&mut self, success: bool) {
		if self.completion_recorded {
			return;
		}
		self.completion_recorded = true;
		self.m.request_duration.record(
			self.request_start.elapsed().as_secs_f64(),
			&self.base_attributes(success),
		);
	}

	pub fn completion_recorded(&self) -> bool {
		self.completion_recorded
	}

	pub fn backend_name(&self) -> &str {
		&self.backend_name
	}

	/// Milliseconds until the first token, when one was seen.
	pub fn ttft_ms(&self) -> Option<f64> {
		self.ttft.map(|s| s * 1000.0)
	}

	/// Mean inter-token latency in milliseconds, when computed.
	pub fn itl_ms(&self) -> Option<f64> {
		self.itl.map(|s| s * 1000.0)
	}
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
