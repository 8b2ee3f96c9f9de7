use opentelemetry::global;

use super::*;
use crate::llm::Operation;

fn recorder() -> GenAI {
	let meter = global::meter("metrics-tests");
	let metrics = Metrics::new(&meter);
	GenAI::new(
		metrics.for_operation(Operation::ChatCompletions),
		"openai",
		"primary".to_string(),
	)
}

#[test]
fn completion_recorded_once() {
	let mut g = recorder();
	g.start_request();
	assert!(!g.completion_recorded());
	g.record_request_completion(true);
	assert!(g.completion_recorded());
	// The second call is a no-op, not a double record.
	g.record_request_completion(false);
	assert!(g.completion_recorded());
}

#[test]
fn ttft_set_on_first_output_token() {
	let mut g = recorder();
	g.start_request();
	g.record_token_latency(0, false);
	assert!(g.ttft_ms().is_none());
	g.record_token_latency(1, false);
	let ttft = g.ttft_ms().expect("ttft after first token");
	g.record_token_latency(2, false);
	// TTFT is recorded once; later chunks leave it alone.
	assert_eq!(g.ttft_ms(), Some(ttft));
}

#[test]
fn itl_requires_two_output_tokens() {
	let mut g = recorder();
	g.start_request();
	g.record_token_latency(1, true);
	assert!(g.itl_ms().is_none());

	let mut g = recorder();
	g.start_request();
	g.record_token_latency(1, false);
	g.record_token_latency(5, true);
	assert!(g.itl_ms().is_some());
}

#[test]
fn ttft_before_itl() {
	let mut g = recorder();
	g.start_request();
	g.record_token_latency(3, false);
	let ttft_at_first = g.ttft_ms();
	g.record_token_latency(6, true);
	assert!(ttft_at_first.is_some(), "ttft must precede itl");
	assert!(g.itl_ms().is_some());
}

#[test]
fn max_output_is_monotonic() {
	let mut g = recorder();
	g.start_request();
	g.record_token_latency(5, false);
	// A lower cumulative count (out-of-order usage frame) cannot shrink the
	// total used for the ITL division.
	g.record_token_latency(3, true);
	assert!(g.itl_ms().is_some());
}

#[test]
fn start_request_resets_streaming_state() {
	let mut g = recorder();
	g.start_request();
	g.record_token_latency(4, true);
	assert!(g.ttft_ms().is_some());
	g.start_request();
	assert!(g.ttft_ms().is_none());
	assert!(g.itl_ms().is_none());
}
