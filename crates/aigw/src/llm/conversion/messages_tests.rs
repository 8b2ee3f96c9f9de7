use serde_json::{Value, json};

use super::from_completions;
use crate::llm::types;

fn chat_request(body: Value) -> types::completions::Request {
	serde_json::from_value(body).unwrap()
}

fn parse_frames(out: &[u8]) -> Vec<String> {
	std::str::from_utf8(out)
		.unwrap()
		.split("\n\n")
		.filter(|s| !s.is_empty())
		.map(|s| s.strip_prefix("data: ").unwrap().to_string())
		.collect()
}

#[test]
fn request_translation_basic() {
	let req = chat_request(json!({
		"model": "gpt-4o",
		"messages": [
			{ "role": "system", "content": "be brief" },
			{ "role": "user", "content": "hi" }
		],
		"stream": true,
		"temperature": 0.2
	}));
	let out = from_completions::translate(&req, "claude-sonnet").unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["model"], "claude-sonnet");
	assert_eq!(v["system"], "be brief");
	assert_eq!(v["stream"], true);
	assert_eq!(v["temperature"], 0.2);
	// Anthropic requires a token budget even when the client sent none.
	assert_eq!(v["max_tokens"], super::DEFAULT_MAX_TOKENS);
	assert_eq!(v["messages"], json!([
		{ "role": "user", "content": [{ "type": "text", "text": "hi" }] }
	]));
}

#[test]
fn request_translation_tools_and_budget() {
	let req = chat_request(json!({
		"model": "gpt-4o",
		"messages": [
			{ "role": "user", "content": "weather in paris?" },
			{ "role": "assistant", "tool_calls": [
				{ "id": "tc1", "type": "function",
				  "function": { "name": "weather", "arguments": "{\"city\":\"Paris\"}" } }
			] },
			{ "role": "tool", "tool_call_id": "tc1", "content": "sunny" }
		],
		"max_completion_tokens": 512,
		"tools": [
			{ "type": "function", "function": {
				"name": "weather",
				"description": "look up weather",
				"parameters": { "type": "object" }
			} }
		],
		"tool_choice": "required"
	}));
	let out = from_completions::translate(&req, "claude").unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["max_tokens"], 512);
	assert_eq!(v["tools"][0]["name"], "weather");
	assert_eq!(v["tools"][0]["input_schema"], json!({ "type": "object" }));
	assert_eq!(v["tool_choice"], json!({ "type": "any" }));

	let messages = v["messages"].as_array().unwrap();
	assert_eq!(messages[1]["role"], "assistant");
	assert_eq!(messages[1]["content"][0]["type"], "tool_use");
	assert_eq!(messages[1]["content"][0]["input"], json!({ "city": "Paris" }));
	assert_eq!(messages[2]["role"], "user");
	assert_eq!(messages[2]["content"][0]["type"], "tool_result");
	assert_eq!(messages[2]["content"][0]["tool_use_id"], "tc1");
}

#[test]
fn response_translation() {
	let anthropic = json!({
		"id": "msg_01",
		"type": "message",
		"role": "assistant",
		"content": [{ "type": "text", "text": "hello there" }],
		"model": "claude-sonnet",
		"stop_reason": "end_turn",
		"stop_sequence": null,
		"usage": { "input_tokens": 10, "output_tokens": 5 }
	});
	let (body, usage, model) =
		from_completions::translate_response(&serde_json::to_vec(&anthropic).unwrap()).unwrap();
	assert_eq!(model, "claude-sonnet");
	assert_eq!(usage.input, Some(10));
	assert_eq!(usage.output, Some(5));
	// The provider defines only input/output; no explicit total.
	assert_eq!(usage.total, None);

	let v: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(v["object"], "chat.completion");
	assert_eq!(v["choices"][0]["message"]["content"], "hello there");
	assert_eq!(v["choices"][0]["finish_reason"], "stop");
	assert_eq!(v["usage"]["prompt_tokens"], 10);
	assert_eq!(v["usage"]["completion_tokens"], 5);
	assert_eq!(v["usage"]["total_tokens"], 15);
}

#[test]
fn response_translation_tool_use() {
	let anthropic = json!({
		"id": "msg_02",
		"type": "message",
		"role": "assistant",
		"content": [
			{ "type": "tool_use", "id": "tu_1", "name": "weather", "input": { "city": "Paris" } }
		],
		"model": "claude-sonnet",
		"stop_reason": "tool_use",
		"stop_sequence": null,
		"usage": { "input_tokens": 4, "output_tokens": 2 }
	});
	let (body, _, _) =
		from_completions::translate_response(&serde_json::to_vec(&anthropic).unwrap()).unwrap();
	let v: Value = serde_json::from_slice(&body).unwrap();
	let tc = &v["choices"][0]["message"]["tool_calls"][0];
	assert_eq!(tc["id"], "tu_1");
	assert_eq!(tc["function"]["name"], "weather");
	assert_eq!(
		serde_json::from_str::<Value>(tc["function"]["arguments"].as_str().unwrap()).unwrap(),
		json!({ "city": "Paris" })
	);
	assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
}

#[test]
fn error_translation() {
	let anthropic = json!({
		"type": "error",
		"error": { "type": "rate_limit_error", "message": "slow down" }
	});
	let out =
		from_completions::translate_error(429, &serde_json::to_vec(&anthropic).unwrap()).unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["error"]["type"], "rate_limit_error");
	assert_eq!(v["error"]["message"], "slow down");
}

#[test]
fn error_translation_plain_text() {
	let out = from_completions::translate_error(503, b"upstream connect error").unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["error"]["type"], "service_unavailable_error");
	assert_eq!(v["error"]["message"], "upstream connect error");
}

fn event(name: &str, data: Value) -> String {
	format!("event: {name}\ndata: {data}\n\n")
}

#[test]
fn stream_text_translation() {
	let mut s = from_completions::TranslateStream::new("claude-sonnet");
	let mut frames = Vec::new();
	let mut input = String::new();
	input += &event(
		"message_start",
		json!({ "type": "message_start", "message": {
			"id": "msg_abc", "type": "message", "role": "assistant", "content": [],
			"model": "claude-sonnet-4", "stop_reason": null, "stop_sequence": null,
			"usage": { "input_tokens": 9, "output_tokens": 1 }
		} }),
	);
	input += &event(
		"content_block_start",
		json!({ "type": "content_block_start", "index": 0,
			"content_block": { "type": "text", "text": "" } }),
	);
	input += &event(
		"content_block_delta",
		json!({ "type": "content_block_delta", "index": 0,
			"delta": { "type": "text_delta", "text": "Hel" } }),
	);
	input += &event(
		"content_block_delta",
		json!({ "type": "content_block_delta", "index": 0,
			"delta": { "type": "text_delta", "text": "lo" } }),
	);
	input += &event(
		"content_block_stop",
		json!({ "type": "content_block_stop", "index": 0 }),
	);
	input += &event(
		"message_delta",
		json!({ "type": "message_delta",
			"delta": { "stop_reason": "end_turn", "stop_sequence": null },
			"usage": { "output_tokens": 2 } }),
	);
	input += &event("message_stop", json!({ "type": "message_stop" }));

	// Deliver in awkward slices so events straddle chunk boundaries.
	let bytes = input.as_bytes();
	let mid = bytes.len() / 3;
	for (i, part) in [&bytes[..mid], &bytes[mid..2 * mid], &bytes[2 * mid..]]
		.into_iter()
		.enumerate()
	{
		let step = s.push(part, i == 2).unwrap();
		frames.extend(parse_frames(&step.out));
	}

	assert_eq!(frames.last().unwrap(), "[DONE]");
	let chunks: Vec<Value> = frames[..frames.len() - 1]
		.iter()
		.map(|f| serde_json::from_str(f).unwrap())
		.collect();
	// Two text deltas, one finish chunk, one usage chunk.
	assert_eq!(chunks.len(), 4);
	assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "Hel");
	assert_eq!(chunks[0]["id"], "msg_abc");
	assert_eq!(chunks[0]["model"], "claude-sonnet-4");
	assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "lo");
	assert_eq!(chunks[2]["choices"][0]["finish_reason"], "stop");
	let usage = &chunks[3]["usage"];
	assert_eq!(usage["prompt_tokens"], 9);
	assert_eq!(usage["completion_tokens"], 2);
	assert_eq!(usage["total_tokens"], 11);
	assert_eq!(chunks[3]["choices"], json!([]));
}

#[test]
fn stream_tool_call_translation() {
	let mut s = from_completions::TranslateStream::new("claude");
	let mut input = String::new();
	input += &event(
		"message_start",
		json!({ "type": "message_start", "message": {
			"id": "msg_t", "type": "message", "role": "assistant", "content": [],
			"model": "claude", "stop_reason": null, "stop_sequence": null,
			"usage": { "input_tokens": 3, "output_tokens": 0 }
		} }),
	);
	input += &event(
		"content_block_start",
		json!({ "type": "content_block_start", "index": 0, "content_block":
			{ "type": "tool_use", "id": "tu_9", "name": "weather", "input": {} } }),
	);
	input += &event(
		"content_block_delta",
		json!({ "type": "content_block_delta", "index": 0,
			"delta": { "type": "input_json_delta", "partial_json": "{\"city\"" } }),
	);
	input += &event(
		"content_block_delta",
		json!({ "type": "content_block_delta", "index": 0,
			"delta": { "type": "input_json_delta", "partial_json": ":\"Paris\"}" } }),
	);
	input += &event(
		"message_delta",
		json!({ "type": "message_delta",
			"delta": { "stop_reason": "tool_use", "stop_sequence": null },
			"usage": { "output_tokens": 7 } }),
	);
	input += &event("message_stop", json!({ "type": "message_stop" }));

	let step = s.push(input.as_bytes(), true).unwrap();
	let frames = parse_frames(&step.out);
	let chunks: Vec<Value> = frames[..frames.len() - 1]
		.iter()
		.map(|f| serde_json::from_str(f).unwrap())
		.collect();

	// First fragment carries the tool-call header; the second only appends
	// arguments.
	let tc0 = &chunks[0]["choices"][0]["delta"]["tool_calls"][0];
	assert_eq!(tc0["index"], 0);
	assert_eq!(tc0["id"], "tu_9");
	assert_eq!(tc0["function"]["name"], "weather");
	assert_eq!(tc0["function"]["arguments"], "{\"city\"");
	let tc1 = &chunks[1]["choices"][0]["delta"]["tool_calls"][0];
	assert_eq!(tc1["index"], 0);
	assert!(tc1.get("id").is_none());
	assert!(tc1["function"].get("name").is_none());
	assert_eq!(tc1["function"]["arguments"], ":\"Paris\"}");

	assert_eq!(chunks[2]["choices"][0]["finish_reason"], "tool_calls");
	assert_eq!(step.usage.output, Some(7));
}

#[test]
fn stream_error_event_fails() {
	let mut s = from_completions::TranslateStream::new("claude");
	let input = event(
		"error",
		json!({ "type": "error", "error": { "type": "overloaded_error", "message": "busy" } }),
	);
	let err = s.push(input.as_bytes(), false).unwrap_err();
	assert_eq!(
		err.to_string(),
		"anthropic stream error: overloaded_error - busy"
	);
}

#[test]
fn stream_terminal_emitted_once() {
	let mut s = from_completions::TranslateStream::new("claude");
	let input = event("message_stop", json!({ "type": "message_stop" }));
	let step = s.push(input.as_bytes(), true).unwrap();
	let done_count = parse_frames(&step.out)
		.iter()
		.filter(|f| *f == "[DONE]")
		.count();
	assert_eq!(done_count, 1);
	// A spurious extra callback after end-of-stream adds nothing.
	let step = s.push(b"", true).unwrap();
	assert!(step.out.is_empty());
}

#[test]
fn stream_partial_tail_discarded() {
	let mut s = from_completions::TranslateStream::new("claude");
	let step = s
		.push(b"event: content_block_delta\ndata: {\"type\":\"content_b", true)
		.unwrap();
	let frames = parse_frames(&step.out);
	// Only the terminal frames, no malformed output event.
	assert_eq!(frames.last().unwrap(), "[DONE]");
	for f in &frames[..frames.len() - 1] {
		serde_json::from_str::<Value>(f).unwrap();
	}
}

#[test]
fn stream_usage_is_monotonic() {
	let mut s = from_completions::TranslateStream::new("claude");
	let mut last = 0;
	let events = [
		event(
			"message_start",
			json!({ "type": "message_start", "message": {
				"id": "m", "type": "message", "role": "assistant", "content": [],
				"model": "claude", "stop_reason": null, "stop_sequence": null,
				"usage": { "input_tokens": 2, "output_tokens": 1 } } }),
		),
		event(
			"message_delta",
			json!({ "type": "message_delta", "delta": { "stop_reason": null, "stop_sequence": null },
				"usage": { "output_tokens": 4 } }),
		),
		event(
			"message_delta",
			json!({ "type": "message_delta", "delta": { "stop_reason": null, "stop_sequence": null },
				"usage": { "output_tokens": 9 } }),
		),
	];
	for e in &events {
		let step = s.push(e.as_bytes(), false).unwrap();
		let out = step.usage.output.unwrap_or(0);
		assert!(out >= last, "usage went backwards: {out} < {last}");
		last = out;
	}
	assert_eq!(last, 9);
}
