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
fn request_translation() {
	let req = chat_request(json!({
		"model": "gemini-2.0-flash",
		"messages": [
			{ "role": "system", "content": "answer briefly" },
			{ "role": "user", "content": "hi" },
			{ "role": "assistant", "content": "hello" },
			{ "role": "user", "content": "bye" }
		],
		"temperature": 0.1,
		"max_completion_tokens": 100,
		"stop": ["END"],
		"tools": [
			{ "type": "function", "function": {
				"name": "lookup", "parameters": { "type": "object" }
			} }
		]
	}));
	let out = from_completions::translate(&req, "gemini-2.0-flash").unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["systemInstruction"]["parts"][0]["text"], "answer briefly");
	let contents = v["contents"].as_array().unwrap();
	assert_eq!(contents.len(), 3);
	assert_eq!(contents[0]["role"], "user");
	assert_eq!(contents[1]["role"], "model");
	assert_eq!(contents[1]["parts"][0]["text"], "hello");
	assert_eq!(v["generationConfig"]["temperature"], 0.1);
	assert_eq!(v["generationConfig"]["maxOutputTokens"], 100);
	assert_eq!(v["generationConfig"]["stopSequences"], json!(["END"]));
	assert_eq!(
		v["tools"][0]["functionDeclarations"][0]["name"],
		"lookup"
	);
	// The model travels in the path, never the body.
	assert!(v.get("model").is_none());
}

#[test]
fn tool_response_carries_function_name() {
	let req = chat_request(json!({
		"model": "gemini",
		"messages": [
			{ "role": "assistant", "tool_calls": [
				{ "id": "call_1", "type": "function",
				  "function": { "name": "lookup", "arguments": "{\"q\":1}" } }
			] },
			{ "role": "tool", "tool_call_id": "call_1", "content": "{\"answer\":42}" }
		]
	}));
	let out = from_completions::translate(&req, "gemini").unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	let contents = v["contents"].as_array().unwrap();
	assert_eq!(contents[0]["parts"][0]["functionCall"]["name"], "lookup");
	assert_eq!(contents[0]["parts"][0]["functionCall"]["args"], json!({ "q": 1 }));
	assert_eq!(
		contents[1]["parts"][0]["functionResponse"]["name"],
		"lookup"
	);
	assert_eq!(
		contents[1]["parts"][0]["functionResponse"]["response"],
		json!({ "answer": 42 })
	);
}

#[test]
fn response_translation() {
	let gemini = json!({
		"candidates": [{
			"content": { "role": "model", "parts": [{ "text": "bonjour" }] },
			"finishReason": "STOP",
			"index": 0
		}],
		"usageMetadata": {
			"promptTokenCount": 6,
			"candidatesTokenCount": 2,
			"totalTokenCount": 8
		},
		"modelVersion": "gemini-2.0-flash-001"
	});
	let (body, usage, model) =
		from_completions::translate_response(&serde_json::to_vec(&gemini).unwrap(), "gemini-2.0-flash")
			.unwrap();
	assert_eq!(model, "gemini-2.0-flash-001");
	assert_eq!(usage.input, Some(6));
	assert_eq!(usage.output, Some(2));
	assert_eq!(usage.total, Some(8));

	let v: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(v["object"], "chat.completion");
	assert_eq!(v["model"], "gemini-2.0-flash-001");
	assert_eq!(v["choices"][0]["message"]["content"], "bonjour");
	assert_eq!(v["choices"][0]["finish_reason"], "stop");
	assert_eq!(v["usage"]["total_tokens"], 8);
}

#[test]
fn response_translation_function_call() {
	let gemini = json!({
		"candidates": [{
			"content": { "role": "model", "parts": [
				{ "functionCall": { "name": "lookup", "args": { "q": "x" } } }
			] },
			"finishReason": "STOP"
		}]
	});
	let (body, _, _) =
		from_completions::translate_response(&serde_json::to_vec(&gemini).unwrap(), "gemini").unwrap();
	let v: Value = serde_json::from_slice(&body).unwrap();
	let tc = &v["choices"][0]["message"]["tool_calls"][0];
	assert_eq!(tc["function"]["name"], "lookup");
	assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
}

#[test]
fn error_translation() {
	let gemini = json!({
		"error": { "code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED" }
	});
	let out =
		from_completions::translate_error(429, &serde_json::to_vec(&gemini).unwrap()).unwrap();
	let v: Value = serde_json::from_slice(&out).unwrap();
	assert_eq!(v["error"]["type"], "rate_limit_error");
	assert_eq!(v["error"]["message"], "quota exceeded");
}

#[test]
fn stream_translation() {
	let mut s = from_completions::TranslateStream::new("gemini-2.0-flash");
	let mut input = String::new();
	input += &format!(
		"data: {}\n\n",
		json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": "one " }] } }] })
	);
	input += &format!(
		"data: {}\n\n",
		json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": "two" }] },
			"finishReason": "STOP" }],
			"usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6 } })
	);

	let step = s.push(input.as_bytes(), true).unwrap();
	let frames = parse_frames(&step.out);
	assert_eq!(frames.last().unwrap(), "[DONE]");
	let chunks: Vec<Value> = frames[..frames.len() - 1]
		.iter()
		.map(|f| serde_json::from_str(f).unwrap())
		.collect();
	assert_eq!(chunks[0]["object"], "chat.completion.chunk");
	assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "one ");
	assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "two");
	assert_eq!(chunks[1]["choices"][0]["finish_reason"], "stop");
	// The terminal usage chunk is separate, with empty choices.
	let usage_chunk = chunks.last().unwrap();
	assert_eq!(usage_chunk["choices"], json!([]));
	assert_eq!(usage_chunk["usage"]["prompt_tokens"], 4);
	assert_eq!(usage_chunk["usage"]["completion_tokens"], 2);
	assert_eq!(step.usage.total, Some(6));
}

#[test]
fn stream_tool_call_chunks() {
	let mut s = from_completions::TranslateStream::new("gemini");
	let input = format!(
		"data: {}\n\n",
		json!({ "candidates": [{ "content": { "role": "model", "parts": [
			{ "functionCall": { "name": "lookup", "args": { "q": 1 } } }
		] }, "finishReason": "STOP" }] })
	);
	let step = s.push(input.as_bytes(), true).unwrap();
	let frames = parse_frames(&step.out);
	let first: Value = serde_json::from_str(&frames[0]).unwrap();
	let tc = &first["choices"][0]["delta"]["tool_calls"][0];
	assert_eq!(tc["index"], 0);
	assert_eq!(tc["function"]["name"], "lookup");
	assert_eq!(
		serde_json::from_str::<Value>(tc["function"]["arguments"].as_str().unwrap()).unwrap(),
		json!({ "q": 1 })
	);
	assert_eq!(first["choices"][0]["finish_reason"], "tool_calls");
	assert_eq!(frames.last().unwrap(), "[DONE]");
}

#[test]
fn stream_tool_call_continued_across_frames() {
	// The same logical call (same part position) delivered over two frames
	// must keep its index and argument buffer; the header goes out once.
	let mut s = from_completions::TranslateStream::new("gemini");
	let frame1 = format!(
		"data: {}\n\n",
		json!({ "candidates": [{ "content": { "role": "model", "parts": [
			{ "functionCall": { "name": "lookup", "args": { "q": 1 } } }
		] } }] })
	);
	let step1 = s.push(frame1.as_bytes(), false).unwrap();
	let c1: Value = serde_json::from_str(&parse_frames(&step1.out)[0]).unwrap();
	let tc1 = &c1["choices"][0]["delta"]["tool_calls"][0];
	assert_eq!(tc1["index"], 0);
	assert!(tc1["id"].is_string());
	assert_eq!(tc1["function"]["name"], "lookup");
	assert_eq!(tc1["function"]["arguments"], "{\"q\":1}");

	let frame2 = format!(
		"data: {}\n\n",
		json!({ "candidates": [{ "content": { "role": "model", "parts": [
			{ "functionCall": { "name": "lookup", "args": { "page": 2 } } }
		] }, "finishReason": "STOP" }] })
	);
	let step2 = s.push(frame2.as_bytes(), true).unwrap();
	let frames2 = parse_frames(&step2.out);
	let c2: Value = serde_json::from_str(&frames2[0]).unwrap();
	let tc2 = &c2["choices"][0]["delta"]["tool_calls"][0];
	assert_eq!(tc2["index"], 0);
	assert!(tc2.get("id").is_none());
	assert!(tc2["function"].get("name").is_none());
	// The fragment is the new tail of the accumulated buffer, so the
	// receiver's concatenation stays contiguous.
	assert_eq!(tc2["function"]["arguments"], "{\"page\":2}");
	assert_eq!(c2["choices"][0]["finish_reason"], "tool_calls");
	assert_eq!(frames2.last().unwrap(), "[DONE]");
}

#[test]
fn stream_parallel_tool_calls_get_distinct_indexes() {
	let mut s = from_completions::TranslateStream::new("gemini");
	let input = format!(
		"data: {}\n\n",
		json!({ "candidates": [{ "content": { "role": "model", "parts": [
			{ "functionCall": { "name": "first", "args": { "a": 1 } } },
			{ "functionCall": { "name": "second", "args": { "b": 2 } } }
		] }, "finishReason": "STOP" }] })
	);
	let step = s.push(input.as_bytes(), true).unwrap();
	let first: Value = serde_json::from_str(&parse_frames(&step.out)[0]).unwrap();
	let calls = first["choices"][0]["delta"]["tool_calls"].as_array().unwrap();
	assert_eq!(calls.len(), 2);
	assert_eq!(calls[0]["index"], 0);
	assert_eq!(calls[0]["function"]["name"], "first");
	assert_eq!(calls[1]["index"], 1);
	assert_eq!(calls[1]["function"]["name"], "second");
	assert_ne!(calls[0]["id"], calls[1]["id"]);
}
