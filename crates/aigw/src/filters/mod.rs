//! The per-request router filter.
//!
//! One router filter is created per downstream request. It owns the request
//! body buffer, the parsed entity, the tracing span and the registry entry;
//! the per-attempt upstream filter is owned by the router and delegates its
//! response-phase work through it (the host invokes response callbacks on
//! the router only).

use std::sync::Arc;

use bytes::BytesMut;
use http::StatusCode;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::Env;
use crate::host::{self, BodyKind, FilterStatus, HeaderSnapshot, HostFilter};
use crate::llm::types::RequestEntity;
use crate::llm::{AIError, Operation};
use crate::registry::FilterHandle;
use crate::telemetry::trc;
use crate::{INTERNAL_REQUEST_ID_KEY, METADATA_NAMESPACE, MODEL_NAME_HEADER, dispatch, llm};

pub mod upstream;
pub use upstream::UpstreamFilter;

pub struct RouterFilter {
	env: Arc<Env>,
	/// Config snapshot captured at construction; used for the whole request
	/// even across reloads.
	config: Arc<crate::config::RuntimeConfig>,
	operation: Option<Operation>,
	attempt_count: u32,
	internal_request_id: String,
	original_request_body_raw: BytesMut,
	original_request_body: Option<Box<dyn RequestEntity>>,
	original_model: String,
	original_request_headers: HeaderSnapshot,
	stream: bool,
	force_body_mutation: bool,
	span: Option<trc::Span>,
	success: bool,
	upstream: Option<UpstreamFilter>,
}

impl RouterFilter {
	pub fn new(env: Arc<Env>) -> FilterHandle {
		let config = env.config.snapshot();
		Arc::new(Mutex::new(Self {
			env,
			config,
			operation: None,
			attempt_count: 0,
			internal_request_id: String::new(),
			original_request_body_raw: BytesMut::new(),
			original_request_body: None,
			original_model: String::new(),
			original_request_headers: HeaderSnapshot::new(),
			stream: false,
			force_body_mutation: false,
			span: None,
			success: false,
			upstream: None,
		}))
	}

	pub fn on_request_headers(handle: &FilterHandle, host: &mut dyn HostFilter) -> FilterStatus {
		let mut f = handle.lock();
		f.request_headers(handle, host)
	}

	pub fn on_request_body(
		handle: &FilterHandle,
		host: &mut dyn HostFilter,
		end_of_stream: bool,
	) -> FilterStatus {
		let mut f = handle.lock();
		f.request_body(host, end_of_stream)
	}

	pub fn on_response_headers(handle: &FilterHandle, host: &mut dyn HostFilter) -> FilterStatus {
		let mut f = handle.lock();
		f.response_headers(host)
	}

	pub fn on_response_body(
		handle: &FilterHandle,
		host: &mut dyn HostFilter,
		end_of_stream: bool,
	) -> FilterStatus {
		let mut f = handle.lock();
		f.response_body(host, end_of_stream)
	}

	/// Invoked by the host when the request completes or is reset. Removes
	/// the registry entry and drops the upstream back-reference.
	pub fn on_destroy(handle: &FilterHandle) {
		let mut f = handle.lock();
		if !f.internal_request_id.is_empty() {
			f.env.registry.remove(&f.internal_request_id);
		}
		f.upstream = None;
		f.span = None;
	}

	fn request_headers(&mut self, handle: &FilterHandle, host: &mut dyn HostFilter) -> FilterStatus {
		let Some(path) = host.get_request_header(":path") else {
			host.send_local_reply(StatusCode::BAD_REQUEST, &[], b"missing :path header");
			return FilterStatus::StopIteration;
		};
		let Some(op) = dispatch::lookup(&self.env.paths, &path) else {
			host.send_local_reply(
				StatusCode::NOT_FOUND,
				&[],
				format!("unsupported path: {path}").as_bytes(),
			);
			return FilterStatus::StopIteration;
		};
		// The model listing is answered locally, without reading a body.
		if op == Operation::Models {
			let body = dispatch::models_response(&self.config.declared_models);
			host.send_local_reply(
				StatusCode::OK,
				&[("content-type", "application/json")],
				&body,
			);
			return FilterStatus::StopIteration;
		}
		self.operation = Some(op);

		let Some(request_id) = host.get_request_header("x-request-id") else {
			host.send_local_reply(StatusCode::BAD_REQUEST, &[], b"missing x-request-id header");
			return FilterStatus::StopIteration;
		};
		// The uuid suffix keeps retries of the same downstream request from
		// colliding in the registry.
		self.internal_request_id = format!("{request_id}-{}", Uuid::new_v4());
		host.set_metadata_string(
			METADATA_NAMESPACE,
			INTERNAL_REQUEST_ID_KEY,
			&self.internal_request_id,
		);
		self.env.registry.insert(&self.internal_request_id, handle.clone());

		if let Some(len) = host
			.get_request_header("content-length")
			.and_then(|v| v.parse::<usize>().ok())
		{
			self.original_request_body_raw.reserve(len);
		}
		FilterStatus::StopIteration
	}

	fn request_body(&mut self, host: &mut dyn HostFilter, end_of_stream: bool) -> FilterStatus {
		for chunk in host.body_chunks(BodyKind::Received) {
			self.original_request_body_raw.extend_from_slice(&chunk);
		}
		if !end_of_stream {
			return FilterStatus::StopIterationAndBuffer;
		}
		let Some(op) = self.operation else {
			host.send_local_reply(StatusCode::INTERNAL_SERVER_ERROR, &[], b"no endpoint resolved");
			return FilterStatus::StopIteration;
		};
		let need_cost_accounting = !self.config.request_costs.is_empty();
		let parsed = match llm::types::parse_request(
			op,
			&self.original_request_body_raw,
			need_cost_accounting,
		) {
			Ok(p) => p,
			Err(e) => {
				host.send_local_reply(
					StatusCode::BAD_REQUEST,
					&[],
					format!("failed to parse request body: {e}").as_bytes(),
				);
				return FilterStatus::StopIteration;
			},
		};
		self.original_model = parsed.model;
		self.stream = parsed.stream;
		if let Some(mutated) = parsed.mutated {
			self.original_request_body_raw = BytesMut::from(&mutated[..]);
			self.force_body_mutation = true;
		}
		self.original_request_body = Some(parsed.entity);

		// The routing layer matches on the model header; a re-route must be
		// possible after it is set.
		host.set_request_header(MODEL_NAME_HEADER, &self.original_model);
		self.original_request_headers = host::snapshot_headers(host.request_headers());

		let env = self.env.clone();
		if let Some(tracer) = &env.tracer {
			let entity = self
				.original_request_body
				.as_deref()
				.expect("entity parsed above");
			let mut carrier = ResponseHeaderCarrier { host: &mut *host };
			self.span = Some(tracer.start_span_and_inject_headers(
				op,
				&self.original_request_headers,
				&mut carrier,
				entity,
				&env.tracing_header_attributes,
			));
		}

		host.clear_route_cache();
		FilterStatus::Continue
	}

	fn response_headers(&mut self, host: &mut dyn HostFilter) -> FilterStatus {
		// Routing may fail before any upstream filter exists.
		if self.upstream.is_none() {
			return FilterStatus::Continue;
		}
		match self.response_headers_impl(host) {
			Ok(status) => status,
			Err(e) => self.fail(host, &e),
		}
	}

	fn response_headers_impl(&mut self, host: &mut dyn HostFilter) -> Result<FilterStatus, AIError> {
		let up = self.upstream.as_mut().expect("checked by caller");
		up.res_headers = host::snapshot_headers(host.response_headers());
		let updates = up.translator.response_headers(&up.res_headers)?;
		upstream::apply_response_updates(host, &updates);
		let status = host.get_response_header(":status").unwrap_or_default();
		self.success = status == "200";
		if self.stream && self.success {
			// Chunks must flow; set up the incremental decoder now.
			let encoding = up.res_headers.get("content-encoding").cloned();
			up.start_stream_decoder(encoding.as_deref());
			Ok(FilterStatus::Continue)
		} else {
			Ok(FilterStatus::StopIteration)
		}
	}

	fn response_body(&mut self, host: &mut dyn HostFilter, end_of_stream: bool) -> FilterStatus {
		if self.upstream.is_none() {
			return FilterStatus::Continue;
		}
		if self.stream && self.success {
			return match self.streaming_response_chunk(host, end_of_stream) {
				Ok(()) => FilterStatus::Continue,
				Err(e) => self.fail(host, &e),
			};
		}
		if !end_of_stream {
			return FilterStatus::StopIterationAndBuffer;
		}
		let result = if self.success {
			self.buffered_response(host)
		} else {
			self.response_body_on_error(host)
		};
		match result {
			Ok(()) => FilterStatus::Continue,
			Err(e) => self.fail(host, &e),
		}
	}

	fn streaming_response_chunk(
		&mut self,
		host: &mut dyn HostFilter,
		end_of_stream: bool,
	) -> Result<(), AIError> {
		let chunk = host::read_body(host, BodyKind::Received);
		{
			let up = self.upstream.as_mut().expect("checked by caller");
			let decoded = up.decode_chunk(&chunk, end_of_stream)?;
			let transform = up.translator.response_body(&decoded, end_of_stream)?;
			match &transform.body {
				Some(b) => host::replace_body(host, BodyKind::Received, b),
				// No rewrite, but a decoded stream still goes out as
				// plaintext.
				None if up.decoded => host::replace_body(host, BodyKind::Received, &decoded),
				None => {},
			}
			up.costs.override_with(&transform.usage);
			if let Some(model) = &transform.response_model {
				up.metrics.set_response_model(model);
			}
			up.metrics
				.record_token_latency(transform.output_tokens_estimate, end_of_stream);
			if end_of_stream {
				up.metrics.record_token_usage(&up.costs);
			}
		}
		if end_of_stream {
			self.write_dynamic_metadata(host)?;
			let up = self.upstream.as_mut().expect("checked by caller");
			up.metrics.record_request_completion(true);
			if let Some(span) = self.span.take() {
				span.end_span();
			}
		}
		Ok(())
	}

	fn buffered_response(&mut self, host: &mut dyn HostFilter) -> Result<(), AIError> {
		let body = read_response_body(host);
		let final_body;
		{
			let up = self.upstream.as_mut().expect("checked by caller");
			let encoding = up.res_headers.get("content-encoding").map(String::as_str);
			let (decoded, was_decoded) = crate::compression::decode_full(encoding, &body)?;
			let transform = up.translator.response_body(&decoded, true)?;
			upstream::apply_response_updates(host, &transform.headers);
			final_body = match transform.body {
				Some(b) => Some(b),
				None if was_decoded => Some(decoded),
				None => None,
			};
			if let Some(b) = &final_body {
				host::replace_body(host, BodyKind::Buffered, b);
				host.set_response_header("content-length", &b.len().to_string());
				if was_decoded {
					host.remove_response_header("content-encoding");
				}
			}
			up.costs.override_with(&transform.usage);
			if let Some(model) = &transform.response_model {
				up.metrics.set_response_model(model);
			}
			up.metrics.record_token_usage(&up.costs);
		}
		self.write_dynamic_metadata(host)?;
		let up = self.upstream.as_mut().expect("checked by caller");
		up.metrics.record_request_completion(true);
		if let Some(span) = self.span.take() {
			let body = final_body.unwrap_or(body);
			span.record_response(&body);
		}
		Ok(())
	}

	/// Non-2xx upstream response: rewrite the error to the client's schema
	/// and close out metrics and span.
	fn response_body_on_error(&mut self, host: &mut dyn HostFilter) -> Result<(), AIError> {
		let body = read_response_body(host);
		let up = self.upstream.as_mut().expect("checked by caller");
		let status: u16 = up
			.res_headers
			.get(":status")
			.and_then(|s| s.parse().ok())
			.unwrap_or(500);
		let encoding = up.res_headers.get("content-encoding").map(String::as_str);
		let (decoded, was_decoded) = crate::compression::decode_full(encoding, &body)?;
		let transform = up.translator.response_error(status, &decoded)?;
		upstream::apply_response_updates(host, &transform.headers);
		let final_body = match transform.body {
			Some(b) => Some(b),
			None if was_decoded => Some(decoded),
			None => None,
		};
		if let Some(b) = &final_body {
			host::replace_body(host, BodyKind::Buffered, b);
			host.set_response_header("content-length", &b.len().to_string());
			if was_decoded {
				host.remove_response_header("content-encoding");
			}
		}
		up.metrics.record_request_completion(false);
		if let Some(span) = self.span.take() {
			span.end_span_on_error(status, final_body.as_deref().unwrap_or(&body));
		}
		Ok(())
	}

	fn write_dynamic_metadata(&mut self, host: &mut dyn HostFilter) -> Result<(), AIError> {
		let config = self.config.clone();
		let up = self.upstream.as_ref().expect("checked by caller");
		for cost in &config.request_costs {
			let value = match cost.kind {
				crate::config::CostKind::Input => up.costs.input.unwrap_or(0),
				crate::config::CostKind::CachedInput => up.costs.cached_input.unwrap_or(0),
				crate::config::CostKind::Output => up.costs.output.unwrap_or(0),
				crate::config::CostKind::Total => up.costs.total_tokens(),
				crate::config::CostKind::CelExpression => {
					let expr = cost.expression.as_ref().ok_or_else(|| {
						AIError::Internal(format!(
							"cost rule {} has no compiled expression",
							cost.metadata_key
						))
					})?;
					expr.eval_cost(&up.request_model, &up.backend.name, &up.costs)?
				},
			};
			host.set_metadata_number(METADATA_NAMESPACE, &cost.metadata_key, value as f64);
		}
		host.set_metadata_string(METADATA_NAMESPACE, "backend_name", &up.backend.name);
		if let Some(o) = &up.backend.model_name_override {
			host.set_metadata_string(METADATA_NAMESPACE, "model_name_override", o);
		}
		if self.stream {
			if let Some(ttft) = up.metrics.ttft_ms() {
				host.set_metadata_number(METADATA_NAMESPACE, "token_latency_ttft", ttft);
			}
			if let Some(itl) = up.metrics.itl_ms() {
				host.set_metadata_number(METADATA_NAMESPACE, "token_latency_itl", itl);
			}
		}
		Ok(())
	}

	/// Terminal error path: local 500 reply in the client's error schema,
	/// one failed-completion record, span closed with the error.
	fn fail(&mut self, host: &mut dyn HostFilter, err: &AIError) -> FilterStatus {
		tracing::error!(error = %err, request_id = %self.internal_request_id, "request failed");
		let message = err.to_string();
		let body = match self.operation {
			Some(Operation::Messages) => {
				crate::llm::conversion::completions::from_messages::translate_error(
					500,
					message.as_bytes(),
				)
				.unwrap_or_else(|_| message.clone().into_bytes())
			},
			_ => crate::llm::conversion::messages::from_completions::translate_error(
				500,
				message.as_bytes(),
			)
			.unwrap_or_else(|_| message.clone().into_bytes()),
		};
		host.send_local_reply(
			StatusCode::INTERNAL_SERVER_ERROR,
			&[("content-type", "application/json")],
			&body,
		);
		if let Some(up) = self.upstream.as_mut() {
			up.metrics.record_request_completion(false);
		}
		if let Some(span) = self.span.take() {
			span.end_span_on_error(500, message.as_bytes());
		}
		FilterStatus::StopIteration
	}
}

/// Buffered responses normally land in the buffered body, but the final
/// chunk can still sit in the received buffer depending on phase.
fn read_response_body(host: &dyn HostFilter) -> Vec<u8> {
	let body = host::read_body(host, BodyKind::Buffered);
	if body.is_empty() {
		host::read_body(host, BodyKind::Received)
	} else {
		body
	}
}

struct ResponseHeaderCarrier<'a> {
	host: &'a mut dyn HostFilter,
}

impl trc::SpanCarrier for ResponseHeaderCarrier<'_> {
	fn set(&mut self, key: &str, value: &str) {
		self.host.set_response_header(key, value);
	}
}

#[cfg(test)]
#[path = "filters_tests.rs"]
mod tests;
