//! The per-attempt upstream filter.
//!
//! Constructed on the upstream leg's request headers, where it re-associates
//! with its router filter through the process-wide registry (the internal
//! request ID travels via dynamic metadata). It owns backend resolution,
//! translator selection, header/body mutation, auth injection and the
//! per-attempt metrics object. Response-phase work is driven through the
//! router, which holds the upstream filter.

use std::sync::Arc;

use http::StatusCode;

use crate::compression::StreamDecoder;
use crate::config::{Env, RuntimeBackend};
use crate::host::{self, BodyKind, FilterStatus, HeaderSnapshot, HostFilter};
use crate::llm::translator::{self, HeaderUpdate, Translator};
use crate::llm::{AIError, Schema, TokenUsage};
use crate::mutation;
use crate::registry::FilterHandle;
use crate::telemetry::metrics::GenAI;
use crate::{INTERNAL_REQUEST_ID_KEY, METADATA_NAMESPACE};

use super::RouterFilter;

/// Upstream-host metadata key carrying the backend selected by the proxy's
/// endpoint picker.
pub const BACKEND_NAME_METADATA_KEY: &str = "backend_name";

pub struct UpstreamFilter {
	pub(super) backend: Arc<RuntimeBackend>,
	pub(super) translator: Box<dyn Translator>,
	pub(super) req_headers: HeaderSnapshot,
	pub(super) res_headers: HeaderSnapshot,
	/// Running totals; streaming translators report cumulative usage which
	/// overrides, never adds.
	pub(super) costs: TokenUsage,
	pub(super) on_retry: bool,
	pub(super) metrics: GenAI,
	pub(super) request_model: String,
	decoder: Option<StreamDecoder>,
	pub(super) decoded: bool,
}

impl UpstreamFilter {
	pub(super) fn start_stream_decoder(&mut self, encoding: Option<&str>) {
		let decoder = StreamDecoder::new(encoding);
		self.decoded = !decoder.is_identity();
		self.decoder = Some(decoder);
	}

	pub(super) fn decode_chunk(
		&mut self,
		chunk: &[u8],
		end_of_stream: bool,
	) -> Result<Vec<u8>, AIError> {
		match self.decoder.as_mut() {
			Some(d) => {
				let mut out = d.push(chunk)?;
				if end_of_stream {
					out.extend(d.finish()?);
				}
				Ok(out)
			},
			None => Ok(chunk.to_vec()),
		}
	}
}

/// Upstream request-headers callback: re-associate with the router, resolve
/// the backend, pick the translator and apply header mutation rules.
pub fn on_request_headers(env: &Arc<Env>, host: &mut dyn HostFilter) -> FilterStatus {
	let handle = match resolve_router(env, host) {
		Ok(h) => h,
		Err(e) => return reply_500(host, &e),
	};
	let mut router = handle.lock();
	match request_headers_impl(&mut router, host) {
		Ok(status) => status,
		Err(e) => reply_500(host, &e),
	}
}

fn request_headers_impl(
	router: &mut RouterFilter,
	host: &mut dyn HostFilter,
) -> Result<FilterStatus, AIError> {
	router.attempt_count += 1;
	let on_retry = router.attempt_count > 1;
	if on_retry {
		// A prior attempt may have mutated the body; it must be regenerated.
		router.force_body_mutation = true;
	}

	let backend_name = host
		.get_upstream_host_metadata(BACKEND_NAME_METADATA_KEY)
		.ok_or_else(|| AIError::Internal("no backend selected for upstream host".to_string()))?;
	let backend = router
		.config
		.backends
		.get(&backend_name)
		.cloned()
		.ok_or(AIError::UnknownBackend(backend_name))?;
	let op = router
		.operation
		.ok_or_else(|| AIError::Internal("no endpoint resolved".to_string()))?;

	let translator = translator::new_translator(
		op,
		&backend.schema,
		backend.model_name_override.as_deref(),
		!router.config.request_costs.is_empty(),
	)?;

	let mut metrics = GenAI::new(
		router.env.metrics.for_operation(op),
		backend.schema.system_name(),
		backend.name.clone(),
	);
	let labels = router
		.env
		.metrics_header_attributes
		.iter()
		.filter_map(|(header, label)| {
			router
				.original_request_headers
				.get(header)
				.map(|v| (label.clone(), v.clone()))
		})
		.collect();
	metrics.set_header_labels(labels);

	for rule in &backend.header_mutations {
		if rule.retry_only && !on_retry {
			continue;
		}
		apply_header_rule(host, rule, &router.original_request_headers);
	}

	let request_model = backend
		.model_name_override
		.clone()
		.unwrap_or_else(|| router.original_model.clone());
	router.upstream = Some(UpstreamFilter {
		backend,
		translator,
		req_headers: HeaderSnapshot::new(),
		res_headers: HeaderSnapshot::new(),
		costs: TokenUsage::default(),
		on_retry,
		metrics,
		request_model,
		decoder: None,
		decoded: false,
	});
	Ok(FilterStatus::StopIteration)
}

/// Upstream request-body callback: translate, mutate, and sign the body.
pub fn on_request_body(
	env: &Arc<Env>,
	host: &mut dyn HostFilter,
	end_of_stream: bool,
) -> FilterStatus {
	if !end_of_stream {
		return FilterStatus::StopIterationAndBuffer;
	}
	let handle = match resolve_router(env, host) {
		Ok(h) => h,
		Err(e) => return reply_500(host, &e),
	};
	let mut router = handle.lock();
	match request_body_impl(&mut router, host) {
		Ok(()) => FilterStatus::Continue,
		Err(e) => {
			tracing::error!(error = %e, "upstream request processing failed");
			if let Some(up) = router.upstream.as_mut() {
				up.metrics.record_request_completion(false);
			}
			host.send_local_reply(
				StatusCode::INTERNAL_SERVER_ERROR,
				&[],
				format!("failed to process request: {e}").as_bytes(),
			);
			FilterStatus::StopIteration
		},
	}
}

fn request_body_impl(router: &mut RouterFilter, host: &mut dyn HostFilter) -> Result<(), AIError> {
	let force = router.force_body_mutation;
	let entity = router
		.original_request_body
		.as_deref()
		.ok_or_else(|| AIError::Internal("request body not parsed".to_string()))?;
	let original_model = router.original_model.clone();
	let up = router
		.upstream
		.as_mut()
		.ok_or_else(|| AIError::Internal("upstream filter not initialized".to_string()))?;

	up.metrics.start_request();
	up.metrics.set_original_model(&original_model);
	let request_model = up.request_model.clone();
	up.metrics.set_request_model(&request_model);

	let transform = up.translator.request_body(entity, force)?;
	for update in &transform.headers {
		apply_request_update(host, update);
	}

	let mut new_body = transform.body;
	let rules = if up.on_retry && !up.backend.retry_body_mutations.is_empty() {
		&up.backend.retry_body_mutations
	} else {
		&up.backend.body_mutations
	};
	if !rules.is_empty() || !up.backend.patches.is_empty() {
		let body = match new_body.take() {
			Some(b) => b,
			None => read_request_body(host),
		};
		let body = mutation::apply_body_mutations(rules, body)?;
		let body = up
			.backend
			.patches
			.apply(schema_config_name(&up.backend.schema), body)?;
		new_body = Some(body);
	}

	// The body the signer sees must be the final upstream bytes.
	let body_for_auth = match new_body {
		Some(b) => {
			// On a retry the proxy keeps the body in the received buffer
			// rather than the buffered one.
			let kind = if host.body_len(BodyKind::Buffered) > 0 {
				BodyKind::Buffered
			} else {
				BodyKind::Received
			};
			host::replace_body(host, kind, &b);
			host.set_request_header("content-length", &b.len().to_string());
			b
		},
		None => read_request_body(host),
	};

	up.req_headers = host::snapshot_headers(host.request_headers());
	if let Some(auth) = &up.backend.auth {
		let extra = auth
			.inject(&up.req_headers, &body_for_auth)
			.map_err(AIError::Auth)?;
		for (name, value) in extra {
			host.set_request_header(&name, &value);
		}
	}
	Ok(())
}

fn resolve_router(env: &Arc<Env>, host: &dyn HostFilter) -> Result<FilterHandle, AIError> {
	let id = host
		.get_metadata_string(METADATA_NAMESPACE, INTERNAL_REQUEST_ID_KEY)
		.ok_or_else(|| AIError::Internal("internal request id metadata missing".to_string()))?;
	env
		.registry
		.get(&id)
		.ok_or_else(|| AIError::Internal(format!("no filter registered for request {id}")))
}

fn read_request_body(host: &dyn HostFilter) -> Vec<u8> {
	let body = host::read_body(host, BodyKind::Buffered);
	if body.is_empty() {
		host::read_body(host, BodyKind::Received)
	} else {
		body
	}
}

fn reply_500(host: &mut dyn HostFilter, err: &AIError) -> FilterStatus {
	tracing::error!(error = %err, "upstream filter failed");
	host.send_local_reply(
		StatusCode::INTERNAL_SERVER_ERROR,
		&[],
		err.to_string().as_bytes(),
	);
	FilterStatus::StopIteration
}

/// The config-facing schema key, as used for JSON-patch scoping.
fn schema_config_name(schema: &Schema) -> &'static str {
	match schema {
		Schema::OpenAI { .. } => "OpenAI",
		Schema::AzureOpenAI { .. } => "AzureOpenAI",
		Schema::Anthropic { .. } => "Anthropic",
		Schema::GCPVertexAI { .. } => "GCPVertexAI",
		Schema::GCPAnthropic { .. } => "GCPAnthropic",
		Schema::Cohere {} => "Cohere",
	}
}

fn apply_header_rule(
	host: &mut dyn HostFilter,
	rule: &crate::mutation::HeaderMutationRule,
	original: &HeaderSnapshot,
) {
	if rule.remove {
		host.remove_request_header(&rule.name);
		return;
	}
	if rule.restore_original {
		match original.get(&rule.name.to_ascii_lowercase()) {
			Some(v) => host.set_request_header(&rule.name, v),
			None => host.remove_request_header(&rule.name),
		}
		return;
	}
	if let Some(v) = &rule.value {
		host.set_request_header(&rule.name, v);
	}
}

fn apply_request_update(host: &mut dyn HostFilter, update: &HeaderUpdate) {
	match &update.value {
		Some(v) => host.set_request_header(&update.name, v),
		None => host.remove_request_header(&update.name),
	}
}

pub(super) fn apply_response_updates(host: &mut dyn HostFilter, updates: &[HeaderUpdate]) {
	for update in updates {
		match &update.value {
			Some(v) => host.set_response_header(&update.name, v),
			None => host.remove_response_header(&update.name),
		}
	}
}
