//! Span lifecycle for the request path.
//!
//! Spans are accumulated in-process and emitted at the terminal callback
//! with recorded start/end timestamps, so no span outlives its request.
//! Propagation uses the W3C `traceparent` header; the carrier surfaces the
//! trace id to the downstream client via response headers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use opentelemetry::trace::{SpanKind, Status, Tracer as _, TracerProvider};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
pub use traceparent::TraceParent;

use crate::llm::Operation;
use crate::llm::types::RequestEntity;

#[derive(Debug, Clone, Default)]
pub struct Config {
	/// OTLP/HTTP endpoint; tracing is disabled when unset.
	pub endpoint: Option<String>,
	pub headers: HashMap<String, String>,
	pub service_name: Option<String>,
}

/// Write-only header carrier; in this core it writes response headers so
/// the client can observe the trace id.
pub trait SpanCarrier {
	fn set(&mut self, key: &str, value: &str);
}

#[derive(Clone, Debug)]
pub struct Tracer {
	tracer: Arc<opentelemetry_sdk::trace::SdkTracer>,
	provider: SdkTracerProvider,
}

impl Tracer {
	pub fn new(cfg: &Config) -> anyhow::Result<Option<Tracer>> {
		let Some(ep) = &cfg.endpoint else {
			return Ok(None);
		};
		let exporter = opentelemetry_otlp::SpanExporter::builder()
			.with_http()
			.with_endpoint(format!("{}/v1/traces", ep.strip_suffix('/').unwrap_or(ep)))
			.with_headers(cfg.headers.clone())
			.build()?;
		let provider = SdkTracerProvider::builder()
			.with_resource(
				Resource::builder()
					.with_service_name(
						cfg
							.service_name
							.clone()
							.unwrap_or_else(|| "aigw".to_string()),
					)
					.build(),
			)
			.with_simple_exporter(exporter)
			.build();
		let tracer = provider.tracer("aigw");
		Ok(Some(Tracer {
			tracer: Arc::new(tracer),
			provider,
		}))
	}

	pub fn shutdown(&self) {
		let _ = self.provider.shutdown();
	}

	/// Open the request span, derive/continue the trace from the incoming
	/// `traceparent`, and surface the new traceparent through the carrier.
	pub fn start_span_and_inject_headers(
		&self,
		operation: Operation,
		request_headers: &crate::host::HeaderSnapshot,
		carrier: &mut dyn SpanCarrier,
		entity: &dyn RequestEntity,
		header_attributes: &[(String, String)],
	) -> Span {
		let parent = request_headers
			.get(traceparent::TRACEPARENT_HEADER)
			.and_then(|v| TraceParent::try_from(v.as_str()).ok());
		let span_parent = match &parent {
			Some(p) => p.new_span(),
			None => TraceParent::new_sampled(),
		};
		carrier.set(traceparent::TRACEPARENT_HEADER, &format!("{span_parent:?}"));

		let mut attributes = vec![
			KeyValue::new("gen_ai.operation.name", operation.name()),
			KeyValue::new(
				"gen_ai.request.model",
				entity.model().unwrap_or_default().to_string(),
			),
			KeyValue::new("gen_ai.request.is_stream", entity.stream()),
			KeyValue::new("gen_ai.request.message_count", entity.message_count() as i64),
			KeyValue::new("gen_ai.request.tool_count", entity.tool_count() as i64),
		];
		for (header, label) in header_attributes {
			if let Some(v) = request_headers.get(header) {
				attributes.push(KeyValue::new(label.clone(), v.clone()));
			}
		}

		Span {
			tracer: self.tracer.clone(),
			context: span_parent,
			name: format!("{} {}", operation.name(), entity.model().unwrap_or_default()),
			start: SystemTime::now(),
			attributes,
		}
	}
}

/// An open request span. Exactly one of the terminal methods must be called;
/// each consumes the span.
pub struct Span {
	tracer: Arc<opentelemetry_sdk::trace::SdkTracer>,
	context: TraceParent,
	name: String,
	start: SystemTime,
	attributes: Vec<KeyValue>,
}

impl Span {
	/// Non-streaming success terminal.
	pub fn record_response(mut self, body: &[u8]) {
		self
			.attributes
			.push(KeyValue::new("http.response.body.size", body.len() as i64));
		self.finish(Status::Ok);
	}

	/// Streaming success terminal.
	pub fn end_span(self) {
		self.finish(Status::Ok);
	}

	/// Error terminal; the body is the (translated) error payload.
	pub fn end_span_on_error(mut self, status_code: u16, body: &[u8]) {
		self.attributes.push(KeyValue::new(
			"http.response.status_code",
			status_code as i64,
		));
		let message = String::from_utf8_lossy(&body[..body.len().min(256)]).into_owned();
		self.finish(Status::error(message));
	}

	fn finish(self, status: Status) {
		use opentelemetry::trace::Span as _;
		self
			.tracer
			.span_builder(self.name)
			.with_kind(SpanKind::Client)
			.with_trace_id(self.context.trace_id.into())
			.with_span_id(self.context.span_id.into())
			.with_start_time(self.start)
			.with_end_time(SystemTime::now())
			.with_attributes(self.attributes)
			.with_status(status)
			.start(self.tracer.as_ref())
			.end()
	}
}

mod traceparent {
	use std::fmt;

	use rand::Rng;

	/// A traceparent, as defined by https://www.w3.org/TR/trace-context/
	#[derive(Clone, Eq, PartialEq)]
	pub struct TraceParent {
		pub version: u8,
		pub trace_id: u128,
		pub span_id: u64,
		pub flags: u8,
	}

	pub const TRACEPARENT_HEADER: &str = "traceparent";

	impl TraceParent {
		pub fn new_sampled() -> Self {
			let mut rng = rand::rng();
			Self {
				version: 0,
				trace_id: rng.random(),
				span_id: rng.random(),
				flags: 1,
			}
		}

		/// Same trace, fresh span id.
		pub fn new_span(&self) -> Self {
			let mut cpy = self.clone();
			cpy.span_id = rand::rng().random();
			cpy
		}

		pub fn trace_id(&self) -> String {
			format!("{:032x}", self.trace_id)
		}

		pub fn is_sampled(&self) -> bool {
			(self.flags & 0x01) == 0x01
		}
	}

	impl fmt::Debug for TraceParent {
		fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
			write!(
				f,
				"{:02x}-{:032x}-{:016x}-{:02x}",
				self.version, self.trace_id, self.span_id, self.flags
			)
		}
	}

	impl TryFrom<&str> for TraceParent {
		type Error = anyhow::Error;

		fn try_from(value: &str) -> Result<Self, Self::Error> {
			if value.len() != 55 {
				anyhow::bail!("traceparent malformed length was {}", value.len())
			}
			let segs: Vec<&str> = value.split('-').collect();
			if segs.len() != 4 {
				anyhow::bail!("traceparent must have 4 segments")
			}
			Ok(Self {
				version: u8::from_str_radix(segs[0], 16)?,
				trace_id: u128::from_str_radix(segs[1], 16)?,
				span_id: u64::from_str_radix(segs[2], 16)?,
				flags: u8::from_str_radix(segs[3], 16)?,
			})
		}
	}
}

#[cfg(test)]
#[path = "trc_tests.rs"]
mod tests;
