//! The narrow capability interface the host proxy provides per request.
//!
//! The core never touches proxy internals directly; every header, body and
//! metadata operation goes through [`HostFilter`]. The host guarantees that
//! all callbacks for one request run sequentially on a single worker thread.

use bytes::Bytes;
use http::StatusCode;

/// Status returned from each filter callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
	/// Let the request proceed to the next filter.
	Continue,
	/// Pause filter iteration; the host resumes this filter later.
	StopIteration,
	/// Pause iteration and buffer the data seen so far.
	StopIterationAndBuffer,
}

/// Which of the host's two per-direction body buffers to address.
///
/// The proxy keeps a "buffered" body (accumulated across `StopIteration`
/// callbacks) and a "received" body (only the data delivered to the current
/// callback). Depending on phase and retry state a body may live in either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
	Buffered,
	Received,
}

/// Per-request host capability.
///
/// Headers are addressed by lowercase name. Single-valued accessors return
/// the first value when the header is multi-valued.
pub trait HostFilter {
	fn get_request_header(&self, name: &str) -> Option<String>;
	fn set_request_header(&mut self, name: &str, value: &str);
	fn remove_request_header(&mut self, name: &str);
	fn request_headers(&self) -> Vec<(String, String)>;

	fn get_response_header(&self, name: &str) -> Option<String>;
	fn set_response_header(&mut self, name: &str, value: &str);
	fn remove_response_header(&mut self, name: &str);
	fn response_headers(&self) -> Vec<(String, String)>;

	/// Total length of the addressed body. Body accessors address the body
	/// of the direction currently being processed: the request body during
	/// request callbacks, the response body during response callbacks.
	fn body_len(&self, kind: BodyKind) -> usize;
	/// The addressed body as a lazy finite sequence of byte chunks.
	fn body_chunks(&self, kind: BodyKind) -> Vec<Bytes>;
	/// Drain `n` bytes from the front of the addressed body.
	fn drain_body(&mut self, kind: BodyKind, n: usize);
	/// Append bytes to the addressed body.
	fn append_body(&mut self, kind: BodyKind, data: &[u8]);

	/// Short-circuit the request with a locally generated response.
	fn send_local_reply(&mut self, status: StatusCode, headers: &[(&str, &str)], body: &[u8]);

	fn set_metadata_string(&mut self, namespace: &str, key: &str, value: &str);
	fn set_metadata_number(&mut self, namespace: &str, key: &str, value: f64);
	fn get_metadata_string(&self, namespace: &str, key: &str) -> Option<String>;
	/// Metadata attached to the selected upstream host by the proxy's
	/// endpoint picker (notably the backend name).
	fn get_upstream_host_metadata(&self, key: &str) -> Option<String>;

	/// Invalidate the cached route so header mutations can re-route.
	fn clear_route_cache(&mut self);
}

/// Single-valued copy of a header map, first value wins for multi-valued
/// headers.
pub type HeaderSnapshot = std::collections::HashMap<String, String>;

/// Collapse an enumerated header list into a single-valued snapshot.
pub fn snapshot_headers(headers: Vec<(String, String)>) -> HeaderSnapshot {
	let mut out = HeaderSnapshot::with_capacity(headers.len());
	for (name, value) in headers {
		out.entry(name.to_ascii_lowercase()).or_insert(value);
	}
	out
}

/// Read the addressed body as one contiguous buffer.
pub fn read_body(host: &dyn HostFilter, kind: BodyKind) -> Vec<u8> {
	let chunks = host.body_chunks(kind);
	match chunks.len() {
		0 => Vec::new(),
		1 => chunks[0].to_vec(),
		_ => {
			let mut out = Vec::with_capacity(host.body_len(kind));
			for c in &chunks {
				out.extend_from_slice(c);
			}
			out
		},
	}
}

/// Replace the addressed body wholesale.
pub fn replace_body(host: &mut dyn HostFilter, kind: BodyKind, data: &[u8]) {
	let len = host.body_len(kind);
	host.drain_body(kind, len);
	host.append_body(kind, data);
}
