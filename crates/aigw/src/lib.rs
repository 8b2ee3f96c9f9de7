//! Request-path data plane for an AI gateway.
//!
//! The crate implements the per-request HTTP filter chain that sits inside a
//! reverse proxy: it accepts LLM API requests in one vendor's wire format,
//! rewrites them for a backend that may speak a different format, injects
//! backend credentials, converts streaming responses event-by-event, and
//! exports OpenTelemetry GenAI metrics and spans.
//!
//! The host proxy is abstracted behind the narrow [`host::HostFilter`]
//! capability; everything else (translation, token accounting, cost
//! metadata) lives here.

pub mod auth;
pub mod cel;
pub mod compression;
pub mod config;
pub mod dispatch;
pub mod filters;
pub mod host;
pub mod json;
pub mod llm;
pub mod mutation;
pub mod registry;
pub mod sse;
pub mod telemetry;

/// Namespace under which all per-request dynamic metadata is written.
pub const METADATA_NAMESPACE: &str = "aigateway.envoy.io";

/// Dynamic metadata key carrying the internal request ID, written on request
/// headers and read back by the upstream filter to re-associate with the
/// owning router filter.
pub const INTERNAL_REQUEST_ID_KEY: &str = "internal_request_id";

/// Request header carrying the (pre-override) model name so the proxy's
/// routing layer can match on it.
pub const MODEL_NAME_HEADER: &str = "x-ai-eg-model";

pub use config::{Env, RuntimeConfig};
pub use filters::RouterFilter;
pub use host::{FilterStatus, HostFilter};
