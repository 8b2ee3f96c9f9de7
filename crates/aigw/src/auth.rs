//! Backend authentication handlers.
//!
//! The contract is narrow: given the upstream-bound request headers and the
//! post-translation body, a handler returns the additional headers to apply.
//! The body matters because some schemes (AWS SigV4) sign its hash, so the
//! handler MUST run after the translator and any body mutation.
//!
//! Handlers are synchronous by design: the host invokes filter callbacks on
//! a pinned worker thread and offers no resumption point for an async
//! signer. Client-disconnect cancellation is therefore not propagated to a
//! handler in flight (known gap).

use std::sync::Arc;
use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use serde::{Deserialize, Serialize};

use crate::host::HeaderSnapshot;

pub trait BackendAuth: Send + Sync {
	/// Headers to add to the upstream request.
	fn inject(
		&self,
		headers: &HeaderSnapshot,
		body: &[u8],
	) -> anyhow::Result<Vec<(String, String)>>;
}

/// Backend auth configuration, one variant per scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthConfig {
	/// A literal header, `x-api-key` unless overridden (Anthropic-style).
	ApiKey {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		header: Option<String>,
		key: String,
	},
	/// `Authorization: Bearer <token>` (OpenAI, GCP access tokens).
	Bearer { token: String },
	/// Azure OpenAI's `api-key` header.
	AzureApiKey { key: String },
	/// AWS SigV4 request signing with static credentials.
	#[serde(rename_all = "camelCase")]
	Aws {
		access_key_id: String,
		secret_access_key: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		session_token: Option<String>,
		region: String,
		#[serde(default = "default_aws_service")]
		service: String,
	},
}

fn default_aws_service() -> String {
	"bedrock".to_string()
}

/// Build the handler for a configuration.
pub fn build(cfg: &AuthConfig) -> Arc<dyn BackendAuth> {
	match cfg {
		AuthConfig::ApiKey { header, key } => Arc::new(ApiKeyAuth {
			header: header.clone().unwrap_or_else(|| "x-api-key".to_string()),
			key: key.clone(),
		}),
		AuthConfig::Bearer { token } => Arc::new(BearerAuth {
			token: token.clone(),
		}),
		AuthConfig::AzureApiKey { key } => Arc::new(ApiKeyAuth {
			header: "api-key".to_string(),
			key: key.clone(),
		}),
		AuthConfig::Aws {
			access_key_id,
			secret_access_key,
			session_token,
			region,
			service,
		} => Arc::new(AwsSigV4Auth {
			credentials: Credentials::new(
				access_key_id.clone(),
				secret_access_key.clone(),
				session_token.clone(),
				None,
				"runtime-config",
			),
			region: region.clone(),
			service: service.clone(),
		}),
	}
}

struct ApiKeyAuth {
	header: String,
	key: String,
}

impl BackendAuth for ApiKeyAuth {
	fn inject(&self, _: &HeaderSnapshot, _: &[u8]) -> anyhow::Result<Vec<(String, String)>> {
		Ok(vec![(self.header.clone(), self.key.clone())])
	}
}

struct BearerAuth {
	token: String,
}

impl BackendAuth for BearerAuth {
	fn inject(&self, _: &HeaderSnapshot, _: &[u8]) -> anyhow::Result<Vec<(String, String)>> {
		Ok(vec![(
			"authorization".to_string(),
			format!("Bearer {}", self.token),
		)])
	}
}

struct AwsSigV4Auth {
	credentials: Credentials,
	region: String,
	service: String,
}

impl BackendAuth for AwsSigV4Auth {
	fn inject(
		&self,
		headers: &HeaderSnapshot,
		body: &[u8],
	) -> anyhow::Result<Vec<(String, String)>> {
		let method = headers
			.get(":method")
			.map(String::as_str)
			.unwrap_or("POST")
			.to_string();
		let path = headers.get(":path").map(String::as_str).unwrap_or("/");
		let host = headers
			.get(":authority")
			.or_else(|| headers.get("host"))
			.map(String::as_str)
			.unwrap_or_default();
		let uri = format!("https://{host}{path}");

		let mut signable_headers: Vec<(&str, &str)> = vec![("host", host)];
		if let Some(ct) = headers.get("content-type") {
			signable_headers.push(("content-type", ct));
		}

		let identity = self.credentials.clone().into();
		let params = v4::SigningParams::builder()
			.identity(&identity)
			.region(&self.region)
			.name(&self.service)
			.time(SystemTime::now())
			.settings(SigningSettings::default())
			.build()?;
		let signable = SignableRequest::new(
			method.as_str(),
			uri.as_str(),
			signable_headers.iter().copied(),
			SignableBody::Bytes(body),
		)?;
		let (instructions, _signature) = sign(signable, &params.into())?.into_parts();

		// Apply onto a scratch request and collect what the signer added.
		let mut builder = http::Request::builder().method(method.as_str()).uri(&uri);
		for (name, value) in &signable_headers {
			builder = builder.header(*name, *value);
		}
		let mut scratch = builder.body(())?;
		instructions.apply_to_request_http1x(&mut scratch);

		let mut out = Vec::new();
		for (name, value) in scratch.headers() {
			if signable_headers
				.iter()
				.any(|(n, _)| name.as_str().eq_ignore_ascii_case(n))
			{
				continue;
			}
			out.push((
				name.as_str().to_string(),
				value.to_str().unwrap_or_default().to_string(),
			));
		}
		Ok(out)
	}
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
