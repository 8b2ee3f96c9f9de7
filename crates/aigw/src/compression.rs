//! Response content decoding.
//!
//! Upstreams may compress bodies; translators always operate on plaintext.
//! When a decode happens and the body is rewritten, the caller strips the
//! `content-encoding` response header since the rewritten body goes out
//! uncompressed. Unknown or absent encodings pass through untouched.

use std::io::Write;

use flate2::write::GzDecoder;

const GZIP: &str = "gzip";
const BR: &str = "br";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("decompression failed: {0}")]
	Io(#[from] std::io::Error),
	#[error("compressed body was truncated")]
	Truncated,
}

enum Inner {
	Identity,
	Gzip(Option<GzDecoder<Vec<u8>>>),
	Brotli(Option<Box<brotli::DecompressorWriter<Vec<u8>>>>),
}

/// Incremental body decoder, fed one chunk per filter callback.
pub struct StreamDecoder {
	inner: Inner,
}

impl StreamDecoder {
	/// Build a decoder for the given `content-encoding` value.
	pub fn new(encoding: Option<&str>) -> Self {
		let inner = match encoding.map(str::trim) {
			Some(e) if e.eq_ignore_ascii_case(GZIP) => Inner::Gzip(Some(GzDecoder::new(Vec::new()))),
			Some(e) if e.eq_ignore_ascii_case(BR) => {
				Inner::Brotli(Some(Box::new(brotli::DecompressorWriter::new(
					Vec::new(),
					4096,
				))))
			},
			_ => Inner::Identity,
		};
		Self { inner }
	}

	/// Whether this decoder actually transforms bytes.
	pub fn is_identity(&self) -> bool {
		matches!(self.inner, Inner::Identity)
	}

	/// Feed one chunk, returning the plaintext that became available.
	pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<u8>, Error> {
		match &mut self.inner {
			Inner::Identity => Ok(chunk.to_vec()),
			Inner::Gzip(d) => {
				let Some(d) = d.as_mut() else {
					return Ok(Vec::new());
				};
				d.write_all(chunk)?;
				d.flush()?;
				Ok(std::mem::take(d.get_mut()))
			},
			Inner::Brotli(d) => {
				let Some(d) = d.as_mut() else {
					return Ok(Vec::new());
				};
				d.write_all(chunk)?;
				d.flush()?;
				Ok(std::mem::take(d.get_mut()))
			},
		}
	}

	/// Finish the stream, returning any final plaintext.
	///
	/// A gzip or brotli body cut off mid-stream surfaces here as an error.
	pub fn finish(&mut self) -> Result<Vec<u8>, Error> {
		match &mut self.inner {
			Inner::Identity => Ok(Vec::new()),
			Inner::Gzip(d) => match d.take() {
				Some(d) => Ok(d.finish()?),
				None => Ok(Vec::new()),
			},
			Inner::Brotli(d) => match d.take() {
				Some(d) => d.into_inner().map_err(|_| Error::Truncated),
				None => Ok(Vec::new()),
			},
		}
	}
}

/// Decode a fully buffered body in one shot. Returns the plaintext and
/// whether any decoding happened.
pub fn decode_full(encoding: Option<&str>, data: &[u8]) -> Result<(Vec<u8>, bool), Error> {
	let mut d = StreamDecoder::new(encoding);
	if d.is_identity() {
		return Ok((data.to_vec(), false));
	}
	let mut out = d.push(data)?;
	out.extend(d.finish()?);
	Ok((out, true))
}

#[cfg(test)]
#[path = "compression_tests.rs"]
mod tests;
