use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::*;

fn gzip(data: &[u8]) -> Vec<u8> {
	let mut enc = GzEncoder::new(Vec::new(), Compression::default());
	enc.write_all(data).unwrap();
	enc.finish().unwrap()
}

#[test]
fn identity_passthrough() {
	let (out, decoded) = decode_full(None, b"hello").unwrap();
	assert_eq!(out, b"hello");
	assert!(!decoded);

	// Unknown encodings pass through untouched.
	let (out, decoded) = decode_full(Some("zstd"), b"hello").unwrap();
	assert_eq!(out, b"hello");
	assert!(!decoded);
}

#[test]
fn gzip_round_trip() {
	let compressed = gzip(b"gzip body payload");
	let (out, decoded) = decode_full(Some("gzip"), &compressed).unwrap();
	assert_eq!(out, b"gzip body payload");
	assert!(decoded);
}

#[test]
fn gzip_case_insensitive() {
	let compressed = gzip(b"x");
	let (out, _) = decode_full(Some("GZIP"), &compressed).unwrap();
	assert_eq!(out, b"x");
}

#[test]
fn gzip_chunked() {
	let compressed = gzip(b"a body split across several callback chunks");
	let mut d = StreamDecoder::new(Some("gzip"));
	let mut out = Vec::new();
	for chunk in compressed.chunks(7) {
		out.extend(d.push(chunk).unwrap());
	}
	out.extend(d.finish().unwrap());
	assert_eq!(out, b"a body split across several callback chunks");
}

#[test]
fn gzip_truncated_fails() {
	let compressed = gzip(b"some payload that will be cut short");
	let truncated = &compressed[..compressed.len() / 2];
	let mut d = StreamDecoder::new(Some("gzip"));
	let first = d.push(truncated);
	let fin = first.and_then(|_| d.finish());
	assert!(fin.is_err());
}

#[test]
fn brotli_round_trip() {
	let mut compressed = Vec::new();
	brotli::BrotliCompress(
		&mut &b"brotli body payload"[..],
		&mut compressed,
		&Default::default(),
	)
	.unwrap();

	let (out, decoded) = decode_full(Some("br"), &compressed).unwrap();
	assert_eq!(out, b"brotli body payload");
	assert!(decoded);
}
