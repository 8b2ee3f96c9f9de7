use bytes::BytesMut;

use super::*;

#[test]
fn event_split_across_chunks() {
	let mut r = EventReader::new();
	r.push(b"data: {\"a\"");
	assert!(r.next_event().is_none());
	r.push(b":1}\n\ndata: {\"b\":2}\n\ndata: par");
	let e1 = r.next_event().unwrap();
	assert_eq!(e1.data, "{\"a\":1}");
	assert_eq!(e1.name, None);
	let e2 = r.next_event().unwrap();
	assert_eq!(e2.data, "{\"b\":2}");
	assert!(r.next_event().is_none());
	// The partial tail stays buffered.
	r.push(b"tial\n\n");
	assert_eq!(r.next_event().unwrap().data, "partial");
	assert!(r.is_empty());
}

#[test]
fn named_events() {
	let mut r = EventReader::new();
	r.push(b"event: message_start\ndata: {\"type\":\"message_start\"}\n\n");
	let e = r.next_event().unwrap();
	assert_eq!(e.name.as_deref(), Some("message_start"));
	assert_eq!(e.data, "{\"type\":\"message_start\"}");
}

#[test]
fn crlf_separators() {
	let mut r = EventReader::new();
	r.push(b"data: one\r\n\r\ndata: two\n\n");
	assert_eq!(r.next_event().unwrap().data, "one");
	assert_eq!(r.next_event().unwrap().data, "two");
}

#[test]
fn multiline_data_joined() {
	let mut r = EventReader::new();
	r.push(b"data: line1\ndata: line2\n\n");
	assert_eq!(r.next_event().unwrap().data, "line1\nline2");
}

#[test]
fn done_sentinel() {
	let mut r = EventReader::new();
	r.push(b"data: [DONE]\n\n");
	assert!(r.next_event().unwrap().is_done());
}

#[test]
fn comment_frames_skipped() {
	let mut r = EventReader::new();
	r.push(b": keepalive\n\ndata: x\n\n");
	assert_eq!(r.next_event().unwrap().data, "x");
}

#[test]
fn remainder_without_terminator() {
	let mut r = EventReader::new();
	r.push(b"data: tail");
	assert!(r.next_event().is_none());
	let e = r.take_remainder().unwrap();
	assert_eq!(e.data, "tail");
	assert!(r.is_empty());
}

#[test]
fn remainder_garbage_is_none() {
	let mut r = EventReader::new();
	r.push(b"half a li");
	assert!(r.take_remainder().is_none());
}

#[test]
fn frame_writers() {
	let mut out = BytesMut::new();
	write_data_frame(&mut out, b"{}");
	write_done_frame(&mut out);
	assert_eq!(&out[..], b"data: {}\n\ndata: [DONE]\n\n");

	let mut out = BytesMut::new();
	write_named_frame(&mut out, "message_stop", b"{\"type\":\"message_stop\"}");
	assert_eq!(
		&out[..],
		b"event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n" as &[u8]
	);
}
