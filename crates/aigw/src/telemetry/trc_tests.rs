use super::*;

#[test]
fn traceparent_round_trip() {
	let tp = TraceParent::new_sampled();
	let formatted = format!("{tp:?}");
	assert_eq!(formatted.len(), 55);
	let parsed = TraceParent::try_from(formatted.as_str()).unwrap();
	assert_eq!(parsed, tp);
	assert!(parsed.is_sampled());
}

#[test]
fn traceparent_rejects_malformed() {
	assert!(TraceParent::try_from("not a traceparent").is_err());
	assert!(TraceParent::try_from("").is_err());
	// Right length, wrong segmentation.
	assert!(
		TraceParent::try_from("0000000000000000000000000000000000000000000000000000000").is_err()
	);
}

#[test]
fn child_span_keeps_trace_id() {
	let parent =
		TraceParent::try_from("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").unwrap();
	let child = parent.new_span();
	assert_eq!(child.trace_id, parent.trace_id);
	assert_ne!(child.span_id, parent.span_id);
	assert_eq!(child.trace_id(), "0af7651916cd43dd8448eb211c80319c");
}

#[test]
fn disabled_without_endpoint() {
	let tracer = Tracer::new(&Config::default()).unwrap();
	assert!(tracer.is_none());
}
