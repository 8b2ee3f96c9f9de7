use super::*;
use crate::llm::TokenUsage;

fn usage(input: u64, output: u64) -> TokenUsage {
	TokenUsage {
		input: Some(input),
		output: Some(output),
		..Default::default()
	}
}

#[test]
fn arithmetic_over_tokens() {
	let e = Expression::new("input * 2 + output").unwrap();
	assert_eq!(e.eval_cost("gpt-4o", "openai", &usage(10, 5)).unwrap(), 25);
}

#[test]
fn model_conditionals() {
	let e = Expression::new("model == 'gpt-4o' ? total : 0").unwrap();
	assert_eq!(e.eval_cost("gpt-4o", "openai", &usage(7, 3)).unwrap(), 10);
	assert_eq!(e.eval_cost("other", "openai", &usage(7, 3)).unwrap(), 0);
}

#[test]
fn backend_binding() {
	let e = Expression::new("backend == 'primary' ? input : output").unwrap();
	assert_eq!(e.eval_cost("m", "primary", &usage(4, 9)).unwrap(), 4);
	assert_eq!(e.eval_cost("m", "secondary", &usage(4, 9)).unwrap(), 9);
}

#[test]
fn parse_error() {
	assert!(Expression::new("input +").is_err());
}

#[test]
fn eval_error_on_unknown_variable() {
	let e = Expression::new("nonexistent + input").unwrap();
	assert!(e.eval_cost("m", "b", &usage(1, 1)).is_err());
}

#[test]
fn rejects_out_of_range() {
	let e = Expression::new("input * input").unwrap();
	let big = usage(1 << 20, 0);
	assert!(matches!(
		e.eval_cost("m", "b", &big),
		Err(Error::OutOfRange(_))
	));
}

#[test]
fn deserialize_compiles() {
	let e: Expression = serde_json::from_str("\"input + output\"").unwrap();
	assert_eq!(e.source(), "input + output");
	assert!(serde_json::from_str::<Expression>("\"input +\"").is_err());
}
