//! CEL cost expressions.
//!
//! A request-cost rule may derive its metadata value from a CEL program
//! evaluated against the request's token usage, e.g.
//! `input * 2 + output`. Programs are compiled once at config load.

use cel_interpreter::{Context, Program, Value};
use serde::{Deserialize, Serialize, Serializer};

use crate::llm::TokenUsage;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("parse: {0}")]
	Parse(String),
	#[error("execution: {0}")]
	Eval(String),
	#[error("expression produced {0}, expected a non-negative number within uint32 range")]
	OutOfRange(String),
}

pub struct Expression {
	program: Program,
	source: String,
}

impl Expression {
	pub fn new(source: &str) -> Result<Self, Error> {
		let program = Program::compile(source).map_err(|e| Error::Parse(e.to_string()))?;
		Ok(Self {
			program,
			source: source.to_string(),
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Evaluate with the per-request cost bindings, yielding a uint32-range
	/// number.
	pub fn eval_cost(
		&self,
		model: &str,
		backend: &str,
		usage: &TokenUsage,
	) -> Result<u64, Error> {
		let mut ctx = Context::default();
		// Tokens are bound as ints so integer literals in user programs
		// (`input * 2`) do not hit CEL's strict uint/int arithmetic split.
		ctx.add_variable_from_value("model", model.to_string());
		ctx.add_variable_from_value("backend", backend.to_string());
		ctx.add_variable_from_value("input", usage.input.unwrap_or(0) as i64);
		ctx.add_variable_from_value("cached_input", usage.cached_input.unwrap_or(0) as i64);
		ctx.add_variable_from_value(
			"cache_creation_input",
			usage.cache_creation_input.unwrap_or(0) as i64,
		);
		ctx.add_variable_from_value("output", usage.output.unwrap_or(0) as i64);
		ctx.add_variable_from_value("total", usage.total_tokens() as i64);

		let value = self
			.program
			.execute(&ctx)
			.map_err(|e| Error::Eval(e.to_string()))?;
		let n = match value {
			Value::UInt(u) => u,
			Value::Int(i) if i >= 0 => i as u64,
			Value::Float(f) if f >= 0.0 && f.fract() == 0.0 => f as u64,
			other => return Err(Error::OutOfRange(format!("{other:?}"))),
		};
		if n > u32::MAX as u64 {
			return Err(Error::OutOfRange(n.to_string()));
		}
		Ok(n)
	}
}

impl std::fmt::Debug for Expression {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Expression")
			.field("expression", &self.source)
			.finish()
	}
}

impl Serialize for Expression {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.source)
	}
}

impl<'de> Deserialize<'de> for Expression {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let e = String::deserialize(deserializer)?;
		// Config-supplied expressions parse strictly at load time.
		Expression::new(&e).map_err(|e| serde::de::Error::custom(e.to_string()))
	}
}

#[cfg(test)]
#[path = "cel_tests.rs"]
mod tests;
