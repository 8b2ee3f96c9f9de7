use serde::Serialize;
use serde::de::DeserializeOwned;

/// Convert between two serde representations of the same JSON document.
///
/// Used to bridge the loose wire structs (which preserve unknown fields) and
/// the typed views the conversion code works with.
pub fn convert<S: Serialize, T: DeserializeOwned>(s: &S) -> Result<T, serde_json::Error> {
	serde_json::from_value(serde_json::to_value(s)?)
}

/// Like [`convert`], but starting from raw bytes.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
	serde_json::from_slice(bytes)
}
