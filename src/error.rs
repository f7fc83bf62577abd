use thiserror::Error;
use wasm_bindgen::JsValue;

/// Why a connections request produced no graph.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("browser window is not available")]
	NoWindow,

	#[error("request failed: {0}")]
	Network(String),

	#[error("server responded with HTTP {0}")]
	Status(u16),

	#[error("invalid connections payload: {0}")]
	Decode(#[from] serde_json::Error),

	#[error("server could not load connections: {0}")]
	Server(String),
}

impl From<JsValue> for FetchError {
	fn from(value: JsValue) -> Self {
		Self::Network(value.as_string().unwrap_or_else(|| format!("{value:?}")))
	}
}
