//! Client for the connections endpoint.

use log::debug;
use url::form_urlencoded;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::components::force_graph::ConnectionsPayload;
use crate::error::FetchError;

pub const DEFAULT_ENDPOINT: &str = "/api/connections";

/// Selection sent to the server to get an expanded or contracted subgraph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionsQuery {
	/// Hash of the root group the graph is scoped to.
	pub hash: Option<String>,
	pub group_ids: Vec<String>,
	pub profile_ids: Vec<String>,
}

impl ConnectionsQuery {
	pub fn url(&self, endpoint: &str) -> String {
		let mut query = form_urlencoded::Serializer::new(String::new());
		if let Some(hash) = &self.hash {
			query.append_pair("hash", hash);
		}
		for id in &self.profile_ids {
			query.append_pair("profileIds[]", id);
		}
		for id in &self.group_ids {
			query.append_pair("groupIds[]", id);
		}
		let query = query.finish();

		if query.is_empty() {
			endpoint.to_string()
		} else {
			let sep = if endpoint.contains('?') { '&' } else { '?' };
			format!("{endpoint}{sep}{query}")
		}
	}
}

/// Decodes a response body. A payload that carries an `error` field counts as
/// a failure even though it arrived with a success status.
pub fn parse_payload(body: &str) -> Result<ConnectionsPayload, FetchError> {
	let payload: ConnectionsPayload = serde_json::from_str(body)?;
	match payload.error {
		Some(message) => Err(FetchError::Server(message)),
		None => Ok(payload),
	}
}

pub async fn fetch_connections(
	endpoint: &str,
	query: &ConnectionsQuery,
) -> Result<ConnectionsPayload, FetchError> {
	let window = web_sys::window().ok_or(FetchError::NoWindow)?;
	let url = query.url(endpoint);
	debug!("GET {url}");

	let init = RequestInit::new();
	init.set_method("GET");
	init.set_mode(RequestMode::SameOrigin);
	let request = Request::new_with_str_and_init(&url, &init)?;
	request.headers().set("Accept", "application/json")?;
	request.headers().set("X-Requested-With", "XMLHttpRequest")?;

	let response: Response = JsFuture::from(window.fetch_with_request(&request))
		.await?
		.dyn_into()?;
	if !response.ok() {
		return Err(FetchError::Status(response.status()));
	}

	let body = JsFuture::from(response.text()?).await?;
	let body = body
		.as_string()
		.ok_or_else(|| FetchError::Network("response body is not text".into()))?;
	parse_payload(&body)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_url_carries_hash_and_array_params() {
		let query = ConnectionsQuery {
			hash: Some("gh1".into()),
			group_ids: vec!["g2".into()],
			profile_ids: vec!["p1".into(), "p 2".into()],
		};
		assert_eq!(
			query.url(DEFAULT_ENDPOINT),
			"/api/connections?hash=gh1&profileIds%5B%5D=p1&profileIds%5B%5D=p+2&groupIds%5B%5D=g2"
		);
	}

	#[test]
	fn test_url_without_params_is_bare_endpoint() {
		assert_eq!(ConnectionsQuery::default().url("/x"), "/x");
		let query = ConnectionsQuery {
			hash: Some("h".into()),
			..Default::default()
		};
		assert_eq!(query.url("/x?lang=en"), "/x?lang=en&hash=h");
	}

	#[test]
	fn test_parse_payload_surfaces_server_error() {
		let err = parse_payload(r#"{"nodes":[],"links":[],"error":"Failed to load connections"}"#)
			.unwrap_err();
		assert!(matches!(err, FetchError::Server(ref m) if m == "Failed to load connections"));

		assert!(matches!(parse_payload("not json"), Err(FetchError::Decode(_))));

		let payload = parse_payload(r#"{"nodes":[{"id":"g1","type":"group","name":"G"}],"links":[]}"#)
			.unwrap();
		assert_eq!(payload.nodes.len(), 1);
	}
}
