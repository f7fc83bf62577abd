use leptos::callback::Callback;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_meta::Title;
use log::{info, warn};
use serde::Deserialize;
use url::form_urlencoded;

use crate::api::{ConnectionsQuery, fetch_connections};
use crate::components::force_graph::{
	ConnectionsGraph, ConnectionsPayload, GraphConfig, GraphNode, GraphRoot,
};

/// Element the server renders the page props into.
const APP_ELEMENT_ID: &str = "app";

/// Props the server embeds for a connections page.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsPageProps {
	#[serde(default)]
	pub connections: Option<ConnectionsPayload>,
	#[serde(default, deserialize_with = "crate::components::force_graph::de_opt_id")]
	pub root_group_id: Option<String>,
	#[serde(default, deserialize_with = "crate::components::force_graph::de_opt_id")]
	pub root_profile_id: Option<String>,
	#[serde(default)]
	pub root_group_hash: Option<String>,
	#[serde(default)]
	pub graph_config: GraphConfig,
}

impl ConnectionsPageProps {
	pub fn root(&self) -> GraphRoot {
		GraphRoot {
			group_id: self.root_group_id.clone(),
			profile_id: self.root_profile_id.clone(),
			group_hash: self.root_group_hash.clone(),
		}
	}
}

#[derive(Deserialize)]
struct PageObject {
	#[serde(default)]
	props: ConnectionsPageProps,
}

/// Decodes the page object JSON (`{ "component": .., "props": { .. } }`).
pub fn parse_page(json: &str) -> Result<ConnectionsPageProps, serde_json::Error> {
	serde_json::from_str::<PageObject>(json).map(|page| page.props)
}

/// Value of `hash` in a location search string such as `?hash=abc`.
pub fn query_hash(search: &str) -> Option<String> {
	form_urlencoded::parse(search.trim_start_matches('?').as_bytes())
		.find(|(key, _)| key == "hash")
		.map(|(_, value)| value.into_owned())
		.filter(|value| !value.is_empty())
}

fn read_page_props() -> ConnectionsPageProps {
	let Some(raw) = web_sys::window()
		.and_then(|w| w.document())
		.and_then(|d| d.get_element_by_id(APP_ELEMENT_ID))
		.and_then(|el| el.get_attribute("data-page"))
	else {
		return ConnectionsPageProps::default();
	};
	parse_page(&raw).unwrap_or_else(|err| {
		warn!("ignoring unreadable page props: {err}");
		ConnectionsPageProps::default()
	})
}

fn location_hash() -> Option<String> {
	let search = web_sys::window()?.location().search().ok()?;
	query_hash(&search)
}

/// Name of the node the page is centred on, for the title.
fn root_name(payload: &ConnectionsPayload, root: &GraphRoot) -> Option<String> {
	let id = payload
		.root_node_id
		.as_ref()
		.or(root.group_id.as_ref())
		.or(root.profile_id.as_ref())?;
	payload
		.nodes
		.iter()
		.find(|node| &node.id == id)
		.map(|node| node.name.clone())
}

/// Full-screen connections page. Uses the embedded graph when the server
/// provided one, otherwise fetches it for the root group hash.
#[component]
pub fn Connections() -> impl IntoView {
	let props = read_page_props();
	let root = props.root();
	let config = props.graph_config.clone();

	let payload = RwSignal::new(props.connections.clone());
	let load_error = RwSignal::new(None::<String>);
	let hovered = RwSignal::new(None::<String>);

	if payload.get_untracked().is_none() {
		let query = ConnectionsQuery {
			hash: root.group_hash.clone().or_else(location_hash),
			..ConnectionsQuery::default()
		};
		let endpoint = config.endpoint.clone();
		spawn_local(async move {
			match fetch_connections(&endpoint, &query).await {
				Ok(data) => payload.set(Some(data)),
				Err(err) => {
					warn!("initial connections load failed: {err}");
					load_error.set(Some(err.to_string()));
				}
			}
		});
	}

	let on_node_click = Callback::new(|node: GraphNode| info!("expanding around {}", node.id));
	let on_node_hover =
		Callback::new(move |node: Option<GraphNode>| hovered.set(node.map(|n| n.name)));

	let title_root = root.clone();
	let title = move || {
		payload
			.get()
			.and_then(|p| root_name(&p, &title_root))
			.map(|name| format!("{name} connections"))
			.unwrap_or_else(|| "Connections".to_string())
	};

	view! {
		<Title text=title.clone() />
		<div class="fullscreen-graph">
			{move || {
				payload
					.get()
					.map(|payload| {
						view! {
							<ConnectionsGraph
								payload=payload
								root=root.clone()
								config=config.clone()
								fullscreen=true
								on_node_click=on_node_click
								on_node_hover=on_node_hover
							/>
						}
					})
			}}
			<div class="graph-overlay">
				<h1>{title}</h1>
				<p class="subtitle">
					{move || {
						hovered
							.get()
							.unwrap_or_else(|| {
								"Click a node to expand its connections. Drag to move, scroll to zoom."
									.to_string()
							})
					}}
				</p>
				{move || {
					load_error
						.get()
						.map(|message| view! { <p class="graph-error" role="alert">{message}</p> })
				}}
			</div>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_parse_page_with_embedded_graph() {
		let page = json!({
			"component": "Groups/Connections",
			"props": {
				"connections": {
					"nodes": [{ "id": 7, "type": "App\\Models\\Group", "name": "Makers" }],
					"links": [],
					"rootNodeId": 7,
					"rootNodeHash": "abc"
				},
				"rootGroupId": 7,
				"rootGroupHash": "abc",
				"graphConfig": { "camera": { "focusZoom": 6.0 } }
			}
		});
		let props = parse_page(&page.to_string()).unwrap();

		let root = props.root();
		assert_eq!(root.group_id.as_deref(), Some("7"));
		assert_eq!(root.group_hash.as_deref(), Some("abc"));
		assert_eq!(props.graph_config.camera.focus_zoom, 6.0);
		let payload = props.connections.unwrap();
		assert_eq!(root_name(&payload, &root).as_deref(), Some("Makers"));
	}

	#[test]
	fn test_parse_page_without_graph_uses_defaults() {
		let props = parse_page(r#"{"component":"Groups/Connections","props":{}}"#).unwrap();
		assert_eq!(props, ConnectionsPageProps::default());
		assert_eq!(props.graph_config, GraphConfig::default());
	}

	#[test]
	fn test_query_hash() {
		assert_eq!(query_hash("?hash=a%20b&x=1").as_deref(), Some("a b"));
		assert_eq!(query_hash("x=1&hash=z").as_deref(), Some("z"));
		assert_eq!(query_hash("?hash="), None);
		assert_eq!(query_hash(""), None);
	}
}
