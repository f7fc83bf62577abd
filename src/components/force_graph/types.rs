use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer};

/// Kind of entity a graph node stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
	Group,
	Profile,
}

impl NodeType {
	/// Maps a server type name onto a node kind.
	///
	/// The server sends either a bare kind (`"group"`) or a model class name
	/// (`"App\\Models\\Group"`). Communities render like groups; every other
	/// kind is a profile.
	pub fn from_type_name(name: &str) -> Self {
		let kind = name.rsplit(['\\', '/']).next().unwrap_or(name);
		if kind.eq_ignore_ascii_case("group") || kind.eq_ignore_ascii_case("community") {
			Self::Group
		} else {
			Self::Profile
		}
	}

	pub fn is_group(self) -> bool {
		self == Self::Group
	}
}

impl<'de> Deserialize<'de> for NodeType {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let name = String::deserialize(deserializer)?;
		Ok(Self::from_type_name(&name))
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GraphNode {
	#[serde(deserialize_with = "de_id")]
	pub id: String,
	#[serde(rename = "type")]
	pub kind: NodeType,
	#[serde(default, deserialize_with = "de_text")]
	pub name: String,
	#[serde(default, deserialize_with = "de_photo")]
	pub photo: Option<String>,
	#[serde(default)]
	pub hash: Option<String>,
	#[serde(default)]
	pub val: Option<f64>,
}

/// Edge between two nodes, stored by id. The wire form may carry either the
/// bare id or the resolved node object for each endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct GraphLink {
	#[serde(deserialize_with = "de_endpoint")]
	pub source: String,
	#[serde(deserialize_with = "de_endpoint")]
	pub target: String,
}

/// Nodes and links of one graph snapshot.
///
/// Nodes are unique by id (first occurrence wins). Links are unique by
/// `(source, target)` and never self-referential.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphData {
	nodes: Vec<GraphNode>,
	links: Vec<GraphLink>,
	index: HashMap<String, usize>,
}

impl GraphData {
	pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
		let mut index = HashMap::with_capacity(nodes.len());
		let mut unique_nodes = Vec::with_capacity(nodes.len());
		for node in nodes {
			if index.contains_key(&node.id) {
				continue;
			}
			index.insert(node.id.clone(), unique_nodes.len());
			unique_nodes.push(node);
		}

		let mut seen = HashSet::new();
		let links = links
			.into_iter()
			.filter(|link| link.source != link.target)
			.filter(|link| seen.insert((link.source.clone(), link.target.clone())))
			.collect();

		Self {
			nodes: unique_nodes,
			links,
			index,
		}
	}

	pub fn nodes(&self) -> &[GraphNode] {
		&self.nodes
	}

	pub fn links(&self) -> &[GraphLink] {
		&self.links
	}

	pub fn node(&self, id: &str) -> Option<&GraphNode> {
		self.index.get(id).map(|&i| &self.nodes[i])
	}
}

/// Response body of the connections endpoint (and the initial page prop).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsPayload {
	#[serde(default)]
	pub nodes: Vec<GraphNode>,
	#[serde(default)]
	pub links: Vec<GraphLink>,
	#[serde(default, deserialize_with = "de_opt_id")]
	pub root_node_id: Option<String>,
	#[serde(default)]
	pub root_node_hash: Option<String>,
	#[serde(default)]
	pub root_node_type: Option<String>,
	#[serde(default)]
	pub error: Option<String>,
}

impl ConnectionsPayload {
	pub fn into_graph_data(self) -> GraphData {
		GraphData::new(self.nodes, self.links)
	}

	pub fn root_is_group(&self) -> bool {
		self.root_node_type
			.as_deref()
			.is_some_and(|t| NodeType::from_type_name(t).is_group())
	}
}

/// The entity a page is centred on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphRoot {
	pub group_id: Option<String>,
	pub profile_id: Option<String>,
	pub group_hash: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
	Text(String),
	Int(i64),
}

impl From<WireId> for String {
	fn from(id: WireId) -> Self {
		match id {
			WireId::Text(s) => s,
			WireId::Int(n) => n.to_string(),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEndpoint {
	Id(WireId),
	Node { id: WireId },
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	WireId::deserialize(deserializer).map(String::from)
}

pub(crate) fn de_opt_id<'de, D: Deserializer<'de>>(
	deserializer: D,
) -> Result<Option<String>, D::Error> {
	Ok(Option::<WireId>::deserialize(deserializer)?.map(String::from))
}

fn de_endpoint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	Ok(match WireEndpoint::deserialize(deserializer)? {
		WireEndpoint::Id(id) | WireEndpoint::Node { id } => id.into(),
	})
}

fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_photo<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
	Ok(Option::<String>::deserialize(deserializer)?.filter(|url| !url.trim().is_empty()))
}

#[cfg(test)]
pub(crate) mod fixtures {
	use super::*;

	pub fn node(id: &str, kind: NodeType) -> GraphNode {
		GraphNode {
			id: id.to_string(),
			kind,
			name: format!("Node {id}"),
			photo: None,
			hash: None,
			val: None,
		}
	}

	pub fn link(source: &str, target: &str) -> GraphLink {
		GraphLink {
			source: source.to_string(),
			target: target.to_string(),
		}
	}

	/// g1 linked to p1 and p2.
	pub fn small_graph() -> GraphData {
		GraphData::new(
			vec![
				node("g1", NodeType::Group),
				node("p1", NodeType::Profile),
				node("p2", NodeType::Profile),
			],
			vec![link("g1", "p1"), link("g1", "p2")],
		)
	}
}

#[cfg(test)]
mod tests {
	use super::fixtures::*;
	use super::*;
	use serde_json::json;

	#[test]
	fn test_type_names_map_to_kinds() {
		assert_eq!(NodeType::from_type_name("group"), NodeType::Group);
		assert_eq!(NodeType::from_type_name("App\\Models\\Group"), NodeType::Group);
		assert_eq!(NodeType::from_type_name("App\\Models\\Community"), NodeType::Group);
		assert_eq!(NodeType::from_type_name("profile"), NodeType::Profile);
		assert_eq!(
			NodeType::from_type_name("App\\Models\\IdeascaleProfile"),
			NodeType::Profile
		);
	}

	#[test]
	fn test_payload_accepts_numeric_ids_and_node_endpoints() {
		let payload: ConnectionsPayload = serde_json::from_value(json!({
			"nodes": [
				{ "id": 7, "type": "App\\Models\\Group", "name": "Seven", "photo": "", "hash": "abc" },
				{ "id": "p-1", "type": "profile", "name": null, "photo": "https://img/p1.png" }
			],
			"links": [
				{ "source": 7, "target": "p-1" },
				{ "source": { "id": "p-1", "x": 3.0 }, "target": { "id": 7 } }
			],
			"rootNodeId": 7,
			"rootNodeHash": "abc",
			"rootNodeType": "App\\Models\\Group"
		}))
		.unwrap();

		assert_eq!(payload.root_node_id.as_deref(), Some("7"));
		assert!(payload.root_is_group());

		let data = payload.into_graph_data();
		let seven = data.node("7").unwrap();
		assert_eq!(seven.kind, NodeType::Group);
		assert_eq!(seven.photo, None);
		let profile = data.node("p-1").unwrap();
		assert_eq!(profile.name, "");
		assert_eq!(profile.photo.as_deref(), Some("https://img/p1.png"));
		assert_eq!(data.links(), &[link("7", "p-1"), link("p-1", "7")]);
	}

	#[test]
	fn test_duplicates_and_self_links_are_dropped() {
		let mut renamed = node("g1", NodeType::Group);
		renamed.name = "Later".into();
		let data = GraphData::new(
			vec![node("g1", NodeType::Group), renamed, node("p1", NodeType::Profile)],
			vec![link("g1", "p1"), link("g1", "p1"), link("p1", "p1"), link("p1", "g1")],
		);

		assert_eq!(data.nodes().len(), 2);
		assert_eq!(data.node("g1").unwrap().name, "Node g1");
		assert_eq!(data.links(), &[link("g1", "p1"), link("p1", "g1")]);
	}

	#[test]
	fn test_links_to_missing_nodes_are_kept() {
		let data = GraphData::new(vec![node("g1", NodeType::Group)], vec![link("g1", "ghost")]);
		assert_eq!(data.links().len(), 1);
		assert!(data.node("ghost").is_none());
	}
}
