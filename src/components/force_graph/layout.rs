use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use super::types::GraphData;

const NODE_MASS: f32 = 10.0;
/// Ring radius for nodes with no placed neighbour.
const SEED_RADIUS: f64 = 100.0;
/// Ring radius around the neighbours of a newly added node.
const NEIGHBOUR_SEED_RADIUS: f64 = 30.0;

/// Source of node positions, in world coordinates.
pub trait Layout {
	fn position(&self, id: &str) -> Option<(f64, f64)>;
}

/// Physics layout backed by `force_graph`. Node user data is the node id.
pub struct ForceLayout {
	graph: ForceGraph<String, ()>,
	nodes: HashMap<String, DefaultNodeIdx>,
	positions: HashMap<DefaultNodeIdx, (f64, f64)>,
	pinned: HashSet<String>,
}

impl ForceLayout {
	/// Builds the simulation for `data`. Nodes found in `previous` start where
	/// they were; new nodes start on a ring around their placed neighbours.
	/// Ids in `pinned` that have a previous position stay anchored there.
	pub fn new(
		data: &GraphData,
		params: SimulationParameters,
		previous: &HashMap<String, (f64, f64)>,
		pinned: &HashSet<String>,
	) -> Self {
		let mut graph = ForceGraph::new(params);
		let mut nodes = HashMap::with_capacity(data.nodes().len());
		let seeds = seed_positions(data, previous);
		let mut kept_pins = HashSet::new();

		for node in data.nodes() {
			let (x, y) = seeds.get(node.id.as_str()).copied().unwrap_or_default();
			let is_anchor = pinned.contains(&node.id) && previous.contains_key(&node.id);
			if is_anchor {
				kept_pins.insert(node.id.clone());
			}
			let idx = graph.add_node(NodeData {
				x: x as f32,
				y: y as f32,
				mass: NODE_MASS,
				is_anchor,
				user_data: node.id.clone(),
			});
			nodes.insert(node.id.clone(), idx);
		}

		for link in data.links() {
			if let (Some(&src), Some(&tgt)) = (nodes.get(&link.source), nodes.get(&link.target)) {
				graph.add_edge(src, tgt, EdgeData::default());
			}
		}

		let mut layout = Self {
			graph,
			nodes,
			positions: HashMap::new(),
			pinned: kept_pins,
		};
		layout.sync_positions();
		layout
	}

	pub fn tick(&mut self, dt: f32) {
		self.graph.update(dt);
		self.sync_positions();
	}

	/// Moves a node and anchors it there.
	pub fn pin(&mut self, id: &str, x: f64, y: f64) {
		let Some(&idx) = self.nodes.get(id) else {
			return;
		};
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.x = x as f32;
				node.data.y = y as f32;
				node.data.is_anchor = true;
			}
		});
		self.positions.insert(idx, (x, y));
		self.pinned.insert(id.to_string());
	}

	/// Ids of the nodes the user has dropped in place.
	pub fn pinned(&self) -> &HashSet<String> {
		&self.pinned
	}

	/// Current position of every node, keyed by id.
	pub fn snapshot(&self) -> HashMap<String, (f64, f64)> {
		self.nodes
			.iter()
			.filter_map(|(id, idx)| self.positions.get(idx).map(|&p| (id.clone(), p)))
			.collect()
	}

	fn sync_positions(&mut self) {
		let positions = &mut self.positions;
		positions.clear();
		self.graph.visit_nodes(|node| {
			positions.insert(node.index(), (node.x() as f64, node.y() as f64));
		});
	}
}

impl Layout for ForceLayout {
	fn position(&self, id: &str) -> Option<(f64, f64)> {
		self.nodes
			.get(id)
			.and_then(|idx| self.positions.get(idx))
			.copied()
	}
}

fn seed_positions<'a>(
	data: &'a GraphData,
	previous: &HashMap<String, (f64, f64)>,
) -> HashMap<&'a str, (f64, f64)> {
	let mut seeds = HashMap::with_capacity(data.nodes().len());
	let mut fresh = Vec::new();
	for node in data.nodes() {
		match previous.get(&node.id) {
			Some(&pos) => {
				seeds.insert(node.id.as_str(), pos);
			}
			None => fresh.push(node.id.as_str()),
		}
	}

	let mut neighbours: HashMap<&str, Vec<&str>> = HashMap::new();
	for link in data.links() {
		neighbours.entry(&link.source).or_default().push(&link.target);
		neighbours.entry(&link.target).or_default().push(&link.source);
	}

	let total = fresh.len().max(1) as f64;
	for (i, id) in fresh.into_iter().enumerate() {
		let angle = (i as f64) * 2.0 * PI / total;
		let placed: Vec<(f64, f64)> = neighbours
			.get(id)
			.into_iter()
			.flatten()
			.filter_map(|n| seeds.get(n).copied())
			.collect();

		let (cx, cy, r) = if placed.is_empty() {
			(0.0, 0.0, SEED_RADIUS)
		} else {
			let n = placed.len() as f64;
			let (sx, sy) = placed
				.iter()
				.fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
			(sx / n, sy / n, NEIGHBOUR_SEED_RADIUS)
		};
		seeds.insert(id, (cx + r * angle.cos(), cy + r * angle.sin()));
	}
	seeds
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::config::ForceConfig;
	use crate::components::force_graph::types::fixtures::*;
	use crate::components::force_graph::types::NodeType;

	fn params() -> SimulationParameters {
		ForceConfig::default().simulation_parameters()
	}

	#[test]
	fn test_every_node_gets_a_distinct_position() {
		let data = small_graph();
		let layout = ForceLayout::new(&data, params(), &HashMap::new(), &HashSet::new());
		let positions: Vec<_> = data
			.nodes()
			.iter()
			.map(|n| layout.position(&n.id).unwrap())
			.collect();
		assert_eq!(positions.len(), 3);
		for (i, a) in positions.iter().enumerate() {
			for b in &positions[i + 1..] {
				assert_ne!(a, b);
			}
		}
		assert!(layout.position("missing").is_none());
	}

	#[test]
	fn test_persisting_nodes_keep_previous_positions() {
		let previous = HashMap::from([("g1".to_string(), (40.0, -12.0))]);
		let layout = ForceLayout::new(&small_graph(), params(), &previous, &HashSet::new());
		assert_eq!(layout.position("g1"), Some((40.0, -12.0)));

		// new neighbours start near g1
		let (x, y) = layout.position("p1").unwrap();
		let dist = ((x - 40.0).powi(2) + (y + 12.0).powi(2)).sqrt();
		assert!((dist - NEIGHBOUR_SEED_RADIUS).abs() < 1e-3);
	}

	#[test]
	fn test_pinned_node_stays_put() {
		let data = GraphData::new(
			vec![node("g1", NodeType::Group), node("p1", NodeType::Profile)],
			vec![link("g1", "p1")],
		);
		let mut layout = ForceLayout::new(&data, params(), &HashMap::new(), &HashSet::new());
		layout.pin("g1", 5.0, 5.0);
		for _ in 0..10 {
			layout.tick(0.016);
		}
		assert_eq!(layout.position("g1"), Some((5.0, 5.0)));
		assert_eq!(layout.snapshot().len(), 2);
		assert!(layout.pinned().contains("g1"));
	}

	#[test]
	fn test_pins_carry_over_only_for_surviving_nodes() {
		let previous = HashMap::from([("g1".to_string(), (3.0, 4.0))]);
		let pinned = HashSet::from(["g1".to_string(), "gone".to_string(), "p1".to_string()]);
		let mut layout = ForceLayout::new(&small_graph(), params(), &previous, &pinned);
		for _ in 0..10 {
			layout.tick(0.016);
		}
		assert_eq!(layout.position("g1"), Some((3.0, 4.0)));
		// p1 had no previous position, so it is placed fresh and free to move
		assert_eq!(layout.pinned(), &HashSet::from(["g1".to_string()]));
	}
}
