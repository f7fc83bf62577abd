use std::collections::BTreeSet;

use log::debug;

use super::types::{GraphData, GraphNode, NodeType};
use crate::api::ConnectionsQuery;
use crate::error::FetchError;

/// Ids of the groups and profiles the user has expanded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
	pub group_ids: BTreeSet<String>,
	pub profile_ids: BTreeSet<String>,
}

impl Selection {
	/// Adds the node if absent, removes it if present. Returns whether the node
	/// is selected afterwards.
	pub fn toggle(&mut self, node: &GraphNode) -> bool {
		let set = match node.kind {
			NodeType::Group => &mut self.group_ids,
			NodeType::Profile => &mut self.profile_ids,
		};
		if set.remove(&node.id) {
			false
		} else {
			set.insert(node.id.clone());
			true
		}
	}

	pub fn contains(&self, node: &GraphNode) -> bool {
		match node.kind {
			NodeType::Group => self.group_ids.contains(&node.id),
			NodeType::Profile => self.profile_ids.contains(&node.id),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpansionState {
	Idle,
	Fetching { seq: u64 },
}

/// A request to issue: its sequence number and the query to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpansionRequest {
	pub seq: u64,
	pub query: ConnectionsQuery,
}

#[derive(Debug)]
pub enum ExpansionOutcome {
	/// Latest response, successful: the new graph to show.
	Applied(GraphData),
	/// Latest response, failed: the selection was rolled back.
	Failed(FetchError),
	/// A newer request has been issued since; the response was dropped.
	Stale,
}

/// Tracks the selection sets and sequences connection requests.
///
/// `requested` follows every click; `committed` only moves when the latest
/// request succeeds. Only the response to the most recent request is ever
/// applied, whatever order responses arrive in.
#[derive(Clone, Debug)]
pub struct ExpansionController {
	root_hash: Option<String>,
	requested: Selection,
	committed: Selection,
	issued: u64,
	state: ExpansionState,
}

impl ExpansionController {
	pub fn new(root_hash: Option<String>) -> Self {
		Self {
			root_hash,
			requested: Selection::default(),
			committed: Selection::default(),
			issued: 0,
			state: ExpansionState::Idle,
		}
	}

	/// Selection including clicks still in flight.
	pub fn selection(&self) -> &Selection {
		&self.requested
	}

	/// Selection the displayed graph was fetched for.
	pub fn committed(&self) -> &Selection {
		&self.committed
	}

	pub fn state(&self) -> ExpansionState {
		self.state
	}

	pub fn is_fetching(&self) -> bool {
		matches!(self.state, ExpansionState::Fetching { .. })
	}

	pub fn toggle(&mut self, node: &GraphNode) -> ExpansionRequest {
		self.requested.toggle(node);
		self.issued += 1;
		self.state = ExpansionState::Fetching { seq: self.issued };
		ExpansionRequest {
			seq: self.issued,
			query: self.query(),
		}
	}

	pub fn query(&self) -> ConnectionsQuery {
		ConnectionsQuery {
			hash: self.root_hash.clone(),
			group_ids: self.requested.group_ids.iter().cloned().collect(),
			profile_ids: self.requested.profile_ids.iter().cloned().collect(),
		}
	}

	pub fn complete(&mut self, seq: u64, result: Result<GraphData, FetchError>) -> ExpansionOutcome {
		if seq != self.issued {
			debug!("dropping response #{seq}, latest is #{}", self.issued);
			return ExpansionOutcome::Stale;
		}
		self.state = ExpansionState::Idle;
		match result {
			Ok(data) => {
				self.committed = self.requested.clone();
				ExpansionOutcome::Applied(data)
			}
			Err(err) => {
				self.requested = self.committed.clone();
				ExpansionOutcome::Failed(err)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::types::fixtures::*;

	fn replacement() -> GraphData {
		GraphData::new(
			vec![node("g1", NodeType::Group), node("p9", NodeType::Profile)],
			vec![link("g1", "p9")],
		)
	}

	#[test]
	fn test_click_on_profile_issues_one_scoped_request() {
		let data = small_graph();
		let mut expansion = ExpansionController::new(Some("root-hash".into()));

		let request = expansion.toggle(data.node("p1").unwrap());

		assert!(expansion.selection().profile_ids.contains("p1"));
		assert!(expansion.selection().group_ids.is_empty());
		assert_eq!(request.seq, 1);
		assert_eq!(
			request.query,
			ConnectionsQuery {
				hash: Some("root-hash".into()),
				group_ids: vec![],
				profile_ids: vec!["p1".into()],
			}
		);
		assert_eq!(expansion.state(), ExpansionState::Fetching { seq: 1 });

		match expansion.complete(request.seq, Ok(replacement())) {
			ExpansionOutcome::Applied(data) => assert_eq!(data, replacement()),
			other => panic!("expected applied, got {other:?}"),
		}
		assert_eq!(expansion.state(), ExpansionState::Idle);
		assert_eq!(expansion.committed(), expansion.selection());
	}

	#[test]
	fn test_group_click_goes_to_group_set() {
		let data = small_graph();
		let mut expansion = ExpansionController::new(None);
		let request = expansion.toggle(data.node("g1").unwrap());
		assert_eq!(request.query.group_ids, vec!["g1".to_string()]);
		assert!(request.query.profile_ids.is_empty());
		assert_eq!(request.query.hash, None);
	}

	#[test]
	fn test_double_toggle_restores_selection() {
		let data = small_graph();
		let p1 = data.node("p1").unwrap();
		let mut selection = Selection::default();
		selection.toggle(data.node("g1").unwrap());
		let before = selection.clone();

		assert!(selection.toggle(p1));
		assert!(selection.contains(p1));
		assert!(!selection.toggle(p1));
		assert_eq!(selection, before);
	}

	#[test]
	fn test_out_of_order_responses_keep_latest() {
		let data = small_graph();
		let mut expansion = ExpansionController::new(None);
		let first = expansion.toggle(data.node("p1").unwrap());
		let second = expansion.toggle(data.node("p2").unwrap());

		assert!(matches!(
			expansion.complete(second.seq, Ok(replacement())),
			ExpansionOutcome::Applied(_)
		));
		assert!(matches!(
			expansion.complete(first.seq, Ok(small_graph())),
			ExpansionOutcome::Stale
		));
		assert_eq!(expansion.committed().profile_ids.len(), 2);
	}

	#[test]
	fn test_stale_response_does_not_end_fetching() {
		let data = small_graph();
		let mut expansion = ExpansionController::new(None);
		let first = expansion.toggle(data.node("p1").unwrap());
		expansion.toggle(data.node("p2").unwrap());

		assert!(matches!(
			expansion.complete(first.seq, Ok(small_graph())),
			ExpansionOutcome::Stale
		));
		assert!(expansion.is_fetching());
	}

	#[test]
	fn test_failed_request_rolls_back_toggle() {
		let data = small_graph();
		let mut expansion = ExpansionController::new(None);
		let ok = expansion.toggle(data.node("p1").unwrap());
		expansion.complete(ok.seq, Ok(small_graph()));

		let failing = expansion.toggle(data.node("g1").unwrap());
		assert!(expansion.selection().group_ids.contains("g1"));

		let outcome = expansion.complete(failing.seq, Err(FetchError::Status(500)));
		assert!(matches!(outcome, ExpansionOutcome::Failed(FetchError::Status(500))));
		assert!(expansion.selection().group_ids.is_empty());
		assert!(expansion.selection().profile_ids.contains("p1"));
		assert!(!expansion.is_fetching());
	}
}
