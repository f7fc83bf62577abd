use super::layout::Layout;
use super::types::GraphData;

/// The focused node and the pending camera recentre on it.
///
/// At most one recentre timer is held. Scheduling a new one drops the old
/// handle, which cancels it. A fired handle is kept until the next schedule
/// or clear, since the timer callback must not drop its own closure.
pub struct FocusController<T> {
	focused: Option<String>,
	timer: Option<T>,
}

impl<T> FocusController<T> {
	pub fn new(initial: Option<String>) -> Self {
		Self {
			focused: initial,
			timer: None,
		}
	}

	pub fn focused(&self) -> Option<&str> {
		self.focused.as_deref()
	}

	/// Focuses `id`. Returns true if the focus moved to a different node.
	pub fn focus(&mut self, id: &str) -> bool {
		if self.focused.as_deref() == Some(id) {
			return false;
		}
		self.focused = Some(id.to_string());
		true
	}

	pub fn clear(&mut self) {
		self.focused = None;
		self.timer = None;
	}

	pub fn schedule(&mut self, timer: T) {
		self.timer = Some(timer);
	}

	pub fn has_pending(&self) -> bool {
		self.timer.is_some()
	}
}

/// Where the camera should go for the focused node, looked up in the data
/// current at the time of the call.
pub fn focus_target(
	focused: Option<&str>,
	data: &GraphData,
	layout: &impl Layout,
) -> Option<(f64, f64)> {
	let node = data.node(focused?)?;
	layout.position(&node.id)
}
