use std::collections::{HashMap, HashSet};

use log::{error, info};

use super::camera::{Bounds, Camera};
use super::config::{GraphConfig, Palette};
use super::expansion::{ExpansionController, ExpansionOutcome, ExpansionRequest};
use super::focus::{FocusController, focus_target};
use super::images::{ImageCache, ImageSlot};
use super::layout::{ForceLayout, Layout};
use super::render::{self, DrawContext, FrameStats, NodeRadii, Scene};
use super::types::{ConnectionsPayload, GraphData, GraphRoot};
use crate::error::FetchError;

/// Smallest hit radius in world units, so tiny nodes stay clickable.
pub const MIN_HIT_RADIUS: f64 = 6.0;
/// Pointer travel (screen px) below which a press counts as a click.
pub const CLICK_TOLERANCE: f64 = 4.0;

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node_id: Option<String>,
	/// Offset from the pointer to the node centre, world units.
	pub grab_offset: (f64, f64),
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	/// World point held under the pointer while panning.
	pub anchor: (f64, f64),
}

#[derive(Clone, Debug, Default)]
pub struct PressState {
	pub origin: Option<(f64, f64)>,
	pub moved: bool,
}

/// Result of handing a finished request to the graph.
pub enum ExpansionEvent<I> {
	/// New data is showing; these images should be loaded.
	Applied(Vec<ImageSlot<I>>),
	/// The request failed; message for the user.
	Failed(String),
	Stale,
}

/// Everything the connections graph keeps between frames.
pub struct GraphState<I, T> {
	pub data: GraphData,
	pub layout: ForceLayout,
	pub camera: Camera,
	pub drag: DragState,
	pub pan: PanState,
	pub press: PressState,
	pub hovered: Option<String>,
	pub focus: FocusController<T>,
	pub expansion: ExpansionController,
	pub radii: NodeRadii,
	pub images: ImageCache<I>,
	pub palette: Palette,
	pub config: GraphConfig,
	pub root_group_id: Option<String>,
}

impl<I: Clone, T> GraphState<I, T> {
	pub fn new(
		payload: ConnectionsPayload,
		root: GraphRoot,
		config: GraphConfig,
		palette: Palette,
		width: f64,
		height: f64,
	) -> Self {
		let root_group_id = root
			.group_id
			.or_else(|| payload.root_is_group().then(|| payload.root_node_id.clone()).flatten());
		let root_hash = root.group_hash.or_else(|| payload.root_node_hash.clone());
		let initial_focus = payload
			.root_node_id
			.clone()
			.or_else(|| root_group_id.clone())
			.or(root.profile_id);

		let data = payload.into_graph_data();
		let layout = ForceLayout::new(
			&data,
			config.forces.simulation_parameters(),
			&HashMap::new(),
			&HashSet::new(),
		);
		info!(
			"connections graph: {} nodes, {} links",
			data.nodes().len(),
			data.links().len()
		);

		Self {
			data,
			layout,
			camera: Camera::new(width, height),
			drag: DragState::default(),
			pan: PanState::default(),
			press: PressState::default(),
			hovered: None,
			focus: FocusController::new(initial_focus),
			expansion: ExpansionController::new(root_hash),
			radii: NodeRadii::default(),
			images: ImageCache::default(),
			palette,
			config,
			root_group_id,
		}
	}

	/// Starts a fresh image generation for the current data.
	pub fn reload_images(&mut self) -> Vec<ImageSlot<I>> {
		self.images.rebuild(&self.data)
	}

	/// Swaps in a new snapshot. Nodes that survive keep their position, pin
	/// and radius; the image cache starts over.
	pub fn replace_data(&mut self, data: GraphData) -> Vec<ImageSlot<I>> {
		let previous = self.layout.snapshot();
		self.layout = ForceLayout::new(
			&data,
			self.config.forces.simulation_parameters(),
			&previous,
			self.layout.pinned(),
		);
		self.data = data;
		if self
			.hovered
			.as_deref()
			.is_some_and(|id| self.data.node(id).is_none())
		{
			self.hovered = None;
		}
		self.drag = DragState::default();
		self.reload_images()
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<String> {
		let (gx, gy) = self.camera.screen_to_world(sx, sy);
		// last painted is on top
		self.data.nodes().iter().rev().find_map(|node| {
			let (x, y) = self.layout.position(&node.id)?;
			let r = self
				.radii
				.peek(node, &self.config.node_size)
				.max(MIN_HIT_RADIUS);
			let (dx, dy) = (x - gx, y - gy);
			(dx * dx + dy * dy < r * r).then(|| node.id.clone())
		})
	}

	/// Returns true if the hovered node changed.
	pub fn set_hover(&mut self, id: Option<String>) -> bool {
		if self.hovered == id {
			return false;
		}
		self.hovered = id;
		true
	}

	pub fn bounds(&self) -> Option<Bounds> {
		Bounds::around(self.data.nodes().iter().filter_map(|node| {
			let (x, y) = self.layout.position(&node.id)?;
			Some((x, y, self.radii.peek(node, &self.config.node_size)))
		}))
	}

	pub fn zoom_to_fit(&mut self) {
		let bounds = self.bounds();
		let camera = &self.config.camera;
		self.camera
			.zoom_to_fit(bounds, camera.fit_padding, camera.fit_duration_ms);
	}

	/// Click on a node: fit the view, and when the focus moves to this node,
	/// toggle it in the selection and return the request to send.
	pub fn node_clicked(&mut self, id: &str) -> Option<ExpansionRequest> {
		self.zoom_to_fit();
		let node = self.data.node(id)?;
		if !self.focus.focus(id) {
			return None;
		}
		Some(self.expansion.toggle(node))
	}

	pub fn background_clicked(&mut self) {
		self.zoom_to_fit();
		self.focus.clear();
	}

	/// Zooms in on the focused node, wherever it is now.
	pub fn recentre(&mut self) {
		let Some((x, y)) = focus_target(self.focus.focused(), &self.data, &self.layout) else {
			return;
		};
		let camera = &self.config.camera;
		self.camera.zoom_to(camera.focus_zoom, camera.animation_ms);
		self.camera.center_at(x, y, camera.animation_ms);
	}

	pub fn complete_expansion(
		&mut self,
		seq: u64,
		result: Result<GraphData, FetchError>,
	) -> ExpansionEvent<I> {
		match self.expansion.complete(seq, result) {
			ExpansionOutcome::Applied(data) => {
				info!(
					"expansion #{seq} applied: {} nodes, {} links",
					data.nodes().len(),
					data.links().len()
				);
				ExpansionEvent::Applied(self.replace_data(data))
			}
			ExpansionOutcome::Failed(err) => {
				error!("connections request #{seq} failed: {err}");
				// unfocus so that clicking the same node retries
				self.focus.clear();
				ExpansionEvent::Failed(err.to_string())
			}
			ExpansionOutcome::Stale => ExpansionEvent::Stale,
		}
	}

	pub fn tick(&mut self, dt: f32) {
		self.layout.tick(dt);
		self.camera.tick(dt as f64);
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.camera.resize(width, height);
	}

	/// Clears the canvas and paints one frame.
	pub fn render<C>(&mut self, ctx: &C, sample: &mut impl FnMut() -> f64) -> FrameStats
	where
		C: DrawContext<Image = I>,
	{
		ctx.clear(self.camera.width, self.camera.height, &self.palette.background);
		ctx.save_state();
		ctx.apply_transform(self.camera.transform());
		let scene = Scene {
			data: &self.data,
			layout: &self.layout,
			images: &self.images,
			palette: &self.palette,
			sizes: &self.config.node_size,
			hovered: self.hovered.as_deref(),
			focused: self.focus.focused(),
			root_group_id: self.root_group_id.as_deref(),
			zoom: self.camera.zoom(),
		};
		let stats = render::paint_scene(ctx, &scene, &mut self.radii, sample);
		ctx.restore_state();
		stats
	}
}
