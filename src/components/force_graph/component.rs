use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use leptos::callback::{Callable, Callback};
use leptos::prelude::*;
use leptos::task::spawn_local;
use log::warn;
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement, MouseEvent, WheelEvent, Window,
};

use super::config::{DocumentColors, GraphConfig};
use super::expansion::ExpansionRequest;
use super::images::start_loading;
use super::layout::Layout;
use super::state::{CLICK_TOLERANCE, DragState, ExpansionEvent, GraphState, PanState, PressState};
use super::types::{ConnectionsPayload, GraphNode, GraphRoot};
use crate::api::fetch_connections;

type CanvasGraphState = GraphState<HtmlImageElement, Timeout>;
type SharedState = Rc<RefCell<Option<CanvasGraphState>>>;
type SharedClosure = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

const FRAME_DT: f32 = 0.016;

/// Signals the overlay reads: request in flight, last error.
#[derive(Clone, Copy)]
struct GraphStatus {
	fetching: RwSignal<bool>,
	error: RwSignal<Option<String>>,
}

/// Browser resources held by one mounted graph.
#[derive(Clone, Default)]
struct GraphHandles {
	state: SharedState,
	animate: SharedClosure,
	resize_cb: SharedClosure,
	/// Id of the pending animation frame.
	frame: Rc<Cell<Option<i32>>>,
}

impl GraphHandles {
	fn request_frame(&self, window: &Window) {
		if let Some(ref cb) = *self.animate.borrow() {
			self.frame
				.set(window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
		}
	}

	fn teardown(&self) {
		if let Some(window) = web_sys::window() {
			self.detach(&window);
		}
		self.release();
	}

	/// Cancels the pending frame and removes the resize listener.
	fn detach(&self, window: &Window) {
		if let Some(id) = self.frame.take() {
			let _ = window.cancel_animation_frame(id);
		}
		if let Some(ref cb) = *self.resize_cb.borrow() {
			let _ =
				window.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
	}

	/// Drops the closures and the graph state. The frame closure refers to
	/// itself, and the recentre timer and in-flight requests hold the state,
	/// so neither goes away on its own.
	fn release(&self) {
		self.animate.borrow_mut().take();
		self.resize_cb.borrow_mut().take();
		self.state.borrow_mut().take();
	}
}

fn viewport_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

fn canvas_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Arms the recentre timer for the focused node, replacing any pending one.
fn schedule_recentre(state: &SharedState) {
	let delay = {
		let guard = state.borrow();
		let Some(s) = guard.as_ref() else {
			return;
		};
		if s.focus.focused().is_none() {
			return;
		}
		s.config.camera.focus_delay_ms
	};
	let target = Rc::clone(state);
	let timer = Timeout::new(delay, move || {
		if let Some(ref mut s) = *target.borrow_mut() {
			s.recentre();
		}
	});
	if let Some(ref mut s) = *state.borrow_mut() {
		s.focus.schedule(timer);
	}
}

fn click_at(
	state: &SharedState,
	x: f64,
	y: f64,
	status: GraphStatus,
	on_node_click: Option<Callback<GraphNode>>,
) {
	let (request, node, endpoint) = {
		let mut guard = state.borrow_mut();
		let Some(s) = guard.as_mut() else {
			return;
		};
		match s.node_at_position(x, y) {
			Some(id) => (
				s.node_clicked(&id),
				s.data.node(&id).cloned(),
				s.config.endpoint.clone(),
			),
			None => {
				s.background_clicked();
				return;
			}
		}
	};
	let Some(request) = request else {
		return;
	};

	if let (Some(cb), Some(node)) = (on_node_click, node) {
		cb.run(node);
	}
	schedule_recentre(state);
	status.fetching.set(true);
	status.error.set(None);
	spawn_local(expand(Rc::clone(state), endpoint, request, status));
}

async fn expand(
	state: SharedState,
	endpoint: String,
	request: ExpansionRequest,
	status: GraphStatus,
) {
	let result = fetch_connections(&endpoint, &request.query)
		.await
		.map(ConnectionsPayload::into_graph_data);

	let (event, fetching) = {
		let mut guard = state.borrow_mut();
		let Some(s) = guard.as_mut() else {
			return;
		};
		(
			s.complete_expansion(request.seq, result),
			s.expansion.is_fetching(),
		)
	};
	match event {
		ExpansionEvent::Applied(slots) => {
			start_loading(slots);
			schedule_recentre(&state);
		}
		ExpansionEvent::Failed(message) => status.error.set(Some(message)),
		ExpansionEvent::Stale => {}
	}
	status.fetching.set(fetching);
}

/// Force-directed graph of groups and profiles. Clicking a node focuses it
/// and asks the server for the graph expanded (or contracted) around it.
#[component]
pub fn ConnectionsGraph(
	payload: ConnectionsPayload,
	#[prop(optional)] root: GraphRoot,
	#[prop(optional)] config: GraphConfig,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(optional)] on_node_click: Option<Callback<GraphNode>>,
	#[prop(optional)] on_node_hover: Option<Callback<Option<GraphNode>>>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let handles = GraphHandles::default();
	let state = handles.state.clone();
	let handles_init = handles.clone();
	let status = GraphStatus {
		fetching: RwSignal::new(false),
		error: RwSignal::new(None),
	};
	let mut init = Some((payload, root, config));

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let Some((payload, root, config)) = init.take() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			warn!("no browser window, connections graph not started");
			return;
		};

		let (w, h) = if fullscreen {
			viewport_size(&window).unwrap_or((800.0, 600.0))
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			warn!("2d canvas context unavailable, connections graph not started");
			return;
		};

		let palette = config.colors.resolve(&DocumentColors);
		let mut graph = CanvasGraphState::new(payload, root, config, palette, w, h);
		start_loading(graph.reload_images());
		*handles_init.state.borrow_mut() = Some(graph);
		schedule_recentre(&handles_init.state);

		if fullscreen {
			let (state_resize, canvas_resize) = (handles_init.state.clone(), canvas.clone());
			*handles_init.resize_cb.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(viewport_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *handles_init.resize_cb.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let anim = handles_init.clone();
		*handles_init.animate.borrow_mut() = Some(Closure::new(move || {
			if let Some(ref mut s) = *anim.state.borrow_mut() {
				s.tick(FRAME_DT);
				s.render(&ctx, &mut js_sys::Math::random);
			}
			if let Some(win) = web_sys::window() {
				anim.request_frame(&win);
			}
		}));
		handles_init.request_frame(&window);
	});

	// Cleanup: stop drawing and release the graph when the component unmounts
	let mounted = StoredValue::new_local(handles);
	on_cleanup(move || {
		mounted.try_with_value(GraphHandles::teardown);
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_md.borrow_mut() {
			s.press = PressState {
				origin: Some((x, y)),
				moved: false,
			};
			let world = s.camera.screen_to_world(x, y);
			if let Some(id) = s.node_at_position(x, y) {
				let (nx, ny) = s.layout.position(&id).unwrap_or(world);
				s.drag = DragState {
					active: true,
					node_id: Some(id),
					grab_offset: (nx - world.0, ny - world.1),
				};
			} else {
				s.pan = PanState {
					active: true,
					anchor: world,
				};
			}
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		let hover_change = {
			let mut guard = state_mm.borrow_mut();
			let Some(s) = guard.as_mut() else {
				return;
			};
			if let Some((ox, oy)) = s.press.origin {
				if (x - ox).hypot(y - oy) > CLICK_TOLERANCE {
					s.press.moved = true;
				}
			}

			// Update hover state when not dragging
			let mut hover_change = None;
			if !s.drag.active {
				let hovered = s.node_at_position(x, y);
				if s.set_hover(hovered.clone()) {
					hover_change = Some(hovered.and_then(|id| s.data.node(&id).cloned()));
				}
			}

			if s.drag.active && s.press.moved {
				if let Some(id) = s.drag.node_id.clone() {
					let (wx, wy) = s.camera.screen_to_world(x, y);
					let (gx, gy) = s.drag.grab_offset;
					s.layout.pin(&id, wx + gx, wy + gy);
				}
			} else if s.pan.active {
				let anchor = s.pan.anchor;
				s.camera.drag_to(anchor, x, y);
			}
			hover_change
		};
		if let (Some(cb), Some(node)) = (on_node_hover, hover_change) {
			cb.run(node);
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let clicked = {
			let mut guard = state_mu.borrow_mut();
			let Some(s) = guard.as_mut() else {
				return;
			};
			let clicked = s.press.origin.is_some() && !s.press.moved;
			s.drag = DragState::default();
			s.pan = PanState::default();
			s.press = PressState::default();
			clicked
		};
		if clicked {
			if let Some((x, y)) = canvas_point(canvas_ref, &ev) {
				click_at(&state_mu, x, y, status, on_node_click);
			}
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		let hover_cleared = {
			let mut guard = state_ml.borrow_mut();
			let Some(s) = guard.as_mut() else {
				return;
			};
			s.drag = DragState::default();
			s.pan = PanState::default();
			s.press = PressState::default();
			s.set_hover(None)
		};
		if let (Some(cb), true) = (on_node_hover, hover_cleared) {
			cb.run(None);
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = canvas_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
			s.camera.zoom_about(x, y, factor);
		}
	};

	view! {
		<div class="connections-graph">
			<canvas
				node_ref=canvas_ref
				class="force-graph-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			<Show when=move || status.fetching.get()>
				<div class="graph-status">"Loading connections…"</div>
			</Show>
			{move || {
				status
					.error
					.get()
					.map(|message| {
						view! { <div class="graph-status graph-error" role="alert">{message}</div> }
					})
			}}
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::render::tests::palette;

	#[test]
	fn test_release_frees_state_shared_with_pending_work() {
		let handles = GraphHandles::default();
		// as held by a queued timer or request
		let pending = Rc::clone(&handles.state);
		*handles.state.borrow_mut() = Some(CanvasGraphState::new(
			ConnectionsPayload::default(),
			GraphRoot::default(),
			GraphConfig::default(),
			palette(),
			800.0,
			600.0,
		));

		handles.release();

		assert!(pending.borrow().is_none());
		assert!(handles.animate.borrow().is_none());
		assert!(handles.resize_cb.borrow().is_none());
	}
}
