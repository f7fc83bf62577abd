use std::collections::HashMap;
use std::f64::consts::PI;

use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use super::camera::ViewTransform;
use super::config::{NodeSizeConfig, Palette};
use super::images::ImageCache;
use super::layout::Layout;
use super::types::{GraphData, GraphLink, GraphNode, NodeType};

pub const ROOT_LINK_WIDTH: f64 = 1.0;
pub const LINK_WIDTH: f64 = 0.3;
const GROUP_BORDER_WIDTH: f64 = 1.0;

const LABEL_FONT_SIZE: f64 = 12.0;
const LABEL_PADDING: f64 = 5.0;
const LABEL_MARGIN: f64 = 5.0;
const LABEL_CORNER: f64 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAnchor {
	/// Left edge, alphabetic baseline.
	Start,
	/// Horizontally centred, top baseline.
	CenterTop,
}

/// The drawing operations the graph needs from a 2D canvas.
pub trait DrawContext {
	type Image;

	fn clear(&self, width: f64, height: f64, color: &str);
	fn save_state(&self);
	fn restore_state(&self);
	fn apply_transform(&self, transform: ViewTransform);
	/// Starts a new path holding one circle.
	fn circle(&self, x: f64, y: f64, radius: f64);
	/// Starts a new path holding one rounded rectangle.
	fn rounded_rect(&self, x: f64, y: f64, width: f64, height: f64, corner: f64);
	fn fill_path(&self, color: &str);
	fn stroke_path(&self, color: &str, width: f64);
	fn clip_path(&self);
	fn draw_image(&self, image: &Self::Image, x: f64, y: f64, width: f64, height: f64);
	fn line(&self, from: (f64, f64), to: (f64, f64), color: &str, width: f64);
	fn text_width(&self, text: &str, font: &str) -> f64;
	fn text(&self, text: &str, x: f64, y: f64, font: &str, color: &str, anchor: TextAnchor);
}

impl DrawContext for CanvasRenderingContext2d {
	type Image = HtmlImageElement;

	fn clear(&self, width: f64, height: f64, color: &str) {
		self.set_fill_style_str(color);
		self.fill_rect(0.0, 0.0, width, height);
	}

	fn save_state(&self) {
		self.save();
	}

	fn restore_state(&self) {
		self.restore();
	}

	fn apply_transform(&self, t: ViewTransform) {
		let _ = self.translate(t.x, t.y);
		let _ = self.scale(t.k, t.k);
	}

	fn circle(&self, x: f64, y: f64, radius: f64) {
		self.begin_path();
		let _ = self.arc(x, y, radius, 0.0, 2.0 * PI);
		self.close_path();
	}

	fn rounded_rect(&self, x: f64, y: f64, w: f64, h: f64, r: f64) {
		self.begin_path();
		self.move_to(x + r, y);
		self.line_to(x + w - r, y);
		self.quadratic_curve_to(x + w, y, x + w, y + r);
		self.line_to(x + w, y + h - r);
		self.quadratic_curve_to(x + w, y + h, x + w - r, y + h);
		self.line_to(x + r, y + h);
		self.quadratic_curve_to(x, y + h, x, y + h - r);
		self.line_to(x, y + r);
		self.quadratic_curve_to(x, y, x + r, y);
		self.close_path();
	}

	fn fill_path(&self, color: &str) {
		self.set_fill_style_str(color);
		self.fill();
	}

	fn stroke_path(&self, color: &str, width: f64) {
		self.set_stroke_style_str(color);
		self.set_line_width(width);
		self.stroke();
	}

	fn clip_path(&self) {
		self.clip();
	}

	fn draw_image(&self, image: &HtmlImageElement, x: f64, y: f64, w: f64, h: f64) {
		let _ = self.draw_image_with_html_image_element_and_dw_and_dh(image, x, y, w, h);
	}

	fn line(&self, from: (f64, f64), to: (f64, f64), color: &str, width: f64) {
		self.begin_path();
		self.move_to(from.0, from.1);
		self.line_to(to.0, to.1);
		self.stroke_path(color, width);
	}

	fn text_width(&self, text: &str, font: &str) -> f64 {
		self.set_font(font);
		self.measure_text(text).map(|m| m.width()).unwrap_or(0.0)
	}

	fn text(&self, text: &str, x: f64, y: f64, font: &str, color: &str, anchor: TextAnchor) {
		let (align, baseline) = match anchor {
			TextAnchor::Start => ("start", "alphabetic"),
			TextAnchor::CenterTop => ("center", "top"),
		};
		self.set_font(font);
		self.set_text_align(align);
		self.set_text_baseline(baseline);
		self.set_fill_style_str(color);
		let _ = self.fill_text(text, x, y);
	}
}

/// Radius of every profile node, drawn once on first paint and reused so
/// that a node keeps its size from frame to frame.
#[derive(Clone, Debug, Default)]
pub struct NodeRadii {
	profiles: HashMap<String, f64>,
}

impl NodeRadii {
	pub fn radius(
		&mut self,
		node: &GraphNode,
		sizes: &NodeSizeConfig,
		sample: &mut impl FnMut() -> f64,
	) -> f64 {
		match node.kind {
			NodeType::Group => sizes.group.max(0.0),
			NodeType::Profile => {
				if let Some(&r) = self.profiles.get(&node.id) {
					return r;
				}
				let (min, max) = sizes.profile.bounds();
				let r = min + (max - min) * sample();
				self.profiles.insert(node.id.clone(), r);
				r
			}
		}
	}

	/// Radius without drawing one; unpainted profiles report the minimum.
	pub fn peek(&self, node: &GraphNode, sizes: &NodeSizeConfig) -> f64 {
		match node.kind {
			NodeType::Group => sizes.group.max(0.0),
			NodeType::Profile => self
				.profiles
				.get(&node.id)
				.copied()
				.unwrap_or(sizes.profile.bounds().0),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkStyle {
	pub highlighted: bool,
	pub width: f64,
}

pub fn link_style(
	source: &GraphNode,
	target: &GraphNode,
	hovered: Option<&str>,
	focused: Option<&str>,
	root_group_id: Option<&str>,
) -> LinkStyle {
	let touches = |id: Option<&str>| {
		id.is_some_and(|id| source.id == id || target.id == id)
	};
	let from_root = source.kind.is_group() && root_group_id == Some(source.id.as_str());
	LinkStyle {
		highlighted: touches(hovered) || touches(focused),
		width: if from_root { ROOT_LINK_WIDTH } else { LINK_WIDTH },
	}
}

/// Tooltip box in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelBox {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

/// Places a label box next to a node of `radius` at `center`, trying below,
/// above, right and left in that order. Takes the first spot that overlaps
/// no other node, else the one overlapping the fewest.
pub fn place_label(
	center: (f64, f64),
	radius: f64,
	text_width: f64,
	others: impl IntoIterator<Item = (f64, f64, f64)>,
) -> LabelBox {
	let (width, height) = (text_width + 2.0 * LABEL_PADDING, LABEL_FONT_SIZE + 2.0 * LABEL_PADDING);
	let (x, y) = center;
	// (centre x, top y)
	let candidates = [
		(x, y + radius + LABEL_MARGIN),
		(x, y - radius - height - LABEL_MARGIN),
		(x + radius + LABEL_MARGIN + width / 2.0, y - height / 2.0),
		(x - radius - LABEL_MARGIN - width / 2.0, y - height / 2.0),
	];
	let others: Vec<_> = others.into_iter().collect();

	let mut best = (candidates[0], usize::MAX);
	for (cx, top) in candidates {
		let overlaps = others
			.iter()
			.filter(|(ox, oy, or)| ((cx - ox).powi(2) + (top - oy).powi(2)).sqrt() < or + height)
			.count();
		if overlaps < best.1 {
			best = ((cx, top), overlaps);
		}
		if overlaps == 0 {
			break;
		}
	}

	let ((cx, top), _) = best;
	LabelBox {
		x: cx - width / 2.0,
		y: top,
		width,
		height,
	}
}

/// Everything a frame paints from, borrowed from the graph state.
pub struct Scene<'a, L, I> {
	pub data: &'a GraphData,
	pub layout: &'a L,
	pub images: &'a ImageCache<I>,
	pub palette: &'a Palette,
	pub sizes: &'a NodeSizeConfig,
	pub hovered: Option<&'a str>,
	pub focused: Option<&'a str>,
	pub root_group_id: Option<&'a str>,
	pub zoom: f64,
}

/// Paint callback invocations of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
	pub nodes: usize,
	pub links: usize,
	pub links_drawn: usize,
}

/// Paints links, then nodes, then the focus and hover labels. Expects the
/// world transform to be applied already.
pub fn paint_scene<C, L>(
	ctx: &C,
	scene: &Scene<'_, L, C::Image>,
	radii: &mut NodeRadii,
	sample: &mut impl FnMut() -> f64,
) -> FrameStats
where
	C: DrawContext,
	C::Image: Clone,
	L: Layout,
{
	let mut stats = FrameStats::default();

	for link in scene.data.links() {
		stats.links += 1;
		if paint_link(ctx, link, scene) {
			stats.links_drawn += 1;
		}
	}

	for node in scene.data.nodes() {
		stats.nodes += 1;
		let Some(pos) = scene.layout.position(&node.id) else {
			continue;
		};
		let radius = radii.radius(node, scene.sizes, sample);
		let image = node.photo.as_deref().and_then(|url| scene.images.get(url));
		paint_node(ctx, node, pos, radius, image.as_ref(), scene.palette);
	}

	if let Some(id) = scene.hovered.filter(|&h| Some(h) != scene.focused) {
		paint_hover_label(ctx, id, scene, radii);
	}
	if let Some(id) = scene.focused {
		paint_focus_label(ctx, id, scene, radii);
	}

	stats
}

pub fn paint_node<C: DrawContext>(
	ctx: &C,
	node: &GraphNode,
	(x, y): (f64, f64),
	radius: f64,
	image: Option<&C::Image>,
	palette: &Palette,
) {
	match image {
		Some(image) => {
			ctx.save_state();
			ctx.circle(x, y, radius);
			ctx.clip_path();
			ctx.draw_image(image, x - radius, y - radius, radius * 2.0, radius * 2.0);
			ctx.restore_state();
		}
		None => {
			ctx.circle(x, y, radius);
			ctx.fill_path(&palette.node);
		}
	}

	if node.kind.is_group() {
		ctx.circle(x, y, radius);
		ctx.stroke_path(&palette.group_border, GROUP_BORDER_WIDTH);
	}
}

/// Draws one link; returns false when an endpoint is not resolvable.
pub fn paint_link<C: DrawContext, L: Layout>(
	ctx: &C,
	link: &GraphLink,
	scene: &Scene<'_, L, C::Image>,
) -> bool {
	let (Some(source), Some(target)) =
		(scene.data.node(&link.source), scene.data.node(&link.target))
	else {
		return false;
	};
	let (Some(from), Some(to)) =
		(scene.layout.position(&source.id), scene.layout.position(&target.id))
	else {
		return false;
	};

	let style = link_style(source, target, scene.hovered, scene.focused, scene.root_group_id);
	let color = if style.highlighted {
		&scene.palette.link_hover
	} else {
		&scene.palette.link
	};
	ctx.line(from, to, color, style.width);
	true
}

fn paint_hover_label<C: DrawContext, L: Layout>(
	ctx: &C,
	id: &str,
	scene: &Scene<'_, L, C::Image>,
	radii: &NodeRadii,
) {
	let Some(node) = scene.data.node(id) else {
		return;
	};
	let Some((x, y)) = scene.layout.position(id) else {
		return;
	};
	let radius = radii.peek(node, scene.sizes);
	let font = format!("{}px sans-serif", 10.0 / scene.zoom.max(0.5));
	ctx.text(&node.name, x + radius + 3.0, y + 3.0, &font, &scene.palette.label, TextAnchor::Start);
}

fn paint_focus_label<C: DrawContext, L: Layout>(
	ctx: &C,
	id: &str,
	scene: &Scene<'_, L, C::Image>,
	radii: &NodeRadii,
) {
	let Some(node) = scene.data.node(id) else {
		return;
	};
	let Some(center) = scene.layout.position(id) else {
		return;
	};
	let font = format!("{LABEL_FONT_SIZE}px Sans-Serif");
	let text_width = ctx.text_width(&node.name, &font);
	let others = scene
		.data
		.nodes()
		.iter()
		.filter(|other| other.id != node.id)
		.filter_map(|other| {
			let (ox, oy) = scene.layout.position(&other.id)?;
			Some((ox, oy, radii.peek(other, scene.sizes)))
		});
	let label = place_label(center, radii.peek(node, scene.sizes), text_width, others);

	ctx.rounded_rect(label.x, label.y, label.width, label.height, LABEL_CORNER);
	ctx.fill_path(&scene.palette.tooltip_background);
	ctx.text(
		&node.name,
		label.x + label.width / 2.0,
		label.y + LABEL_PADDING,
		&font,
		&scene.palette.label,
		TextAnchor::CenterTop,
	);
}
