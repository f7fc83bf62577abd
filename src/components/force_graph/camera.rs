pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

/// Screen = world * k + (x, y).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

/// Axis-aligned world-space box around a set of circles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl Bounds {
	/// Box around `(x, y, radius)` circles, or `None` for an empty set.
	pub fn around(circles: impl IntoIterator<Item = (f64, f64, f64)>) -> Option<Self> {
		circles.into_iter().fold(None, |acc, (x, y, r)| {
			let b = Bounds {
				min_x: x - r,
				min_y: y - r,
				max_x: x + r,
				max_y: y + r,
			};
			Some(match acc {
				None => b,
				Some(a) => Bounds {
					min_x: a.min_x.min(b.min_x),
					min_y: a.min_y.min(b.min_y),
					max_x: a.max_x.max(b.max_x),
					max_y: a.max_y.max(b.max_y),
				},
			})
		})
	}

	fn center(&self) -> (f64, f64) {
		((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
	}
}

trait Lerp: Copy {
	fn lerp(self, to: Self, t: f64) -> Self;
}

impl Lerp for f64 {
	fn lerp(self, to: Self, t: f64) -> Self {
		self + (to - self) * t
	}
}

impl Lerp for (f64, f64) {
	fn lerp(self, to: Self, t: f64) -> Self {
		(self.0.lerp(to.0, t), self.1.lerp(to.1, t))
	}
}

#[derive(Clone, Copy, Debug)]
struct Tween<T> {
	from: T,
	to: T,
	elapsed: f64,
	duration: f64,
}

impl<T: Lerp> Tween<T> {
	fn new(from: T, to: T, duration_ms: u32) -> Self {
		Self {
			from,
			to,
			elapsed: 0.0,
			duration: duration_ms as f64 / 1000.0,
		}
	}

	/// Advances and returns the current value plus whether the tween is done.
	fn step(&mut self, dt: f64) -> (T, bool) {
		self.elapsed += dt;
		let t = if self.duration <= 0.0 {
			1.0
		} else {
			(self.elapsed / self.duration).min(1.0)
		};
		if t >= 1.0 {
			return (self.to, true);
		}
		(self.from.lerp(self.to, ease_out_cubic(t)), false)
	}
}

/// Pan/zoom state. The camera looks at `center` (world) with zoom `k`, and
/// can animate both independently.
#[derive(Clone, Debug)]
pub struct Camera {
	center: (f64, f64),
	k: f64,
	pub width: f64,
	pub height: f64,
	zoom_tween: Option<Tween<f64>>,
	center_tween: Option<Tween<(f64, f64)>>,
}

impl Camera {
	pub fn new(width: f64, height: f64) -> Self {
		Self {
			center: (0.0, 0.0),
			k: 1.0,
			width,
			height,
			zoom_tween: None,
			center_tween: None,
		}
	}

	pub fn transform(&self) -> ViewTransform {
		ViewTransform {
			x: self.width / 2.0 - self.center.0 * self.k,
			y: self.height / 2.0 - self.center.1 * self.k,
			k: self.k,
		}
	}

	pub fn zoom(&self) -> f64 {
		self.k
	}

	pub fn center(&self) -> (f64, f64) {
		self.center
	}

	pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
		let t = self.transform();
		((sx - t.x) / t.k, (sy - t.y) / t.k)
	}

	pub fn is_animating(&self) -> bool {
		self.zoom_tween.is_some() || self.center_tween.is_some()
	}

	pub fn zoom_to(&mut self, k: f64, duration_ms: u32) {
		let k = k.clamp(MIN_ZOOM, MAX_ZOOM);
		self.zoom_tween = Some(Tween::new(self.k, k, duration_ms));
		self.tick(0.0);
	}

	pub fn center_at(&mut self, x: f64, y: f64, duration_ms: u32) {
		self.center_tween = Some(Tween::new(self.center, (x, y), duration_ms));
		self.tick(0.0);
	}

	/// Frames `bounds` with `padding` screen pixels on each side.
	pub fn zoom_to_fit(&mut self, bounds: Option<Bounds>, padding: f64, duration_ms: u32) {
		let Some(bounds) = bounds else {
			return;
		};
		let avail_w = (self.width - 2.0 * padding).max(1.0);
		let avail_h = (self.height - 2.0 * padding).max(1.0);
		let (bw, bh) = (
			(bounds.max_x - bounds.min_x).max(f64::EPSILON),
			(bounds.max_y - bounds.min_y).max(f64::EPSILON),
		);
		let (cx, cy) = bounds.center();
		self.zoom_to((avail_w / bw).min(avail_h / bh), duration_ms);
		self.center_at(cx, cy, duration_ms);
	}

	/// Moves the camera so that `world` sits under the screen point `(sx, sy)`.
	/// Cancels any running animation, as all direct user input does.
	pub fn drag_to(&mut self, world: (f64, f64), sx: f64, sy: f64) {
		self.stop();
		self.center = (
			world.0 - (sx - self.width / 2.0) / self.k,
			world.1 - (sy - self.height / 2.0) / self.k,
		);
	}

	/// Zooms by `factor`, keeping the world point under the cursor fixed.
	pub fn zoom_about(&mut self, sx: f64, sy: f64, factor: f64) {
		let world = self.screen_to_world(sx, sy);
		self.stop();
		self.k = (self.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		self.drag_to(world, sx, sy);
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	pub fn tick(&mut self, dt: f64) {
		if let Some(tween) = self.zoom_tween.as_mut() {
			let (k, done) = tween.step(dt);
			self.k = k;
			if done {
				self.zoom_tween = None;
			}
		}
		if let Some(tween) = self.center_tween.as_mut() {
			let (center, done) = tween.step(dt);
			self.center = center;
			if done {
				self.center_tween = None;
			}
		}
	}

	fn stop(&mut self) {
		self.zoom_tween = None;
		self.center_tween = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_close(a: f64, b: f64) {
		assert!((a - b).abs() < 1e-9, "{a} != {b}");
	}

	#[test]
	fn test_world_origin_starts_at_screen_centre() {
		let camera = Camera::new(800.0, 600.0);
		assert_eq!(
			camera.transform(),
			ViewTransform {
				x: 400.0,
				y: 300.0,
				k: 1.0
			}
		);
		assert_eq!(camera.screen_to_world(400.0, 300.0), (0.0, 0.0));
	}

	#[test]
	fn test_animations_finish_after_duration() {
		let mut camera = Camera::new(800.0, 600.0);
		camera.zoom_to(4.0, 1000);
		camera.center_at(10.0, -20.0, 1000);
		assert!(camera.is_animating());

		camera.tick(0.5);
		assert!(camera.zoom() > 1.0 && camera.zoom() < 4.0);

		camera.tick(0.6);
		assert!(!camera.is_animating());
		assert_close(camera.zoom(), 4.0);
		assert_eq!(camera.center(), (10.0, -20.0));
	}

	#[test]
	fn test_zero_duration_applies_immediately() {
		let mut camera = Camera::new(800.0, 600.0);
		camera.center_at(3.0, 4.0, 0);
		assert_eq!(camera.center(), (3.0, 4.0));
		assert!(!camera.is_animating());
	}

	#[test]
	fn test_zoom_to_fit_contains_every_circle() {
		let mut camera = Camera::new(800.0, 600.0);
		let circles = [(-100.0, 0.0, 10.0), (300.0, 50.0, 20.0), (0.0, -200.0, 5.0)];
		camera.zoom_to_fit(Bounds::around(circles), 20.0, 0);

		let t = camera.transform();
		for (x, y, r) in circles {
			let (sx, sy) = (x * t.k + t.x, y * t.k + t.y);
			let sr = r * t.k;
			assert!(sx - sr >= 20.0 - 1e-6 && sx + sr <= 780.0 + 1e-6);
			assert!(sy - sr >= 20.0 - 1e-6 && sy + sr <= 580.0 + 1e-6);
		}
	}

	#[test]
	fn test_zoom_to_fit_without_nodes_is_noop() {
		let mut camera = Camera::new(800.0, 600.0);
		camera.zoom_to_fit(Bounds::around(std::iter::empty()), 20.0, 400);
		assert!(!camera.is_animating());
		assert_eq!(camera.zoom(), 1.0);
	}

	#[test]
	fn test_zoom_about_keeps_cursor_point_fixed() {
		let mut camera = Camera::new(800.0, 600.0);
		camera.center_at(50.0, 25.0, 0);
		let before = camera.screen_to_world(120.0, 80.0);
		camera.zoom_about(120.0, 80.0, 1.1);
		let after = camera.screen_to_world(120.0, 80.0);
		assert_close(before.0, after.0);
		assert_close(before.1, after.1);
		assert_close(camera.zoom(), 1.1);
	}
}
