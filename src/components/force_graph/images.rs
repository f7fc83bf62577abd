use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::HtmlImageElement;

use super::types::GraphData;

type ImageMap<I> = Rc<RefCell<HashMap<String, I>>>;

/// Avatar images keyed by photo URL.
///
/// Each rebuild starts a fresh generation. Loads that finish after a rebuild
/// land in the map of their own generation and are never seen again.
pub struct ImageCache<I> {
	loaded: ImageMap<I>,
}

impl<I> Default for ImageCache<I> {
	fn default() -> Self {
		Self {
			loaded: Rc::new(RefCell::new(HashMap::new())),
		}
	}
}

impl<I: Clone> ImageCache<I> {
	/// Drops every cached image and returns one slot per distinct photo URL of
	/// `data`, to be filled when the image has loaded.
	pub fn rebuild(&mut self, data: &GraphData) -> Vec<ImageSlot<I>> {
		self.loaded = Rc::new(RefCell::new(HashMap::new()));
		let mut requested = HashSet::new();
		data.nodes()
			.iter()
			.filter_map(|node| node.photo.as_deref())
			.filter(|url| requested.insert(*url))
			.map(|url| ImageSlot {
				url: url.to_string(),
				target: Rc::clone(&self.loaded),
			})
			.collect()
	}

	pub fn get(&self, url: &str) -> Option<I> {
		self.loaded.borrow().get(url).cloned()
	}
}

/// Pending image load for one URL.
pub struct ImageSlot<I> {
	url: String,
	target: ImageMap<I>,
}

impl<I> ImageSlot<I> {
	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn fill(self, image: I) {
		self.target.borrow_mut().insert(self.url, image);
	}
}

/// Starts browser loads for the given slots. Failed loads are left empty so
/// the node falls back to a plain circle.
pub fn start_loading(slots: Vec<ImageSlot<HtmlImageElement>>) {
	for slot in slots {
		let Ok(image) = HtmlImageElement::new() else {
			continue;
		};
		let url = slot.url().to_string();

		let loaded = image.clone();
		let on_load = Closure::once_into_js(move || slot.fill(loaded));
		image.set_onload(Some(on_load.unchecked_ref()));

		let failed_url = url.clone();
		let on_error = Closure::once_into_js(move || debug!("avatar failed to load: {failed_url}"));
		image.set_onerror(Some(on_error.unchecked_ref()));

		image.set_src(&url);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::types::fixtures::node;
	use crate::components::force_graph::types::{GraphData, NodeType};

	fn with_photos() -> GraphData {
		let mut a = node("p1", NodeType::Profile);
		a.photo = Some("https://img/a.png".into());
		let mut b = node("p2", NodeType::Profile);
		b.photo = Some("https://img/a.png".into());
		let mut c = node("g1", NodeType::Group);
		c.photo = Some("https://img/c.png".into());
		GraphData::new(vec![a, b, c, node("p3", NodeType::Profile)], vec![])
	}

	#[test]
	fn test_rebuild_requests_each_url_once() {
		let mut cache = ImageCache::<u32>::default();
		let slots = cache.rebuild(&with_photos());
		let urls: Vec<_> = slots.iter().map(|s| s.url().to_string()).collect();
		assert_eq!(urls, vec!["https://img/a.png", "https://img/c.png"]);
		assert_eq!(cache.loaded.borrow().len(), 0);
	}

	#[test]
	fn test_filled_slot_is_visible() {
		let mut cache = ImageCache::<u32>::default();
		let mut slots = cache.rebuild(&with_photos());
		slots.remove(0).fill(7);
		assert_eq!(cache.get("https://img/a.png"), Some(7));
		assert_eq!(cache.get("https://img/c.png"), None);
	}

	#[test]
	fn test_loads_from_previous_generation_are_abandoned() {
		let mut cache = ImageCache::<u32>::default();
		let stale = cache.rebuild(&with_photos());
		let fresh = cache.rebuild(&with_photos());

		for slot in stale {
			slot.fill(1);
		}
		assert_eq!(cache.loaded.borrow().len(), 0);

		for slot in fresh {
			slot.fill(2);
		}
		assert_eq!(cache.get("https://img/c.png"), Some(2));
	}
}
