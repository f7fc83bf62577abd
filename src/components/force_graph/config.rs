use force_graph::SimulationParameters;
use serde::Deserialize;

use crate::api::DEFAULT_ENDPOINT;

const CUSTOM_PROPERTY_PREFIX: &str = "--";

/// Tunables of the connections graph. Every field has a default, so page
/// props only need to name what they override.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
	pub node_size: NodeSizeConfig,
	pub forces: ForceConfig,
	pub colors: ColorConfig,
	pub camera: CameraConfig,
	pub endpoint: String,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			node_size: NodeSizeConfig::default(),
			forces: ForceConfig::default(),
			colors: ColorConfig::default(),
			camera: CameraConfig::default(),
			endpoint: DEFAULT_ENDPOINT.to_string(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeSizeConfig {
	pub group: f64,
	pub profile: RadiusRange,
}

impl Default for NodeSizeConfig {
	fn default() -> Self {
		Self {
			group: 50.0,
			profile: RadiusRange::default(),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RadiusRange {
	pub min: f64,
	pub max: f64,
}

impl Default for RadiusRange {
	fn default() -> Self {
		Self {
			min: 5.0,
			max: 20.0,
		}
	}
}

impl RadiusRange {
	/// `(min, max)` made drawable: never negative, never inverted.
	pub fn bounds(self) -> (f64, f64) {
		let min = self.min.max(0.0);
		(min, self.max.max(min))
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
	pub link_distance: f64,
	pub charge_strength: f64,
}

impl Default for ForceConfig {
	fn default() -> Self {
		Self {
			link_distance: 50.0,
			charge_strength: -300.0,
		}
	}
}

impl ForceConfig {
	/// Maps link distance and charge onto the simulation. The defaults land on
	/// a spring of 0.05 and a charge of 150.
	pub fn simulation_parameters(&self) -> SimulationParameters {
		SimulationParameters {
			force_charge: (self.charge_strength.abs() / 2.0) as f32,
			force_spring: (2.5 / self.link_distance.max(1.0)) as f32,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		}
	}
}

/// Color settings. Values starting with `--` name CSS custom properties on
/// the document root; anything else is used as a literal canvas color.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorConfig {
	pub node: String,
	pub group_node_border: String,
	pub link: String,
	pub link_hover: String,
	pub tooltip_background: String,
	pub label: String,
	pub background: String,
}

impl Default for ColorConfig {
	fn default() -> Self {
		Self {
			node: "--cx-primary".into(),
			group_node_border: "--success-gradient-color-2".into(),
			link: "--cx-primary".into(),
			link_hover: "--cx-accent".into(),
			tooltip_background: "--cx-tooltip-background".into(),
			label: "white".into(),
			background: "--cx-background".into(),
		}
	}
}

impl ColorConfig {
	pub fn resolve(&self, resolver: &impl ColorResolver) -> Palette {
		let pick = |color: &str, fallback: &str| {
			resolver
				.resolve(color)
				.filter(|c| !c.is_empty())
				.unwrap_or_else(|| fallback.to_string())
		};
		Palette {
			node: pick(&self.node, "#1f77b4"),
			group_border: pick(&self.group_node_border, "#2ca02c"),
			link: pick(&self.link, "rgba(100, 180, 255, 0.6)"),
			link_hover: pick(&self.link_hover, "#ff7f0e"),
			tooltip_background: pick(&self.tooltip_background, "rgba(20, 20, 40, 0.85)"),
			label: pick(&self.label, "white"),
			background: pick(&self.background, "#1a1a2e"),
		}
	}
}

/// Concrete canvas colors, resolved once per graph mount.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
	pub node: String,
	pub group_border: String,
	pub link: String,
	pub link_hover: String,
	pub tooltip_background: String,
	pub label: String,
	pub background: String,
}

pub trait ColorResolver {
	/// Value of a CSS custom property, if defined.
	fn custom_property(&self, name: &str) -> Option<String>;

	fn resolve(&self, color: &str) -> Option<String> {
		if color.starts_with(CUSTOM_PROPERTY_PREFIX) {
			self.custom_property(color)
		} else {
			Some(color.to_string())
		}
	}
}

/// Reads custom properties from the computed style of `<html>`.
pub struct DocumentColors;

impl ColorResolver for DocumentColors {
	fn custom_property(&self, name: &str) -> Option<String> {
		let window = web_sys::window()?;
		let root = window.document()?.document_element()?;
		let style = window.get_computed_style(&root).ok()??;
		let value = style.get_property_value(name).ok()?;
		Some(value.trim().to_string())
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
	/// Zoom level applied when recentring on the focused node.
	pub focus_zoom: f64,
	/// Delay before recentring, giving the simulation time to settle.
	pub focus_delay_ms: u32,
	pub animation_ms: u32,
	pub fit_duration_ms: u32,
	pub fit_padding: f64,
}

impl Default for CameraConfig {
	fn default() -> Self {
		Self {
			focus_zoom: 4.0,
			focus_delay_ms: 2000,
			animation_ms: 1000,
			fit_duration_ms: 400,
			fit_padding: 20.0,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;
	use serde_json::json;

	struct FakeRoot(HashMap<&'static str, &'static str>);

	impl ColorResolver for FakeRoot {
		fn custom_property(&self, name: &str) -> Option<String> {
			self.0.get(name).map(|v| v.to_string())
		}
	}

	#[test]
	fn test_partial_override_keeps_defaults() {
		let config: GraphConfig = serde_json::from_value(json!({
			"nodeSize": { "group": 30 },
			"forces": { "chargeStrength": -500 },
			"camera": { "focusZoom": 2.5 }
		}))
		.unwrap();

		assert_eq!(config.node_size.group, 30.0);
		assert_eq!(config.node_size.profile, RadiusRange { min: 5.0, max: 20.0 });
		assert_eq!(config.forces.link_distance, 50.0);
		assert_eq!(config.forces.charge_strength, -500.0);
		assert_eq!(config.camera.focus_zoom, 2.5);
		assert_eq!(config.camera.focus_delay_ms, 2000);
		assert_eq!(config.endpoint, "/api/connections");
	}

	#[test]
	fn test_default_forces_match_simulation_defaults() {
		let params = ForceConfig::default().simulation_parameters();
		assert_eq!(params.force_charge, 150.0);
		assert!((params.force_spring - 0.05).abs() < 1e-6);
	}

	#[test]
	fn test_custom_properties_resolve_and_literals_pass_through() {
		let root = FakeRoot(HashMap::from([
			("--cx-primary", "#123456"),
			("--cx-accent", "#abcdef"),
		]));
		let colors = ColorConfig {
			label: "black".into(),
			..ColorConfig::default()
		};
		let palette = colors.resolve(&root);

		assert_eq!(palette.node, "#123456");
		assert_eq!(palette.link, "#123456");
		assert_eq!(palette.link_hover, "#abcdef");
		assert_eq!(palette.label, "black");
		// undefined property falls back
		assert_eq!(palette.group_border, "#2ca02c");
	}
}
