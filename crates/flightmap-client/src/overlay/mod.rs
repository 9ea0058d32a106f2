// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Map overlays for flight paths.
//!
//! The map itself is abstracted behind the [`Renderer`] trait, which mirrors
//! the handful of operations a web map library offers for vector layers:
//! create a styled overlay from a geometry, restyle it, bind a click handler
//! and a popup label, collect overlays into groups and expose groups through a
//! layer-selection control.
//!
//! [`build_overlay`] turns one [`FlightRecord`] into a fully configured overlay
//! and [`OverlayAggregator`] collects those overlays into one named layer.

mod aggregator;

pub use aggregator::OverlayAggregator;

use std::fmt;

use crate::feed::FlightRecord;
use crate::protocol::Geometry;

/// Name of the layer flight paths are collected into.
pub const DEFAULT_LAYER_NAME: &str = "Flights";

/// A CSS color name or hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Color(String);

impl Color {
    pub fn new(css: impl Into<String>) -> Self {
        Self(css.into())
    }

    #[must_use]
    pub fn red() -> Self {
        Self::new("red")
    }

    #[must_use]
    pub fn blue() -> Self {
        Self::new("blue")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual style of an overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStyle {
    pub color: Color,
}

impl OverlayStyle {
    #[must_use]
    pub fn with_color(color: Color) -> Self {
        Self { color }
    }
}

/// Styles for an overlay before and after it has been clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylePalette {
    pub default: OverlayStyle,
    pub selected: OverlayStyle,
}

impl Default for StylePalette {
    fn default() -> Self {
        Self {
            default: OverlayStyle::with_color(Color::red()),
            selected: OverlayStyle::with_color(Color::blue()),
        }
    }
}

/// Click callback.
///
/// Receives the current style of the clicked overlay and returns the style
/// the renderer must apply to that overlay only.
pub type ClickHandler = Box<dyn Fn(&OverlayStyle) -> OverlayStyle + Send + Sync>;

/// The map a pipeline draws on.
///
/// Handles are cheap renderer-owned identifiers. All methods are called from a
/// single task, so implementations need no internal synchronization.
pub trait Renderer {
    /// Handle to one overlay.
    type Overlay: Clone;
    /// Handle to a group of overlays.
    type Group: Clone;

    /// Create an overlay for `geometry`. It is not visible until added to a
    /// group that is on the map.
    fn create_overlay(&mut self, geometry: &Geometry, style: OverlayStyle) -> Self::Overlay;

    fn set_style(&mut self, overlay: &Self::Overlay, style: OverlayStyle);

    /// Register a handler invoked when the overlay is clicked.
    fn on_click(&mut self, overlay: &Self::Overlay, handler: ClickHandler);

    /// Bind a popup label, shown when the user interacts with the overlay.
    fn bind_label(&mut self, overlay: &Self::Overlay, text: &str);

    fn create_group(&mut self) -> Self::Group;

    fn add_to_group(&mut self, group: &Self::Group, overlay: &Self::Overlay);

    /// Register named groups with the layer-selection control.
    fn add_layer_control(&mut self, overlays: &[(String, Self::Group)]);

    fn add_to_map(&mut self, group: &Self::Group);
}

/// Create the overlay for one flight.
///
/// The overlay gets the palette's default style, a click handler switching it
/// to the selected style, and the record's icao as popup label. It is not
/// added to any group.
pub fn build_overlay<R: Renderer>(
    renderer: &mut R,
    record: &FlightRecord,
    palette: &StylePalette,
) -> R::Overlay {
    let overlay = renderer.create_overlay(&record.geometry, palette.default.clone());

    let selected = palette.selected.clone();
    renderer.on_click(&overlay, Box::new(move |_| selected.clone()));
    renderer.bind_label(&overlay, &record.icao);

    overlay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneRenderer;

    fn record(icao: &str) -> FlightRecord {
        FlightRecord {
            icao: icao.to_string(),
            geometry: Geometry::line_string(&[(-112.0, 33.4), (-112.1, 33.5)]),
            status: None,
            landed_airport: None,
            surveillance_score: None,
            live_turns: None,
            last_seen: None,
        }
    }

    #[test]
    fn test_build_overlay_starts_red_with_hidden_label() {
        let mut scene = SceneRenderer::new();
        let overlay = build_overlay(&mut scene, &record("A1B2C3"), &StylePalette::default());

        assert_eq!(scene.style(overlay).unwrap().color, Color::red());
        assert_eq!(scene.label(overlay), Some("A1B2C3"));
        assert!(!scene.popup_open(overlay));
        assert!(scene.visible_overlays().is_empty());
    }

    #[test]
    fn test_click_selects_only_that_overlay() {
        let mut scene = SceneRenderer::new();
        let palette = StylePalette::default();
        let first = build_overlay(&mut scene, &record("AAA111"), &palette);
        let second = build_overlay(&mut scene, &record("BBB222"), &palette);

        assert_eq!(scene.click(first), Some("AAA111"));
        assert_eq!(scene.style(first).unwrap().color, Color::blue());
        assert_eq!(scene.style(second).unwrap().color, Color::red());
    }

    #[test]
    fn test_repeated_clicks_stay_selected() {
        let mut scene = SceneRenderer::new();
        let overlay = build_overlay(&mut scene, &record("A1B2C3"), &StylePalette::default());

        scene.click(overlay);
        assert_eq!(scene.style(overlay).unwrap().color, Color::blue());
        scene.click(overlay);
        assert_eq!(scene.style(overlay).unwrap().color, Color::blue());
    }

    #[test]
    fn test_custom_palette() {
        let mut scene = SceneRenderer::new();
        let palette = StylePalette {
            default: OverlayStyle::with_color(Color::new("#ff8800")),
            selected: OverlayStyle::with_color(Color::new("#0088ff")),
        };
        let overlay = build_overlay(&mut scene, &record("A1B2C3"), &palette);
        assert_eq!(scene.style(overlay).unwrap().color.as_str(), "#ff8800");
        scene.click(overlay);
        assert_eq!(scene.style(overlay).unwrap().color.as_str(), "#0088ff");
    }

    #[test]
    fn test_aggregator_registers_layer_before_overlays_arrive() {
        let mut scene = SceneRenderer::new();
        let layer = OverlayAggregator::attach(&mut scene, DEFAULT_LAYER_NAME);

        assert!(layer.is_empty());
        assert!(scene.is_on_map(*layer.group()));
        assert_eq!(scene.layers(), &[("Flights".to_string(), *layer.group())]);
    }

    #[test]
    fn test_aggregator_adds_configured_overlays() {
        let mut scene = SceneRenderer::new();
        let palette = StylePalette::default();
        let mut layer = OverlayAggregator::attach(&mut scene, DEFAULT_LAYER_NAME);

        let first = layer.add(&mut scene, &record("AAA111"), &palette);
        assert_eq!(scene.visible_overlays(), vec![first]);
        let second = layer.add(&mut scene, &record("BBB222"), &palette);

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.labels(), &["AAA111".to_string(), "BBB222".to_string()]);
        assert_eq!(scene.members(*layer.group()), &[first, second]);
        for overlay in layer.overlays() {
            assert_eq!(scene.style(*overlay).unwrap().color, Color::red());
            assert!(scene.label(*overlay).is_some());
        }
    }
}
