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

//! Retained in-memory map scene.
//!
//! [`SceneRenderer`] implements [`Renderer`] by recording overlays, groups and
//! layer-control entries. It can replay clicks and export what is visible as a
//! GeoJSON `FeatureCollection` with simplestyle properties (`stroke`,
//! `title`), which most map viewers understand.

use serde_json::{json, Value};

use crate::overlay::{ClickHandler, OverlayStyle, Renderer};
use crate::protocol::{Bounds, Geometry};

/// Handle to an overlay in a [`SceneRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(usize);

/// Handle to a group in a [`SceneRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

struct SceneOverlay {
    geometry: Geometry,
    style: OverlayStyle,
    label: Option<String>,
    click_handlers: Vec<ClickHandler>,
    popup_open: bool,
}

#[derive(Default)]
struct SceneGroup {
    members: Vec<OverlayId>,
    on_map: bool,
}

/// In-memory [`Renderer`].
#[derive(Default)]
pub struct SceneRenderer {
    overlays: Vec<SceneOverlay>,
    groups: Vec<SceneGroup>,
    layer_control: Vec<(String, GroupId)>,
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("overlays", &self.overlays.len())
            .field("groups", &self.groups.len())
            .field("layer_control", &self.layer_control)
            .finish()
    }
}

impl SceneRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a click: run the overlay's handlers, then open its popup.
    ///
    /// Returns the popup label, if one is bound.
    pub fn click(&mut self, id: OverlayId) -> Option<&str> {
        let overlay = self.overlays.get(id.0)?;
        let style = overlay
            .click_handlers
            .iter()
            .fold(overlay.style.clone(), |style, handler| handler(&style));
        self.set_style(&id, style);

        let overlay = self.overlays.get_mut(id.0)?;
        overlay.popup_open = overlay.label.is_some();
        overlay.label.as_deref()
    }

    #[must_use]
    pub fn style(&self, id: OverlayId) -> Option<&OverlayStyle> {
        self.overlays.get(id.0).map(|o| &o.style)
    }

    #[must_use]
    pub fn label(&self, id: OverlayId) -> Option<&str> {
        self.overlays.get(id.0).and_then(|o| o.label.as_deref())
    }

    #[must_use]
    pub fn geometry(&self, id: OverlayId) -> Option<&Geometry> {
        self.overlays.get(id.0).map(|o| &o.geometry)
    }

    /// Whether the overlay's popup is currently shown.
    #[must_use]
    pub fn popup_open(&self, id: OverlayId) -> bool {
        self.overlays.get(id.0).is_some_and(|o| o.popup_open)
    }

    #[must_use]
    pub fn members(&self, group: GroupId) -> &[OverlayId] {
        self.groups
            .get(group.0)
            .map_or(&[] as &[OverlayId], |g| g.members.as_slice())
    }

    #[must_use]
    pub fn is_on_map(&self, group: GroupId) -> bool {
        self.groups.get(group.0).is_some_and(|g| g.on_map)
    }

    /// Entries of the layer-selection control, in registration order.
    #[must_use]
    pub fn layers(&self) -> &[(String, GroupId)] {
        &self.layer_control
    }

    /// Overlays that belong to a group shown on the map.
    #[must_use]
    pub fn visible_overlays(&self) -> Vec<OverlayId> {
        self.groups
            .iter()
            .filter(|g| g.on_map)
            .flat_map(|g| g.members.iter().copied())
            .collect()
    }

    /// Extent of all visible overlays.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.visible_overlays()
            .into_iter()
            .filter_map(|id| self.geometry(id).and_then(Geometry::bounds))
            .reduce(Bounds::union)
    }

    fn layer_name(&self, group: GroupId) -> Option<&str> {
        self.layer_control
            .iter()
            .find(|(_, g)| *g == group)
            .map(|(name, _)| name.as_str())
    }

    /// Export visible overlays as a GeoJSON `FeatureCollection`.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let mut features = Vec::new();
        for (index, group) in self.groups.iter().enumerate() {
            if !group.on_map {
                continue;
            }
            let layer = self.layer_name(GroupId(index));
            for overlay in group.members.iter().filter_map(|id| self.overlays.get(id.0)) {
                features.push(json!({
                    "type": "Feature",
                    "geometry": overlay.geometry,
                    "properties": {
                        "layer": layer,
                        "title": overlay.label,
                        "stroke": overlay.style.color.as_str(),
                    },
                }));
            }
        }

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

impl Renderer for SceneRenderer {
    type Overlay = OverlayId;
    type Group = GroupId;

    fn create_overlay(&mut self, geometry: &Geometry, style: OverlayStyle) -> OverlayId {
        self.overlays.push(SceneOverlay {
            geometry: geometry.clone(),
            style,
            label: None,
            click_handlers: Vec::new(),
            popup_open: false,
        });
        OverlayId(self.overlays.len() - 1)
    }

    fn set_style(&mut self, overlay: &OverlayId, style: OverlayStyle) {
        if let Some(o) = self.overlays.get_mut(overlay.0) {
            o.style = style;
        }
    }

    fn on_click(&mut self, overlay: &OverlayId, handler: ClickHandler) {
        if let Some(o) = self.overlays.get_mut(overlay.0) {
            o.click_handlers.push(handler);
        }
    }

    fn bind_label(&mut self, overlay: &OverlayId, text: &str) {
        if let Some(o) = self.overlays.get_mut(overlay.0) {
            o.label = Some(text.to_string());
        }
    }

    fn create_group(&mut self) -> GroupId {
        self.groups.push(SceneGroup::default());
        GroupId(self.groups.len() - 1)
    }

    fn add_to_group(&mut self, group: &GroupId, overlay: &OverlayId) {
        if overlay.0 >= self.overlays.len() {
            return;
        }
        if let Some(g) = self.groups.get_mut(group.0) {
            if !g.members.contains(overlay) {
                g.members.push(*overlay);
            }
        }
    }

    fn add_layer_control(&mut self, overlays: &[(String, GroupId)]) {
        self.layer_control.extend(overlays.iter().cloned());
    }

    fn add_to_map(&mut self, group: &GroupId) {
        if let Some(g) = self.groups.get_mut(group.0) {
            g.on_map = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Color;

    fn red() -> OverlayStyle {
        OverlayStyle::with_color(Color::red())
    }

    #[test]
    fn test_overlay_hidden_until_group_on_map() {
        let mut scene = SceneRenderer::new();
        let overlay = scene.create_overlay(&Geometry::line_string(&[(0.0, 0.0), (1.0, 1.0)]), red());
        let group = scene.create_group();
        scene.add_to_group(&group, &overlay);
        assert!(scene.visible_overlays().is_empty());

        scene.add_to_map(&group);
        assert_eq!(scene.visible_overlays(), vec![overlay]);
    }

    #[test]
    fn test_click_runs_handlers_and_opens_popup() {
        let mut scene = SceneRenderer::new();
        let overlay = scene.create_overlay(&Geometry::line_string(&[(0.0, 0.0)]), red());
        scene.on_click(&overlay, Box::new(|_| OverlayStyle::with_color(Color::new("green"))));
        scene.bind_label(&overlay, "A1B2C3");
        assert!(!scene.popup_open(overlay));

        assert_eq!(scene.click(overlay), Some("A1B2C3"));
        assert!(scene.popup_open(overlay));
        assert_eq!(scene.style(overlay).unwrap().color.as_str(), "green");
    }

    #[test]
    fn test_geojson_export() {
        let mut scene = SceneRenderer::new();
        let group = scene.create_group();
        scene.add_to_map(&group);
        scene.add_layer_control(&[("Flights".to_string(), group)]);
        let overlay = scene.create_overlay(&Geometry::line_string(&[(-112.0, 33.4), (-112.1, 33.5)]), red());
        scene.bind_label(&overlay, "A1B2C3");
        scene.add_to_group(&group, &overlay);

        let hidden = scene.create_overlay(&Geometry::line_string(&[(0.0, 0.0)]), red());
        let hidden_group = scene.create_group();
        scene.add_to_group(&hidden_group, &hidden);

        let export = scene.to_geojson();
        let features = export["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["properties"]["title"], "A1B2C3");
        assert_eq!(features[0]["properties"]["stroke"], "red");
        assert_eq!(features[0]["properties"]["layer"], "Flights");
        assert_eq!(features[0]["geometry"]["type"], "LineString");
    }

    #[test]
    fn test_foreign_overlay_is_not_grouped() {
        let mut other = SceneRenderer::new();
        other.create_overlay(&Geometry::line_string(&[(0.0, 0.0)]), red());
        let foreign = other.create_overlay(&Geometry::line_string(&[(1.0, 1.0)]), red());

        let mut scene = SceneRenderer::new();
        let group = scene.create_group();
        scene.add_to_map(&group);
        scene.add_to_group(&group, &foreign);

        assert!(scene.members(group).is_empty());
        assert_eq!(scene.to_geojson()["features"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_bounds_cover_visible_overlays() {
        let mut scene = SceneRenderer::new();
        let group = scene.create_group();
        scene.add_to_map(&group);
        for points in [[(-112.0, 33.4)], [(-111.0, 34.0)]] {
            let overlay = scene.create_overlay(&Geometry::line_string(&points), red());
            scene.add_to_group(&group, &overlay);
        }

        let bounds = scene.bounds().unwrap();
        assert!((bounds.min_lon - -112.0).abs() < f64::EPSILON);
        assert!((bounds.max_lat - 34.0).abs() < f64::EPSILON);
    }
}
