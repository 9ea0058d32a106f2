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

use log::debug;

use super::{build_overlay, Renderer, StylePalette};
use crate::feed::FlightRecord;

/// One named, growable layer of flight overlays.
///
/// The group is put on the map and registered with the layer control when the
/// aggregator is attached, so overlays appear one by one as they are added.
/// Overlays are never removed.
pub struct OverlayAggregator<R: Renderer> {
    name: String,
    group: R::Group,
    overlays: Vec<R::Overlay>,
    labels: Vec<String>,
}

impl<R: Renderer> std::fmt::Debug for OverlayAggregator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayAggregator")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> OverlayAggregator<R> {
    /// Create the group, show it on the map and register it as `name`.
    pub fn attach(renderer: &mut R, name: impl Into<String>) -> Self {
        let name = name.into();
        let group = renderer.create_group();
        renderer.add_to_map(&group);
        renderer.add_layer_control(&[(name.clone(), group.clone())]);
        debug!("Attached layer '{name}'");

        Self {
            name,
            group,
            overlays: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Build the overlay for `record` and add it to the group.
    ///
    /// The overlay is fully styled and labelled before it joins the group.
    pub fn add(
        &mut self,
        renderer: &mut R,
        record: &FlightRecord,
        palette: &StylePalette,
    ) -> R::Overlay {
        let overlay = build_overlay(renderer, record, palette);
        renderer.add_to_group(&self.group, &overlay);

        self.overlays.push(overlay.clone());
        self.labels.push(record.icao.clone());
        overlay
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn group(&self) -> &R::Group {
        &self.group
    }

    /// Overlays in the order they were added.
    #[must_use]
    pub fn overlays(&self) -> &[R::Overlay] {
        &self.overlays
    }

    /// Labels of the added overlays, in the order they were added.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}
