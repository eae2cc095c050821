//! Composition store - last host snapshot plus derived layer geometry.
//!
//! Sole owner of the committed layer list. Writers:
//! - [`CompositionStore::replace`] / [`CompositionStore::import_json`] swap
//!   the whole snapshot (host refetch, file import)
//! - [`CompositionStore::apply_geometry`] updates one layer in place (drag commit)
//!
//! Tempo/zoom changes go through [`CompositionStore::set_inputs`], which
//! re-derives every geometry from the snapshot.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use super::host::SyncError;
use crate::entities::{derive_on_grid, Composition, GridInputs, GridParameters, LayerGeometry, LayerRecord};

#[derive(Clone, Debug, Default)]
pub struct CompositionStore {
    snapshot: Composition,
    inputs: GridInputs,
    grid: GridParameters,
    /// Keyed by host layer index, in host order
    layers: IndexMap<u32, LayerGeometry>,
}

impl CompositionStore {
    pub fn new(inputs: GridInputs) -> Self {
        Self {
            inputs,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> &Composition {
        &self.snapshot
    }

    pub fn grid(&self) -> &GridParameters {
        &self.grid
    }

    pub fn geometry(&self, layer_index: u32) -> Option<&LayerGeometry> {
        self.layers.get(&layer_index)
    }

    pub fn record(&self, layer_index: u32) -> Option<&LayerRecord> {
        self.snapshot.layer(layer_index)
    }

    /// Geometry for timeline row `row` (0-based, host order).
    pub fn layer_at_row(&self, row: usize) -> Option<&LayerGeometry> {
        self.layers.get_index(row).map(|(_, g)| g)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerGeometry> {
        self.layers.values()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Replace the whole snapshot (host refetch).
    pub fn replace(&mut self, comp: Composition) {
        info!(
            "Composition '{}' loaded: {:.3}s, {} layer(s)",
            comp.name,
            comp.duration,
            comp.layers.len()
        );
        self.snapshot = comp;
        self.regrid();
    }

    /// Change tempo/zoom inputs and re-derive all geometry.
    pub fn set_inputs(&mut self, inputs: GridInputs) {
        if inputs != self.inputs {
            self.inputs = inputs;
            self.regrid();
        }
    }

    fn regrid(&mut self) {
        self.grid = self.inputs.compute(self.snapshot.duration);
        self.layers.clear();

        if self.grid.is_degenerate() {
            // Nothing renders until there is a composition with at least one beat
            debug!("Grid degenerate (duration {:.3}s), no layers laid out", self.snapshot.duration);
            return;
        }

        let width = self.inputs.timeline_width_px;
        for record in &self.snapshot.layers {
            let geometry = derive_on_grid(record, self.snapshot.duration, &self.grid, width);
            if self.layers.insert(record.index, geometry).is_some() {
                warn!("Duplicate layer index {} in composition, keeping last", record.index);
            }
        }
        debug!(
            "Regrid: {} beats, {} bars, {:.2}px/beat, {} layer(s)",
            self.grid.total_beats,
            self.grid.total_bars,
            self.grid.beat_width_px,
            self.layers.len()
        );
    }

    /// Commit one layer's new geometry in place (optimistic drag commit).
    ///
    /// The snapshot record follows so a later regrid keeps the edit.
    /// Returns false when the layer is not in the store.
    pub fn apply_geometry(&mut self, geometry: LayerGeometry) -> bool {
        let index = geometry.index;
        let Some(slot) = self.layers.get_mut(&index) else {
            warn!("Commit for unknown layer {}", index);
            return false;
        };
        if let Some(record) = self.snapshot.layer_mut(index) {
            record.set_span(geometry.in_point, geometry.out_point);
        }
        *slot = geometry;
        true
    }

    // === Interchange ===

    /// Replace the snapshot from an interchange document. All-or-nothing.
    pub fn import_json(&mut self, json: &str) -> Result<(), SyncError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SyncError::InvalidImportDocument(format!("malformed JSON: {}", e)))?;

        let Some(object) = value.as_object() else {
            return Err(SyncError::InvalidImportDocument("expected a JSON object".to_string()));
        };
        for key in ["duration", "layers"] {
            if !object.contains_key(key) {
                return Err(SyncError::InvalidImportDocument(format!("missing '{}'", key)));
            }
        }

        let comp: Composition = serde_json::from_value(value)
            .map_err(|e| SyncError::InvalidImportDocument(e.to_string()))?;
        self.replace(comp);
        Ok(())
    }

    /// Serialize the current snapshot as an interchange document.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot).context("Failed to serialize composition")
    }

    /// Write the snapshot to `path` (`.json` appended if missing).
    pub fn export_to_file<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = path.as_ref();
        let path = if path.extension().and_then(|s| s.to_str()) != Some("json") {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };
        let json = self.export_json()?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Exported composition to {}", path.display());
        Ok(path)
    }

    /// Read an interchange file and replace the snapshot.
    pub fn import_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.import_json(&json)
            .with_context(|| format!("Failed to import {}", path.display()))?;
        Ok(())
    }
}
