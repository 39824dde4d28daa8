//! Tiered-precision value store
//!
//! Cells are keyed by id and quantized at `min(layer level, global level)`.
//! The global level is the shared budget: lowering it shrinks the modeled
//! memory footprint, and it can follow memory pressure and the controller's
//! FPS ratio.

use super::codec::{
    decode, encode_at_level, precision_name, requantize, scale_for, EncodedValue, ResidueTable,
    MAX_INTEGER_PART,
};
use crate::config::{BandPosition, TuningConfig, MAX_PRECISION_LEVEL};
use crate::error::{IoResultExt, PerfTierError, Result};
use crate::notify::{NotificationSink, TuningEvent};
use crate::perf::FpsRatioSource;
use crate::system::{HardwareProfile, DEFAULT_MEMORY_GB};
use chrono::{DateTime, Utc};
use humansize::{format_size, BINARY};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bytes per GB in the memory model
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One quantized named value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionCell {
    /// Cell id
    pub id: String,
    /// Current encoding
    pub encoded: EncodedValue,
    /// Last encode or re-quantization
    pub last_updated: DateTime<Utc>,
}

/// Outcome of [`PrecisionManager::optimize_for_memory`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    /// Estimated usage fits the target
    pub success: bool,
    /// Level before
    pub previous_level: u8,
    /// Level after
    pub new_level: u8,
    /// Name of the level before
    pub previous_precision: &'static str,
    /// Name of the level after
    pub new_precision: &'static str,
    /// Modeled usage before, in GB
    pub estimated_gb_before: f64,
    /// Modeled usage after, in GB
    pub estimated_gb_after: f64,
    /// Requested budget, in GB
    pub target_gb: f64,
}

impl OptimizationResult {
    /// Print a human-readable summary
    pub fn print_summary(&self) {
        let before = format_size((self.estimated_gb_before * BYTES_PER_GB) as u64, BINARY);
        let after = format_size((self.estimated_gb_after * BYTES_PER_GB) as u64, BINARY);
        let target = format_size((self.target_gb.max(0.0) * BYTES_PER_GB) as u64, BINARY);

        println!("\n=== Precision Optimization ===");
        println!("Target:     {}", target);
        println!("Precision:  {} -> {}", self.previous_precision, self.new_precision);
        println!("Estimated:  {} -> {}", before, after);
        println!("Result:     {}", if self.success { "fits" } else { "over budget at floor" });
    }
}

/// Store counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecisionMetrics {
    /// Values encoded
    pub encodes: u64,
    /// Cells created
    pub registrations: u64,
    /// Global level changes
    pub level_changes: u64,
}

/// Cell as it appears in a snapshot, residue inlined
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CellSnapshot {
    integer_part: i64,
    residue: i64,
    precision_level: u8,
    layer: u32,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrecisionSnapshot {
    level: u8,
    scale: i64,
    cells: BTreeMap<String, CellSnapshot>,
    metrics: PrecisionMetrics,
}

/// Tiered-precision value store
pub struct PrecisionManager {
    level: u8,
    scale: i64,
    config: TuningConfig,
    cells: HashMap<String, PrecisionCell>,
    residues: ResidueTable,
    fps_source: Option<Arc<dyn FpsRatioSource>>,
    sink: Option<Arc<dyn NotificationSink>>,
    memory_gb: f64,
    metrics: PrecisionMetrics,
}

impl PrecisionManager {
    /// Create an empty store at the configured maximum level
    pub fn new(config: &TuningConfig) -> Self {
        let level = config.max_precision_level.min(MAX_PRECISION_LEVEL);
        Self {
            level,
            scale: scale_for(level),
            config: config.clone(),
            cells: HashMap::new(),
            residues: ResidueTable::new(),
            fps_source: None,
            sink: None,
            memory_gb: DEFAULT_MEMORY_GB,
            metrics: PrecisionMetrics::default(),
        }
    }

    /// Read FPS ratios from the controller (or any other source)
    pub fn with_fps_source(mut self, source: Arc<dyn FpsRatioSource>) -> Self {
        self.fps_source = Some(source);
        self
    }

    /// Attach a notification sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Take the memory hint from a hardware profile
    pub fn with_profile(mut self, profile: &HardwareProfile) -> Self {
        self.set_memory_hint(profile.memory_gb);
        self
    }

    /// Host memory used for the base recommendation
    pub fn set_memory_hint(&mut self, memory_gb: f64) {
        self.memory_gb = if memory_gb.is_finite() && memory_gb > 0.0 {
            memory_gb
        } else {
            DEFAULT_MEMORY_GB
        };
    }

    /// Current global level
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Always `10^level`
    pub fn scale(&self) -> i64 {
        self.scale
    }

    /// Name of the current global level
    pub fn precision_name(&self) -> &'static str {
        precision_name(self.level)
    }

    /// Number of registered cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Look up a cell
    pub fn cell(&self, id: &str) -> Option<&PrecisionCell> {
        self.cells.get(id)
    }

    /// Residue arena backing the cells
    pub fn residues(&self) -> &ResidueTable {
        &self.residues
    }

    /// Store counters
    pub fn metrics(&self) -> &PrecisionMetrics {
        &self.metrics
    }

    /// Create a cell unless one already exists
    ///
    /// An existing cell is returned as is; `initial` is ignored for it.
    pub fn register_cell(&mut self, id: &str, initial: f64) -> &PrecisionCell {
        let level = self.config.default_layer_level.min(self.level);
        let residues = &mut self.residues;
        let metrics = &mut self.metrics;
        self.cells.entry(id.to_string()).or_insert_with(|| {
            metrics.registrations += 1;
            PrecisionCell {
                id: id.to_string(),
                encoded: encode_at_level(initial, level, 0, residues, None),
                last_updated: Utc::now(),
            }
        })
    }

    /// Quantize `value` for `data_id` at the level its layer allows
    ///
    /// Creates the cell on first use; later calls overwrite it and reuse its
    /// residue slot.
    pub fn encode(&mut self, data_id: &str, value: f64, layer: u32) -> EncodedValue {
        let level = self.config.level_for_layer(layer).min(self.level);
        let existing = self.cells.get(data_id).and_then(|c| c.encoded.residue);
        let encoded = encode_at_level(value, level, layer, &mut self.residues, existing);
        self.metrics.encodes += 1;

        match self.cells.get_mut(data_id) {
            Some(cell) => {
                cell.encoded = encoded;
                cell.last_updated = Utc::now();
            }
            None => {
                self.metrics.registrations += 1;
                self.cells.insert(
                    data_id.to_string(),
                    PrecisionCell {
                        id: data_id.to_string(),
                        encoded,
                        last_updated: Utc::now(),
                    },
                );
            }
        }
        encoded
    }

    /// Reconstruct an encoded value against this store's residues
    pub fn decode(&self, encoded: &EncodedValue) -> f64 {
        decode(encoded, &self.residues)
    }

    /// Current value of a cell
    pub fn value(&self, id: &str) -> Option<f64> {
        self.cells.get(id).map(|c| decode(&c.encoded, &self.residues))
    }

    /// Re-quantize one cell, level clamped to [0, max]
    pub fn set_precision(&mut self, cell_id: &str, level: u8) -> Result<EncodedValue> {
        let level = level.min(self.max_level());
        let cell = self
            .cells
            .get_mut(cell_id)
            .ok_or_else(|| PerfTierError::UnknownCell(cell_id.to_string()))?;

        cell.encoded = requantize(&cell.encoded, level, &mut self.residues);
        cell.last_updated = Utc::now();
        debug!("Cell {} re-quantized to {}", cell_id, precision_name(level));
        Ok(cell.encoded)
    }

    /// Set the global level, clamped to [0, max]; returns the applied level
    pub fn set_global_precision(&mut self, level: u8) -> u8 {
        let level = level.min(self.max_level());
        if level != self.level {
            let previous = self.level;
            self.level = level;
            self.scale = scale_for(level);
            self.metrics.level_changes += 1;
            info!(
                "Global precision {} -> {}",
                precision_name(previous),
                precision_name(level)
            );
            self.notify(TuningEvent::precision_changed(level));
        }
        self.level
    }

    fn max_level(&self) -> u8 {
        self.config.max_precision_level.min(MAX_PRECISION_LEVEL)
    }

    /// Percent of modeled memory saved by moving to `target`
    pub fn estimate_memory_savings(&self, target: u8) -> f64 {
        let target = target.min(MAX_PRECISION_LEVEL);
        if target >= self.level {
            return 0.0;
        }
        (1.0 - scale_for(target) as f64 / self.scale as f64) * 100.0
    }

    /// Percent of resolution lost by moving to `target`, e.g. `"99.00%"`
    pub fn estimate_precision_loss(&self, target: u8) -> String {
        let target = target.min(MAX_PRECISION_LEVEL);
        let loss = if target >= self.level {
            0.0
        } else {
            (self.scale - scale_for(target)) as f64 / self.scale as f64 * 100.0
        };
        format!("{:.2}%", loss)
    }

    /// Modeled usage in GB at `level`
    pub fn estimated_memory_gb(&self, level: u8) -> f64 {
        let full = scale_for(MAX_PRECISION_LEVEL) as f64;
        self.cells.len() as f64 * self.config.per_cell_bytes as f64 * scale_for(level) as f64
            / full
            / BYTES_PER_GB
    }

    /// Lower the global level one step at a time until usage fits
    ///
    /// Never raises the level. Reports failure when the floor is reached
    /// and usage is still over target.
    pub fn optimize_for_memory(&mut self, target_gb: f64) -> OptimizationResult {
        let previous_level = self.level;
        let estimated_gb_before = self.estimated_memory_gb(previous_level);

        let mut level = previous_level;
        if target_gb.is_finite() {
            while level > 0 && self.estimated_memory_gb(level) > target_gb {
                level -= 1;
            }
        } else {
            warn!("Ignoring non-finite memory target {}", target_gb);
        }

        let estimated_gb_after = self.estimated_memory_gb(level);
        let success = target_gb.is_finite() && estimated_gb_after <= target_gb;
        self.set_global_precision(level);

        if !success {
            warn!(
                "Precision store still over budget at {} ({:.6} GB > {:.6} GB)",
                precision_name(level),
                estimated_gb_after,
                target_gb
            );
        }

        OptimizationResult {
            success,
            previous_level,
            new_level: level,
            previous_precision: precision_name(previous_level),
            new_precision: precision_name(level),
            estimated_gb_before,
            estimated_gb_after,
            target_gb,
        }
    }

    /// Level suggested by host memory, nudged one step by the FPS ratio
    pub fn recommend_precision_mode(&self) -> u8 {
        let base: u8 = match self.memory_gb {
            m if m < 4.0 => 1,
            m if m < 8.0 => 2,
            m if m < 16.0 => 3,
            _ => 4,
        };

        let ratio = self.fps_source.as_ref().and_then(|s| s.fps_ratio());
        let recommended = match ratio.map(|r| self.config.hysteresis.position(r)) {
            Some(BandPosition::Below) => base.saturating_sub(1),
            Some(BandPosition::Above) => base + 1,
            Some(BandPosition::Within) | None => base,
        };
        recommended.min(self.max_level())
    }

    /// Apply the recommendation if it differs; returns the new level
    pub fn auto_adjust_precision(&mut self) -> Option<u8> {
        let recommended = self.recommend_precision_mode();
        if recommended == self.level {
            return None;
        }
        Some(self.set_global_precision(recommended))
    }

    /// Drop every cell and residue and return to the maximum level
    pub fn reset(&mut self) {
        self.cells.clear();
        self.residues.clear();
        self.metrics = PrecisionMetrics::default();
        let max = self.max_level();
        self.set_global_precision(max);
    }

    fn notify(&self, event: TuningEvent) {
        if let Some(sink) = &self.sink {
            sink.notify(&event);
        }
    }

    /// Export level, cells and counters
    pub fn export_snapshot(&self) -> Result<serde_json::Value> {
        let cells = self
            .cells
            .iter()
            .map(|(id, cell)| {
                let e = &cell.encoded;
                let residue = e.residue.and_then(|r| self.residues.get(r)).unwrap_or(0);
                (
                    id.clone(),
                    CellSnapshot {
                        integer_part: e.integer_part,
                        residue,
                        precision_level: e.precision_level,
                        layer: e.layer,
                        last_updated: cell.last_updated,
                    },
                )
            })
            .collect();

        let snapshot = PrecisionSnapshot {
            level: self.level,
            scale: self.scale,
            cells,
            metrics: self.metrics.clone(),
        };
        Ok(serde_json::to_value(snapshot)?)
    }

    /// Validate and apply a snapshot
    ///
    /// The store is rebuilt aside and swapped in only if every cell checks
    /// out.
    pub fn import_snapshot(&mut self, value: &serde_json::Value) -> Result<()> {
        let snapshot = PrecisionSnapshot::deserialize(value)
            .map_err(|e| PerfTierError::snapshot(format!("precision snapshot: {}", e)))?;

        if snapshot.level > self.max_level() {
            return Err(PerfTierError::snapshot(format!(
                "level {} above maximum {}",
                snapshot.level,
                self.max_level()
            )));
        }
        if snapshot.scale != scale_for(snapshot.level) {
            return Err(PerfTierError::snapshot(format!(
                "scale {} does not match level {}",
                snapshot.scale, snapshot.level
            )));
        }

        let mut residues = ResidueTable::new();
        let mut cells = HashMap::with_capacity(snapshot.cells.len());
        for (id, cell) in snapshot.cells {
            if cell.precision_level > MAX_PRECISION_LEVEL {
                return Err(PerfTierError::snapshot(format!(
                    "cell {} has level {}",
                    id, cell.precision_level
                )));
            }
            if cell.integer_part.unsigned_abs() > MAX_INTEGER_PART.unsigned_abs() {
                return Err(PerfTierError::snapshot(format!(
                    "cell {} integer part {} outside encodable range",
                    id, cell.integer_part
                )));
            }
            let scale = scale_for(cell.precision_level);
            if cell.residue.unsigned_abs() >= scale.unsigned_abs() {
                return Err(PerfTierError::snapshot(format!(
                    "cell {} residue {} exceeds scale {}",
                    id, cell.residue, scale
                )));
            }
            let residue = (cell.residue != 0).then(|| residues.alloc(cell.residue));
            let encoded = EncodedValue {
                integer_part: cell.integer_part,
                residue,
                precision_level: cell.precision_level,
                layer: cell.layer,
                scale,
            };
            cells.insert(
                id.clone(),
                PrecisionCell {
                    id,
                    encoded,
                    last_updated: cell.last_updated,
                },
            );
        }

        let previous = self.level;
        self.cells = cells;
        self.residues = residues;
        self.metrics = snapshot.metrics;
        self.level = snapshot.level;
        self.scale = scale_for(snapshot.level);
        if previous != self.level {
            self.notify(TuningEvent::precision_changed(self.level));
        }
        Ok(())
    }

    /// Write the snapshot to a JSON file
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.export_snapshot()?)?;
        std::fs::write(path, content).with_path(path)
    }

    /// Read and apply a snapshot from a JSON file
    pub fn load_snapshot(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| PerfTierError::snapshot(format!("{}: {}", path.display(), e)))?;
        self.import_snapshot(&value)
    }
}
