// ── Sensor registry ──
//
// Ordered, observable collection of the sensors currently known to the
// engine. The `watch` snapshot is the ordered source of truth; the
// `DashMap` index mirrors it for O(1) lookups by id.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use phimon_api::SensorSummary;

use crate::model::SensorRecord;
use crate::stream::SensorStream;

type Snapshot = Arc<Vec<Arc<SensorRecord>>>;

/// Reactive store for sensor records.
///
/// Writers are serialized through the snapshot channel; readers never
/// block. Every mutation publishes a fresh snapshot to subscribers.
///
/// Only the engine mutates it. Outside this crate it is read-only:
///
/// ```compile_fail
/// let registry = phimon_core::SensorRegistry::new();
/// registry.clear();
/// ```
pub struct SensorRegistry {
    by_id: DashMap<String, Arc<SensorRecord>>,
    snapshot: watch::Sender<Snapshot>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_update, _) = watch::channel(None);
        Self {
            by_id: DashMap::new(),
            snapshot,
            last_update,
        }
    }

    /// Bring membership in line with the backend's inventory.
    ///
    /// Sensors new to the registry are appended; sensors missing from
    /// `inventory` are dropped. Records already present are left alone,
    /// including their last reading. Returns the ids that were dropped.
    pub(crate) fn reconcile_inventory(
        &self,
        inventory: impl IntoIterator<Item = SensorSummary>,
    ) -> Vec<String> {
        let mut pruned = Vec::new();
        let mut added = 0_usize;

        self.snapshot.send_if_modified(|snap| {
            let mut records: Vec<Arc<SensorRecord>> = snap.iter().cloned().collect();
            let mut present: HashSet<String> =
                records.iter().map(|r| r.sensor_id.clone()).collect();
            let mut incoming: HashSet<String> = HashSet::new();

            for summary in inventory {
                incoming.insert(summary.sensor_id.clone());
                if present.insert(summary.sensor_id.clone()) {
                    let record = Arc::new(SensorRecord::from_inventory(summary));
                    self.by_id
                        .insert(record.sensor_id.clone(), Arc::clone(&record));
                    records.push(record);
                    added += 1;
                }
            }

            records.retain(|r| {
                let keep = incoming.contains(&r.sensor_id);
                if !keep {
                    self.by_id.remove(&r.sensor_id);
                    pruned.push(r.sensor_id.clone());
                }
                keep
            });

            if added == 0 && pruned.is_empty() {
                return false;
            }
            *snap = Arc::new(records);
            true
        });

        if added > 0 || !pruned.is_empty() {
            debug!(added, pruned = pruned.len(), "inventory reconciled");
        }
        pruned
    }

    /// Merge fresh readings into the registry.
    ///
    /// Known sensors get their value, timestamp and attachment updated.
    /// Readings for unknown ids are inserted as new records. The result is
    /// re-sorted by name, case-insensitively; ties keep their prior order.
    pub(crate) fn apply_readings(&self, readings: impl IntoIterator<Item = SensorRecord>) {
        self.snapshot.send_modify(|snap| {
            let mut records: Vec<Arc<SensorRecord>> = snap.iter().cloned().collect();

            for reading in readings {
                match records.iter_mut().find(|r| r.sensor_id == reading.sensor_id) {
                    Some(existing) => {
                        Arc::make_mut(existing).apply_reading(&reading);
                        self.by_id
                            .insert(reading.sensor_id.clone(), Arc::clone(existing));
                    }
                    None => {
                        let record = Arc::new(reading);
                        self.by_id
                            .insert(record.sensor_id.clone(), Arc::clone(&record));
                        records.push(record);
                    }
                }
            }

            records.sort_by(|a, b| cmp_names(&a.sensor_name, &b.sensor_name));
            *snap = Arc::new(records);
        });
        self.last_update.send_replace(Some(Utc::now()));
    }

    /// Drop every record.
    pub(crate) fn clear(&self) {
        self.snapshot.send_modify(|snap| {
            self.by_id.clear();
            *snap = Arc::new(Vec::new());
        });
        self.last_update.send_replace(None);
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Current ordered snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn get(&self, sensor_id: &str) -> Option<Arc<SensorRecord>> {
        self.by_id.get(sensor_id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.borrow().is_empty()
    }

    pub fn subscribe(&self) -> SensorStream {
        SensorStream::new(self.snapshot.subscribe())
    }

    /// When readings were last applied, or `None` since the last clear.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    /// How long ago readings were last applied.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_update().map(|t| Utc::now() - t)
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive name ordering.
fn cmp_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
