//! The update pipeline: one call per monitor event.
//!
//! Holds no state of its own beyond its collaborators. History is
//! best-effort: a failed append is logged and the cache write and render
//! still happen, so the cache and history may drift apart. The same holds
//! when no store could be opened at all.

use std::sync::Arc;

use gauge_protocol::{
    BatterySnapshot, EventOutcome, HistoryEntry, HistoryWrite, MonitorEvent, RawSample,
    VisualState, WidgetId,
};
use tracing::{debug, trace, warn};

use crate::alerts::AlertSink;
use crate::data::history_store::{now_millis, HistoryStore, HistoryStoreError};
use crate::data::normalizer::normalize;
use crate::data::snapshot_cache::SnapshotCache;
use crate::widget::{render, DisplaySurface};

const STORE_UNAVAILABLE: &str = "history store is unavailable";

pub struct UpdateOrchestrator {
    history: Option<Arc<HistoryStore>>,
    cache: Arc<SnapshotCache>,
    surface: Box<dyn DisplaySurface + Send>,
    alerts: Box<dyn AlertSink + Send>,
    record_history: bool,
}

impl UpdateOrchestrator {
    pub fn new(
        history: Option<Arc<HistoryStore>>,
        cache: Arc<SnapshotCache>,
        surface: Box<dyn DisplaySurface + Send>,
        alerts: Box<dyn AlertSink + Send>,
    ) -> Self {
        Self {
            history,
            cache,
            surface,
            alerts,
            record_history: true,
        }
    }

    pub fn with_history_enabled(mut self, enabled: bool) -> Self {
        self.record_history = enabled;
        self
    }

    pub fn handle(&mut self, event: MonitorEvent) -> EventOutcome {
        self.handle_at(event, now_millis())
    }

    /// Handle an event as if it arrived at `now` (milliseconds since epoch).
    pub fn handle_at(&mut self, event: MonitorEvent, now: i64) -> EventOutcome {
        trace!(event = event.kind(), "Handling event");

        match event {
            MonitorEvent::SampleArrived { sample } => self.on_sample(&sample, now),
            MonitorEvent::Low => {
                self.alerts.low();
                EventOutcome::new("LOW")
            }
            MonitorEvent::Okay => {
                self.alerts.okay();
                EventOutcome::new("OKAY")
            }
            MonitorEvent::WidgetRefreshRequest { target_ids } => self.on_refresh(&target_ids),
        }
    }

    fn on_sample(&mut self, raw: &RawSample, now: i64) -> EventOutcome {
        let snapshot = normalize(raw);
        let previous = self.cache.read();

        let mut outcome = EventOutcome::new("SAMPLE_ARRIVED");
        outcome.history = if !self.record_history {
            HistoryWrite::Disabled
        } else if snapshot.level == previous.level {
            trace!(level = snapshot.level, "Level unchanged, skipping history");
            HistoryWrite::Unchanged
        } else {
            self.append_history(now, &snapshot)
        };

        let state = render(snapshot.level, snapshot.is_charging());
        self.cache.write(snapshot);

        let targets = self.surface.targets();
        self.dispatch(&targets, &state, &mut outcome);
        outcome.rendered = Some(state);
        outcome
    }

    fn append_history(&self, now: i64, snapshot: &BatterySnapshot) -> HistoryWrite {
        let Some(history) = &self.history else {
            warn!(level = snapshot.level, "No history store, dropping level change");
            return HistoryWrite::Failed {
                reason: STORE_UNAVAILABLE.to_string(),
            };
        };

        let entry = HistoryEntry::from_snapshot(now, snapshot);
        match history.append(&entry) {
            Ok(row_id) => {
                debug!(level = entry.level, timestamp = now, "Recorded level change");
                HistoryWrite::Appended { row_id }
            }
            Err(HistoryStoreError::DuplicateKey(timestamp)) => {
                warn!(timestamp, "History entry already exists, dropping");
                HistoryWrite::Duplicate { timestamp }
            }
            Err(e) => {
                warn!(error = %e, "Failed to record history");
                HistoryWrite::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn on_refresh(&mut self, target_ids: &[WidgetId]) -> EventOutcome {
        let snapshot = self.cache.read();
        let state = render(snapshot.level, snapshot.is_charging());

        let mut outcome = EventOutcome::new("WIDGET_REFRESH_REQUEST");
        let (present, missing): (Vec<WidgetId>, Vec<WidgetId>) = target_ids
            .iter()
            .cloned()
            .partition(|id| self.surface.contains(id));

        if !missing.is_empty() {
            trace!(?missing, "Skipping unknown widget targets");
        }
        outcome.skipped_targets = missing;

        self.dispatch(&present, &state, &mut outcome);
        outcome.rendered = Some(state);
        outcome
    }

    fn dispatch(&mut self, targets: &[WidgetId], state: &VisualState, outcome: &mut EventOutcome) {
        for id in targets {
            match self.surface.show(id, state) {
                Ok(()) => outcome.updated_targets.push(id.clone()),
                Err(e) => {
                    warn!(widget = %id, error = %e, "Failed to update widget");
                    outcome.skipped_targets.push(id.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    use gauge_protocol::{BatteryStatus, Visibility, VisualElement};
    use tempfile::TempDir;

    use crate::widget::FileSurface;

    type Shown = Arc<Mutex<Vec<(WidgetId, VisualState)>>>;

    struct RecordingSurface {
        targets: Vec<WidgetId>,
        shown: Shown,
    }

    impl DisplaySurface for RecordingSurface {
        fn targets(&self) -> Vec<WidgetId> {
            self.targets.clone()
        }

        fn contains(&self, id: &WidgetId) -> bool {
            self.targets.contains(id)
        }

        fn show(&mut self, id: &WidgetId, state: &VisualState) -> io::Result<()> {
            self.shown.lock().unwrap().push((id.clone(), state.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingAlerts {
        signals: Arc<Mutex<Vec<&'static str>>>,
    }

    impl AlertSink for RecordingAlerts {
        fn low(&mut self) {
            self.signals.lock().unwrap().push("low");
        }

        fn okay(&mut self) {
            self.signals.lock().unwrap().push("okay");
        }
    }

    struct Harness {
        _dir: TempDir,
        orchestrator: UpdateOrchestrator,
        history: Arc<HistoryStore>,
        cache: Arc<SnapshotCache>,
        shown: Shown,
        signals: Arc<Mutex<Vec<&'static str>>>,
    }

    fn harness(targets: &[&str]) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::open_at(dir.path().join("history.db")).unwrap());
        let cache = Arc::new(SnapshotCache::open_at(dir.path().join("snapshot.json")).unwrap());
        let shown = Shown::default();
        let alerts = RecordingAlerts::default();
        let signals = alerts.signals.clone();

        let surface = RecordingSurface {
            targets: targets.iter().map(|t| WidgetId::new(*t)).collect(),
            shown: shown.clone(),
        };
        let orchestrator = UpdateOrchestrator::new(
            Some(history.clone()),
            cache.clone(),
            Box::new(surface),
            Box::new(alerts),
        );

        Harness {
            _dir: dir,
            orchestrator,
            history,
            cache,
            shown,
            signals,
        }
    }

    fn sample(level: i32, status: i32) -> MonitorEvent {
        MonitorEvent::SampleArrived {
            sample: RawSample {
                level: Some(level),
                scale: Some(100),
                status: Some(status),
                ..RawSample::default()
            },
        }
    }

    #[test]
    fn test_first_sample_end_to_end() {
        let mut h = harness(&["default"]);

        let outcome = h.orchestrator.handle_at(sample(38, 2), 1_000);

        let entries = h.history.query().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, 38);
        assert_eq!(entries[0].status, BatteryStatus::Charging);
        assert_eq!(outcome.history, HistoryWrite::Appended { row_id: 1_000 });

        assert_eq!(h.cache.read().level, 38);

        let rendered = outcome.rendered.unwrap();
        assert_eq!(rendered.element, VisualElement::Tier(3));
        assert_eq!(rendered.charging_overlay, Visibility::Visible);
        assert_eq!(outcome.updated_targets, vec![WidgetId::new("default")]);

        let shown = h.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].1, rendered);
    }

    #[test]
    fn test_unchanged_level_skips_history_but_writes_cache() {
        let mut h = harness(&["default"]);
        h.cache.write(BatterySnapshot {
            level: 42,
            status: BatteryStatus::Discharging,
            ..BatterySnapshot::default()
        });

        let outcome = h.orchestrator.handle_at(sample(42, 2), 2_000);

        assert_eq!(outcome.history, HistoryWrite::Unchanged);
        assert!(h.history.query().unwrap().is_empty());
        assert_eq!(h.cache.read().status, BatteryStatus::Charging);
        assert_eq!(h.shown.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_only_level_changes_are_recorded() {
        let mut h = harness(&[]);
        for (ts, level) in [(1, 80), (2, 80), (3, 79), (4, 79), (5, 80)] {
            h.orchestrator.handle_at(sample(level, 3), ts);
        }

        let levels: Vec<(i64, i32)> = h
            .history
            .query()
            .unwrap()
            .iter()
            .map(|e| (e.timestamp, e.level))
            .collect();
        assert_eq!(levels, vec![(1, 80), (3, 79), (5, 80)]);
    }

    #[test]
    fn test_duplicate_timestamp_still_updates_cache() {
        let mut h = harness(&["default"]);
        h.history
            .append(&HistoryEntry::level_only(7_000, 90))
            .unwrap();

        let outcome = h.orchestrator.handle_at(sample(12, 3), 7_000);

        assert_eq!(outcome.history, HistoryWrite::Duplicate { timestamp: 7_000 });
        assert_eq!(h.history.query().unwrap()[0].level, 90);
        assert_eq!(h.cache.read().level, 12);
        assert!(outcome.rendered.is_some());
    }

    #[test]
    fn test_storage_failure_does_not_block_cache_or_render() {
        let mut h = harness(&["default"]);
        {
            let conn = rusqlite::Connection::open(h.history.path()).unwrap();
            conn.execute_batch("DROP TABLE battery_log;").unwrap();
        }

        let outcome = h.orchestrator.handle_at(sample(64, 3), 9_000);

        assert!(matches!(outcome.history, HistoryWrite::Failed { .. }));
        assert_eq!(h.cache.read().level, 64);
        assert_eq!(outcome.updated_targets, vec![WidgetId::new("default")]);
    }

    #[test]
    fn test_unopenable_store_still_writes_cache_and_widgets() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        std::fs::write(&db_path, vec![0x42u8; 4096]).unwrap();
        assert!(HistoryStore::open_at(&db_path).is_err());

        let cache = Arc::new(SnapshotCache::open_at(dir.path().join("snapshot.json")).unwrap());
        let widgets = dir.path().join("widgets");
        let surface = FileSurface::at(&widgets, [WidgetId::new("default")]);
        let mut orchestrator = UpdateOrchestrator::new(
            None,
            cache.clone(),
            Box::new(surface),
            Box::new(RecordingAlerts::default()),
        );

        let outcome = orchestrator.handle_at(sample(38, 2), 1_000);

        assert_eq!(
            outcome.history,
            HistoryWrite::Failed {
                reason: STORE_UNAVAILABLE.to_string()
            }
        );
        assert_eq!(outcome.updated_targets, vec![WidgetId::new("default")]);
        cache.flush().unwrap();
        assert_eq!(cache.read().level, 38);
        assert!(dir.path().join("snapshot.json").exists());
        assert!(widgets.join("default.txt").exists());
    }

    #[test]
    fn test_missing_store_with_unchanged_level_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(SnapshotCache::open_at(dir.path().join("snapshot.json")).unwrap());
        let mut orchestrator = UpdateOrchestrator::new(
            None,
            cache,
            Box::new(FileSurface::at(dir.path().join("widgets"), [])),
            Box::new(RecordingAlerts::default()),
        );

        let outcome = orchestrator.handle_at(sample(50, 3), 1);

        assert_eq!(outcome.history, HistoryWrite::Unchanged);
    }

    #[test]
    fn test_disabled_history_is_never_written() {
        let Harness {
            _dir,
            orchestrator,
            history,
            cache,
            ..
        } = harness(&[]);
        let mut orchestrator = orchestrator.with_history_enabled(false);

        let outcome = orchestrator.handle_at(sample(20, 3), 1);

        assert_eq!(outcome.history, HistoryWrite::Disabled);
        assert!(history.query().unwrap().is_empty());
        assert_eq!(cache.read().level, 20);
    }

    #[test]
    fn test_refresh_reads_cache_and_targets_only_listed_ids() {
        let mut h = harness(&["bar", "dock", "panel"]);
        h.cache.write(BatterySnapshot {
            level: 55,
            status: BatteryStatus::Full,
            ..BatterySnapshot::default()
        });

        let outcome = h.orchestrator.handle_at(
            MonitorEvent::WidgetRefreshRequest {
                target_ids: vec![WidgetId::new("dock"), WidgetId::new("gone")],
            },
            1,
        );

        assert_eq!(outcome.history, HistoryWrite::NotApplicable);
        assert_eq!(outcome.updated_targets, vec![WidgetId::new("dock")]);
        assert_eq!(outcome.skipped_targets, vec![WidgetId::new("gone")]);
        assert!(h.history.query().unwrap().is_empty());

        let shown = h.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, WidgetId::new("dock"));
        assert_eq!(shown[0].1.tier(), Some(5));
        assert!(shown[0].1.charging_overlay.is_visible());
    }

    #[test]
    fn test_low_and_okay_only_signal() {
        let mut h = harness(&["default"]);

        let low = h.orchestrator.handle_at(MonitorEvent::Low, 1);
        let okay = h.orchestrator.handle_at(MonitorEvent::Okay, 2);

        assert_eq!(low.history, HistoryWrite::NotApplicable);
        assert_eq!(okay.event, "OKAY");
        assert_eq!(*h.signals.lock().unwrap(), vec!["low", "okay"]);
        assert!(h.history.query().unwrap().is_empty());
        assert!(h.shown.lock().unwrap().is_empty());
        assert_eq!(h.cache.read(), BatterySnapshot::default());
    }
}
