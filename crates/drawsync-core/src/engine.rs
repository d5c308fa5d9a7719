//! Drawing synchronization between chart sessions.
//!
//! A [`SyncSession`] is attached to one chart. It listens to the chart's
//! object notifications, captures the changed objects into snapshots and
//! queues them on every other session in scope. Each receiving session then
//! applies the batch on its own execution context.
//!
//! Applying a batch changes the receiving chart, which in turn notifies the
//! receiving session. Those notifications must not be sent back out, so each
//! session carries an inbound flag: the sender raises it before the handoff
//! and the receiver lowers it once the batch has been applied. Chart
//! notifications are synchronous, so every notification caused by an apply
//! sees the flag raised.
//!
//! Updates are throttled per session. The first update in a debounce window
//! is sent at once; later ones are merged by object name and the latest state
//! of each object is sent when the window closes.

use crate::config::SyncConfig;
use crate::error::HostResult;
use crate::host::{ChangeKind, Chart, ChartIdentity, ChartListener, ChartObject, PropertyUpdate};
use crate::normalize::{VerticalMap, VisibleRange};
use crate::registry::SessionRegistry;
use crate::runtime::Dispatcher;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

/// Leading part of every session key and synthesized object name.
pub const NAME_PREFIX: &str = "SynchronizedDrawings";

/// Name prefix for sessions showing `identity`.
pub fn name_prefix(identity: &ChartIdentity) -> String {
    format!(
        "{}_{}_{}_{}",
        NAME_PREFIX, identity.symbol, identity.time_frame, identity.chart_type
    )
}

/// One broadcast: a change kind, the captured objects and the sender's
/// visible range at capture time. Shared by every target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub change: ChangeKind,
    pub snapshots: Vec<Snapshot>,
    pub source: VisibleRange,
}

/// Why a local change was not sent right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The change was caused by an inbound batch.
    Applying,
    /// An update arrived inside the debounce window. It is held back and
    /// sent with the window's trailing flush.
    Debounced,
    /// No changed object passed the object filter or could be captured.
    NoEligibleObjects,
}

/// Result of handling one local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Suppressed(SuppressReason),
    /// The batch was queued on `targets` sessions; `evicted` sessions were
    /// unreachable and dropped from the registry.
    Sent { targets: usize, evicted: usize },
}

/// What one inbound batch did to the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
}

/// Counters for a session's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub broadcasts: u64,
    pub suppressed: u64,
    /// Trailing flushes of held-back updates.
    pub flushes: u64,
    pub evictions: u64,
    pub batches_applied: u64,
}

#[derive(Default)]
struct Counters {
    broadcasts: AtomicU64,
    suppressed: AtomicU64,
    flushes: AtomicU64,
    evictions: AtomicU64,
    batches_applied: AtomicU64,
}

/// Update throttling state.
#[derive(Default)]
struct Debounce {
    window_opened: Option<Instant>,
    /// Latest held-back state per object name, in first-seen order.
    pending: Vec<Snapshot>,
    /// Sender's range when the latest pending update was captured.
    source: Option<VisibleRange>,
    flush_scheduled: bool,
}

impl Debounce {
    fn hold(&mut self, snapshots: Vec<Snapshot>) {
        for snapshot in snapshots {
            match self.pending.iter_mut().find(|p| p.name == snapshot.name) {
                Some(slot) => *slot = snapshot,
                None => self.pending.push(snapshot),
            }
        }
    }

    fn forget(&mut self, snapshots: &[Snapshot]) {
        self.pending
            .retain(|pending| !snapshots.iter().any(|s| s.name == pending.name));
    }
}

/// Lowers the inbound flag when dropped, including on unwind.
struct InboundGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InboundGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for InboundGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// A batch on its way to one target. Dropping it unapplied (the target's
/// loop refused or discarded it) lowers the target's inbound flag.
struct Delivery {
    target: Arc<SyncSession>,
    batch: Arc<SyncBatch>,
    applied: bool,
}

impl Delivery {
    fn apply(mut self, chart: &mut dyn Chart) {
        self.target.apply(chart, &self.batch);
        self.applied = true;
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.applied {
            log::debug!("{}: batch dropped before apply", self.target.key);
            self.target.applying.store(false, Ordering::SeqCst);
        }
    }
}

enum Upsert {
    Created,
    Updated,
}

/// Synchronization state of one chart.
pub struct SyncSession {
    this: Weak<SyncSession>,
    key: String,
    prefix: String,
    identity: ChartIdentity,
    config: SyncConfig,
    applying: AtomicBool,
    debounce: Mutex<Debounce>,
    dispatcher: Box<dyn Dispatcher>,
    registry: Arc<SessionRegistry>,
    counters: Counters,
}

impl SyncSession {
    /// Attach a session to `chart`.
    ///
    /// Removes objects left over from an earlier run on a chart of the same
    /// identity, registers the session and subscribes it to the chart. Must
    /// be called from the chart's own execution context; `dispatcher` must
    /// feed that same context.
    pub fn start(
        chart: &mut dyn Chart,
        config: SyncConfig,
        dispatcher: Box<dyn Dispatcher>,
        registry: Arc<SessionRegistry>,
    ) -> Arc<Self> {
        let identity = chart.identity().clone();
        let prefix = name_prefix(&identity);
        let key = format!("{}_{}", prefix, chart.server_time().timestamp_micros());

        let stale: Vec<String> = chart
            .objects()
            .iter()
            .map(|object| object.name())
            .filter(|name| name.starts_with(&prefix))
            .map(String::from)
            .collect();
        for name in &stale {
            chart.remove_object(name);
        }

        let session = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            key,
            prefix,
            identity,
            config,
            applying: AtomicBool::new(false),
            debounce: Mutex::new(Debounce::default()),
            dispatcher,
            registry,
            counters: Counters::default(),
        });

        session.registry.register(&session.key, &session);
        let listener: Arc<dyn ChartListener> = session.clone();
        chart.subscribe(listener);

        log::info!(
            "Session {} started ({:?}), purged {} stale objects",
            session.key,
            session.config.mode,
            stale.len()
        );
        session
    }

    /// Registry key of this session.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Prefix shared by this session's key and the names it synthesizes.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn identity(&self) -> &ChartIdentity {
        &self.identity
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether an inbound batch is pending or being applied.
    pub fn is_applying(&self) -> bool {
        self.applying.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            broadcasts: self.counters.broadcasts.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            flushes: self.counters.flushes.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            batches_applied: self.counters.batches_applied.load(Ordering::Relaxed),
        }
    }

    /// Name used for `object` on other charts. Blank names are replaced by
    /// one derived from the session key and the host id.
    pub fn object_name(&self, object: &dyn ChartObject) -> String {
        if object.name().trim().is_empty() {
            format!("{}_{}", self.key, object.host_id())
        } else {
            object.name().to_string()
        }
    }

    /// Send a local change to every session in scope.
    pub fn broadcast(
        &self,
        chart: &dyn Chart,
        change: ChangeKind,
        objects: &[&dyn ChartObject],
    ) -> BroadcastOutcome {
        if self.is_applying() {
            return self.suppress(SuppressReason::Applying);
        }

        let snapshots = self.capture(objects);
        if snapshots.is_empty() {
            return self.suppress(SuppressReason::NoEligibleObjects);
        }

        let source = chart.visible_range();
        let snapshots = match change {
            ChangeKind::Updated => match self.throttle(snapshots, &source) {
                Some(ready) => ready,
                None => return self.suppress(SuppressReason::Debounced),
            },
            ChangeKind::Removed => {
                self.debounce_state().forget(&snapshots);
                snapshots
            }
            ChangeKind::Added => snapshots,
        };

        self.send(change, snapshots, source)
    }

    /// Send the updates held back during the current debounce window.
    ///
    /// Runs on the session's own execution context when the window closes.
    /// Returns `None` if nothing was pending.
    pub fn flush(&self) -> Option<BroadcastOutcome> {
        let (snapshots, source) = {
            let mut state = self.debounce_state();
            state.flush_scheduled = false;
            // Pending updates always come with the range they were captured in.
            let source = state.source.take()?;
            if state.pending.is_empty() {
                return None;
            }
            state.window_opened = Some(Instant::now());
            (std::mem::take(&mut state.pending), source)
        };

        self.counters.flushes.fetch_add(1, Ordering::Relaxed);
        Some(self.send(ChangeKind::Updated, snapshots, source))
    }

    /// Apply an inbound batch to this session's chart.
    ///
    /// Objects are matched by exact name. A failure on one object skips that
    /// object only.
    pub fn apply(&self, chart: &mut dyn Chart, batch: &SyncBatch) -> ApplyReport {
        let _guard = InboundGuard::enter(&self.applying);

        let dest = chart.visible_range();
        let map = VerticalMap::new(self.config.y_axis, &batch.source, &dest);
        let mut report = ApplyReport::default();

        for snapshot in &batch.snapshots {
            match batch.change {
                ChangeKind::Removed => {
                    if chart.remove_object(&snapshot.name) {
                        report.removed += 1;
                    }
                }
                ChangeKind::Added | ChangeKind::Updated => {
                    match Self::upsert(chart, snapshot, &map) {
                        Ok(Upsert::Created) => report.created += 1,
                        Ok(Upsert::Updated) => report.updated += 1,
                        Err(err) => {
                            log::warn!("{}: skipping {:?}: {}", self.key, snapshot.name, err);
                            report.skipped += 1;
                        }
                    }
                }
            }
        }

        self.counters.batches_applied.fetch_add(1, Ordering::Relaxed);
        log::debug!("{}: applied {:?}: {:?}", self.key, batch.change, report);
        report
    }

    fn send(
        &self,
        change: ChangeKind,
        snapshots: Vec<Snapshot>,
        source: VisibleRange,
    ) -> BroadcastOutcome {
        let batch = Arc::new(SyncBatch {
            change,
            snapshots,
            source,
        });

        let targets = self.registry.targets(&self.key, |target| {
            self.config.mode.matches(&self.identity, &target.identity)
        });

        let mut sent = 0;
        let mut evicted = 0;
        for (key, target) in targets {
            target.applying.store(true, Ordering::SeqCst);

            let delivery = Delivery {
                target: Arc::clone(&target),
                batch: Arc::clone(&batch),
                applied: false,
            };
            let handoff = target
                .dispatcher
                .dispatch(Box::new(move |chart: &mut dyn Chart| delivery.apply(chart)));

            match handoff {
                Ok(()) => sent += 1,
                Err(err) => {
                    log::warn!("Evicting {}: {}", key, err);
                    self.registry.remove(&key);
                    evicted += 1;
                }
            }
        }

        log::debug!(
            "{}: {:?} of {} objects sent to {} sessions",
            self.key,
            change,
            batch.snapshots.len(),
            sent
        );
        self.counters.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        BroadcastOutcome::Sent {
            targets: sent,
            evicted,
        }
    }

    fn upsert(
        chart: &mut dyn Chart,
        snapshot: &Snapshot,
        map: &VerticalMap<'_>,
    ) -> HostResult<Upsert> {
        let drawing = snapshot.drawing.remapped(map);
        let update = PropertyUpdate::for_kind(&snapshot.properties, snapshot.kind());

        if chart.find_object(&snapshot.name).is_some() {
            chart.set_drawing(&snapshot.name, &drawing)?;
            chart.set_properties(&snapshot.name, &update)?;
            Ok(Upsert::Updated)
        } else {
            chart.draw(&snapshot.name, &drawing)?;
            chart.set_properties(&snapshot.name, &update)?;
            Ok(Upsert::Created)
        }
    }

    fn capture(&self, objects: &[&dyn ChartObject]) -> Vec<Snapshot> {
        objects
            .iter()
            .filter(|object| self.config.object_type.accepts(object.properties().is_interactive))
            .filter_map(|object| match Snapshot::capture(*object, self.object_name(*object)) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    log::warn!("{}: {}", self.key, err);
                    None
                }
            })
            .collect()
    }

    /// Decide what an update sends now. Returns `None` when the update was
    /// held back for the trailing flush of the open window.
    fn throttle(&self, snapshots: Vec<Snapshot>, source: &VisibleRange) -> Option<Vec<Snapshot>> {
        let window = self.config.debounce();
        if window.is_zero() {
            return Some(snapshots);
        }

        let mut state = self.debounce_state();
        let now = Instant::now();
        match state.window_opened {
            Some(opened) if now.duration_since(opened) < window => {
                state.hold(snapshots);
                state.source = Some(source.clone());
                if !state.flush_scheduled {
                    state.flush_scheduled = self.schedule_flush(opened + window);
                }
                None
            }
            _ => {
                state.window_opened = Some(now);
                state.source = None;
                state.hold(snapshots);
                Some(std::mem::take(&mut state.pending))
            }
        }
    }

    /// Queue a flush on this session's own context. Returns whether it was
    /// queued.
    fn schedule_flush(&self, due: Instant) -> bool {
        let Some(session) = self.this.upgrade() else {
            return false;
        };
        let job = Box::new(move |_: &mut dyn Chart| {
            session.flush();
        });
        match self.dispatcher.dispatch_at(due, job) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}: cannot schedule flush: {}", self.key, err);
                false
            }
        }
    }

    fn debounce_state(&self) -> MutexGuard<'_, Debounce> {
        self.debounce.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn suppress(&self, reason: SuppressReason) -> BroadcastOutcome {
        log::trace!("{}: suppressed ({:?})", self.key, reason);
        self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
        BroadcastOutcome::Suppressed(reason)
    }
}

impl ChartListener for SyncSession {
    fn on_objects_changed(
        &self,
        chart: &dyn Chart,
        change: ChangeKind,
        objects: &[&dyn ChartObject],
    ) {
        self.broadcast(chart, change, objects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, ObjectType, YAxisType};
    use crate::host::MemoryChart;
    use crate::runtime::{ChartLoop, LoopHandle};
    use crate::snapshot::{
        Anchor, Drawing, EquidistantChannel, HorizontalAlignment, HorizontalLine, ObjectProperties,
        Rectangle, StaticText, TrendLine, VerticalAlignment,
    };
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::AtomicI64;
    use std::thread;
    use std::time::Duration;

    static CLOCK: AtomicI64 = AtomicI64::new(0);

    struct Node {
        chart_loop: ChartLoop<MemoryChart>,
        handle: LoopHandle,
        session: Arc<SyncSession>,
    }

    impl Node {
        fn chart(&self) -> &MemoryChart {
            self.chart_loop.chart()
        }

        fn chart_mut(&mut self) -> &mut MemoryChart {
            self.chart_loop.chart_mut()
        }

        fn y_of(&self, name: &str) -> f64 {
            match self.chart().drawing_of(name) {
                Some(Drawing::HorizontalLine(line)) => line.y,
                other => panic!("expected a horizontal line, got {:?}", other),
            }
        }
    }

    fn server_time() -> DateTime<Utc> {
        let seconds = CLOCK.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn start_on(registry: &Arc<SessionRegistry>, chart: MemoryChart, config: SyncConfig) -> Node {
        let (mut chart_loop, handle) = ChartLoop::new(chart);
        let session = SyncSession::start(
            chart_loop.chart_mut(),
            config,
            Box::new(handle.dispatcher()),
            registry.clone(),
        );
        Node {
            chart_loop,
            handle,
            session,
        }
    }

    fn node(
        registry: &Arc<SessionRegistry>,
        symbol: &str,
        time_frame: &str,
        range: (f64, f64),
        config: SyncConfig,
    ) -> Node {
        let identity = ChartIdentity::new(symbol, time_frame, "Candlesticks");
        let chart = MemoryChart::new(identity, range.0, range.1).with_server_time(server_time());
        start_on(registry, chart, config)
    }

    fn hline(y: f64) -> Drawing {
        Drawing::HorizontalLine(HorizontalLine::new(y))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_relative_mapping_between_symbols() {
        let registry = Arc::new(SessionRegistry::new());
        let mut eur = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut gbp = node(&registry, "GBPUSD", "h1", (1.3, 1.5), SyncConfig::default());

        eur.chart_mut().draw("level", &hline(1.10)).unwrap();
        assert_eq!(gbp.chart_loop.run_pending(), 1);

        assert!(approx(gbp.y_of("level"), 1.40));
        assert_eq!(eur.chart_loop.run_pending(), 0);
    }

    #[test]
    fn test_same_symbol_copies_values() {
        let registry = Arc::new(SessionRegistry::new());
        let mut h1 = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut m5 = node(&registry, "EURUSD", "m5", (1.05, 1.07), SyncConfig::default());

        h1.chart_mut().draw("level", &hline(1.10)).unwrap();
        m5.chart_loop.run_pending();

        assert_eq!(m5.y_of("level"), 1.10);
    }

    #[test]
    fn test_absolute_axis_copies_values() {
        let registry = Arc::new(SessionRegistry::new());
        let mut eur = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let absolute = SyncConfig::default().with_y_axis(YAxisType::Absolute);
        let mut gbp = node(&registry, "GBPUSD", "h1", (1.3, 1.5), absolute);

        eur.chart_mut().draw("level", &hline(1.10)).unwrap();
        gbp.chart_loop.run_pending();

        assert_eq!(gbp.y_of("level"), 1.10);
    }

    #[test]
    fn test_channel_height_uses_delta_mapping() {
        let registry = Arc::new(SessionRegistry::new());
        let mut eur = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut gbp = node(&registry, "GBPUSD", "h1", (1.3, 1.7), SyncConfig::default());

        let channel =
            EquidistantChannel::new(Anchor::new(t(1), 1.1), Anchor::new(t(5), 1.15), 0.05);
        eur.chart_mut()
            .draw("channel", &Drawing::EquidistantChannel(channel))
            .unwrap();
        gbp.chart_loop.run_pending();

        match gbp.chart().drawing_of("channel") {
            Some(Drawing::EquidistantChannel(c)) => {
                assert!(approx(c.start.y, 1.5));
                assert!(approx(c.end.y, 1.6));
                assert!(approx(c.channel_height, 0.1));
            }
            other => panic!("unexpected drawing {:?}", other),
        }
    }

    #[test]
    fn test_no_self_echo() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut b = node(&registry, "GBPUSD", "h1", (1.3, 1.5), SyncConfig::default());

        a.chart_mut().draw("level", &hline(1.10)).unwrap();
        assert!(b.session.is_applying());
        b.chart_loop.run_pending();

        assert!(!b.session.is_applying());
        assert_eq!(b.session.stats().broadcasts, 0);
        assert!(b.session.stats().suppressed >= 1);
        assert_eq!(a.chart_loop.run_pending(), 0);
        assert_eq!(a.chart().len(), 1);
    }

    #[test]
    fn test_applying_flag_suppresses_local_changes() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut b = node(&registry, "GBPUSD", "h1", (1.3, 1.5), SyncConfig::default());

        a.session.applying.store(true, Ordering::SeqCst);
        a.chart_mut().draw("level", &hline(1.10)).unwrap();

        let object = a.chart().find_object("level").unwrap();
        let outcome = a.session.broadcast(a.chart(), ChangeKind::Added, &[object]);
        assert_eq!(outcome, BroadcastOutcome::Suppressed(SuppressReason::Applying));
        assert_eq!(b.chart_loop.run_pending(), 0);
        assert!(b.chart().is_empty());
    }

    #[test]
    fn test_added_twice_is_idempotent() {
        let registry = Arc::new(SessionRegistry::new());
        let mut b = node(&registry, "GBPUSD", "h1", (1.3, 1.5), SyncConfig::default());
        let batch = SyncBatch {
            change: ChangeKind::Added,
            snapshots: vec![Snapshot::new("level", hline(1.10))],
            source: VisibleRange::new(1.0, 1.2, "EURUSD"),
        };

        let session = b.session.clone();
        let first = session.apply(b.chart_mut(), &batch);
        let second = session.apply(b.chart_mut(), &batch);

        assert_eq!(first.created, 1);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(b.chart().len(), 1);
        assert!(!session.is_applying());
    }

    #[test]
    fn test_update_of_missing_object_creates_it() {
        let registry = Arc::new(SessionRegistry::new());
        let mut b = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let batch = SyncBatch {
            change: ChangeKind::Updated,
            snapshots: vec![Snapshot::new("level", hline(1.10))],
            source: VisibleRange::new(1.0, 1.2, "EURUSD"),
        };

        let session = b.session.clone();
        let report = session.apply(b.chart_mut(), &batch);
        assert_eq!(report.created, 1);
        assert_eq!(b.y_of("level"), 1.10);
    }

    #[test]
    fn test_removal_follows_mode_scope() {
        let registry = Arc::new(SessionRegistry::new());
        let by_symbol = SyncConfig::default().with_mode(Mode::Symbol);
        let mut source = node(&registry, "EURUSD", "h1", (1.0, 1.2), by_symbol.clone());
        let mut same = node(&registry, "EURUSD", "m5", (1.0, 1.2), by_symbol.clone());
        let mut other = node(&registry, "GBPUSD", "h1", (1.3, 1.5), by_symbol);

        other.chart_mut().draw("x", &hline(1.4)).unwrap();
        source.chart_mut().draw("x", &hline(1.1)).unwrap();
        same.chart_loop.run_pending();
        other.chart_loop.run_pending();
        assert!(same.chart().object("x").is_some());

        source.chart_mut().remove_object("x");
        same.chart_loop.run_pending();
        other.chart_loop.run_pending();

        assert!(same.chart().object("x").is_none());
        assert_eq!(other.y_of("x"), 1.4);
    }

    #[test]
    fn test_time_frame_mode() {
        let registry = Arc::new(SessionRegistry::new());
        let by_time_frame = SyncConfig::default().with_mode(Mode::TimeFrame);
        let mut source = node(&registry, "EURUSD", "h1", (1.0, 1.2), by_time_frame);
        let mut gbp_h1 = node(&registry, "GBPUSD", "h1", (1.3, 1.5), SyncConfig::default());
        let mut eur_m5 = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        source.chart_mut().draw("level", &hline(1.1)).unwrap();

        assert_eq!(gbp_h1.chart_loop.run_pending(), 1);
        assert_eq!(eur_m5.chart_loop.run_pending(), 0);
        assert!(eur_m5.chart().is_empty());
    }

    #[test]
    fn test_debounced_updates_are_flushed() {
        let registry = Arc::new(SessionRegistry::new());
        let config = SyncConfig::default().with_debounce_ms(200);
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), config);
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        a.chart_mut().draw("x", &hline(1.10)).unwrap();
        a.chart_mut().draw("y", &hline(1.05)).unwrap();
        a.chart_mut().set_drawing("x", &hline(1.11)).unwrap();
        a.chart_mut().set_drawing("x", &hline(1.15)).unwrap();
        a.chart_mut().set_drawing("y", &hline(1.01)).unwrap();

        let stats = a.session.stats();
        assert_eq!(stats.broadcasts, 3);
        assert_eq!(stats.suppressed, 2);

        assert_eq!(b.chart_loop.run_pending(), 3);
        assert_eq!(b.y_of("x"), 1.11);
        assert_eq!(b.y_of("y"), 1.05);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(a.chart_loop.run_pending(), 1);
        assert_eq!(a.session.stats().flushes, 1);

        assert_eq!(b.chart_loop.run_pending(), 1);
        assert_eq!(b.y_of("x"), 1.15);
        assert_eq!(b.y_of("y"), 1.01);
    }

    #[test]
    fn test_close_flushes_held_updates() {
        let registry = Arc::new(SessionRegistry::new());
        let config = SyncConfig::default().with_debounce_ms(60_000);
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), config);
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        a.chart_mut().draw("level", &hline(1.10)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.11)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.12)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.13)).unwrap();
        a.chart_mut().draw("other", &hline(1.15)).unwrap();

        assert_eq!(b.chart_loop.run_pending(), 3);
        assert_eq!(b.y_of("level"), 1.11);
        assert_eq!(b.y_of("other"), 1.15);

        a.handle.close();
        assert_eq!(a.chart_loop.run_pending(), 1);
        assert_eq!(a.session.stats().flushes, 1);

        assert_eq!(b.chart_loop.run_pending(), 1);
        assert_eq!(b.y_of("level"), 1.13);
    }

    #[test]
    fn test_removal_drops_held_updates() {
        let registry = Arc::new(SessionRegistry::new());
        let config = SyncConfig::default().with_debounce_ms(60_000);
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), config);
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        a.chart_mut().draw("level", &hline(1.10)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.11)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.12)).unwrap();
        a.chart_mut().remove_object("level");

        assert_eq!(b.chart_loop.run_pending(), 3);
        assert!(b.chart().is_empty());

        a.handle.close();
        a.chart_loop.run_pending();
        assert_eq!(a.session.stats().flushes, 0);
        assert_eq!(b.chart_loop.run_pending(), 0);
        assert!(b.chart().is_empty());
    }

    #[test]
    fn test_zero_debounce_sends_every_update() {
        let registry = Arc::new(SessionRegistry::new());
        let config = SyncConfig::default().with_debounce_ms(0);
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), config);
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        a.chart_mut().draw("level", &hline(1.10)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.11)).unwrap();
        a.chart_mut().set_drawing("level", &hline(1.12)).unwrap();

        assert_eq!(b.chart_loop.run_pending(), 3);
        assert_eq!(b.y_of("level"), 1.12);
    }

    #[test]
    fn test_unreachable_target_is_evicted() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());
        let Node {
            chart_loop: gone_loop,
            session: gone,
            ..
        } = node(&registry, "EURUSD", "m15", (1.0, 1.2), SyncConfig::default());
        drop(gone_loop);

        a.chart_mut().draw("level", &hline(1.10)).unwrap();
        let object = a.chart().find_object("level").unwrap();
        let outcome = a.session.broadcast(a.chart(), ChangeKind::Updated, &[object]);

        assert_eq!(outcome, BroadcastOutcome::Sent { targets: 1, evicted: 0 });
        assert!(!registry.contains(gone.key()));
        assert!(!gone.is_applying());
        assert_eq!(a.session.stats().evictions, 1);
        assert_eq!(b.chart_loop.run_pending(), 2);
        assert_eq!(b.y_of("level"), 1.10);
    }

    #[test]
    fn test_batches_discarded_after_close_lower_the_flag() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());
        b.handle.close();
        b.chart_loop.run_pending();

        a.chart_mut().draw("level", &hline(1.10)).unwrap();
        assert!(b.session.is_applying());

        assert_eq!(b.chart_loop.run_pending(), 0);
        assert!(!b.session.is_applying());
        assert!(b.chart().is_empty());
    }

    #[test]
    fn test_ranges_taken_at_send_and_at_apply() {
        let registry = Arc::new(SessionRegistry::new());
        let mut eur = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut gbp = node(&registry, "GBPUSD", "h1", (1.3, 1.5), SyncConfig::default());

        eur.chart_mut().draw("level", &hline(1.10)).unwrap();
        eur.chart_mut().set_visible_range(2.0, 2.2);
        gbp.chart_mut().set_visible_range(1.5, 1.7);
        assert_eq!(gbp.chart_loop.run_pending(), 1);
        assert!(approx(gbp.y_of("level"), 1.6));

        eur.chart_mut().draw("late", &hline(2.15)).unwrap();
        gbp.chart_loop.run_pending();
        assert!(approx(gbp.y_of("late"), 1.65));
    }

    #[test]
    fn test_group_with_unsupported_object_sends_the_rest() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        let ids = a
            .chart_mut()
            .draw_group(vec![
                ("arrow", None),
                ("level", Some(hline(1.10))),
                ("", Some(hline(1.12))),
            ])
            .unwrap();

        assert_eq!(a.session.stats().broadcasts, 1);
        assert_eq!(a.session.stats().suppressed, 0);
        assert_eq!(b.chart_loop.run_pending(), 1);

        let unnamed = format!("{}_{}", a.session.key(), ids[2]);
        assert_eq!(b.chart().names(), vec!["level".to_string(), unnamed.clone()]);
        assert_eq!(b.y_of("level"), 1.10);
        assert_eq!(b.y_of(&unnamed), 1.12);
    }

    #[test]
    fn test_dead_session_leaves_registry() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());
        let key = b.session.key().to_string();
        assert_eq!(registry.len(), 2);

        drop(b);
        a.chart_mut().draw("level", &hline(1.10)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(&key));
    }

    #[test]
    fn test_static_text_interactivity_left_to_host() {
        let registry = Arc::new(SessionRegistry::new());
        let everything = SyncConfig::default().with_object_type(ObjectType::All);
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), everything);
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        let properties = ObjectProperties {
            comment: "watermark".into(),
            is_interactive: false,
            ..ObjectProperties::default()
        };
        let text = StaticText::new("hello", HorizontalAlignment::Left, VerticalAlignment::Top);
        a.chart_mut()
            .draw_with("label", Drawing::StaticText(text), properties.clone())
            .unwrap();
        let line = TrendLine::new(Anchor::new(t(1), 1.0), Anchor::new(t(2), 1.1));
        a.chart_mut()
            .draw_with("line", Drawing::TrendLine(line), properties)
            .unwrap();
        b.chart_loop.run_pending();

        let label = b.chart().properties_of("label").unwrap();
        assert_eq!(label.comment, "watermark");
        assert!(label.is_interactive);
        assert!(!b.chart().properties_of("line").unwrap().is_interactive);
    }

    #[test]
    fn test_startup_purges_prefixed_objects_only() {
        let registry = Arc::new(SessionRegistry::new());
        let identity = ChartIdentity::new("EURUSD", "h1", "Candlesticks");
        let mut chart = MemoryChart::new(identity, 1.0, 1.2).with_server_time(server_time());
        chart
            .draw("SynchronizedDrawings_EURUSD_h1_Candlesticks_1_7", &hline(1.1))
            .unwrap();
        chart
            .draw("SynchronizedDrawings_GBPUSD_h1_Candlesticks_1_7", &hline(1.1))
            .unwrap();
        chart.draw("support", &hline(1.05)).unwrap();

        let node = start_on(&registry, chart, SyncConfig::default());

        assert_eq!(
            node.chart().names(),
            vec![
                "SynchronizedDrawings_GBPUSD_h1_Candlesticks_1_7".to_string(),
                "support".to_string()
            ]
        );
        assert!(node.session.key().starts_with(node.session.prefix()));
        assert!(registry.contains(node.session.key()));
    }

    #[test]
    fn test_unnamed_objects_get_stable_names() {
        let registry = Arc::new(SessionRegistry::new());
        let config = SyncConfig::default().with_debounce_ms(0);
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), config);
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        let id = a.chart_mut().draw_unnamed(hline(1.10));
        a.chart_mut().set_drawing_by_id(id, hline(1.12)).unwrap();
        b.chart_loop.run_pending();

        let expected = format!("{}_{}", a.session.key(), id);
        assert_eq!(b.chart().names(), vec![expected.clone()]);
        assert_eq!(b.y_of(&expected), 1.12);

        a.chart_mut().remove_by_id(id);
        b.chart_loop.run_pending();
        assert!(b.chart().is_empty());
    }

    #[test]
    fn test_unsupported_and_filtered_objects_are_not_sent() {
        let registry = Arc::new(SessionRegistry::new());
        let mut a = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        let mut b = node(&registry, "EURUSD", "m5", (1.0, 1.2), SyncConfig::default());

        a.chart_mut().draw_unsupported("arrow").unwrap();
        let passive = ObjectProperties {
            is_interactive: false,
            ..ObjectProperties::default()
        };
        a.chart_mut().draw_with("passive", hline(1.1), passive).unwrap();

        assert_eq!(a.session.stats().broadcasts, 0);
        assert_eq!(a.session.stats().suppressed, 2);
        assert_eq!(b.chart_loop.run_pending(), 0);
    }

    #[test]
    fn test_kind_collision_skips_object() {
        let registry = Arc::new(SessionRegistry::new());
        let mut b = node(&registry, "EURUSD", "h1", (1.0, 1.2), SyncConfig::default());
        b.chart_mut().draw("a", &hline(1.1)).unwrap();

        let rect = Rectangle::new(Anchor::new(t(1), 1.0), Anchor::new(t(2), 1.1));
        let batch = SyncBatch {
            change: ChangeKind::Added,
            snapshots: vec![
                Snapshot::new("a", Drawing::Rectangle(rect)),
                Snapshot::new("b", hline(1.15)),
            ],
            source: VisibleRange::new(1.0, 1.2, "EURUSD"),
        };

        let session = b.session.clone();
        let report = session.apply(b.chart_mut(), &batch);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert_eq!(b.y_of("a"), 1.1);
    }

    #[test]
    fn test_sessions_on_threads() {
        let registry = Arc::new(SessionRegistry::new());
        let config = SyncConfig::default().with_debounce_ms(0);
        let a = node(&registry, "EURUSD", "h1", (1.0, 1.2), config.clone());
        let b = node(&registry, "GBPUSD", "h1", (1.3, 1.5), config);

        let a_handle = a.handle.clone();
        let b_handle = b.handle.clone();
        let a_worker = a.chart_loop.spawn();
        let b_worker = b.chart_loop.spawn();

        a_handle
            .run(|chart: &mut dyn Chart| {
                chart.draw("level", &hline(1.10)).unwrap();
            })
            .unwrap();
        a_handle.close();
        let a_chart = a_worker.join().unwrap();

        b_handle.close();
        let b_chart = b_worker.join().unwrap();

        assert_eq!(a_chart.len(), 1);
        match b_chart.drawing_of("level") {
            Some(Drawing::HorizontalLine(line)) => assert!(approx(line.y, 1.40)),
            other => panic!("unexpected drawing {:?}", other),
        }
    }
}
