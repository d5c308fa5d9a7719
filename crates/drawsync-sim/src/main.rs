//! Multi-session simulator.
//!
//! Starts a few chart sessions, edits the first one the way a user would and
//! prints every chart's final state as JSON.
//!
//! Usage: `drawsync-sim [config.json]`

use chrono::{DateTime, TimeZone, Utc};
use drawsync_core::snapshot::{
    Anchor, Color, FibonacciRetracement, HorizontalLine, LineStyle, Rectangle, ShapeStyle,
    TrendLine,
};
use drawsync_core::{
    Chart, ChartIdentity, ChartLoop, Drawing, LoopHandle, MemoryChart, SessionRegistry, SyncConfig,
    SyncSession,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Session {
    chart_loop: ChartLoop<MemoryChart>,
    handle: LoopHandle,
    session: Arc<SyncSession>,
}

struct Running {
    handle: LoopHandle,
    session: Arc<SyncSession>,
    worker: JoinHandle<MemoryChart>,
}

impl Session {
    fn spawn(self) -> Running {
        Running {
            handle: self.handle,
            session: self.session,
            worker: self.chart_loop.spawn(),
        }
    }
}

fn start(
    registry: &Arc<SessionRegistry>,
    config: &SyncConfig,
    identity: ChartIdentity,
    range: (f64, f64),
    started_at: i64,
) -> Session {
    let server_time = Utc.timestamp_opt(started_at, 0).single().unwrap_or_else(Utc::now);
    let chart = MemoryChart::new(identity, range.0, range.1).with_server_time(server_time);
    let (mut chart_loop, handle) = ChartLoop::new(chart);

    let session = SyncSession::start(
        chart_loop.chart_mut(),
        config.clone(),
        Box::new(handle.dispatcher()),
        registry.clone(),
    );
    log::info!("Started {}", session.key());

    Session {
        chart_loop,
        handle,
        session,
    }
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn draw(chart: &mut MemoryChart, name: &str, drawing: Drawing) {
    if let Err(err) = chart.draw(name, &drawing) {
        log::warn!("Could not draw {}: {}", name, err);
    }
}

fn hline(y: f64) -> Drawing {
    Drawing::HorizontalLine(HorizontalLine::new(y))
}

/// User edits on the source chart.
fn scribble(chart: &mut MemoryChart) {
    let mut trend = TrendLine::new(Anchor::new(at(2), 1.02), Anchor::new(at(9), 1.16));
    trend.style = ShapeStyle::new(Color::rgb(0x1e, 0x90, 0xff), 2, LineStyle::Solid);
    draw(chart, "trend", Drawing::TrendLine(trend));

    draw(chart, "resistance", hline(1.18));
    draw(chart, "support", hline(1.03));

    let mut zone = Rectangle::new(Anchor::new(at(4), 1.08), Anchor::new(at(7), 1.12));
    zone.style = ShapeStyle::new(Color::rgb(0xff, 0xa5, 0x00), 1, LineStyle::Dots).filled(true);
    draw(chart, "zone", Drawing::Rectangle(zone));

    let fib = FibonacciRetracement::new(Anchor::new(at(1), 1.01), Anchor::new(at(10), 1.19));
    draw(chart, "retracement", Drawing::FibonacciRetracement(fib));

    let pivot = chart.draw_unnamed(hline(1.11));

    // A drag: a burst of updates ending at 1.165.
    for step in 1..=5 {
        let y = 1.18 - 0.003 * f64::from(step);
        if let Err(err) = chart.set_drawing("resistance", &hline(y)) {
            log::warn!("Could not move resistance: {}", err);
        }
    }
    if let Err(err) = chart.set_drawing_by_id(pivot, hline(1.105)) {
        log::warn!("Could not move pivot: {}", err);
    }
    chart.remove_object("support");

    // Scrolled charts still map at the range in effect when the edit happened.
    chart.set_visible_range(1.05, 1.25);
    draw(chart, "late", hline(1.15));
}

fn dump(chart: &MemoryChart, session: &SyncSession) -> serde_json::Value {
    let mut shapes = 0;
    let mut fibonacci = 0;
    let objects: Vec<serde_json::Value> = chart
        .names()
        .into_iter()
        .map(|name| {
            let drawing = chart.drawing_of(&name);
            if let Some(kind) = drawing.map(Drawing::kind) {
                shapes += usize::from(kind.is_shape());
                fibonacci += usize::from(kind.is_fibonacci());
            }
            serde_json::json!({
                "drawing": drawing,
                "properties": chart.properties_of(&name),
                "name": name,
            })
        })
        .collect();

    serde_json::json!({
        "key": session.key(),
        "identity": chart.identity(),
        "visible_range": chart.visible_range(),
        "stats": session.stats(),
        "shapes": shapes,
        "fibonacci_tools": fibonacci,
        "objects": objects,
    })
}

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match SyncConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Failed to load {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => SyncConfig::default(),
    };
    log::info!("Starting drawsync simulator with {:?}", config);

    let registry = SessionRegistry::global();
    let mut source = start(
        &registry,
        &config,
        ChartIdentity::new("EURUSD", "h1", "Candlesticks"),
        (1.0, 1.2),
        1_700_000_000,
    );
    let others: Vec<Running> = vec![
        start(
            &registry,
            &config,
            ChartIdentity::new("GBPUSD", "h1", "Candlesticks"),
            (1.3, 1.5),
            1_700_000_001,
        ),
        start(
            &registry,
            &config,
            ChartIdentity::new("EURUSD", "m15", "Bars"),
            (1.05, 1.15),
            1_700_000_002,
        ),
    ]
    .into_iter()
    .map(Session::spawn)
    .collect();

    // The source is edited from the thread that owns it, before its loop runs.
    scribble(source.chart_loop.chart_mut());
    let source = source.spawn();

    // Let the debounce window close so held-back updates go out.
    thread::sleep(config.debounce() + Duration::from_millis(50));

    // The source stops first so every batch it sent is queued before the
    // other loops are told to close.
    let mut charts = Vec::new();
    for running in std::iter::once(source).chain(others) {
        running.handle.close();
        match running.worker.join() {
            Ok(chart) => charts.push(dump(&chart, &running.session)),
            Err(_) => log::error!("A chart loop panicked"),
        }
    }

    match serde_json::to_string_pretty(&charts) {
        Ok(json) => println!("{}", json),
        Err(err) => log::error!("Failed to serialize charts: {}", err),
    }
}
