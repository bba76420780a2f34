use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, bail};
use hand_cursor::{
    Calibrator, HandTrackingSession, Point2, TemplateSet, TrackingConfig,
    pipeline::{ReplayStream, SessionDriver, detection_channel, load_recording},
    store::FileStore,
};

const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Default)]
struct Args {
    recording: Option<PathBuf>,
    config: Option<PathBuf>,
    templates: Option<PathBuf>,
    store: Option<PathBuf>,
    calibrate: Option<[Point2; 4]>,
    clear_calibration: bool,
}

fn usage() -> &'static str {
    "usage: hand-cursor [--config PATH] [--templates PATH] [--store DIR] \
     [--calibrate \"x,y;x,y;x,y;x,y\"] [--clear-calibration] RECORDING.jsonl"
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().ok_or_else(|| anyhow!("{name} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value("--config")?.into()),
            "--templates" => args.templates = Some(value("--templates")?.into()),
            "--store" => args.store = Some(value("--store")?.into()),
            "--calibrate" => args.calibrate = Some(parse_quad(&value("--calibrate")?)?),
            "--clear-calibration" => args.clear_calibration = true,
            "-h" | "--help" => {
                println!("{}", usage());
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option {other}\n{}", usage()),
            other => args.recording = Some(other.into()),
        }
    }
    Ok(args)
}

fn parse_quad(text: &str) -> Result<[Point2; 4]> {
    let points = text
        .split(';')
        .map(|pair| -> Result<Point2> {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| anyhow!("expected x,y but got {pair:?}"))?;
            Ok(Point2::new(x.trim().parse()?, y.trim().parse()?))
        })
        .collect::<Result<Vec<_>>>()?;
    let count = points.len();
    points
        .try_into()
        .map_err(|_| anyhow!("calibration needs exactly 4 points, got {count}"))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args()?;
    let recording = args
        .recording
        .clone()
        .ok_or_else(|| anyhow!("missing recording\n{}", usage()))?;

    let config = match &args.config {
        Some(path) => TrackingConfig::load(path)?,
        None => TrackingConfig::default(),
    };
    let templates = match &args.templates {
        Some(path) => TemplateSet::load_or_empty(path),
        None => TemplateSet::empty(),
    };
    let store = match &args.store {
        Some(dir) => FileStore::new(dir),
        None => FileStore::default_location(),
    };
    log::info!("calibration store at {}", store.dir().display());

    let mut calibrator = Calibrator::load(Box::new(store), config.calibration.inside_margin);
    if args.clear_calibration {
        calibrator.clear_calibration();
    }
    if let Some(quad) = args.calibrate {
        calibrator.start_calibration();
        for point in quad {
            if let Err(err) = calibrator.submit_point(point) {
                eprintln!("calibration failed: {err}");
            }
        }
    }
    let mode = if calibrator.is_calibrated() { "quad" } else { "full frame" };
    println!("calibration: {} ({mode})", calibrator.status().phase.label());

    let events = load_recording(&recording)
        .with_context(|| format!("cannot replay {}", recording.display()))?;
    println!("replaying {} detections from {}", events.len(), recording.display());

    let session = HandTrackingSession::new(config, calibrator, templates);
    let (tx, rx) = detection_channel();
    let first_ts = events.first().map(|e| e.timestamp_ms).unwrap_or(0.0);
    let replay = ReplayStream::start(events, tx);
    let mut driver = SessionDriver::new(session, rx);

    let started = Instant::now();
    let mut last_line = String::new();
    while !driver.is_finished() {
        let now_ms = first_ts + started.elapsed().as_secs_f64() * 1000.0;
        let state = driver.frame(now_ms);
        let line = state.display_text();
        if line != last_line {
            println!("{:>9.1}ms {line}", now_ms - first_ts);
            last_line = line;
        }
        thread::sleep(FRAME_INTERVAL);
    }

    replay.stop();
    Ok(())
}
