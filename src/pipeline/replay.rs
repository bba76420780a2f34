use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

use crate::types::DetectionEvent;

pub fn load_recording(path: impl AsRef<Path>) -> Result<Vec<DetectionEvent>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read recording {}", path.display()))?;
    parse_recording(&text).with_context(|| format!("invalid recording {}", path.display()))
}

pub fn parse_recording(text: &str) -> Result<Vec<DetectionEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Sleeps until `deadline` in short slices. False if `stop` was raised first.
fn sleep_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let Some(wait) = deadline.checked_duration_since(Instant::now()) else {
            return true;
        };
        if wait.is_zero() {
            return true;
        }
        thread::sleep(wait.min(SLEEP_SLICE));
    }
}

#[derive(Debug)]
pub struct ReplayStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReplayStream {
    pub fn start(events: Vec<DetectionEvent>, tx: Sender<DetectionEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let Some(first_ts) = events.first().map(|e| e.timestamp_ms) else {
                return;
            };
            let started = Instant::now();
            let total = events.len();

            for event in events {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                let offset =
                    Duration::from_secs_f64(((event.timestamp_ms - first_ts) / 1000.0).max(0.0));
                if !sleep_until(started + offset, &stop_flag) {
                    break;
                }
                if tx.send(event).is_err() {
                    log::warn!("replay receiver dropped");
                    return;
                }
            }
            log::debug!("replay finished after {total} events");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}
