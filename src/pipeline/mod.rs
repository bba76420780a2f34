mod replay;

pub use replay::{ReplayStream, load_recording, parse_recording};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

use crate::{
    session::HandTrackingSession,
    types::{CursorState, DetectionEvent},
};

const DETECTION_QUEUE: usize = 64;

pub fn detection_channel() -> (Sender<DetectionEvent>, Receiver<DetectionEvent>) {
    bounded(DETECTION_QUEUE)
}

pub struct SessionDriver {
    session: HandTrackingSession,
    detections: Receiver<DetectionEvent>,
    disconnected: bool,
}

impl SessionDriver {
    pub fn new(session: HandTrackingSession, detections: Receiver<DetectionEvent>) -> Self {
        Self {
            session,
            detections,
            disconnected: false,
        }
    }

    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.detections.try_recv() {
                Ok(event) => {
                    self.session
                        .on_detection(event.hand.as_ref(), event.timestamp_ms);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        log::info!("detection source disconnected");
                    }
                    self.disconnected = true;
                    break;
                }
            }
        }
        applied
    }

    pub fn frame(&mut self, now_ms: f64) -> CursorState {
        self.pump();
        self.session.tick(now_ms)
    }

    pub fn is_finished(&self) -> bool {
        self.disconnected && self.detections.is_empty()
    }

    pub fn session(&self) -> &HandTrackingSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut HandTrackingSession {
        &mut self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibration::Calibrator, config::TrackingConfig, gesture::test_hands::hand,
        store::MemoryStore, templates::TemplateSet,
    };

    fn driver() -> (Sender<DetectionEvent>, SessionDriver) {
        let (tx, rx) = detection_channel();
        let session = HandTrackingSession::new(
            TrackingConfig::default(),
            Calibrator::load(Box::new(MemoryStore::new()), 0.04),
            TemplateSet::empty(),
        );
        (tx, SessionDriver::new(session, rx))
    }

    #[test]
    fn frame_applies_queued_detections_in_order() {
        let (tx, mut driver) = driver();
        let frame = hand([true, false, false, false]);
        for i in 0..4 {
            tx.send(DetectionEvent {
                timestamp_ms: i as f64 * 30.0,
                hand: Some(frame.clone()),
            })
            .unwrap();
        }
        let state = driver.frame(100.0);
        assert!(state.active);
        assert_eq!(state.gesture.as_deref(), Some("pointing"));

        tx.send(DetectionEvent {
            timestamp_ms: 120.0,
            hand: None,
        })
        .unwrap();
        let state = driver.frame(130.0);
        assert!(!state.active);
        assert_eq!(state.gesture, None);
    }

    #[test]
    fn finishes_after_sender_drops() {
        let (tx, mut driver) = driver();
        tx.send(DetectionEvent {
            timestamp_ms: 0.0,
            hand: None,
        })
        .unwrap();
        drop(tx);
        assert!(!driver.is_finished());
        assert_eq!(driver.pump(), 1);
        assert!(driver.is_finished());
    }
}
