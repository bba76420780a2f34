use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;

use crate::{
    homography::{CanvasPoint, Homography, HomographyError, map_to_canvas},
    store::KeyValueStore,
    types::{CalibrationPhase, CalibrationStatus, Point2},
};

pub const CALIBRATION_KEY: &str = "hand-cursor.calibration";
pub const QUAD_POINTS: usize = 4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration point submitted while not collecting")]
    NotCollecting,
    #[error("calibration invalid: {0}")]
    Degenerate(#[from] HomographyError),
}

#[derive(Clone, Copy, Debug)]
struct Installed {
    quad: [Point2; QUAD_POINTS],
    homography: Homography,
}

pub struct Calibrator {
    store: Box<dyn KeyValueStore>,
    margin: f32,
    installed: Option<Installed>,
    collecting: Option<Vec<Point2>>,
    subscribers: Vec<Sender<CalibrationStatus>>,
}

impl Calibrator {
    pub fn load(store: Box<dyn KeyValueStore>, margin: f32) -> Self {
        let mut calibrator = Self {
            store,
            margin,
            installed: None,
            collecting: None,
            subscribers: Vec::new(),
        };
        calibrator.installed = calibrator.restore();
        calibrator
    }

    fn restore(&self) -> Option<Installed> {
        let text = match self.store.get(CALIBRATION_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("failed to read saved calibration: {err}");
                return None;
            }
        };

        let points: Vec<Point2> = match serde_json::from_str(&text) {
            Ok(points) => points,
            Err(err) => {
                log::warn!("ignoring corrupt saved calibration: {err}");
                return None;
            }
        };
        let Ok(quad) = <[Point2; QUAD_POINTS]>::try_from(points.as_slice()) else {
            log::warn!(
                "ignoring saved calibration with {} points, expected {QUAD_POINTS}",
                points.len()
            );
            return None;
        };

        match Homography::from_quad(&quad) {
            Ok(homography) => {
                log::info!("restored saved calibration");
                Some(Installed { quad, homography })
            }
            Err(err) => {
                log::warn!("saved calibration is invalid: {err}");
                None
            }
        }
    }

    pub fn subscribe(&mut self) -> Receiver<CalibrationStatus> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self) {
        let status = self.status();
        self.subscribers.retain(|tx| tx.send(status).is_ok());
    }

    pub fn status(&self) -> CalibrationStatus {
        match &self.collecting {
            Some(points) => CalibrationStatus {
                phase: CalibrationPhase::Collecting,
                points_collected: points.len(),
            },
            None if self.installed.is_some() => CalibrationStatus {
                phase: CalibrationPhase::Done,
                points_collected: QUAD_POINTS,
            },
            None => CalibrationStatus {
                phase: CalibrationPhase::Idle,
                points_collected: 0,
            },
        }
    }

    pub fn start_calibration(&mut self) {
        self.collecting = Some(Vec::with_capacity(QUAD_POINTS));
        log::info!("calibration started");
        self.notify();
    }

    /// Add the next corner. The fourth point confirms the calibration.
    pub fn submit_point(&mut self, point: Point2) -> Result<CalibrationStatus, CalibrationError> {
        let points = self
            .collecting
            .as_mut()
            .ok_or(CalibrationError::NotCollecting)?;
        points.push(point);

        if points.len() < QUAD_POINTS {
            log::debug!("calibration point {} of {QUAD_POINTS}", points.len());
            self.notify();
            return Ok(self.status());
        }

        let points = self.collecting.take().unwrap_or_default();
        let result = self.confirm(&points);
        self.notify();
        result.map(|()| self.status())
    }

    fn confirm(&mut self, points: &[Point2]) -> Result<(), CalibrationError> {
        let quad = <[Point2; QUAD_POINTS]>::try_from(points)
            .map_err(|_| CalibrationError::NotCollecting)?;

        let homography = Homography::from_quad(&quad).inspect_err(|err| {
            log::warn!("calibration rejected, keeping previous mapping: {err}");
        })?;

        self.installed = Some(Installed { quad, homography });
        log::info!("calibration confirmed");

        match serde_json::to_string(&quad) {
            Ok(text) => {
                if let Err(err) = self.store.set(CALIBRATION_KEY, &text) {
                    log::warn!("failed to persist calibration: {err}");
                }
            }
            Err(err) => log::warn!("failed to serialize calibration: {err}"),
        }
        Ok(())
    }

    pub fn clear_calibration(&mut self) {
        self.installed = None;
        self.collecting = None;
        if let Err(err) = self.store.remove(CALIBRATION_KEY) {
            log::warn!("failed to remove saved calibration: {err}");
        }
        log::info!("calibration cleared");
        self.notify();
    }

    pub fn is_calibrated(&self) -> bool {
        self.installed.is_some()
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting.is_some()
    }

    pub fn quad(&self) -> Option<[Point2; QUAD_POINTS]> {
        self.installed.map(|i| i.quad)
    }

    pub fn homography(&self) -> Option<&Homography> {
        self.installed.as_ref().map(|i| &i.homography)
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn map_point(&self, point: Point2) -> CanvasPoint {
        map_to_canvas(self.homography(), point, self.margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }

        fn remove(&mut self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }
    }

    const INSET: [(f32, f32); 4] = [(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)];

    fn calibrator_with(store: MemoryStore) -> Calibrator {
        Calibrator::load(Box::new(store), 0.04)
    }

    fn submit_all(
        c: &mut Calibrator,
        points: [(f32, f32); 4],
    ) -> Result<CalibrationStatus, CalibrationError> {
        c.start_calibration();
        let mut last = Ok(c.status());
        for (x, y) in points {
            last = c.submit_point(Point2::new(x, y));
        }
        last
    }

    #[test]
    fn starts_uncalibrated_with_empty_store() {
        let c = calibrator_with(MemoryStore::new());
        assert!(!c.is_calibrated());
        assert_eq!(c.status().phase, CalibrationPhase::Idle);
    }

    #[test]
    fn four_points_confirm_and_persist() {
        let mut c = calibrator_with(MemoryStore::new());
        let status = submit_all(&mut c, INSET).unwrap();
        assert_eq!(status.phase, CalibrationPhase::Done);
        assert!(c.is_calibrated());
        assert!(!c.is_collecting());
        assert!(c.store.get(CALIBRATION_KEY).unwrap().is_some());
    }

    #[test]
    fn persisted_quad_is_restored() {
        let mut store = MemoryStore::new();
        store
            .set(
                CALIBRATION_KEY,
                r#"[{"x":0.1,"y":0.1},{"x":0.9,"y":0.1},{"x":0.9,"y":0.9},{"x":0.1,"y":0.9}]"#,
            )
            .unwrap();
        let c = calibrator_with(store);
        assert!(c.is_calibrated());
        let mapped = c.map_point(Point2::new(0.5, 0.5));
        assert!((mapped.point.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn corrupt_or_partial_saved_data_falls_back() {
        let mut store = MemoryStore::new();
        store.set(CALIBRATION_KEY, "{nope").unwrap();
        assert!(!calibrator_with(store).is_calibrated());

        let mut store = MemoryStore::new();
        store
            .set(CALIBRATION_KEY, r#"[{"x":0.1,"y":0.1},{"x":0.9,"y":0.1}]"#)
            .unwrap();
        assert!(!calibrator_with(store).is_calibrated());
    }

    #[test]
    fn collinear_quad_is_rejected_without_installing() {
        let mut c = calibrator_with(MemoryStore::new());
        let err =
            submit_all(&mut c, [(0.1, 0.1), (0.3, 0.3), (0.5, 0.5), (0.7, 0.7)]).unwrap_err();
        assert!(matches!(err, CalibrationError::Degenerate(_)));
        assert!(!c.is_calibrated());
        assert_eq!(c.status().phase, CalibrationPhase::Idle);
        assert!(c.store.get(CALIBRATION_KEY).unwrap().is_none());
    }

    #[test]
    fn failed_recalibration_keeps_previous() {
        let mut c = calibrator_with(MemoryStore::new());
        submit_all(&mut c, INSET).unwrap();
        let before = c.quad();
        assert!(submit_all(&mut c, [(0.2, 0.2); 4]).is_err());
        assert!(c.is_calibrated());
        assert_eq!(c.quad(), before);
        assert_eq!(c.status().phase, CalibrationPhase::Done);
    }

    #[test]
    fn points_outside_collecting_are_refused() {
        let mut c = calibrator_with(MemoryStore::new());
        assert_eq!(
            c.submit_point(Point2::new(0.1, 0.1)),
            Err(CalibrationError::NotCollecting)
        );
    }

    #[test]
    fn restart_discards_partial_points() {
        let mut c = calibrator_with(MemoryStore::new());
        c.start_calibration();
        c.submit_point(Point2::new(0.1, 0.1)).unwrap();
        c.submit_point(Point2::new(0.9, 0.1)).unwrap();
        c.start_calibration();
        assert_eq!(c.status().points_collected, 0);
    }

    #[test]
    fn clear_reverts_to_passthrough_and_removes_saved() {
        let mut c = calibrator_with(MemoryStore::new());
        submit_all(&mut c, INSET).unwrap();
        c.clear_calibration();
        assert!(!c.is_calibrated());
        assert!(c.store.get(CALIBRATION_KEY).unwrap().is_none());
        let mapped = c.map_point(Point2::new(0.2, 0.3));
        assert!(mapped.inside);
        assert!((mapped.point.x - 0.8).abs() < 1e-6);
    }

    #[test]
    fn subscribers_see_each_phase_change() {
        let mut c = calibrator_with(MemoryStore::new());
        let rx = c.subscribe();
        submit_all(&mut c, INSET).unwrap();
        let seen: Vec<CalibrationStatus> = rx.try_iter().collect();
        let counts: Vec<usize> = seen.iter().map(|s| s.points_collected).collect();
        assert_eq!(counts, vec![0, 1, 2, 3, 4]);
        assert_eq!(seen.last().map(|s| s.phase), Some(CalibrationPhase::Done));
        assert_eq!(seen[0].phase, CalibrationPhase::Collecting);
    }

    #[test]
    fn unreadable_store_loads_uncalibrated() {
        let c = Calibrator::load(Box::new(BrokenStore), 0.04);
        assert!(!c.is_calibrated());
        assert_eq!(c.status().phase, CalibrationPhase::Idle);
    }

    #[test]
    fn failed_writes_still_install_and_clear() {
        let mut c = Calibrator::load(Box::new(BrokenStore), 0.04);
        let status = submit_all(&mut c, INSET).unwrap();
        assert_eq!(status.phase, CalibrationPhase::Done);
        assert!(c.is_calibrated());

        c.clear_calibration();
        assert!(!c.is_calibrated());
        assert_eq!(c.status().phase, CalibrationPhase::Idle);
    }

    #[test]
    fn saved_collinear_quad_is_ignored() {
        let mut store = MemoryStore::new();
        store
            .set(
                CALIBRATION_KEY,
                r#"[{"x":0.1,"y":0.1},{"x":0.3,"y":0.3},{"x":0.5,"y":0.5},{"x":0.7,"y":0.7}]"#,
            )
            .unwrap();
        let c = calibrator_with(store);
        assert!(!c.is_calibrated());
        assert!(c.homography().is_none());
    }
}
