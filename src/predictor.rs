use crate::{config::PredictorConfig, types::Point2};

const INITIAL_POSITION: Point2 = Point2::new(0.5, 0.5);

#[derive(Clone, Debug)]
pub struct VelocityPredictor {
    config: PredictorConfig,
    base: Point2,
    base_timestamp_ms: Option<f64>,
    velocity: (f32, f32),
    active: bool,
}

impl VelocityPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            base: INITIAL_POSITION,
            base_timestamp_ms: None,
            velocity: (0.0, 0.0),
            active: false,
        }
    }

    pub fn update(&mut self, x: f32, y: f32, timestamp_ms: f64) {
        if let Some(prev) = self.base_timestamp_ms {
            let dt = ((timestamp_ms - prev) / 1000.0) as f32;
            if dt > self.config.min_update_interval_ms / 1000.0 {
                let max = self.config.max_velocity;
                let vx = ((x - self.base.x) / dt).clamp(-max, max);
                let vy = ((y - self.base.y) / dt).clamp(-max, max);
                let alpha = self.config.velocity_smoothing;
                self.velocity.0 = self.velocity.0 * (1.0 - alpha) + vx * alpha;
                self.velocity.1 = self.velocity.1 * (1.0 - alpha) + vy * alpha;
            }
        }

        self.base = Point2::new(x, y);
        self.base_timestamp_ms = Some(timestamp_ms);
        self.active = true;
    }

    pub fn predict(&self, now_ms: f64) -> Point2 {
        let Some(base_ts) = self.base_timestamp_ms.filter(|_| self.active) else {
            return self.base;
        };

        let elapsed = (((now_ms - base_ts) / 1000.0) as f32)
            .clamp(0.0, self.config.max_extrapolation_ms / 1000.0);
        let ahead = elapsed + self.config.lookahead_ms / 1000.0;

        Point2::new(
            (self.base.x + self.velocity.0 * ahead).clamp(0.0, 1.0),
            (self.base.y + self.velocity.1 * ahead).clamp(0.0, 1.0),
        )
    }

    pub fn reset(&mut self) {
        self.velocity = (0.0, 0.0);
        self.base_timestamp_ms = None;
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.velocity
    }

    pub fn base_position(&self) -> Point2 {
        self.base
    }
}

impl Default for VelocityPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_predict_returns_initial_base() {
        let p = VelocityPredictor::default();
        assert!(!p.is_active());
        assert_eq!(p.predict(1234.0), INITIAL_POSITION);
    }

    #[test]
    fn continues_positive_motion() {
        let mut p = VelocityPredictor::default();
        p.update(0.2, 0.5, 1000.0);
        p.update(0.3, 0.5, 1100.0);
        let out = p.predict(1110.0);
        assert!(out.x >= 0.3 && out.x <= 1.0, "got {}", out.x);
        assert!((out.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn first_update_has_no_velocity() {
        let mut p = VelocityPredictor::default();
        p.update(0.7, 0.2, 50.0);
        assert_eq!(p.velocity(), (0.0, 0.0));
        assert_eq!(p.predict(60.0), Point2::new(0.7, 0.2));
    }

    #[test]
    fn velocity_is_clamped() {
        let mut p = VelocityPredictor::default();
        p.update(0.0, 0.0, 0.0);
        p.update(1.0, 1.0, 10.0);
        let alpha = PredictorConfig::default().velocity_smoothing;
        let max = PredictorConfig::default().max_velocity;
        assert!((p.velocity().0 - max * alpha).abs() < 1e-5);
    }

    #[test]
    fn updates_too_close_together_skip_velocity() {
        let mut p = VelocityPredictor::default();
        p.update(0.2, 0.2, 100.0);
        p.update(0.4, 0.4, 102.0);
        assert_eq!(p.velocity(), (0.0, 0.0));
        assert_eq!(p.base_position(), Point2::new(0.4, 0.4));
    }

    #[test]
    fn extrapolation_is_capped_during_stalls() {
        let mut p = VelocityPredictor::default();
        p.update(0.1, 0.5, 0.0);
        p.update(0.2, 0.5, 100.0);
        let soon = p.predict(100.0 + 150.0);
        let late = p.predict(100.0 + 5000.0);
        assert!((soon.x - late.x).abs() < 1e-6);
    }

    #[test]
    fn prediction_is_clamped_to_canvas() {
        let mut p = VelocityPredictor::default();
        p.update(0.9, 0.5, 0.0);
        p.update(0.99, 0.5, 20.0);
        assert!(p.predict(150.0).x <= 1.0);
    }

    #[test]
    fn reset_deactivates_and_keeps_position() {
        let mut p = VelocityPredictor::default();
        p.update(0.2, 0.5, 0.0);
        p.update(0.3, 0.5, 100.0);
        p.reset();
        assert!(!p.is_active());
        assert_eq!(p.velocity(), (0.0, 0.0));
        assert_eq!(p.predict(500.0), Point2::new(0.3, 0.5));

        p.update(0.8, 0.8, 600.0);
        assert_eq!(p.velocity(), (0.0, 0.0));
    }
}
