use std::f32::consts::PI;

use crate::{config::FilterConfig, types::Point2};

const MIN_DT: f64 = 1e-6;

#[derive(Clone, Copy, Debug)]
struct FilterState {
    value: f32,
    derivative: f32,
    timestamp: f64,
}

#[derive(Clone, Debug)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    state: Option<FilterState>,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
            state: None,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.min_cutoff, config.beta, config.d_cutoff)
    }

    fn smoothing_factor(dt: f32, cutoff: f32) -> f32 {
        let tau = 1.0 / (2.0 * PI * cutoff);
        1.0 / (1.0 + tau / dt)
    }

    /// Filter `value` sampled at `timestamp` seconds.
    pub fn filter(&mut self, value: f32, timestamp: f64) -> f32 {
        let Some(prev) = self.state else {
            self.state = Some(FilterState {
                value,
                derivative: 0.0,
                timestamp,
            });
            return value;
        };

        let dt = (timestamp - prev.timestamp).max(MIN_DT) as f32;

        let raw_derivative = (value - prev.value) / dt;
        let a_d = Self::smoothing_factor(dt, self.d_cutoff);
        let derivative = a_d * raw_derivative + (1.0 - a_d) * prev.derivative;

        let cutoff = self.min_cutoff + self.beta * derivative.abs();
        let a = Self::smoothing_factor(dt, cutoff);
        let filtered = a * value + (1.0 - a) * prev.value;

        self.state = Some(FilterState {
            value: filtered,
            derivative,
            timestamp,
        });
        filtered
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn is_primed(&self) -> bool {
        self.state.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct OneEuroFilter2D {
    pub x: OneEuroFilter,
    pub y: OneEuroFilter,
}

impl OneEuroFilter2D {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            x: OneEuroFilter::from_config(config),
            y: OneEuroFilter::from_config(config),
        }
    }

    pub fn filter(&mut self, point: Point2, timestamp: f64) -> Point2 {
        Point2::new(
            self.x.filter(point.x, timestamp),
            self.y.filter(point.y, timestamp),
        )
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
