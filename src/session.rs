use crate::{
    calibration::Calibrator,
    config::TrackingConfig,
    filter::OneEuroFilter2D,
    gesture::GestureClassifier,
    predictor::VelocityPredictor,
    templates::TemplateSet,
    types::{CursorState, LandmarkFrame, Point2},
};

pub struct HandTrackingSession {
    filter: OneEuroFilter2D,
    predictor: VelocityPredictor,
    calibrator: Calibrator,
    classifier: GestureClassifier,
    hand_present: bool,
    inside: bool,
    state: CursorState,
}

impl HandTrackingSession {
    pub fn new(config: TrackingConfig, calibrator: Calibrator, templates: TemplateSet) -> Self {
        Self {
            filter: OneEuroFilter2D::new(&config.filter),
            predictor: VelocityPredictor::new(config.predictor),
            classifier: GestureClassifier::new(config.gesture, templates),
            calibrator,
            hand_present: false,
            inside: false,
            state: CursorState::default(),
        }
    }

    /// Feed one detector result. `None` is tracking loss.
    pub fn on_detection(&mut self, hand: Option<&LandmarkFrame>, timestamp_ms: f64) {
        let Some(frame) = hand else {
            if self.hand_present {
                log::debug!("hand lost at {timestamp_ms:.1}ms");
            }
            self.filter.reset();
            self.predictor.reset();
            self.classifier.observe(None);
            self.hand_present = false;
            self.inside = false;
            self.state.active = false;
            self.state.gesture = None;
            return;
        };

        let mapped = self.calibrator.map_point(frame.index_tip());
        let filtered = self.filter.filter(mapped.point, timestamp_ms / 1000.0);
        self.predictor.update(filtered.x, filtered.y, timestamp_ms);
        let gesture = self.classifier.observe(Some(frame)).map(str::to_owned);

        self.hand_present = true;
        self.inside = mapped.inside;
        self.state.x = filtered.x;
        self.state.y = filtered.y;
        self.state.active = mapped.inside;
        self.state.gesture = gesture;
    }

    pub fn tick(&mut self, now_ms: f64) -> CursorState {
        if self.hand_present {
            let Point2 { x, y } = self.predictor.predict(now_ms);
            self.state.x = x;
            self.state.y = y;
            self.state.active = self.inside;
        } else {
            self.state.active = false;
        }
        self.state.gesture = self.classifier.current_gesture().map(str::to_owned);
        self.state.clone()
    }

    pub fn cursor_state(&self) -> &CursorState {
        &self.state
    }

    pub fn set_layer_index(&mut self, layer_index: usize) {
        self.state.layer_index = layer_index;
    }

    pub fn hand_present(&self) -> bool {
        self.hand_present
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut Calibrator {
        &mut self.calibrator
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }
}
