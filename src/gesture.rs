use crate::{
    config::GestureConfig,
    templates::TemplateSet,
    types::{FEATURE_LEN, LandmarkFrame, landmark},
};

const MIN_HAND_SCALE: f32 = 1e-6;

const FINGERS: [(usize, usize); 4] = [
    (landmark::INDEX_TIP, landmark::INDEX_PIP),
    (landmark::MIDDLE_TIP, landmark::MIDDLE_PIP),
    (landmark::RING_TIP, landmark::RING_PIP),
    (landmark::PINKY_TIP, landmark::PINKY_PIP),
];

/// Translate to the wrist and scale by the wrist to middle-MCP distance.
/// Returns `None` for a degenerate, near zero-size hand.
pub fn normalize_landmarks(frame: &LandmarkFrame) -> Option<[f32; FEATURE_LEN]> {
    let points = frame.points();
    let wrist = points[landmark::WRIST].to_array();
    let scale = distance3(points[landmark::MIDDLE_MCP].to_array(), wrist);
    if scale < MIN_HAND_SCALE {
        return None;
    }

    let mut out = [0.0; FEATURE_LEN];
    for (i, p) in points.iter().enumerate() {
        let p = p.to_array();
        for axis in 0..3 {
            out[i * 3 + axis] = (p[axis] - wrist[axis]) / scale;
        }
    }
    Some(out)
}

pub fn extension_ratios(frame: &LandmarkFrame) -> [f32; 4] {
    let wrist = frame.get(landmark::WRIST).to_array();
    FINGERS.map(|(tip, pip)| {
        let tip = distance3(frame.get(tip).to_array(), wrist);
        let pip = distance3(frame.get(pip).to_array(), wrist);
        if pip < MIN_HAND_SCALE { 0.0 } else { tip / pip }
    })
}

pub struct GestureClassifier {
    config: GestureConfig,
    templates: TemplateSet,
    hysteresis: Hysteresis,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig, templates: TemplateSet) -> Self {
        let hysteresis = Hysteresis::new(config.confirm_frames, config.release_frames);
        Self {
            config,
            templates,
            hysteresis,
        }
    }

    pub fn match_frame(&self, frame: &LandmarkFrame) -> Option<String> {
        if !self.templates.is_empty() {
            if let Some(features) = normalize_landmarks(frame) {
                if let Some((name, _score)) =
                    self.templates.best_match(&features, self.config.match_threshold)
                {
                    return Some(name.to_string());
                }
            }
        }
        self.classify_geometry(frame)
    }

    fn classify_geometry(&self, frame: &LandmarkFrame) -> Option<String> {
        let [index, middle, ring, pinky] = extension_ratios(frame);
        let extended = |r: f32| r > self.config.extended_threshold;
        let curled = |r: f32| r < self.config.curled_threshold;
        let labels = &self.config.labels;

        if extended(index) && extended(middle) && extended(ring) && extended(pinky) {
            Some(labels.open_hand.clone())
        } else if extended(index) && extended(middle) && curled(ring) && curled(pinky) {
            Some(labels.two_finger.clone())
        } else if extended(index) && curled(middle) && curled(ring) && curled(pinky) {
            Some(labels.single_finger.clone())
        } else {
            None
        }
    }

    /// Advance one frame. `None` means no hand, which clears the gesture at once.
    pub fn observe(&mut self, frame: Option<&LandmarkFrame>) -> Option<&str> {
        match frame {
            Some(frame) => {
                let candidate = self.match_frame(frame);
                self.hysteresis.step(candidate);
            }
            None => self.hysteresis.clear(),
        }
        self.current_gesture()
    }

    pub fn current_gesture(&self) -> Option<&str> {
        self.hysteresis.current.as_deref()
    }

    pub fn has_templates(&self) -> bool {
        !self.templates.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
struct Hysteresis {
    confirm_frames: u32,
    release_frames: u32,
    current: Option<String>,
    candidate: Option<String>,
    candidate_count: u32,
    release_count: u32,
}

impl Hysteresis {
    fn new(confirm_frames: u32, release_frames: u32) -> Self {
        Self {
            confirm_frames,
            release_frames,
            ..Self::default()
        }
    }

    fn clear(&mut self) {
        if let Some(prev) = self.current.take() {
            log::debug!("gesture {prev} lost with hand");
        }
        self.candidate = None;
        self.candidate_count = 0;
        self.release_count = 0;
    }

    fn track_candidate(&mut self, matched: Option<String>) {
        if matched == self.candidate {
            self.candidate_count = self.candidate_count.saturating_add(1);
        } else {
            self.candidate = matched;
            self.candidate_count = 1;
        }
    }

    fn step(&mut self, matched: Option<String>) {
        if self.current.is_none() {
            self.track_candidate(matched);
            if self.candidate.is_some() && self.candidate_count >= self.confirm_frames {
                log::debug!("gesture confirmed: {:?}", self.candidate);
                self.current = self.candidate.take();
                self.candidate_count = 0;
                self.release_count = 0;
            }
            return;
        }

        if matched == self.current {
            self.release_count = 0;
            self.candidate = None;
            self.candidate_count = 0;
            return;
        }

        self.release_count += 1;
        self.track_candidate(matched);
        if self.release_count < self.release_frames {
            return;
        }

        let next = if self.candidate.is_some() && self.candidate_count >= self.confirm_frames {
            self.candidate.take()
        } else {
            None
        };
        log::debug!("gesture released: {:?} -> {:?}", self.current, next);
        self.current = next;
        self.candidate = None;
        self.candidate_count = 0;
        self.release_count = 0;
    }
}

fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}
