use serde::{Deserialize, Serialize};

pub const NUM_LANDMARKS: usize = 21;
pub const FEATURE_LEN: usize = NUM_LANDMARKS * 3;

pub mod landmark {
    pub const WRIST: usize = 0;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// One detector result: exactly 21 landmarks in camera-normalized space.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkFrame {
    points: [Landmark; NUM_LANDMARKS],
}

impl LandmarkFrame {
    pub fn new(points: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    pub fn from_slice(points: &[Landmark]) -> Option<Self> {
        let points: [Landmark; NUM_LANDMARKS] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn points(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.points
    }

    pub(crate) fn get(&self, index: usize) -> Landmark {
        self.points[index]
    }

    pub fn index_tip(&self) -> Point2 {
        let tip = self.points[landmark::INDEX_TIP];
        Point2::new(tip.x, tip.y)
    }
}

impl TryFrom<Vec<Landmark>> for LandmarkFrame {
    type Error = usize;

    fn try_from(points: Vec<Landmark>) -> Result<Self, Self::Error> {
        let len = points.len();
        Self::from_slice(&points).ok_or(len)
    }
}

impl Serialize for LandmarkFrame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.points.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LandmarkFrame {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let points = Vec::<Landmark>::deserialize(deserializer)?;
        LandmarkFrame::try_from(points).map_err(|len| {
            serde::de::Error::custom(format!(
                "expected {NUM_LANDMARKS} landmarks, got {len}"
            ))
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CursorState {
    pub x: f32,
    pub y: f32,
    pub active: bool,
    pub layer_index: usize,
    pub gesture: Option<String>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            active: false,
            layer_index: 0,
            gesture: None,
        }
    }
}

impl CursorState {
    pub fn display_text(&self) -> String {
        let gesture = self.gesture.as_deref().unwrap_or("-");
        if self.active {
            format!(
                "({:.3}, {:.3}) layer {} gesture {}",
                self.x, self.y, self.layer_index, gesture
            )
        } else {
            format!("inactive layer {} gesture {}", self.layer_index, gesture)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    Collecting,
    Done,
}

impl CalibrationPhase {
    pub fn label(&self) -> &'static str {
        match self {
            CalibrationPhase::Idle => "idle",
            CalibrationPhase::Collecting => "collecting",
            CalibrationPhase::Done => "done",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationStatus {
    pub phase: CalibrationPhase,
    pub points_collected: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(rename = "t")]
    pub timestamp_ms: f64,
    #[serde(rename = "landmarks", default)]
    pub hand: Option<LandmarkFrame>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_requires_exactly_21_points() {
        assert!(LandmarkFrame::from_slice(&[Landmark::default(); 20]).is_none());
        assert!(LandmarkFrame::from_slice(&[Landmark::default(); 22]).is_none());
        assert!(LandmarkFrame::from_slice(&[Landmark::default(); 21]).is_some());
    }

    #[test]
    fn detection_event_decodes_missing_z_and_null_hand() {
        let points = (0..21)
            .map(|i| format!("{{\"x\":{},\"y\":0.5}}", i as f32 * 0.01))
            .collect::<Vec<_>>()
            .join(",");
        let line = format!("{{\"t\":16.5,\"landmarks\":[{points}]}}");
        let event: DetectionEvent = serde_json::from_str(&line).unwrap();
        let hand = event.hand.unwrap();
        assert_eq!(hand.get(3).z, 0.0);
        assert!((hand.index_tip().x - 0.08).abs() < 1e-6);

        let empty: DetectionEvent = serde_json::from_str("{\"t\":20,\"landmarks\":null}").unwrap();
        assert!(empty.hand.is_none());
    }

    #[test]
    fn short_frame_is_rejected_when_decoding() {
        let line = "{\"t\":1,\"landmarks\":[{\"x\":0.1,\"y\":0.2}]}";
        assert!(serde_json::from_str::<DetectionEvent>(line).is_err());
    }
}
