use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    gesture::normalize_landmarks,
    types::{FEATURE_LEN, Landmark, LandmarkFrame},
};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read templates {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse templates: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSample {
    Points(Vec<Landmark>),
    Wrapped { landmarks: Vec<Landmark> },
}

impl RawSample {
    fn into_points(self) -> Vec<Landmark> {
        match self {
            RawSample::Points(points) | RawSample::Wrapped { landmarks: points } => points,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    classes: BTreeMap<String, Vec<[f32; FEATURE_LEN]>>,
}

impl TemplateSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self, TemplateError> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut classes = BTreeMap::new();

        for (name, value) in raw {
            let serde_json::Value::Array(samples) = value else {
                log::debug!("skipping template class {name}: samples are not an array");
                continue;
            };
            let vectors: Vec<_> = samples
                .into_iter()
                .enumerate()
                .filter_map(|(i, value)| {
                    let decoded = decode_sample(value);
                    if decoded.is_none() {
                        log::debug!("skipping unusable template sample {name}[{i}]");
                    }
                    decoded
                })
                .collect();

            if vectors.is_empty() {
                log::debug!("template class {name} has no usable samples");
            } else {
                classes.insert(name, vectors);
            }
        }

        Ok(Self { classes })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let set = Self::from_json_str(&text)?;
        log::info!(
            "loaded {} template samples in {} classes from {}",
            set.sample_count(),
            set.class_count(),
            path.display()
        );
        Ok(set)
    }

    /// Like [`TemplateSet::load`], but any failure yields an empty set so the
    /// classifier falls back to geometry alone.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            log::warn!("gesture templates unavailable, using geometry only: {err}");
            Self::empty()
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, frame: &LandmarkFrame) -> bool {
        match normalize_landmarks(frame) {
            Some(vector) => {
                self.classes.entry(name.into()).or_default().push(vector);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn sample_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn best_match(&self, features: &[f32; FEATURE_LEN], threshold: f32) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;
        for (name, vectors) in &self.classes {
            let score = vectors
                .iter()
                .map(|t| cosine_similarity(features, t))
                .fold(f32::NEG_INFINITY, f32::max);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((name.as_str(), score));
            }
        }
        best.filter(|&(_, score)| score > threshold)
    }
}

fn decode_sample(value: serde_json::Value) -> Option<[f32; FEATURE_LEN]> {
    let sample: RawSample = serde_json::from_value(value).ok()?;
    let frame = LandmarkFrame::try_from(sample.into_points()).ok()?;
    normalize_landmarks(&frame)
}

pub fn cosine_similarity(a: &[f32; FEATURE_LEN], b: &[f32; FEATURE_LEN]) -> f32 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = (na * nb).sqrt();
    if denom < 1e-12 { 0.0 } else { dot / denom }
}
