//! JSON scan reports.

use std::fs;
use std::path::Path;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::detector::ScanResult;
use crate::params::SegmentMode;

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One recognized card, flattened for serialization.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecognizedCard {
    pub name: String,
    /// Separation score over the acceptance threshold, `>= 1.0`.
    pub score: f64,
    /// Quad vertices `[x, y]` in input-image coordinates.
    pub quad: [[f32; 2]; 4],
    /// Quad area over image area.
    pub area_fraction: f32,
}

/// Per-image scan report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanReport {
    pub image: String,
    pub modes_tried: Vec<SegmentMode>,
    pub cards: Vec<RecognizedCard>,
}

impl ScanReport {
    pub fn from_result(image: impl Into<String>, result: &ScanResult) -> Self {
        Self {
            image: image.into(),
            modes_tried: result.modes_tried.clone(),
            cards: result
                .cards
                .iter()
                .map(|c| RecognizedCard {
                    name: c.name.clone(),
                    score: c.recognition_score,
                    quad: c.bounding_quad.map(|p: Point2<f32>| [p.x, p.y]),
                    area_fraction: c.image_area_fraction,
                })
                .collect(),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
