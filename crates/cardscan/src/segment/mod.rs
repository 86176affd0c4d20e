//! Segmentation: local contrast enhancement, thresholding, and contour
//! extraction.

mod clahe;
mod contours;
mod threshold;

pub use clahe::ClaheParams;
pub(crate) use clahe::{enhance_channels, enhance_lightness};

use log::debug;
use nalgebra::Point2;

use cardscan_core::{geometry, RgbImageView};

use crate::params::{DetectorParams, SegmentMode};
use contours::TracedContour;

/// Rec. 601 luma of an RGB view.
pub(crate) fn luma_plane(src: &RgbImageView<'_>) -> Vec<u8> {
    src.data
        .chunks_exact(3)
        .map(|px| {
            let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            y.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Produce the candidate contours for one thresholding mode, sorted by
/// signed area descending (holes last) and capped at `max_contours`.
pub(crate) fn mode_contours(
    original: &RgbImageView<'_>,
    adjusted: &RgbImageView<'_>,
    mode: SegmentMode,
    params: &DetectorParams,
) -> Vec<Vec<Point2<f32>>> {
    let mut traced = collect_traced(original, adjusted, mode, params);

    // Outer borders wind one way and holes the other; keying on signed area
    // (outer-positive) floats the big outer borders to the front.
    traced.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));

    if traced.len() > params.max_contours {
        debug!(
            "mode {}: capping {} contours at {}",
            mode.as_str(),
            traced.len(),
            params.max_contours
        );
        traced.truncate(params.max_contours);
    }

    traced.into_iter().map(|c| c.points).collect()
}

fn sort_key(c: &TracedContour) -> f32 {
    let area = geometry::polygon_area(&c.points);
    if c.is_hole {
        -area
    } else {
        area
    }
}

fn collect_traced(
    original: &RgbImageView<'_>,
    adjusted: &RgbImageView<'_>,
    mode: SegmentMode,
    params: &DetectorParams,
) -> Vec<TracedContour> {
    let (w, h) = (adjusted.width, adjusted.height);
    match mode {
        SegmentMode::Gray => {
            let mask = threshold::threshold_fixed(&luma_plane(adjusted), params.gray_threshold);
            contours::trace_contours(&mask, w, h)
        }
        SegmentMode::Adaptive => {
            let mask =
                threshold::threshold_adaptive(&luma_plane(adjusted), w, h, params.adaptive_offset);
            contours::trace_contours(&mask, w, h)
        }
        SegmentMode::Rgb => {
            let mut out = Vec::new();
            for channel in enhance_channels(original, &params.clahe) {
                let mask = threshold::threshold_fixed(&channel, params.rgb_threshold);
                out.extend(contours::trace_contours(&mask, w, h));
            }
            out
        }
        SegmentMode::All => {
            let mut out = collect_traced(original, adjusted, SegmentMode::Gray, params);
            out.extend(collect_traced(
                original,
                adjusted,
                SegmentMode::Adaptive,
                params,
            ));
            out.extend(collect_traced(original, adjusted, SegmentMode::Rgb, params));
            out
        }
    }
}
