use crate::geo::Coordinates;

/// Outcome of the GPS-jitter check for a candidate Enter event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseVerdict {
    pub is_noise: bool,
    /// Distance to the day's first entry, recorded for diagnostics whenever
    /// both points carry coordinates, noise or not.
    pub distance_m: Option<f64>,
}

impl NoiseVerdict {
    pub fn clean() -> Self {
        Self {
            is_noise: false,
            distance_m: None,
        }
    }
}

/// Classifies a candidate Enter against the day's first non-noise Enter for
/// the same employee and site. Pass `first_entry = None` when no earlier
/// entry exists (the candidate is the day's first) or the earlier entry has
/// no coordinates; either way the candidate is genuine. Exit events are
/// never noise-filtered.
pub fn classify_reentry(
    candidate: Option<Coordinates>,
    first_entry: Option<Coordinates>,
    threshold_m: i32,
) -> NoiseVerdict {
    let (Some(candidate), Some(first)) = (candidate, first_entry) else {
        return NoiseVerdict::clean();
    };

    let distance = candidate.distance_m(&first);
    NoiseVerdict {
        is_noise: distance <= threshold_m as f64,
        distance_m: Some(distance),
    }
}
