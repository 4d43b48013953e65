//! Adaptive capture cadence.
//!
//! The capture interval must be short enough that the surface moves less
//! than the cameras' field of view between two captures. Starting from the
//! initial interval, the search probes the displacement over each candidate
//! and shortens the interval by a fixed step until the displacement fits.

use crate::error::RigResult;
use crate::signal::round_to;
use std::future::Future;

/// Decimal places of a returned interval
const FREQUENCY_DECIMAL_PLACES: u32 = 3;

/// Parameters of the linear interval search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencySearch {
    /// First candidate interval, seconds
    pub initial: f64,
    /// Decrement between candidates, seconds
    pub step: f64,
    /// Returned when no candidate at or above it fits
    pub floor: f64,
    /// Largest acceptable displacement per interval
    pub field_of_view: f64,
}

impl Default for FrequencySearch {
    fn default() -> Self {
        Self {
            initial: 1.0,
            step: 0.05,
            floor: 0.001,
            field_of_view: 25.0,
        }
    }
}

impl FrequencySearch {
    /// Candidate interval for probe `k`.
    ///
    /// Computed from the start each time so no rounding drift accumulates.
    pub fn candidate(&self, k: u32) -> f64 {
        round_to(
            self.initial - f64::from(k) * self.step,
            FREQUENCY_DECIMAL_PLACES,
        )
    }

    /// Upper bound on the number of probes a search makes.
    pub fn max_probes(&self) -> u32 {
        let scannable = self.step > 0.0 && self.initial >= self.floor;
        if !scannable {
            return 1;
        }
        ((self.initial - self.floor) / self.step).ceil() as u32 + 1
    }
}

/// Find the longest candidate interval whose displacement fits the field of
/// view.
///
/// `probe(interval)` measures the displacement over `interval` seconds. A probe
/// error aborts the search.
pub async fn find_optimal_frequency<F, Fut>(mut probe: F, search: &FrequencySearch) -> RigResult<f64>
where
    F: FnMut(f64) -> Fut,
    Fut: Future<Output = RigResult<f64>>,
{
    let max_probes = search.max_probes();
    for k in 0..max_probes {
        let candidate = search.candidate(k);
        if candidate < search.floor || candidate <= 0.0 {
            break;
        }

        let displacement = probe(candidate).await?;
        tracing::debug!(candidate, displacement, "Capture interval probed");
        if displacement <= search.field_of_view {
            return Ok(candidate);
        }
    }

    tracing::warn!(
        floor = search.floor,
        "No capture interval fits the field of view, using the minimum"
    );
    Ok(search.floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RigError;
    use std::cell::Cell;

    #[tokio::test]
    async fn exact_field_of_view_at_initial_interval_is_accepted() {
        let search = FrequencySearch::default();
        let result = find_optimal_frequency(
            |interval| async move { Ok(interval * 25.0) },
            &search,
        )
        .await;
        assert_eq!(result.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn shortens_interval_until_displacement_fits() {
        // 40 units per second: fits at 25/40 = 0.625 s, first candidate below is 0.6
        let search = FrequencySearch::default();
        let result = find_optimal_frequency(
            |interval| async move { Ok(interval * 40.0) },
            &search,
        )
        .await;
        assert_eq!(result.unwrap(), 0.6);
    }

    #[tokio::test]
    async fn decreasing_displacement_terminates_within_bound() {
        let search = FrequencySearch {
            floor: 0.001,
            ..Default::default()
        };
        let calls = Cell::new(0u32);
        let result = find_optimal_frequency(
            |_| {
                calls.set(calls.get() + 1);
                async { Ok(1_000.0) }
            },
            &search,
        )
        .await;

        assert_eq!(result.unwrap(), 0.001);
        let bound = ((1.0 - search.floor) / search.step).ceil() as u32;
        assert!(calls.get() <= bound, "{} probes", calls.get());
    }

    #[test]
    fn candidates_do_not_drift() {
        let search = FrequencySearch::default();
        assert_eq!(search.candidate(0), 1.0);
        assert_eq!(search.candidate(1), 0.95);
        assert_eq!(search.candidate(19), 0.05);
        assert_eq!(search.candidate(20), 0.0);
    }

    #[test]
    fn unscannable_searches_make_a_single_probe() {
        let nan_step = FrequencySearch {
            step: f64::NAN,
            ..Default::default()
        };
        let inverted = FrequencySearch {
            initial: 0.01,
            floor: 0.5,
            ..Default::default()
        };
        assert_eq!(nan_step.max_probes(), 1);
        assert_eq!(inverted.max_probes(), 1);
        assert_eq!(FrequencySearch::default().max_probes(), 21);
    }

    #[tokio::test]
    async fn probe_error_aborts_search() {
        let search = FrequencySearch::default();
        let result = find_optimal_frequency(
            |_| async { Err(RigError::InsufficientData { samples: 0 }) },
            &search,
        )
        .await;
        assert!(matches!(result, Err(RigError::InsufficientData { .. })));
    }

    #[tokio::test]
    async fn degenerate_search_returns_floor() {
        let search = FrequencySearch {
            step: 0.0,
            ..Default::default()
        };
        let result = find_optimal_frequency(
            |_| async { Ok(1_000.0) },
            &search,
        )
        .await;
        assert_eq!(result.unwrap(), search.floor);
    }
}
