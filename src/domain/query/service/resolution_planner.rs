use crate::domain::common::model::Resolution;

pub const DEFAULT_MAX_DATA_POINTS: u32 = 101;

/// Candidate resolutions from finest to coarsest with their width in minutes.
const RESOLUTION_STEPS: [(Resolution, f64); 9] = [
    (Resolution::Min5, 5.0),
    (Resolution::Min10, 10.0),
    (Resolution::Min15, 15.0),
    (Resolution::Min30, 30.0),
    (Resolution::Hour, 60.0),
    (Resolution::Day, 1_440.0),
    (Resolution::Week, 10_080.0),
    (Resolution::Month, 43_200.0),
    (Resolution::Year, 525_600.0),
];

/// Finest resolution that keeps `range_minutes` within `max_data_points`
/// buckets; the coarsest one when none does.
pub fn auto_resolution(range_minutes: f64, max_data_points: Option<u32>) -> Resolution {
    let max_points = max_data_points.unwrap_or(DEFAULT_MAX_DATA_POINTS) as f64;
    RESOLUTION_STEPS
        .iter()
        .find(|(_, minutes)| range_minutes / minutes <= max_points)
        .map(|(res, _)| *res)
        .unwrap_or(Resolution::Year)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(res: Resolution) -> usize {
        RESOLUTION_STEPS.iter().position(|(r, _)| *r == res).unwrap()
    }

    #[test]
    fn picks_first_fitting_resolution() {
        assert_eq!(auto_resolution(60.0, None), Resolution::Min5);
        assert_eq!(auto_resolution(6.0 * 60.0, Some(20)), Resolution::Min30);
        assert_eq!(auto_resolution(4.0 * 1_440.0, None), Resolution::Hour);
        assert_eq!(auto_resolution(7.0 * 1_440.0, None), Resolution::Day);
        assert_eq!(auto_resolution(90.0 * 1_440.0, None), Resolution::Day);
        assert_eq!(auto_resolution(5.0 * 365.0 * 1_440.0, None), Resolution::Month);
    }

    #[test]
    fn falls_back_to_coarsest() {
        assert_eq!(auto_resolution(1e12, Some(1)), Resolution::Year);
    }

    #[test]
    fn monotonic_in_range() {
        for max in [1u32, 10, 101, 1_000] {
            let mut last = 0;
            let mut minutes = 1.0;
            while minutes < 1e9 {
                let r = rank(auto_resolution(minutes, Some(max)));
                assert!(r >= last, "range {minutes} max {max}");
                last = r;
                minutes *= 1.7;
            }
        }
    }
}
