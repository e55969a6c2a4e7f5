//! Condition code to watchface icon mapping.
//!
//! Condition codes follow the OpenWeatherMap groups (2xx thunderstorm,
//! 3xx drizzle, 5xx rain, 6xx snow, 7xx atmosphere, 800 clear, 80x clouds,
//! 9xx extreme).

/// Whether `now` falls strictly between sunrise and sunset (unix seconds).
pub fn is_daytime(now: f64, sunrise: i64, sunset: i64) -> bool {
    now > sunrise as f64 && now < sunset as f64
}

/// Icon for a condition code, with day/night variants for the clear and
/// cloudy ranges. Unknown codes map to 0.
pub fn icon_for(code: i64, is_day: bool) -> u8 {
    match code {
        c if c <= 100 => {
            if is_day {
                1
            } else {
                0
            }
        }
        c if c <= 232 => 5,
        c if c <= 321 => 6,
        c if c <= 600 => 6,
        c if c <= 700 => 7,
        c if c <= 800 => {
            if is_day {
                3
            } else {
                2
            }
        }
        c if c <= 900 => 4,
        c if c < 950 => 5,
        _ => 0,
    }
}

/// Resolve the icon against the current wall-clock time.
pub fn map_icon_code(code: i64, sunset: i64, sunrise: i64) -> u8 {
    let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    icon_for(code, is_daytime(now, sunrise, sunset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_night_variants() {
        assert_eq!(icon_for(50, true), 1);
        assert_eq!(icon_for(50, false), 0);
        assert_eq!(icon_for(800, true), 3);
        assert_eq!(icon_for(800, false), 2);
    }

    #[test]
    fn threshold_table() {
        for is_day in [true, false] {
            assert_eq!(icon_for(200, is_day), 5);
            assert_eq!(icon_for(232, is_day), 5);
            assert_eq!(icon_for(310, is_day), 6);
            assert_eq!(icon_for(500, is_day), 6);
            assert_eq!(icon_for(600, is_day), 6);
            assert_eq!(icon_for(650, is_day), 7);
            assert_eq!(icon_for(701, is_day), 3 - u8::from(!is_day));
            assert_eq!(icon_for(850, is_day), 4);
            assert_eq!(icon_for(920, is_day), 5);
            assert_eq!(icon_for(950, is_day), 0);
            assert_eq!(icon_for(1000, is_day), 0);
        }
    }

    #[test]
    fn every_code_maps_into_range() {
        for code in -10..1100 {
            for is_day in [true, false] {
                assert!(icon_for(code, is_day) <= 7, "code {code} out of range");
            }
        }
    }

    #[test]
    fn daytime_bounds_are_exclusive() {
        assert!(is_daytime(1500.0, 1000, 2000));
        assert!(!is_daytime(1000.0, 1000, 2000));
        assert!(!is_daytime(2000.0, 1000, 2000));
        assert!(!is_daytime(2500.0, 1000, 2000));
    }

    #[test]
    fn map_icon_code_uses_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(map_icon_code(800, now + 3600, now - 3600), 3);
        assert_eq!(map_icon_code(800, now - 3600, now - 7200), 2);
        assert_eq!(map_icon_code(650, now + 3600, now - 3600), 7);
    }
}
