//! MIDI velocity assignment.
//!
//! Human loudness perception is logarithmic: -46 dBFS approximates
//! pianissimo (velocity 30) and -6 dBFS approximates fortissimo (velocity
//! 120) for normalized voice. When no energy was captured for a note,
//! confidence is used as a weaker proxy instead (velocity 50-127).

const DB_MIN: f64 = -46.0;
const DB_MAX: f64 = -6.0;
const MIN_VELOCITY: f64 = 30.0;
const MAX_VELOCITY: f64 = 120.0;

pub fn assign_velocity(energy: Option<f64>, confidence: f64) -> u8 {
    match energy {
        Some(e) if e > 0.0 => {
            let db = 20.0 * e.max(1e-10).log10();
            let n = ((db - DB_MIN) / (DB_MAX - DB_MIN)).clamp(0.0, 1.0);
            let velocity = (MIN_VELOCITY + n * (MAX_VELOCITY - MIN_VELOCITY)).round();
            velocity.clamp(0.0, 127.0) as u8
        }
        _ => {
            let velocity = (confidence * 77.0 + 50.0).round();
            velocity.clamp(0.0, 127.0) as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_energy_falls_back_to_confidence_like_missing_energy() {
        assert_eq!(assign_velocity(Some(0.0), 0.9), assign_velocity(None, 0.9));
    }

    #[test]
    fn loud_energy_saturates_high() {
        // 0 dBFS is well above the -6 dBFS fortissimo reference.
        assert_eq!(assign_velocity(Some(1.0), 0.5), 120);
    }

    #[test]
    fn quiet_energy_saturates_low() {
        // -60 dBFS is below the -46 dBFS pianissimo reference.
        let quiet = 10f64.powf(-60.0 / 20.0);
        assert_eq!(assign_velocity(Some(quiet), 0.5), 30);
    }

    #[test]
    fn fallback_uses_confidence() {
        assert_eq!(assign_velocity(None, 1.0), 127);
        assert_eq!(assign_velocity(None, 0.0), 50);
    }

    #[test]
    fn velocity_always_in_range() {
        for i in 0..=100 {
            let c = i as f64 / 100.0;
            assert!(assign_velocity(None, c) <= 127);
            for j in 0..=20 {
                let e = j as f64 / 20.0;
                assert!(assign_velocity(Some(e), c) <= 127);
            }
        }
    }
}
