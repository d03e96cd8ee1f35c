//! Value transforms from raw 0-127 readings to normalized 0-1 parameter values

use serde::{Deserialize, Serialize};

/// Offset added to `x / 127` so that CC 63 lands on exactly 0.5.
/// A 128-step range has no true center without it.
pub const SCALE_OFFSET: f64 = 0.003937007874016;

/// Results below this are snapped to 0 so CC 0 still reaches the minimum
const SCALE_FLOOR: f64 = 0.004;

/// Named transform selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTransform {
    Scale,
    ScaleInverse,
    ThresholdSwitch,
    SemitoneCurve,
}

impl ValueTransform {
    pub fn apply(self, x: u8) -> f64 {
        match self {
            ValueTransform::Scale => scale(x),
            ValueTransform::ScaleInverse => scale_inverse(x),
            ValueTransform::ThresholdSwitch => threshold_switch(x),
            ValueTransform::SemitoneCurve => semitone_curve(x),
        }
    }
}

/// Standard CC to parameter mapping
pub fn scale(x: u8) -> f64 {
    let value = x as f64 / 127.0 + SCALE_OFFSET;
    if value > 1.0 {
        1.0
    } else if value < SCALE_FLOOR {
        0.0
    } else {
        value
    }
}

/// Reversed mapping: 0 sends the maximum, 127 the minimum
pub fn scale_inverse(x: u8) -> f64 {
    scale(127 - x.min(127))
}

/// Turn a knob or fader into an on/off gate
pub fn threshold_switch(x: u8) -> f64 {
    if x <= 63 {
        0.0
    } else {
        1.0
    }
}

/// One linear piece of the first stage of the semitone curve:
/// inputs up to `last` map to `anchor_out + (x - anchor_in) * slope`.
struct Segment {
    last: u8,
    anchor_in: f64,
    anchor_out: f64,
    slope: f64,
}

/// Calibration of the semitone curve. Slopes are gentler around the center
/// (39-87) so that one-semitone detune is easy to dial in.
const SEMITONE_SEGMENTS: [Segment; 6] = [
    Segment { last: 15, anchor_in: 0.0, anchor_out: 0.0, slope: 1.6666666666667 },
    Segment { last: 39, anchor_in: 15.0, anchor_out: 25.0, slope: 1.25 },
    Segment { last: 63, anchor_in: 39.0, anchor_out: 55.0, slope: 0.3333333333333333 },
    Segment { last: 87, anchor_in: 88.0, anchor_out: 72.0, slope: 0.36 },
    Segment { last: 111, anchor_in: 112.0, anchor_out: 102.0, slope: 1.25 },
    Segment { last: 127, anchor_in: 127.0, anchor_out: 127.0, slope: 1.6666666666666667 },
];

/// Semitone steps in the outer ranges of the second stage
const OUTER_STEP: f64 = 0.00833333333;
/// Finer step used between 58 and 69
const INNER_STEP: f64 = 0.002604166667;
/// Output span: +/-12 semitones of a +/-25 semitone parameter
const SEMITONE_SPAN: f64 = 24.0 / 50.0;

/// Piecewise-linear curve for tuning parameters.
///
/// Output stays within 0.26..=0.74 and 63 maps to exactly 0.5.
pub fn semitone_curve(x: u8) -> f64 {
    let x = x.min(127);
    let segment = SEMITONE_SEGMENTS
        .iter()
        .find(|s| x <= s.last)
        .unwrap_or(&SEMITONE_SEGMENTS[SEMITONE_SEGMENTS.len() - 1]);
    let scaled = segment.anchor_out + (x as f64 - segment.anchor_in) * segment.slope;

    let value = if scaled <= 58.0 {
        0.5 + (scaled - 60.0) * OUTER_STEP
    } else if scaled >= 69.0 {
        0.5 + (scaled - 67.0) * OUTER_STEP
    } else {
        0.5 + (scaled - 63.0) * INNER_STEP
    };

    0.5 + SEMITONE_SPAN * (value - 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_scale_endpoints_and_center() {
        assert_eq!(scale(0), 0.0);
        assert_eq!(scale(127), 1.0);
        assert!((scale(63) - 0.5).abs() < 1e-9);
        // 64 is one step above the center
        assert!((scale(64) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_threshold_switch() {
        assert_eq!(threshold_switch(0), 0.0);
        assert_eq!(threshold_switch(63), 0.0);
        assert_eq!(threshold_switch(64), 1.0);
        assert_eq!(threshold_switch(127), 1.0);
    }

    #[test]
    fn test_semitone_curve_check_points() {
        assert!((semitone_curve(0) - 0.26).abs() < EPS);
        assert!((semitone_curve(39) - 0.48).abs() < EPS);
        assert!((semitone_curve(63) - 0.5).abs() < EPS);
        assert!((semitone_curve(64) - 0.500450).abs() < EPS);
        assert!((semitone_curve(88) - 0.52).abs() < EPS);
        assert!((semitone_curve(127) - 0.74).abs() < EPS);
    }

    #[test]
    fn test_semitone_curve_is_monotonic() {
        for x in 0..127u8 {
            assert!(
                semitone_curve(x) <= semitone_curve(x + 1) + EPS,
                "curve decreases at {}",
                x
            );
        }
    }

    #[test]
    fn test_named_transforms() {
        assert_eq!(ValueTransform::Scale.apply(127), 1.0);
        assert_eq!(ValueTransform::ScaleInverse.apply(127), 0.0);
        assert_eq!(ValueTransform::ThresholdSwitch.apply(100), 1.0);
        assert!((ValueTransform::SemitoneCurve.apply(63) - 0.5).abs() < EPS);
    }

    proptest! {
        #[test]
        fn prop_scale_inverse_mirrors_scale(x in 0u8..=127) {
            prop_assert_eq!(scale_inverse(x), scale(127 - x));
        }

        #[test]
        fn prop_scale_stays_normalized(x in 0u8..=127) {
            let v = scale(x);
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }
}
