//! Decibel / coefficient conversions
//!
//! Gain arithmetic shared between the engine and the display layer.

/// Convert a gain in dB to a linear coefficient.
///
/// Values below -318.8 dB are treated as silence.
pub fn db_to_coefficient(db: f32) -> f32 {
    if db > -318.8 {
        (db * 0.05 * std::f32::consts::LN_10).exp()
    } else {
        0.0
    }
}

/// Convert a linear coefficient to gain in dB.
pub fn coefficient_to_db(coefficient: f32) -> f32 {
    20.0 * coefficient.log10()
}
