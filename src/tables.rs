//! Fixed-point DSP tables and level curves
//!
//! Shared constants and lookup tables used by the generators and the
//! mixer's gain computation. All tables are built once at construction
//! time from their closed-form formulas so they stay testable bit-for-bit.

/// Phase accumulator step for a period-1 tone at 44.1 kHz output
///
/// Derived from the 3.579545 MHz PSG master clock:
/// `(1 << 28) * 3_579_545 / 32 / 44_100`.
pub const BASE_PHASE_STEP: u32 = 0x2895_9bec;

/// Compute the tone phase step for a 12-bit period register value
///
/// Period 0 cannot be divided; real hardware degenerates to the fastest
/// possible toggle, so the step saturates at the maximum representable
/// step instead.
#[inline]
pub fn tone_phase_step(period: u32) -> u32 {
    if period > 0 {
        BASE_PHASE_STEP / period
    } else {
        1 << 31
    }
}

/// Geometric ratio between adjacent 16-level amplitude steps (~3 dB)
const AMP_RATIO: f64 = 0.707_945_784_384_137_910_802_214_942_189_43;

/// Geometric ratio between adjacent 32-level envelope steps (~1.5 dB)
const ENV_RATIO: f64 = 0.841_395_141_645_195_091_152_741_893_800_29;

/// Peak amplitude the level tables decay from
const AMP_PEAK: f64 = 0x26a9 as f64;

/// Chip variant selecting the envelope table resolution
///
/// The AY-3-8910 drives its envelope DAC with the same 16 levels as the
/// amplitude registers (each level duplicated); the YM2149 variant has a
/// true 32-step envelope DAC with a steeper per-step ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PsgVariant {
    /// AY-3-8910: 16 distinct envelope levels
    Ay8910,
    /// YM2149: 32 distinct envelope levels
    Ym2149,
}

/// Logarithmic amplitude tables for one PSG instance
#[derive(Clone, Debug)]
pub struct LevelTables {
    /// 16-level amplitude table indexed by the amplitude register (0-15)
    pub amp: [i16; 16],
    /// 32-level table indexed by the envelope output (0-31)
    pub env: [i16; 32],
}

impl LevelTables {
    /// Build the tables for the given chip variant
    ///
    /// Levels decay geometrically from the peak; the zero level is
    /// normalized to exactly zero so a silent voice contributes no DC.
    pub fn new(variant: PsgVariant) -> Self {
        let mut amp = [0i16; 16];
        let mut env = [0i16; 32];

        let mut v = AMP_PEAK;
        for i in (0..16).rev() {
            amp[i] = v as i16;
            env[2 * i] = v as i16;
            env[2 * i + 1] = v as i16;
            v *= AMP_RATIO;
        }

        if variant == PsgVariant::Ym2149 {
            let mut v = AMP_PEAK;
            for i in (0..32).rev() {
                env[i] = v as i16;
                v *= ENV_RATIO;
            }
        }

        let amp_floor = amp[0];
        for level in &mut amp {
            *level -= amp_floor;
        }
        let env_floor = env[0];
        for level in &mut env {
            *level -= env_floor;
        }

        Self { amp, env }
    }
}

/// Floor term of the volume curve, so that volume 0 maps to exactly 0.0
#[inline]
fn volume_floor() -> f64 {
    10f64.powf(-100.0 / 60.0)
}

/// Floor term of the pan curve
#[inline]
fn pan_floor() -> f64 {
    10f64.powf(-50.0 / 30.0)
}

/// Map a 0-100 volume setting onto the logarithmic gain curve
///
/// 100 maps to just under unity, each 6 points cost ~2 dB, and 0 maps to
/// exactly zero.
#[inline]
pub fn volume_factor(volume: i32) -> f64 {
    let v = volume.clamp(0, 100);
    10f64.powf((v - 100) as f64 / 60.0) - volume_floor()
}

/// Left-side attenuation for a 0-100 pan setting (50 = center)
#[inline]
pub fn pan_factor_left(pan: i32) -> f64 {
    let p = pan.clamp(0, 100);
    10f64.powf(((100 - p).min(50) - 50) as f64 / 30.0) - pan_floor()
}

/// Right-side attenuation for a 0-100 pan setting (50 = center)
#[inline]
pub fn pan_factor_right(pan: i32) -> f64 {
    let p = pan.clamp(0, 100);
    10f64.powf((p.min(50) - 50) as f64 / 30.0) - pan_floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_phase_step_matches_formula() {
        for period in 1u32..=4095 {
            assert_eq!(tone_phase_step(period), BASE_PHASE_STEP / period);
        }
    }

    #[test]
    fn test_phase_step_period_zero_saturates() {
        assert_eq!(tone_phase_step(0), 1 << 31);
        // Saturated step must exceed every finite-period step
        assert!(tone_phase_step(0) > tone_phase_step(1));
    }

    #[test]
    fn test_amp_table_matches_geometric_formula() {
        let tables = LevelTables::new(PsgVariant::Ay8910);

        // Rebuild from the closed form and compare bit-for-bit
        let mut v = AMP_PEAK;
        let mut expected = [0i16; 16];
        for i in (0..16).rev() {
            expected[i] = v as i16;
            v *= AMP_RATIO;
        }
        let floor = expected[0];
        for (i, e) in expected.iter().enumerate() {
            assert_eq!(tables.amp[i], e - floor, "amp[{i}]");
        }
    }

    #[test]
    fn test_amp_table_zero_normalized() {
        for variant in [PsgVariant::Ay8910, PsgVariant::Ym2149] {
            let tables = LevelTables::new(variant);
            assert_eq!(tables.amp[0], 0);
            assert_eq!(tables.env[0], 0);
        }
    }

    #[test]
    fn test_amp_table_monotonic() {
        let tables = LevelTables::new(PsgVariant::Ym2149);
        for i in 1..16 {
            assert!(tables.amp[i] > tables.amp[i - 1]);
        }
        for i in 1..32 {
            assert!(tables.env[i] >= tables.env[i - 1]);
        }
    }

    #[test]
    fn test_env_table_variants_differ() {
        let ay = LevelTables::new(PsgVariant::Ay8910);
        let ym = LevelTables::new(PsgVariant::Ym2149);

        // AY duplicates each amplitude level; YM has 32 distinct steps
        assert_eq!(ay.env[30], ay.env[31]);
        assert!(ym.env[30] < ym.env[31]);
        // Both peak at the same level
        assert_eq!(ay.env[31], ym.env[31]);
    }

    #[test]
    fn test_volume_factor_endpoints() {
        assert_eq!(volume_factor(0), 0.0);
        assert_relative_eq!(volume_factor(100), 1.0 - volume_floor(), epsilon = 1e-12);
        // Out-of-range input clamps
        assert_eq!(volume_factor(150), volume_factor(100));
        assert_eq!(volume_factor(-5), volume_factor(0));
    }

    #[test]
    fn test_volume_factor_monotonic() {
        for v in 1..=100 {
            assert!(volume_factor(v) > volume_factor(v - 1));
        }
    }

    #[test]
    fn test_pan_center_is_symmetric() {
        assert_relative_eq!(pan_factor_left(50), pan_factor_right(50), epsilon = 1e-12);
    }

    #[test]
    fn test_pan_extremes() {
        // Hard left: full left, silent right
        assert_relative_eq!(pan_factor_left(0), 1.0 - pan_floor(), epsilon = 1e-12);
        assert_eq!(pan_factor_right(0), 0.0);
        // Hard right mirrors
        assert_relative_eq!(pan_factor_right(100), 1.0 - pan_floor(), epsilon = 1e-12);
        assert_eq!(pan_factor_left(100), 0.0);
    }

    #[test]
    fn test_pan_mirror_symmetry() {
        for pan in 0..=100 {
            assert_relative_eq!(
                pan_factor_left(pan),
                pan_factor_right(100 - pan),
                epsilon = 1e-12
            );
        }
    }
}
