use sertel_frame::CHANNELS;

/// Per-channel affine calibration: `calibrated[i] = raw[i] * scale[i] + offset[i]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    scale: [f32; CHANNELS],
    offset: [f32; CHANNELS],
}

impl Calibration {
    pub fn new(scale: [f32; CHANNELS], offset: [f32; CHANNELS]) -> Self {
        Self { scale, offset }
    }

    /// Scale 1, offset 0 on every channel.
    pub fn identity() -> Self {
        Self::new([1.0; CHANNELS], [0.0; CHANNELS])
    }

    pub fn scale(&self) -> &[f32; CHANNELS] {
        &self.scale
    }

    pub fn offset(&self) -> &[f32; CHANNELS] {
        &self.offset
    }

    /// Calibrate one channel. Out-of-range inputs are not clamped.
    pub fn channel(&self, index: usize, raw: f32) -> f32 {
        raw * self.scale[index] + self.offset[index]
    }

    /// Calibrate all channels of a packet.
    pub fn apply(&self, raw: &[f32; CHANNELS]) -> [f32; CHANNELS] {
        std::array::from_fn(|i| self.channel(i, raw[i]))
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Calibration {
        Calibration::new(
            [1.0, 2.0, 0.5, -1.0, 10.0, 0.25, 3.0, 100.0],
            [0.0, 1.0, -0.5, 4.0, 0.0, 0.125, -3.0, 7.0],
        )
    }

    #[test]
    fn zero_maps_to_offset() {
        let cal = ramp();
        for i in 0..CHANNELS {
            assert_eq!(cal.channel(i, 0.0), cal.offset()[i]);
        }
    }

    #[test]
    fn affine_in_raw_value() {
        let cal = ramp();
        for i in 0..CHANNELS {
            let at_one = cal.channel(i, 1.0);
            let at_two = cal.channel(i, 2.0);
            assert_eq!(at_two - at_one, cal.scale()[i]);
        }
    }

    #[test]
    fn apply_matches_per_channel() {
        let cal = ramp();
        let raw = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(
            cal.apply(&raw),
            [1.0, 5.0, 1.0, 0.0, 50.0, 1.625, 18.0, 807.0]
        );
    }

    #[test]
    fn identity_is_default_and_passes_through() {
        let raw = [-1.5, 0.0, 1e6, 3.25, -0.0, 7.0, 8.0, 9.0];
        assert_eq!(Calibration::default(), Calibration::identity());
        assert_eq!(Calibration::identity().apply(&raw), raw);
    }

    #[test]
    fn out_of_range_values_pass_unclamped() {
        let cal = Calibration::new([2.0; CHANNELS], [0.0; CHANNELS]);
        assert_eq!(cal.channel(0, f32::MAX), f32::INFINITY);
        assert!(cal.channel(1, f32::NAN).is_nan());
    }
}
