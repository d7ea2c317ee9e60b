//! Sample conversion from device formats to signed little-endian PCM.
//!
//! Backends deliver whatever the OS hands them — Float32 on most hosts,
//! Int16 on some — and the stream promises bytes at the configured bit
//! depth. Out-of-range floats are clamped, never wrapped.

/// Convert f32 samples in `[-1.0, 1.0]` to PCM bytes at `bit_depth`
/// (16, 24, or 32, little-endian).
pub fn f32_to_pcm(samples: &[f32], bit_depth: u16) -> Vec<u8> {
    let bytes_per_sample = bit_depth as usize / 8;
    let mut data = Vec::with_capacity(samples.len() * bytes_per_sample);

    match bit_depth {
        16 => {
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        24 => {
            const MAX_24: f64 = 8_388_607.0; // 2^23 - 1
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) as f64 * MAX_24) as i32;
                data.extend_from_slice(&value.to_le_bytes()[..3]);
            }
        }
        32 => {
            for &sample in samples {
                let value = (sample.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        other => unreachable!("bit depth {} rejected by config validation", other),
    }
    data
}

/// Convert i16 device samples to PCM bytes at `bit_depth`. 16-bit is a
/// straight little-endian copy; wider depths shift up.
pub fn i16_to_pcm(samples: &[i16], bit_depth: u16) -> Vec<u8> {
    let bytes_per_sample = bit_depth as usize / 8;
    let mut data = Vec::with_capacity(samples.len() * bytes_per_sample);

    match bit_depth {
        16 => {
            for &sample in samples {
                data.extend_from_slice(&sample.to_le_bytes());
            }
        }
        24 => {
            for &sample in samples {
                let value = (sample as i32) << 8;
                data.extend_from_slice(&value.to_le_bytes()[..3]);
            }
        }
        32 => {
            for &sample in samples {
                let value = (sample as i32) << 16;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        other => unreachable!("bit depth {} rejected by config validation", other),
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn read_i16(bytes: &[u8]) -> i16 {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn read_i24(bytes: &[u8]) -> i32 {
        // sign-extend the 3-byte value
        (i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]])) >> 8
    }

    #[test]
    fn f32_to_16bit_roundtrip() {
        let samples = [0.0f32, 0.5, -0.5, 1.0, -1.0];
        let pcm = f32_to_pcm(&samples, 16);
        assert_eq!(pcm.len(), samples.len() * 2);

        for (i, &expected) in samples.iter().enumerate() {
            let value = read_i16(&pcm[i * 2..]) as f32 / i16::MAX as f32;
            assert_relative_eq!(value, expected.max(-1.0), epsilon = 1e-3);
        }
    }

    #[test]
    fn f32_clamps_out_of_range() {
        let pcm = f32_to_pcm(&[2.0, -2.0], 16);
        assert_eq!(read_i16(&pcm[0..2]), i16::MAX);
        assert_eq!(read_i16(&pcm[2..4]), -i16::MAX);
    }

    #[test]
    fn f32_to_24bit() {
        let pcm = f32_to_pcm(&[1.0, -1.0, 0.0], 24);
        assert_eq!(pcm.len(), 9);
        assert_eq!(read_i24(&pcm[0..3]), 8_388_607);
        assert_eq!(read_i24(&pcm[3..6]), -8_388_607);
        assert_eq!(read_i24(&pcm[6..9]), 0);
    }

    #[test]
    fn f32_to_32bit() {
        let pcm = f32_to_pcm(&[0.25f32], 32);
        let value = i32::from_le_bytes([pcm[0], pcm[1], pcm[2], pcm[3]]);
        assert_relative_eq!(
            value as f64 / i32::MAX as f64,
            0.25,
            epsilon = 1e-6
        );
    }

    #[test]
    fn i16_passthrough_is_byte_exact() {
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN];
        let pcm = i16_to_pcm(&samples, 16);
        for (i, &sample) in samples.iter().enumerate() {
            assert_eq!(read_i16(&pcm[i * 2..]), sample);
        }
    }

    #[test]
    fn i16_widens_by_shifting() {
        let pcm = i16_to_pcm(&[1i16, -1], 24);
        assert_eq!(read_i24(&pcm[0..3]), 256);
        assert_eq!(read_i24(&pcm[3..6]), -256);

        let pcm = i16_to_pcm(&[1i16], 32);
        assert_eq!(i32::from_le_bytes([pcm[0], pcm[1], pcm[2], pcm[3]]), 65536);
    }
}
