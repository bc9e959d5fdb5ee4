use std::fmt;

// -------------------------------------------------------------------------------------------------

/// Known SPC driver families.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AudioEngine {
    NSpc,
    Akao,
    Hal,
    Kankichi,
    CapcomQSound,
    Unknown,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EngineFingerprint {
    pub engine:      AudioEngine,
    pub driver_base: u16,
    pub confidence:  f32,
}

impl EngineFingerprint {
    pub const fn unknown() -> Self {
        Self { engine: AudioEngine::Unknown, driver_base: 0, confidence: 0.5 }
    }
}

// -------------------------------------------------------------------------------------------------

/// Identifies the driver from the first bytes of an audio image.
pub fn fingerprint(image: &[u8]) -> EngineFingerprint {
    if image.len() < 4 {
        return EngineFingerprint::unknown();
    }
    if image[0] == 0x40 && image[1] == 0x12 {
        return EngineFingerprint { engine: AudioEngine::NSpc, driver_base: 0x0200, confidence: 0.9 };
    }
    if image[0] == 0x7C && image[1] == 0x95 {
        return EngineFingerprint { engine: AudioEngine::Akao, driver_base: 0x0100, confidence: 0.8 };
    }
    if image.starts_with(b"HAL") {
        return EngineFingerprint { engine: AudioEngine::Hal, driver_base: 0x0200, confidence: 0.8 };
    }
    if (0x80..=0xDF).contains(&image[0]) && image[1] < 0x80 {
        return EngineFingerprint { engine: AudioEngine::Kankichi, driver_base: 0x0200, confidence: 0.6 };
    }
    EngineFingerprint::unknown()
}

/// Tries the image start first, then each candidate offset, keeping the most
/// confident match.
pub fn fingerprint_with_candidates(image: &[u8], candidates: &[usize]) -> EngineFingerprint {
    let mut best = fingerprint(image);
    for &offset in candidates {
        if offset < image.len() {
            let probe = fingerprint(&image[offset..]);
            if probe.confidence > best.confidence {
                best = probe;
            }
        }
    }
    best
}

impl fmt::Display for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            Self::NSpc => "N-SPC",
            Self::Akao => "Akao",
            Self::Hal => "HAL",
            Self::Kankichi => "Kankichi-kun",
            Self::CapcomQSound => "Capcom QSound",
            Self::Unknown => "Unknown",
        })
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nspc_signature_wins() {
        let fp = fingerprint(&[0x40, 0x12, 0x00, 0x00]);
        assert_eq!(fp.engine, AudioEngine::NSpc);
        assert_eq!(fp.driver_base, 0x0200);
        assert!((fp.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn akao_signature_wins() {
        let fp = fingerprint(&[0x7C, 0x95, 0x12, 0x34]);
        assert_eq!(fp.engine, AudioEngine::Akao);
        assert_eq!(fp.driver_base, 0x0100);
    }

    #[test]
    fn hal_signature_wins() {
        assert_eq!(fingerprint(b"HAL\x10").engine, AudioEngine::Hal);
    }

    #[test]
    fn kankichi_command_stream_is_detected() {
        assert_eq!(fingerprint(&[0x9C, 0x10, 0x00, 0x00]).engine, AudioEngine::Kankichi);
    }

    #[test]
    fn anything_else_is_unknown_at_half_confidence() {
        let fp = fingerprint(&[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(fp.engine, AudioEngine::Unknown);
        assert!((fp.confidence - 0.5).abs() < f32::EPSILON);
    }
}
