use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// `"SNES-SPC700 Sound File Data"`, 27 bytes.
pub const SPC_HEADER_PREFIX: &[u8; 27] = b"SNES-SPC700 Sound File Data";
pub const SPC_SIGNATURE_BYTE: u8 = 0x1A;
pub const SPC_VERSION_MINOR: u8 = 30;
/// Header + RAM + DSP registers + unused + extra RAM.
pub const SPC_MIN_FILE_SIZE: usize = 0x10200;

pub const ID666_TEXT: u8 = 26;
pub const ID666_BINARY: u8 = 27;

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SpcExportError {
    #[error("SPC file too small: {0} bytes, need {SPC_MIN_FILE_SIZE:#x}")]
    TooSmall(usize),
    #[error("SPC header prefix mismatch")]
    BadHeader,
    #[error("SPC signature bytes at 27..30 are not 0x1A")]
    BadSignature,
    #[error("ID666 flag byte {0} is neither text (26) nor binary (27)")]
    BadId666Flag(u8),
}

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SpcRegisters {
    pub pc:  u16,
    pub a:   u8,
    pub x:   u8,
    pub y:   u8,
    pub psw: u8,
    pub sp:  u8,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SpcTimer {
    pub value:   u8,
    pub target:  u8,
    pub enabled: bool,
}

/// One bidirectional CPU<->APU mailbox port.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SpcPort {
    pub to_apu: u8,
    pub to_cpu: u8,
}

/// Envelope settings decoded from the two ADSR registers.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Adsr {
    pub attack:  u8,
    pub decay:   u8,
    pub sustain: u8,
    pub release: u8,
}

impl Adsr {
    pub fn from_registers(adsr1: u8, adsr2: u8) -> Option<Self> {
        // Bit 7 of ADSR1 selects ADSR mode over GAIN.
        (adsr1 & 0x80 != 0).then_some(Self {
            attack:  adsr1 & 0x0F,
            decay:   (adsr1 >> 4) & 0x07,
            sustain: (adsr2 >> 5) & 0x07,
            release: adsr2 & 0x1F,
        })
    }
}

/// Well-known global DSP register addresses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum DspGlobalRegister {
    MainVolumeLeft  = 0x0C,
    EchoFeedback    = 0x0D,
    MainVolumeRight = 0x1C,
    EchoVolumeLeft  = 0x2C,
    PitchModulation = 0x2D,
    EchoVolumeRight = 0x3C,
    NoiseEnable     = 0x3D,
    KeyOn           = 0x4C,
    EchoEnable      = 0x4D,
    KeyOff          = 0x5C,
    SampleDirectory = 0x5D,
    Flags           = 0x6C,
    EchoStart       = 0x6D,
    EndX            = 0x7C,
    EchoDelay       = 0x7D,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DspVoice {
    pub volume_left:  i8,
    pub volume_right: i8,
    pub pitch:        u16,
    pub source:       u8,
    pub adsr:         Option<Adsr>,
    pub gain:         u8,
    pub envelope:     u8,
    pub output:       i8,
}

#[derive(Clone, Debug)]
pub struct DspState {
    pub registers:         [u8; 128],
    pub voices:            [DspVoice; 8],
    pub main_volume:       (i8, i8),
    pub echo_volume:       (i8, i8),
    pub echo_feedback:     i8,
    pub echo_enable:       u8,
    pub noise_enable:      u8,
    pub key_on:            u8,
    pub key_off:           u8,
    pub sample_directory:  u8,
}

impl DspState {
    pub fn from_registers(registers: [u8; 128]) -> Self {
        let reg = |r: DspGlobalRegister| registers[u8::from(r) as usize];
        let mut voices = [DspVoice::default(); 8];
        for (v, voice) in voices.iter_mut().enumerate() {
            let base = v * 0x10;
            *voice = DspVoice {
                volume_left:  registers[base] as i8,
                volume_right: registers[base + 1] as i8,
                pitch:        u16::from_le_bytes([registers[base + 2], registers[base + 3]]) & 0x3FFF,
                source:       registers[base + 4],
                adsr:         Adsr::from_registers(registers[base + 5], registers[base + 6]),
                gain:         registers[base + 7],
                envelope:     registers[base + 8],
                output:       registers[base + 9] as i8,
            };
        }
        Self {
            voices,
            main_volume: (reg(DspGlobalRegister::MainVolumeLeft) as i8, reg(DspGlobalRegister::MainVolumeRight) as i8),
            echo_volume: (reg(DspGlobalRegister::EchoVolumeLeft) as i8, reg(DspGlobalRegister::EchoVolumeRight) as i8),
            echo_feedback: reg(DspGlobalRegister::EchoFeedback) as i8,
            echo_enable: reg(DspGlobalRegister::EchoEnable),
            noise_enable: reg(DspGlobalRegister::NoiseEnable),
            key_on: reg(DspGlobalRegister::KeyOn),
            key_off: reg(DspGlobalRegister::KeyOff),
            sample_directory: reg(DspGlobalRegister::SampleDirectory),
            registers,
        }
    }
}

/// Frozen snapshot of the audio co-processor, exportable as an SPC file.
#[derive(Clone)]
pub struct SpcProgramState {
    pub registers: SpcRegisters,
    pub ram:       Box<[u8; 0x10000]>,
    pub timers:    [SpcTimer; 3],
    pub ports:     [SpcPort; 4],
    pub dsp:       DspState,
}

/// Text metadata written into the ID666 block.
#[derive(Clone, Debug, Default)]
pub struct Id666Metadata {
    pub song_title:     String,
    pub game_title:     String,
    pub dumper:         String,
    pub comments:       String,
    pub length_seconds: u32,
}

impl Default for SpcProgramState {
    fn default() -> Self {
        Self::new()
    }
}

impl SpcProgramState {
    pub fn new() -> Self {
        Self {
            registers: SpcRegisters { pc: 0x0200, sp: 0xEF, ..Default::default() },
            ram:       Box::new([0u8; 0x10000]),
            timers:    [SpcTimer::default(); 3],
            ports:     [SpcPort::default(); 4],
            dsp:       DspState::from_registers([0u8; 128]),
        }
    }

    /// Serializes the snapshot in the SPC file layout: 27-byte header string,
    /// three 0x1A signature bytes, ID666 flag, version minor, register block,
    /// ID666 text padded to 0x100, 64 KiB RAM, 128 DSP registers, 64 unused
    /// bytes and 64 bytes of extra RAM.
    pub fn export_spc(&self, metadata: Option<&Id666Metadata>) -> Vec<u8> {
        let mut out = vec![0u8; SPC_MIN_FILE_SIZE];
        out[..27].copy_from_slice(SPC_HEADER_PREFIX);
        out[27] = SPC_SIGNATURE_BYTE;
        out[28] = SPC_SIGNATURE_BYTE;
        out[29] = SPC_SIGNATURE_BYTE;
        out[30] = if metadata.is_some() { ID666_TEXT } else { ID666_BINARY };
        out[31] = SPC_VERSION_MINOR;
        out[32..34].copy_from_slice(&self.registers.pc.to_le_bytes());
        out[34] = self.registers.a;
        out[35] = self.registers.x;
        out[36] = self.registers.y;
        out[37] = self.registers.psw;
        out[38] = self.registers.sp;
        // Two reserved bytes follow the register block.

        if let Some(meta) = metadata {
            write_padded(&mut out[0x2E..0x4E], meta.song_title.as_bytes());
            write_padded(&mut out[0x4E..0x6E], meta.game_title.as_bytes());
            write_padded(&mut out[0x6E..0x7E], meta.dumper.as_bytes());
            write_padded(&mut out[0x7E..0x9E], meta.comments.as_bytes());
            write_padded(&mut out[0xA9..0xAC], format!("{}", meta.length_seconds.min(999)).as_bytes());
        }

        out[0x100..0x10100].copy_from_slice(&self.ram[..]);
        out[0x10100..0x10180].copy_from_slice(&self.dsp.registers);
        // 64 unused bytes, then 64 bytes of extra RAM, all zero.
        out
    }
}

fn write_padded(dest: &mut [u8], src: &[u8]) {
    let n = src.len().min(dest.len());
    dest[..n].copy_from_slice(&src[..n]);
}

/// The validation the exporter's own output must pass.
pub fn validate_spc(bytes: &[u8]) -> Result<(), SpcExportError> {
    if bytes.len() < SPC_MIN_FILE_SIZE {
        return Err(SpcExportError::TooSmall(bytes.len()));
    }
    if &bytes[..27] != SPC_HEADER_PREFIX {
        return Err(SpcExportError::BadHeader);
    }
    if bytes[27] != SPC_SIGNATURE_BYTE || bytes[28] != SPC_SIGNATURE_BYTE || bytes[29] != SPC_SIGNATURE_BYTE {
        return Err(SpcExportError::BadSignature);
    }
    if bytes[30] != ID666_TEXT && bytes[30] != ID666_BINARY {
        return Err(SpcExportError::BadId666Flag(bytes[30]));
    }
    Ok(())
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_validates_under_own_validator() {
        let mut state = SpcProgramState::new();
        state.registers.pc = 0x0200;
        state.ram[0x0200] = 0x40;
        let bytes = state.export_spc(None);
        assert_eq!(bytes.len(), SPC_MIN_FILE_SIZE);
        validate_spc(&bytes).unwrap();

        let with_meta = state.export_spc(Some(&Id666Metadata {
            song_title: "Overworld Theme".into(),
            game_title: "Some Game".into(),
            ..Default::default()
        }));
        validate_spc(&with_meta).unwrap();
        assert_eq!(with_meta[30], ID666_TEXT);
    }

    #[test]
    fn ram_lands_at_offset_0x100() {
        let mut state = SpcProgramState::new();
        state.ram[0] = 0xAB;
        state.ram[0xFFFF] = 0xCD;
        let bytes = state.export_spc(None);
        assert_eq!(bytes[0x100], 0xAB);
        assert_eq!(bytes[0x100FF], 0xCD);
    }

    #[test]
    fn corrupted_signature_is_rejected() {
        let mut bytes = SpcProgramState::new().export_spc(None);
        bytes[28] = 0;
        assert!(matches!(validate_spc(&bytes), Err(SpcExportError::BadSignature)));
        assert!(matches!(validate_spc(&bytes[..100]), Err(SpcExportError::TooSmall(_))));
    }

    #[test]
    fn adsr_decoding_respects_mode_bit() {
        assert!(Adsr::from_registers(0x00, 0x00).is_none());
        let adsr = Adsr::from_registers(0x8F, 0xE0).unwrap();
        assert_eq!(adsr.attack, 0x0F);
        assert_eq!(adsr.sustain, 0x07);
    }

    #[test]
    fn dsp_voice_fields_come_from_register_file() {
        let mut registers = [0u8; 128];
        registers[0x10] = 0x7F; // voice 1 left volume
        registers[0x12] = 0x00;
        registers[0x13] = 0x10; // voice 1 pitch = 0x1000
        registers[0x14] = 0x05; // voice 1 source
        registers[0x4C] = 0b0000_0010; // key-on voice 1
        let dsp = DspState::from_registers(registers);
        assert_eq!(dsp.voices[1].volume_left, 0x7F);
        assert_eq!(dsp.voices[1].pitch, 0x1000);
        assert_eq!(dsp.voices[1].source, 5);
        assert_eq!(dsp.key_on, 2);
    }
}
