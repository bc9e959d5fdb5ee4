pub mod brr;
pub mod engine;
pub mod sequence;
pub mod spc;
pub mod upload;

use crate::{
    cartridge::Mapper,
    disassembler::Disassembly,
    snes_utils::rom::Rom,
};

use self::{
    brr::BrrSample,
    engine::EngineFingerprint,
    sequence::{GlobalEffect, MusicSequence},
    spc::SpcProgramState,
    upload::UploadTrace,
};

// -------------------------------------------------------------------------------------------------

/// Everything the audio sub-pipeline recovered from one ROM.
pub struct AudioAnalysis {
    pub engine:    EngineFingerprint,
    pub uploads:   Vec<UploadTrace>,
    pub spc_state: SpcProgramState,
    pub samples:   Vec<BrrSample>,
    pub sequences: Vec<MusicSequence>,
}

impl AudioAnalysis {
    /// Placeholder for cancelled or audio-free runs.
    pub fn empty() -> Self {
        Self {
            engine:    EngineFingerprint::unknown(),
            uploads:   Vec::new(),
            spc_state: SpcProgramState::new(),
            samples:   Vec::new(),
            sequences: Vec::new(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Runs after the CFG is built: traces uploads, reconstructs the 64 KiB audio
/// RAM image, fingerprints the driver, then scans for samples and sequences.
pub fn analyze_audio(disasm: &Disassembly, rom: &Rom, mapper: Mapper) -> AudioAnalysis {
    let uploads = upload::trace_uploads(disasm, mapper);

    let mut state = SpcProgramState::new();
    apply_uploads(&mut state, &uploads, rom, mapper);

    let targets: Vec<usize> = uploads.iter().filter_map(|u| u.target_addr).map(usize::from).collect();
    let fingerprint = engine::fingerprint_with_candidates(&state.ram[..], &targets);
    state.registers.pc = fingerprint.driver_base;

    let mut samples = brr::scan_brr(&state.ram[..]);
    attach_voice_envelopes(&mut samples, &state);

    let mut sequences = sequence::locate_sequences(&state.ram[..], fingerprint.engine);
    for sequence in &mut sequences {
        sequence.global_effects = global_effects(&state);
    }

    log::info!(
        "Audio: engine {} ({:.0}% confidence), {} uploads, {} samples, {} sequences",
        fingerprint.engine,
        fingerprint.confidence * 100.0,
        uploads.len(),
        samples.len(),
        sequences.len()
    );

    AudioAnalysis { engine: fingerprint, uploads, spc_state: state, samples, sequences }
}

/// Copies each retained upload's declared span from ROM into the RAM image.
fn apply_uploads(state: &mut SpcProgramState, uploads: &[UploadTrace], rom: &Rom, mapper: Mapper) {
    for upload in uploads {
        let (Some(target), Some(size), Some(source)) = (upload.target_addr, upload.data_size, upload.source) else {
            continue;
        };
        let Some(offset) = mapper.cpu_to_file(source) else { continue };
        let start = offset.as_index();
        let available = rom.0.len().saturating_sub(start);
        let room = 0x10000 - target as usize;
        let count = (size as usize).min(available).min(room);
        state.ram[target as usize..target as usize + count].copy_from_slice(&rom.0[start..start + count]);
    }
}

/// Ties keyed-on voices' ADSR settings to the samples they index.
fn attach_voice_envelopes(samples: &mut [BrrSample], state: &SpcProgramState) {
    for voice in &state.dsp.voices {
        let Some(adsr) = voice.adsr else { continue };
        if let Some(sample) = samples.get_mut(voice.source as usize) {
            sample.adsr.get_or_insert(adsr);
        }
    }
}

fn global_effects(state: &SpcProgramState) -> Vec<GlobalEffect> {
    let mut effects = Vec::new();
    if state.dsp.echo_enable != 0 {
        effects.push(GlobalEffect::Echo);
    }
    if state.dsp.noise_enable != 0 {
        effects.push(GlobalEffect::Noise);
    }
    effects
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::engine::AudioEngine,
        cartridge::CartridgeType,
        disassembler::disassemble,
        internal_header::MapMode,
        snes_utils::addr::AddrSnes,
        CancellationToken,
    };

    #[test]
    fn upload_feeds_the_ram_image_and_fingerprint() {
        // Upload routine: LDA $C000 (source) / LDX #$00 / LDY #$10 /
        // LDA #$CC / STA $2141 / RTS, with N-SPC-looking bytes at the source.
        let mut data = vec![0u8; 0x8000];
        let code = [
            0xAD, 0x00, 0xC0, // LDA $C000
            0xA2, 0x00, // LDX #$00
            0xA0, 0x10, // LDY #$10
            0xA9, 0xCC, // LDA #$CC
            0x8D, 0x41, 0x21, // STA $2141
            0x8D, 0x40, 0x21, // STA $2140
            0xD0, 0xF8, // BNE back
            0x60,
        ];
        data[..code.len()].copy_from_slice(&code);
        data[0x4000] = 0x40;
        data[0x4001] = 0x12;
        let rom = Rom::new(data).unwrap();
        let mapper = Mapper::new(CartridgeType::LoRom, MapMode(0x20), 0x8000);
        let disasm = disassemble(&rom, mapper, &[AddrSnes(0x008000)], &CancellationToken::new()).unwrap();

        let audio = analyze_audio(&disasm, &rom, mapper);
        assert_eq!(audio.uploads.len(), 1);
        assert_eq!(audio.spc_state.ram[0], 0x40);
        assert_eq!(audio.spc_state.ram[1], 0x12);
        assert_eq!(audio.engine.engine, AudioEngine::NSpc);
        assert_eq!(audio.spc_state.registers.pc, 0x0200);
    }
}
