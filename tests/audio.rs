mod common;

use common::RomBuilder;
use snes_disasm::{
    audio::{
        brr::scan_brr,
        engine::AudioEngine,
        sequence::TrackEventKind,
        spc::validate_spc,
    },
    AnalysisConfig, CancellationToken, RomAnalysis,
};

/// Upload routine: widen X/Y, load the transfer registers, then perform the
/// IPL handshake. The transferred region holds an N-SPC driver image with a
/// sequence header and one channel.
fn audio_rom() -> snes_disasm::Rom {
    let code = [
        0xC2, 0x10, // REP #$10 (16-bit X/Y)
        0xAD, 0x00, 0xC0, // LDA $C000 (transfer source)
        0xA2, 0x00, 0x00, // LDX #$0000 (SPC RAM target)
        0xA0, 0x00, 0x04, // LDY #$0400 (transfer size)
        0xA9, 0xCC, // LDA #$CC
        0x8D, 0x41, 0x21, // STA $2141
        0x8D, 0x40, 0x21, // STA $2140
        0xD0, 0xF8, // BNE (copy loop)
        0x60, // RTS
    ];

    // The audio image transferred to SPC RAM, staged at file 0x4000 (= $C000).
    let mut image = vec![0u8; 0x400];
    image[0] = 0x40;
    image[1] = 0x12;
    // Sequence header: channel mask 0x01, tempo 120, channel pointer 0x0300.
    image[0x100] = 0x01;
    image[0x101] = 120;
    image[0x102..0x104].copy_from_slice(&0x0300u16.to_le_bytes());
    // Channel: rest 24 ticks, note C4 (0x98) for 24 ticks, end.
    image[0x300] = 0x18;
    image[0x301..0x304].copy_from_slice(&[0x98, 0x18, 0x50]);
    image[0x304] = 0x00;
    // A two-block BRR sample at a 9-byte-aligned offset (0x1C2 = 9 * 50).
    let brr_at = 0x1C2;
    image[brr_at] = 0x00;
    image[brr_at + 1..brr_at + 9].copy_from_slice(&[0x11; 8]);
    image[brr_at + 9] = 0x01;
    image[brr_at + 10..brr_at + 18].copy_from_slice(&[0x22; 8]);

    RomBuilder::lorom(0x8000).reset_vector(0x8000).code(0, &code).code(0x4000, &image).build()
}

fn analyze(rom: &snes_disasm::Rom) -> RomAnalysis {
    RomAnalysis::analyze(rom, &AnalysisConfig::default(), &CancellationToken::new()).expect("analysis failed")
}

#[test]
fn nspc_driver_is_fingerprinted_from_the_upload() {
    let analysis = analyze(&audio_rom());
    assert_eq!(analysis.audio.uploads.len(), 1);
    assert_eq!(analysis.audio.engine.engine, AudioEngine::NSpc);
    assert_eq!(analysis.audio.engine.driver_base, 0x0200);
    assert!((analysis.audio.engine.confidence - 0.9).abs() < f32::EPSILON);
    assert_eq!(analysis.audio.spc_state.ram[0], 0x40);
    assert_eq!(analysis.audio.spc_state.ram[1], 0x12);
}

#[test]
fn nspc_sequence_parses_one_channel_at_120_bpm() {
    let analysis = analyze(&audio_rom());
    let sequence = analysis
        .audio
        .sequences
        .iter()
        .find(|s| s.addr == 0x100)
        .expect("sequence header at 0x100");

    assert_eq!(sequence.engine, AudioEngine::NSpc);
    assert_eq!(sequence.tempo_bpm, 120);
    assert_eq!(sequence.tracks.len(), 1);
    assert_eq!(sequence.timing.ticks_per_beat, 48);

    let track = &sequence.tracks[0];
    assert!(!track.aborted);
    assert_eq!(track.events.last().map(|e| e.kind), Some(TrackEventKind::End));
    assert_eq!(track.ticks, 48);
}

#[test]
fn brr_sample_is_found_in_the_ram_image() {
    let analysis = analyze(&audio_rom());
    let sample = analysis.audio.samples.iter().find(|s| s.addr == 0x1C2).expect("BRR sample at 0x1C2");
    assert_eq!(sample.byte_len(), 18);
    assert!(sample.end_flag);
    assert!(!sample.loop_flag);
    assert_eq!(sample.loop_start, -1);
}

#[test]
fn exported_spc_passes_its_own_validation() {
    let analysis = analyze(&audio_rom());
    let bytes = analysis.audio.spc_state.export_spc(None);
    validate_spc(&bytes).expect("exporter output must validate");
    // The reconstructed RAM image lands at file offset 0x100.
    assert_eq!(bytes[0x100], 0x40);
    assert_eq!(bytes[0x101], 0x12);
}

#[test]
fn brr_scan_respects_the_sample_cap() {
    // An image of back-to-back minimal two-block samples.
    let mut image = Vec::new();
    for _ in 0..400 {
        let mut first = [0x33u8; 9];
        first[0] = 0x00;
        let mut second = [0x44u8; 9];
        second[0] = 0x01;
        image.extend_from_slice(&first);
        image.extend_from_slice(&second);
    }
    let samples = scan_brr(&image);
    assert_eq!(samples.len(), snes_disasm::audio::brr::MAX_SAMPLES_PER_SCAN);
}
