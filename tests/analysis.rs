mod common;

use common::RomBuilder;
use pretty_assertions::assert_eq;
use snes_disasm::{
    AddrSnes, AnalysisConfig, CancellationToken, CartridgeType, Rom, RomAnalysis,
};

fn analyze(rom: &Rom) -> RomAnalysis {
    RomAnalysis::analyze(rom, &AnalysisConfig::default(), &CancellationToken::new()).expect("analysis failed")
}

#[test]
fn lorom_reset_at_8000_discovers_the_entry_function() {
    // SEI / CLC / XCE / LDA #$00 / RTS
    let rom = RomBuilder::lorom(0x8000)
        .reset_vector(0x8000)
        .code(0, &[0x78, 0x18, 0xFB, 0xA9, 0x00, 0x60])
        .build();
    let analysis = analyze(&rom);

    assert_eq!(analysis.cartridge.cartridge_type, CartridgeType::LoRom);
    assert_eq!(analysis.header.reset_vector(), AddrSnes(0x008000));

    let mnemonics: Vec<String> =
        analysis.disassembly.lines.iter().take(3).map(|l| l.opcode.mnemonic.to_string()).collect();
    assert_eq!(mnemonics, vec!["SEI", "CLC", "XCE"]);

    let entry = &analysis.cfg.functions[&AddrSnes(0x008000)];
    assert!((entry.confidence - 1.0).abs() < f32::EPSILON);
    assert_eq!(analysis.metrics.indirect_jumps, 0);
    assert!(analysis.metrics.code_bytes > 0);
    assert!(analysis.metrics.potential_bugs.is_empty(), "{:?}", analysis.metrics.potential_bugs);
    assert!(!analysis.partial);
}

#[test]
fn hirom_long_call_is_a_second_function_with_one_call_ref() {
    // Reset at $008000 (file 0x8000 in HiROM): JSL $C01234 / RTS.
    // The callee at file 0x1234: RTS.
    let rom = RomBuilder::hirom(0x10000)
        .reset_vector(0x8000)
        .code(0x8000, &[0x22, 0x34, 0x12, 0xC0, 0x60])
        .code(0x1234, &[0x60])
        .build();
    let analysis = analyze(&rom);

    assert_eq!(analysis.cartridge.cartridge_type, CartridgeType::HiRom);
    let reset = &analysis.cfg.functions[&AddrSnes(0x008000)];
    assert!((reset.confidence - 1.0).abs() < f32::EPSILON);

    let callee = &analysis.cfg.functions[&AddrSnes(0xC01234)];
    assert!((callee.confidence - 0.9).abs() < 1e-6);

    let refs = analysis.xrefs.references_to(AddrSnes(0xC01234));
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].source, AddrSnes(0x008000));
}

#[test]
fn four_entry_jump_table_discovers_four_functions() {
    // $8000: JMP ($C100,X); table bytes 00 81 40 81 80 81 C0 81, then an
    // unmapped entry. Each target holds RTS.
    let rom = RomBuilder::lorom(0x8000)
        .reset_vector(0x8000)
        .code(0, &[0x7C, 0x00, 0xC1])
        .code(0x4100, &[0x00, 0x81, 0x40, 0x81, 0x80, 0x81, 0xC0, 0x81, 0x00, 0x00])
        .code(0x0100, &[0x60])
        .code(0x0140, &[0x60])
        .code(0x0180, &[0x60])
        .code(0x01C0, &[0x60])
        .build();
    let analysis = analyze(&rom);

    let targets = [0x008100u32, 0x008140, 0x008180, 0x0081C0];
    for target in targets {
        assert!(
            analysis.cfg.functions.contains_key(&AddrSnes(target)),
            "missing function at {target:#x}"
        );
        let refs = analysis.xrefs.references_to(AddrSnes(target));
        assert_eq!(refs.len(), 1, "xrefs for {target:#x}");
    }

    let dispatch = analysis.cfg.block_containing(AddrSnes(0x008000)).unwrap();
    assert_eq!(dispatch.successors.len(), 4);
    assert_eq!(analysis.metrics.indirect_jumps, 1);
}

#[test]
fn every_line_round_trips_through_the_mapper() {
    let rom = RomBuilder::lorom(0x8000)
        .reset_vector(0x8000)
        .code(0, &[0x78, 0x18, 0xFB, 0xC2, 0x20, 0xA9, 0x34, 0x12, 0xE2, 0x20, 0xA9, 0x56, 0x60])
        .build();
    let analysis = analyze(&rom);
    let mapper = analysis.cartridge.mapper(rom.0.len());

    for line in &analysis.disassembly.lines {
        let offset = mapper.cpu_to_file(line.addr).expect("line maps to ROM");
        let bytes = line.bytes();
        assert_eq!(&rom.0[offset.as_index()..offset.as_index() + bytes.len()], bytes.as_slice());
    }
}

#[test]
fn block_byte_lengths_match_their_instruction_sums() {
    let rom = RomBuilder::lorom(0x8000)
        .reset_vector(0x8000)
        .code(0, &[0xA9, 0x01, 0xF0, 0x03, 0x4C, 0x08, 0x80, 0x60, 0x60])
        .build();
    let analysis = analyze(&rom);

    assert!(!analysis.cfg.blocks.is_empty());
    for block in analysis.cfg.blocks.values() {
        let total: usize = block.instructions.iter().map(|i| i.size()).sum();
        assert_eq!(total, block.byte_len(), "block {}", block.id);
        for succ in &block.successors {
            assert!(analysis.cfg.blocks[succ].predecessors.contains(&block.id));
        }
    }
}

#[test]
fn analysis_is_idempotent() {
    let rom = RomBuilder::lorom(0x8000)
        .reset_vector(0x8000)
        .nmi_vector(0x8010)
        .code(0, &[0x20, 0x10, 0x80, 0xF0, 0xFB, 0x60])
        .code(0x10, &[0x40])
        .build();

    let first = analyze(&rom);
    let second = analyze(&rom);

    let ids = |a: &RomAnalysis| a.cfg.blocks.keys().copied().collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));

    let functions = |a: &RomAnalysis| a.cfg.functions.keys().copied().collect::<Vec<_>>();
    assert_eq!(functions(&first), functions(&second));

    let refs = |a: &RomAnalysis| {
        a.xrefs.iter().map(|(t, rs)| (*t, rs.iter().map(|r| r.source).collect::<Vec<_>>())).collect::<Vec<_>>()
    };
    assert_eq!(refs(&first), refs(&second));

    let lines = |a: &RomAnalysis| a.disassembly.lines.iter().map(|l| (l.addr, l.bytes())).collect::<Vec<_>>();
    assert_eq!(lines(&first), lines(&second));
}

#[test]
fn copier_header_is_invisible_downstream() {
    let plain = RomBuilder::lorom(0x8000).reset_vector(0x8000).code(0, &[0x78, 0x18, 0xFB, 0x60]).build();
    let headered = Rom::new(
        RomBuilder::lorom(0x8000).reset_vector(0x8000).code(0, &[0x78, 0x18, 0xFB, 0x60]).with_copier_header(),
    )
    .unwrap();

    let a = analyze(&plain);
    let b = analyze(&headered);
    assert_eq!(a.metrics.total_instructions, b.metrics.total_instructions);
    assert_eq!(
        a.cfg.functions.keys().collect::<Vec<_>>(),
        b.cfg.functions.keys().collect::<Vec<_>>()
    );
}

#[test]
fn unmapped_reset_vector_is_an_input_error() {
    // Reset points at $4321, which is not ROM-mapped in LoROM.
    let rom = RomBuilder::lorom(0x8000).reset_vector(0x4321).build();
    let result = RomAnalysis::analyze(&rom, &AnalysisConfig::default(), &CancellationToken::new());
    assert!(result.is_err());
}

#[test]
fn jmp_to_self_is_reported_as_a_high_severity_bug() {
    let rom = RomBuilder::lorom(0x8000).reset_vector(0x8000).code(0, &[0x4C, 0x00, 0x80]).build();
    let analysis = analyze(&rom);
    assert!(analysis
        .metrics
        .potential_bugs
        .iter()
        .any(|b| matches!(b.kind, snes_disasm::metrics::BugKind::JumpToSelf)));
}

#[test]
fn cancelled_run_is_partial() {
    let rom = RomBuilder::lorom(0x8000).reset_vector(0x8000).code(0, &[0x60]).build();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let analysis = RomAnalysis::analyze(&rom, &AnalysisConfig::default(), &cancel).unwrap();
    assert!(analysis.partial);
}

#[test]
fn caller_seeds_and_hints_are_honored() {
    use std::collections::BTreeMap;

    // Unreferenced routine at file 0x100 only reachable through a user seed.
    let rom = RomBuilder::lorom(0x8000)
        .reset_vector(0x8000)
        .code(0, &[0x60])
        .code(0x100, &[0xA9, 0x01, 0x60])
        .build();

    let mut config = AnalysisConfig { seeds: vec![AddrSnes(0x008100)], ..Default::default() };
    config.hints.labels = BTreeMap::from([(AddrSnes(0x008100), "SideEntry".to_string())]);

    let analysis = RomAnalysis::analyze(&rom, &config, &CancellationToken::new()).unwrap();
    assert!(analysis.disassembly.line_at(AddrSnes(0x008100)).is_some());
    assert_eq!(analysis.enrichment.labels.get(&AddrSnes(0x008100)).map(String::as_str), Some("SideEntry"));
}
