#![allow(clippy::identity_op)]

pub mod audio;
pub mod cartridge;
pub mod disassembler;
pub mod enrichment;
pub mod internal_header;
pub mod metrics;
pub mod snes_utils;

use std::{
    collections::BTreeSet,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use thiserror::Error;

pub use crate::{
    cartridge::{CartridgeInfo, CartridgeType, Mapper},
    enrichment::Hints,
    internal_header::{RomHeader, HeaderParseError},
    snes_utils::{
        addr::{AddrPc, AddrSnes},
        rom::{Rom, RomError, SMC_HEADER_SIZE},
    },
};
use crate::{
    audio::AudioAnalysis,
    disassembler::{
        binary_block::{build_blocks, DataStructure},
        cfg::{build_cfg, ControlFlowGraph},
        disassemble,
        functions::detect_functions,
        jump_tables::{scan_tables, TableScan},
        patterns::match_patterns,
        serialization::{render_lines, LineKind},
        xref::{build_xref_index, CrossRefIndex},
        Disassembly, DisassemblyError,
    },
    enrichment::{enrich, Enrichment},
    metrics::{collect_metrics, AnalysisWarnings, QualityMetrics, WarningKind},
};

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to load ROM: {0}")]
    Rom(#[from] RomError),
    #[error("Failed to parse internal header: {0}")]
    Header(#[from] HeaderParseError),
    #[error(transparent)]
    Disassembly(#[from] DisassemblyError),
}

// -------------------------------------------------------------------------------------------------

/// Cooperative cancellation shared between the caller and the pipeline. The
/// walker tests it every 1024 lines; the driver tests it between stages.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Caller-supplied analysis inputs beyond the ROM itself.
#[derive(Clone, Debug, Default)]
pub struct AnalysisConfig {
    /// Extra walk seeds on top of the interrupt vectors.
    pub seeds: Vec<AddrSnes>,
    /// Label/comment/symbol overrides, applied after enrichment.
    pub hints: Hints,
}

// -------------------------------------------------------------------------------------------------

/// The full analysis result handed to renderers. Populated once, immutable
/// afterwards; owns everything it refers to.
pub struct RomAnalysis {
    pub header:          RomHeader,
    pub cartridge:       CartridgeInfo,
    pub disassembly:     Disassembly,
    pub cfg:             ControlFlowGraph,
    pub tables:          TableScan,
    pub xrefs:           CrossRefIndex,
    pub data_structures: Vec<DataStructure>,
    pub enrichment:      Enrichment,
    pub audio:           AudioAnalysis,
    /// Lines joined with labels and comments, for output emitters.
    pub rendered_lines:  Vec<LineKind>,
    pub metrics:         QualityMetrics,
    pub warnings:        AnalysisWarnings,
    /// Set when cancellation cut the run short.
    pub partial:         bool,
}

impl RomAnalysis {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        log::info!("Reading ROM from file: {}", path.as_ref().display());
        let rom = Rom::from_file(path)?;
        let analysis = Self::analyze(&rom, &AnalysisConfig::default(), &CancellationToken::new())?;
        log::info!("Success analysing ROM");
        Ok(analysis)
    }

    /// Runs the full pipeline. Input errors (bad header, unmapped seeds) come
    /// back as `Err`; cancellation yields `Ok` with `partial = true`.
    pub fn analyze(rom: &Rom, config: &AnalysisConfig, cancel: &CancellationToken) -> Result<Self, AnalysisError> {
        let mut warnings = AnalysisWarnings::default();

        log::info!("Parsing internal ROM header");
        let header = RomHeader::parse(rom)?;
        if header.ambiguous {
            warnings.add(WarningKind::AmbiguousHeader, None);
        }

        let cartridge = CartridgeInfo::from_header(&header, rom.0.len());
        let mapper = cartridge.mapper(rom.0.len());
        log::info!("Cartridge: {} ({})", cartridge.cartridge_type, cartridge.speed);

        let reset = header.reset_vector();
        if mapper.cpu_to_file(reset).is_none() {
            return Err(DisassemblyError::UnmappedReset(reset).into());
        }

        // Vectors seed the walk; caller seeds must map, dead vectors only warn.
        let vectors = header.interrupt_vectors();
        let mut seeds: Vec<AddrSnes> = Vec::with_capacity(vectors.len() + config.seeds.len());
        for &(_, addr) in &vectors {
            if mapper.cpu_to_file(addr).is_some() {
                seeds.push(addr);
            } else {
                warnings.add(WarningKind::UnmappedFlow, Some(addr));
            }
        }
        for &seed in &config.seeds {
            if mapper.cpu_to_file(seed).is_none() {
                return Err(DisassemblyError::UnmappedSeed(seed).into());
            }
            seeds.push(seed);
        }

        log::info!("Disassembling from {} seeds", seeds.len());
        let mut disasm = disassemble(rom, mapper, &seeds, cancel)?;

        log::info!("Scanning jump and pointer tables");
        let mut tables = if disasm.cancelled || cancel.is_cancelled() {
            TableScan::default()
        } else {
            scan_tables(&disasm, rom, mapper)
        };

        // Indirect-dispatch targets only surface after a table scan, so feed
        // them back as seeds until the walk closes (bounded, in practice one
        // extra pass).
        for _ in 0..4 {
            if disasm.cancelled || cancel.is_cancelled() {
                break;
            }
            let mut new_seeds: Vec<AddrSnes> = tables
                .jump_tables
                .iter()
                .flat_map(|t| t.entries.iter().copied())
                .filter(|&target| disasm.line_at(target).is_none())
                .collect();
            if new_seeds.is_empty() {
                break;
            }
            new_seeds.sort_unstable();
            new_seeds.dedup();
            seeds.extend(new_seeds);
            disasm = disassemble(rom, mapper, &seeds, cancel)?;
            tables = scan_tables(&disasm, rom, mapper);
        }

        warnings.add_many(WarningKind::FlagConflict, &disasm.flag_conflicts);
        warnings.add_many(WarningKind::UnmappedFlow, &disasm.unmapped_flows);
        for &(addr, _) in &disasm.data_bytes {
            warnings.add(WarningKind::DecodeError, Some(addr));
        }

        let mut partial = disasm.cancelled;
        let mut stage_gate = |stage: &str| {
            if cancel.is_cancelled() {
                if !partial {
                    log::warn!("Cancelled before {stage}");
                }
                partial = true;
            }
            !partial
        };

        log::info!("Building basic blocks and control-flow graph");
        let mut cfg = if stage_gate("CFG construction") {
            let mut boundaries: BTreeSet<AddrSnes> = disasm.seeds.iter().copied().collect();
            boundaries.extend(disasm.flow_targets.iter().copied());
            boundaries.extend(tables.jump_tables.iter().flat_map(|t| t.entries.iter().copied()));
            let blocks = build_blocks(&disasm.lines, &boundaries);
            build_cfg(&disasm, blocks, &tables)
        } else {
            build_cfg(&disasm, Vec::new(), &tables)
        };

        log::info!("Detecting functions");
        if stage_gate("function detection") {
            let overlaps = detect_functions(&mut cfg, &disasm, &vectors, &tables);
            for (a, _) in overlaps {
                warnings.add(WarningKind::OverlappingFunctions, Some(a));
            }
        }

        log::info!("Indexing cross-references");
        let xrefs = if stage_gate("cross-reference indexing") {
            build_xref_index(&disasm, &tables)
        } else {
            CrossRefIndex::default()
        };

        log::info!("Matching data-structure patterns");
        let (data_structures, pattern_comments) = if stage_gate("pattern matching") {
            let matches = match_patterns(&disasm, rom, mapper, &tables);
            for _ in 0..matches.dropped_low_confidence {
                warnings.add(WarningKind::PatternLowConfidence, None);
            }
            (matches.data_structures, matches.comments)
        } else {
            (Vec::new(), Default::default())
        };

        log::info!("Extracting audio state");
        let audio = if stage_gate("audio extraction") {
            audio::analyze_audio(&disasm, rom, mapper)
        } else {
            AudioAnalysis::empty()
        };

        log::info!("Enriching lines with labels and comments");
        let enrichment = enrich(&disasm, &cfg, &data_structures, &pattern_comments, &config.hints);
        let rendered_lines = render_lines(&disasm, &enrichment.labels, &enrichment.comments);

        let metrics = collect_metrics(&disasm, &cfg, &xrefs, &enrichment);
        if partial {
            warnings.add(WarningKind::Cancelled, None);
        }

        Ok(Self {
            header,
            cartridge,
            disassembly: disasm,
            cfg,
            tables,
            xrefs,
            data_structures,
            enrichment,
            audio,
            rendered_lines,
            metrics,
            warnings,
            partial,
        })
    }
}
