use std::collections::BTreeMap;

use crate::audio::engine::AudioEngine;

pub const TICKS_PER_BEAT: u32 = 48;
/// Malformed-data guard: abort a channel past this many ticks.
pub const MAX_CHANNEL_TICKS: u64 = 100_000;
/// At most this many sequences are reported per image.
pub const MAX_SEQUENCES: usize = 8;

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceComplexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrackEventKind {
    Note { midi: u8, velocity: u8, duration: u8 },
    Rest { ticks: u8 },
    Volume(u8),
    /// Center is 64.
    Pan(u8),
    /// Signed, biased by 128 on the wire.
    PitchBend(i16),
    Vibrato { depth: u8, rate: u8 },
    Other(u8),
    End,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TrackEvent {
    pub tick: u64,
    pub kind: TrackEventKind,
}

#[derive(Clone, Debug)]
pub struct ChannelTrack {
    pub channel: u8,
    /// Offset of the channel data within the image.
    pub start:   usize,
    pub events:  Vec<TrackEvent>,
    pub ticks:   u64,
    /// Set when the tick guard tripped before an end byte.
    pub aborted: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceTiming {
    pub ticks_per_beat: u32,
    pub bpm:            u16,
}

#[derive(Clone, Debug)]
pub struct SequenceMetadata {
    pub title:                   Option<String>,
    pub complexity:              SequenceComplexity,
    pub estimated_duration_secs: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GlobalEffect {
    Echo,
    Noise,
    PitchModulation,
}

#[derive(Clone, Debug)]
pub struct MusicSequence {
    /// Offset of the sequence header within the image.
    pub addr:                usize,
    pub bytes:               Vec<u8>,
    pub engine:              AudioEngine,
    pub tempo_bpm:           u16,
    /// Up to 8 channel tracks.
    pub tracks:              Vec<ChannelTrack>,
    pub pattern_table:       Option<Vec<u16>>,
    pub track_length_ticks:  u64,
    pub loop_point:          Option<u64>,
    pub loop_length:         Option<u64>,
    pub timing:              SequenceTiming,
    pub channel_instruments: BTreeMap<u8, u8>,
    pub global_effects:      Vec<GlobalEffect>,
    pub metadata:            SequenceMetadata,
}

// -------------------------------------------------------------------------------------------------

/// Engine-specific header scan over an audio image.
pub fn locate_sequences(image: &[u8], engine: AudioEngine) -> Vec<MusicSequence> {
    let mut sequences = Vec::new();
    let mut offset = 0usize;

    while offset + 4 <= image.len() && sequences.len() < MAX_SEQUENCES {
        let found = match engine {
            AudioEngine::NSpc => nspc_sequence_at(image, offset),
            AudioEngine::Akao => akao_sequence_at(image, offset),
            AudioEngine::Hal => hal_sequence_at(image, offset),
            AudioEngine::Kankichi => kankichi_sequence_at(image, offset),
            AudioEngine::CapcomQSound | AudioEngine::Unknown => generic_sequence_at(image, offset),
        };
        match found {
            Some(sequence) => {
                let skip = sequence.bytes.len().max(2);
                sequences.push(sequence);
                offset += skip;
            }
            None => offset += 2,
        }
        // Header scans are 2-byte aligned.
        offset &= !1;
    }
    sequences
}

// -------------------------------------------------------------------------------------------------

/// N-SPC: channel mask, tempo 30-300 BPM, then one 16-bit pointer per set
/// mask bit, each inside the image.
fn nspc_sequence_at(image: &[u8], offset: usize) -> Option<MusicSequence> {
    let channel_mask = image[offset];
    let tempo = image[offset + 1] as u16;
    if channel_mask == 0 || !(30..=300).contains(&tempo) {
        return None;
    }

    let channel_count = channel_mask.count_ones() as usize;
    if channel_count > 8 || offset + 2 + channel_count * 2 > image.len() {
        return None;
    }

    let mut pointers = Vec::with_capacity(channel_count);
    for i in 0..channel_count {
        let at = offset + 2 + i * 2;
        let ptr = u16::from_le_bytes([image[at], image[at + 1]]) as usize;
        if ptr == 0 || ptr >= image.len() {
            return None;
        }
        pointers.push(ptr);
    }

    let mut tracks = Vec::with_capacity(channel_count);
    for (i, &ptr) in pointers.iter().enumerate() {
        let channel = nth_set_bit(channel_mask, i)?;
        tracks.push(parse_nspc_channel(image, ptr, channel));
    }
    if !tracks.iter().any(|t| !t.aborted && t.events.len() > 1) {
        return None;
    }

    let header_len = 2 + channel_count * 2;
    Some(assemble(image, offset, header_len, AudioEngine::NSpc, tempo, tracks, BTreeMap::new()))
}

fn nth_set_bit(mask: u8, n: usize) -> Option<u8> {
    (0..8).filter(|&b| mask & (1 << b) != 0).nth(n)
}

fn parse_nspc_channel(image: &[u8], start: usize, channel: u8) -> ChannelTrack {
    let mut events = Vec::new();
    let mut tick = 0u64;
    let mut cursor = start;
    let mut aborted = false;

    loop {
        if tick > MAX_CHANNEL_TICKS {
            aborted = true;
            break;
        }
        let Some(&byte) = image.get(cursor) else {
            aborted = true;
            break;
        };
        match byte {
            0x00 | 0xFF => {
                events.push(TrackEvent { tick, kind: TrackEventKind::End });
                break;
            }
            0xE0 => {
                events.push(TrackEvent { tick, kind: TrackEventKind::Volume(byte_at(image, cursor + 1)) });
                cursor += 2;
            }
            0xE1 => {
                events.push(TrackEvent { tick, kind: TrackEventKind::Pan(byte_at(image, cursor + 1)) });
                cursor += 2;
            }
            0xE2 => {
                let bend = byte_at(image, cursor + 1) as i16 - 128;
                events.push(TrackEvent { tick, kind: TrackEventKind::PitchBend(bend) });
                cursor += 2;
            }
            0xE3 => {
                let depth = byte_at(image, cursor + 1);
                let rate = byte_at(image, cursor + 2);
                events.push(TrackEvent { tick, kind: TrackEventKind::Vibrato { depth, rate } });
                cursor += 3;
            }
            0x01..=0x7F => {
                events.push(TrackEvent { tick, kind: TrackEventKind::Rest { ticks: byte } });
                tick += byte as u64;
                cursor += 1;
            }
            0x80..=0xF7 => {
                let duration = byte_at(image, cursor + 1);
                let velocity = byte_at(image, cursor + 2);
                events.push(TrackEvent {
                    tick,
                    kind: TrackEventKind::Note { midi: (byte - 0x80).saturating_add(36), velocity, duration },
                });
                tick += duration as u64;
                cursor += 3;
            }
            _ => {
                events.push(TrackEvent { tick, kind: TrackEventKind::Other(byte) });
                cursor += 1;
            }
        }
    }

    ChannelTrack { channel, start, events, ticks: tick, aborted }
}

fn byte_at(image: &[u8], at: usize) -> u8 {
    image.get(at).copied().unwrap_or(0)
}

// -------------------------------------------------------------------------------------------------

/// Akao: instrument count 1-32 followed by that many bytes, each below 0x80.
fn akao_sequence_at(image: &[u8], offset: usize) -> Option<MusicSequence> {
    let count = image[offset] as usize;
    if !(1..=32).contains(&count) || offset + 1 + count >= image.len() {
        return None;
    }
    let instruments = &image[offset + 1..offset + 1 + count];
    if !instruments.iter().all(|&b| b <= 127) {
        return None;
    }

    let track_start = offset + 1 + count;
    let track = parse_loose_channel(image, track_start, 0, &[0xC0, 0xFF], 2);
    if track.aborted || track.events.len() < 4 {
        return None;
    }

    let channel_instruments = instruments.iter().enumerate().map(|(i, &b)| (i as u8, b)).collect();
    let header_len = 1 + count;
    Some(assemble(image, offset, header_len, AudioEngine::Akao, 120, vec![track], channel_instruments))
}

/// HAL: literal "HAL" prefix with a pattern count of 1-64.
fn hal_sequence_at(image: &[u8], offset: usize) -> Option<MusicSequence> {
    if !image[offset..].starts_with(b"HAL") {
        return None;
    }
    let pattern_count = *image.get(offset + 3)? as usize;
    if !(1..=64).contains(&pattern_count) {
        return None;
    }

    let track = parse_loose_channel(image, offset + 4, 0, &[0xFE, 0xFF], 2);
    let pattern_table = (offset + 4 + pattern_count * 2 <= image.len()).then(|| {
        (0..pattern_count)
            .map(|i| u16::from_le_bytes([image[offset + 4 + i * 2], image[offset + 5 + i * 2]]))
            .collect()
    });
    let mut sequence = assemble(image, offset, 4, AudioEngine::Hal, 120, vec![track], BTreeMap::new());
    sequence.pattern_table = pattern_table;
    Some(sequence)
}

/// Kankichi-kun: a run of command pairs (0x80-0xDF then a byte below 0x80).
fn kankichi_sequence_at(image: &[u8], offset: usize) -> Option<MusicSequence> {
    const MIN_RUN: usize = 4;
    let mut pairs = 0;
    let mut cursor = offset;
    while cursor + 1 < image.len() && (0x80..=0xDF).contains(&image[cursor]) && image[cursor + 1] < 0x80 {
        pairs += 1;
        cursor += 2;
    }
    if pairs < MIN_RUN {
        return None;
    }

    let track = parse_loose_channel(image, offset, 0, &[0x00], 2);
    Some(assemble(image, offset, 2, AudioEngine::Kankichi, 120, vec![track], BTreeMap::new()))
}

/// Generic fallback: plausible tempo byte followed by an in-image pointer.
fn generic_sequence_at(image: &[u8], offset: usize) -> Option<MusicSequence> {
    let tempo = image[offset] as u16;
    if !(30..=200).contains(&tempo) {
        return None;
    }
    let ptr = u16::from_le_bytes([image[offset + 1], image[offset + 2]]) as usize;
    if ptr == 0 || ptr >= image.len() {
        return None;
    }
    let track = parse_nspc_channel(image, ptr, 0);
    if track.aborted || track.events.len() < 4 {
        return None;
    }
    Some(assemble(image, offset, 3, AudioEngine::Unknown, tempo, vec![track], BTreeMap::new()))
}

/// Looser per-byte parse used by the non-N-SPC engines: low bytes are notes,
/// high bytes are commands with `command_len` total bytes, `ends` terminate.
fn parse_loose_channel(image: &[u8], start: usize, channel: u8, ends: &[u8], command_len: usize) -> ChannelTrack {
    const LOOSE_NOTE_TICKS: u64 = 12;

    let mut events = Vec::new();
    let mut tick = 0u64;
    let mut cursor = start;
    let mut aborted = false;

    loop {
        if tick > MAX_CHANNEL_TICKS {
            aborted = true;
            break;
        }
        let Some(&byte) = image.get(cursor) else {
            aborted = true;
            break;
        };
        if ends.contains(&byte) {
            events.push(TrackEvent { tick, kind: TrackEventKind::End });
            break;
        }
        if byte < 0x80 {
            events.push(TrackEvent {
                tick,
                kind: TrackEventKind::Note { midi: byte.saturating_add(24).min(127), velocity: 64, duration: LOOSE_NOTE_TICKS as u8 },
            });
            tick += LOOSE_NOTE_TICKS;
            cursor += 1;
        } else {
            events.push(TrackEvent { tick, kind: TrackEventKind::Other(byte) });
            cursor += command_len;
        }
    }

    ChannelTrack { channel, start, events, ticks: tick, aborted }
}

// -------------------------------------------------------------------------------------------------

fn assemble(
    image: &[u8], addr: usize, header_len: usize, engine: AudioEngine, tempo: u16, tracks: Vec<ChannelTrack>,
    channel_instruments: BTreeMap<u8, u8>,
) -> MusicSequence {
    let track_length_ticks = tracks.iter().map(|t| t.ticks).max().unwrap_or(0);
    let event_count: usize = tracks.iter().map(|t| t.events.len()).sum();
    let complexity = match event_count {
        0..=63 => SequenceComplexity::Simple,
        64..=511 => SequenceComplexity::Moderate,
        _ => SequenceComplexity::Complex,
    };
    let estimated_duration_secs = if tempo > 0 {
        track_length_ticks as f32 * 60.0 / (TICKS_PER_BEAT as f32 * tempo as f32)
    } else {
        0.0
    };

    let data_end = tracks
        .iter()
        .flat_map(|t| t.events.iter().map(move |_| t.start))
        .max()
        .unwrap_or(addr + header_len)
        .max(addr + header_len);

    MusicSequence {
        addr,
        bytes: image[addr..data_end.min(image.len())].to_vec(),
        engine,
        tempo_bpm: tempo,
        tracks,
        pattern_table: None,
        track_length_ticks,
        loop_point: None,
        loop_length: None,
        timing: SequenceTiming { ticks_per_beat: TICKS_PER_BEAT, bpm: tempo },
        channel_instruments,
        global_effects: Vec::new(),
        metadata: SequenceMetadata { title: None, complexity, estimated_duration_secs },
    }
}

// -------------------------------------------------------------------------------------------------
