//! Standard MIDI File adaptor.
//!
//! A thin, stateless byte writer sitting outside the transcription core: it
//! takes a finished note list and produces format-0 SMF bytes. It never
//! reads audio or pitch data and holds no state across calls.

use transcribe_core::Note;

const TICKS_PER_QUARTER: u16 = 480;
/// Microseconds per quarter note at 120 BPM (`60_000_000 / 120`).
const MICROSECONDS_PER_QUARTER_AT_120_BPM: u32 = 500_000;

/// Render a note list to Standard MIDI File format 0 bytes.
///
/// One tempo meta-event at tick 0 declares 120 BPM; every note becomes a
/// `note_on`/`note_off` pair. Tick conversion is `round(seconds * 960)`
/// (960 = `480 ticks/quarter * 120 bpm / 60 s`). Ties at the same tick sort
/// `note_off` before `note_on` so a repeated pitch never appears to overlap
/// itself for a single tick.
pub fn notes_to_midi(notes: &[Note]) -> Vec<u8> {
    let mut events: Vec<(u64, Vec<u8>)> = Vec::with_capacity(notes.len() * 2 + 1);

    events.push((
        0,
        vec![
            0xFF,
            0x51,
            0x03,
            (MICROSECONDS_PER_QUARTER_AT_120_BPM >> 16) as u8,
            (MICROSECONDS_PER_QUARTER_AT_120_BPM >> 8) as u8,
            MICROSECONDS_PER_QUARTER_AT_120_BPM as u8,
        ],
    ));

    for note in notes {
        let on_tick = seconds_to_tick(note.start_time_s);
        let off_tick = seconds_to_tick(note.end_time_s());
        events.push((on_tick, vec![0x90, note.midi_number, note.velocity]));
        events.push((off_tick, vec![0x80, note.midi_number, 0]));
    }

    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1.first().is_some_and(|&status| status & 0xF0 == 0x80);
            let b_is_off = b.1.first().is_some_and(|&status| status & 0xF0 == 0x80);
            b_is_off.cmp(&a_is_off)
        })
    });

    let track_data = encode_track(&events);
    build_midi_file(TICKS_PER_QUARTER, &track_data)
}

fn seconds_to_tick(seconds: f64) -> u64 {
    (seconds * 960.0).round() as u64
}

fn encode_track(events: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut track_data = Vec::new();
    let mut last_tick = 0u64;

    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta as u32);
        track_data.extend_from_slice(data);
        last_tick = *tick;
    }

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    track_data
}

fn build_midi_file(ppq: u16, track_data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // format 0
    buf.extend_from_slice(&1u16.to_be_bytes()); // single track
    buf.extend_from_slice(&ppq.to_be_bytes());

    buf.extend_from_slice(b"MTrk");
    buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
    buf.extend_from_slice(track_data);

    buf
}

fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
