//! Standard MIDI File export.
//!
//! Serializes a [`Sequence`] into a Type-0 (single-track) SMF byte buffer:
//! a fixed 14-byte header chunk followed by one track chunk containing a
//! tempo meta-event, a Note-On/Note-Off pair per pitched note, and an
//! end-of-track marker. Delta-times are MIDI variable-length quantities;
//! rests advance the tick cursor without emitting any event.
//!
//! The track chunk's length field must equal the exact byte count of the
//! event stream, so it is reserved up front and back-patched once the
//! stream is complete. Any bad input rejects the whole export; a truncated
//! buffer is worse than none because consumers cannot detect it.

use crate::error::{Error, Result};
use crate::pitch;
use crate::score::Sequence;

/// Ticks per quarter note in the header's division field.
const TICKS_PER_QUARTER: u32 = 480;

/// Velocity of every emitted Note-On.
const NOTE_ON_VELOCITY: u8 = 96;

/// Convert a duration in seconds to ticks at the given tempo.
fn seconds_to_ticks(seconds: f64, tempo_bpm: f64) -> u32 {
    (seconds * TICKS_PER_QUARTER as f64 * tempo_bpm / 60.0).round() as u32
}

/// Append a MIDI variable-length quantity: 7 bits per byte, high bit set on
/// all but the last byte, most-significant group first.
fn write_variable_length(data: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut count = 0;
    loop {
        bytes[count] = (value & 0x7F) as u8;
        count += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        if i > 0 {
            data.push(bytes[i] | 0x80);
        } else {
            data.push(bytes[i]);
        }
    }
}

/// MIDI note number for a pitched note's frequency, rejecting anything the
/// wire format cannot carry.
fn midi_note_number(frequency: f64) -> Result<u8> {
    let midi = pitch::frequency_to_midi(frequency)
        .map_err(|_| Error::ExportRejected(format!("frequency {frequency} Hz is not exportable")))?;
    if !(0..=127).contains(&midi) {
        return Err(Error::ExportRejected(format!(
            "frequency {frequency} Hz maps to MIDI note {midi}, outside 0-127"
        )));
    }
    Ok(midi as u8)
}

/// Serialize a sequence as a Type-0 Standard MIDI File.
///
/// The output is deterministic: the same sequence always yields a
/// byte-identical buffer.
pub fn sequence_to_midi(sequence: &Sequence) -> Result<Vec<u8>> {
    if !sequence.tempo_bpm.is_finite() || sequence.tempo_bpm <= 0.0 {
        return Err(Error::ExportRejected(format!(
            "tempo {} BPM is unusable",
            sequence.tempo_bpm
        )));
    }
    for (i, note) in sequence.notes.iter().enumerate() {
        if !note.duration.is_finite() || note.duration <= 0.0 {
            return Err(Error::ExportRejected(format!(
                "note {i}: duration {} is not a positive finite number",
                note.duration
            )));
        }
        if !note.is_silent() && !note.frequency.is_finite() {
            return Err(Error::ExportRejected(format!(
                "note {i}: frequency {} Hz is not finite",
                note.frequency
            )));
        }
    }

    let mut data = Vec::new();

    // Header chunk: magic, length 6, format 0, one track, 480 TPQ.
    data.extend_from_slice(b"MThd");
    data.extend_from_slice(&6u32.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&(TICKS_PER_QUARTER as u16).to_be_bytes());

    // Track chunk header with the length field reserved for back-patching.
    data.extend_from_slice(b"MTrk");
    let length_field = data.len();
    data.extend_from_slice(&[0u8; 4]);
    let stream_start = data.len();

    // Tempo meta-event: microseconds per quarter note, 24-bit big-endian.
    let tempo_us = (60_000_000.0 / sequence.tempo_bpm).round() as u32;
    data.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03]);
    data.push((tempo_us >> 16) as u8);
    data.push((tempo_us >> 8) as u8);
    data.push(tempo_us as u8);

    // Rests accumulate into the next event's delta-time.
    let mut pending_ticks: u32 = 0;
    for note in &sequence.notes {
        let duration_ticks = seconds_to_ticks(note.duration, sequence.tempo_bpm);
        if note.is_silent() {
            pending_ticks += duration_ticks;
            continue;
        }
        let number = midi_note_number(note.frequency)?;

        write_variable_length(&mut data, pending_ticks);
        data.extend_from_slice(&[0x90, number, NOTE_ON_VELOCITY]);

        write_variable_length(&mut data, duration_ticks);
        data.extend_from_slice(&[0x80, number, 0x00]);

        pending_ticks = 0;
    }

    // End-of-track meta-event.
    data.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

    // Back-patch the exact event-stream byte count.
    let stream_len = (data.len() - stream_start) as u32;
    data[length_field..length_field + 4].copy_from_slice(&stream_len.to_be_bytes());

    log::debug!(
        "exported {} notes as {} bytes of SMF",
        sequence.len(),
        data.len()
    );
    Ok(data)
}
