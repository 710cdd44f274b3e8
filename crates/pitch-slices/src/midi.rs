use midly::{MidiMessage, Smf, TrackEventKind};
use tracing::debug;

use crate::slice::{Observation, PitchClassSlice};
use crate::{Error, Result};

/// General MIDI percussion channel (channel 10, zero-based 9).
const DRUM_CHANNEL: u8 = 9;

/// Collect note onsets from every track, grouped by absolute tick.
///
/// Each distinct onset tick becomes one slice holding the pitch classes that
/// start there. Note-offs are ignored and the drum channel is skipped.
pub fn observation_from_midi(bytes: &[u8]) -> Result<Observation> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let mut onsets: Vec<(u64, u8)> = Vec::new();
    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        for event in track {
            current_tick += event.delta.as_int() as u64;

            if let TrackEventKind::Midi { channel, message } = event.kind {
                if channel.as_int() == DRUM_CHANNEL {
                    continue;
                }
                if let MidiMessage::NoteOn { key, vel } = message {
                    if vel.as_int() > 0 {
                        onsets.push((current_tick, key.as_int()));
                    }
                }
            }
        }
    }

    // Stable, so simultaneous onsets keep track order
    onsets.sort_by_key(|&(tick, _)| tick);

    let mut slices = Vec::new();
    let mut start = 0;
    while start < onsets.len() {
        let tick = onsets[start].0;
        let end = onsets[start..]
            .iter()
            .position(|&(t, _)| t != tick)
            .map_or(onsets.len(), |offset| start + offset);
        slices.push(PitchClassSlice::from_midi_keys(
            onsets[start..end].iter().map(|&(_, key)| key),
        ));
        start = end;
    }

    debug!(
        tracks = smf.tracks.len(),
        onsets = onsets.len(),
        slices = slices.len(),
        "parsed MIDI into pitch-class slices"
    );

    Ok(Observation::new(slices))
}
