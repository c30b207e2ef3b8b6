use std::panic::{self, AssertUnwindSafe};

use aus::analysis;
use tracing::{debug, warn};

use crate::types::AudioData;

/// Samples per pitch-analysis frame.
pub const PITCH_FRAME_LENGTH: usize = 2048;
/// Minimum normalized autocorrelation at the pitch period for a frame to count as voiced.
const VOICING_THRESHOLD: f64 = 0.45;
const SILENCE_FLOOR: f32 = 1e-6;

/// Fundamental-frequency search band in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRange {
    pub fmin: f64,
    pub fmax: f64,
}

impl PitchRange {
    pub const BROAD: PitchRange = PitchRange {
        fmin: 50.0,
        fmax: 500.0,
    };
    pub const NARROW: PitchRange = PitchRange {
        fmin: 80.0,
        fmax: 400.0,
    };
}

/// Outcome of pitch tracking over a clip.
#[derive(Debug, Clone, PartialEq)]
pub enum PitchTrack {
    /// f0 in Hz of every voiced frame, never empty
    Voiced(Vec<f64>),
    /// The tracker ran (or the clip is silent) and found no voiced frame
    Unvoiced,
    /// The tracker could not run on this clip
    Failed { reason: String },
}

impl PitchTrack {
    /// Voiced f0 series; empty unless the track is `Voiced`.
    pub fn f0(&self) -> &[f64] {
        match self {
            PitchTrack::Voiced(f0) => f0,
            PitchTrack::Unvoiced | PitchTrack::Failed { .. } => &[],
        }
    }

    pub fn is_voiced(&self) -> bool {
        matches!(self, PitchTrack::Voiced(_))
    }
}

/// Estimate the f0 contour of `audio` with pYIN restricted to `range`,
/// keeping only frames that are flagged voiced and clearly periodic.
pub fn track_pitch(audio: &AudioData, range: PitchRange) -> PitchTrack {
    if audio.samples.len() < PITCH_FRAME_LENGTH {
        return PitchTrack::Failed {
            reason: format!(
                "clip has {} samples, pitch tracking needs at least {}",
                audio.samples.len(),
                PITCH_FRAME_LENGTH
            ),
        };
    }
    let peak = audio.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    if peak < SILENCE_FLOOR {
        debug!("clip is silent; skipping pitch tracking");
        return PitchTrack::Unvoiced;
    }

    let signal: Vec<f64> = audio.samples.iter().map(|&s| s as f64).collect();
    let estimate = run_quietly(|| {
        analysis::pyin_pitch_estimator(
            &signal,
            audio.sample_rate,
            range.fmin,
            range.fmax,
            PITCH_FRAME_LENGTH,
        )
    });
    let (timestamps, pitches, voiced_flags, _confidence) = match estimate {
        Ok(result) => result,
        Err(reason) => {
            warn!(%reason, "pitch tracker failed; treating clip as unvoiced");
            return PitchTrack::Failed { reason };
        }
    };

    let frames = pitches.len();
    let f0: Vec<f64> = pitches
        .iter()
        .zip(voiced_flags.iter())
        .zip(timestamps.iter())
        .filter_map(|((&pitch, &voiced), &time)| {
            if !voiced || !pitch.is_finite() || pitch <= 0.0 {
                return None;
            }
            let frame = frame_window(&signal, frame_centre(time, audio.sample_rate));
            (periodicity(&frame, pitch, audio.sample_rate) >= VOICING_THRESHOLD).then_some(pitch)
        })
        .collect();

    debug!(frames, voiced = f0.len(), "pitch tracking complete");
    if f0.is_empty() {
        PitchTrack::Unvoiced
    } else {
        PitchTrack::Voiced(f0)
    }
}

/// Sample index a tracker frame is centred on.
fn frame_centre(time_secs: f64, sample_rate: u32) -> usize {
    (time_secs * sample_rate as f64).round().max(0.0) as usize
}

/// `PITCH_FRAME_LENGTH` samples centred on `centre`, zero padded past the
/// clip edges the way the tracker pads its own frames.
fn frame_window(signal: &[f64], centre: usize) -> Vec<f64> {
    let half = PITCH_FRAME_LENGTH / 2;
    (0..PITCH_FRAME_LENGTH)
        .map(|offset| {
            (centre + offset)
                .checked_sub(half)
                .and_then(|idx| signal.get(idx))
                .copied()
                .unwrap_or(0.0)
        })
        .collect()
}

/// Normalized autocorrelation of `frame` at the lag of one `f0` period.
fn periodicity(frame: &[f64], f0: f64, sample_rate: u32) -> f64 {
    let lag = (sample_rate as f64 / f0).round() as usize;
    if lag == 0 || lag >= frame.len() {
        return 0.0;
    }
    let head = &frame[..frame.len() - lag];
    let tail = &frame[lag..];
    let cross: f64 = head.iter().zip(tail).map(|(a, b)| a * b).sum();
    let head_energy: f64 = head.iter().map(|a| a * a).sum();
    let tail_energy: f64 = tail.iter().map(|b| b * b).sum();
    let norm = (head_energy * tail_energy).sqrt();
    if norm <= f64::MIN_POSITIVE {
        0.0
    } else {
        cross / norm
    }
}

/// Run `tracker`, turning a panic into an error message. The panic hook is
/// swapped out for the call so the failure is only reported through `warn!`.
fn run_quietly<T>(tracker: impl FnOnce() -> T) -> Result<T, String> {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let outcome = panic::catch_unwind(AssertUnwindSafe(tracker));
    panic::set_hook(previous);
    outcome.map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pitch tracker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f64, len: usize, sample_rate: u32) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * frequency * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn short_clip_is_a_tracker_failure() {
        let audio = AudioData::new(vec![0.1; 1024], 22_050);
        let track = track_pitch(&audio, PitchRange::BROAD);
        assert!(matches!(track, PitchTrack::Failed { .. }));
        assert!(track.f0().is_empty());
    }

    #[test]
    fn silent_clip_is_unvoiced() {
        let audio = AudioData::new(vec![0.0; 22_050], 22_050);
        assert_eq!(track_pitch(&audio, PitchRange::NARROW), PitchTrack::Unvoiced);
    }

    #[test]
    fn periodic_frame_correlates_at_its_period() {
        let frame = sine(150.0, PITCH_FRAME_LENGTH, 22_050);
        assert!(periodicity(&frame, 150.0, 22_050) > 0.99);
        assert!(periodicity(&frame, 210.0, 22_050) < VOICING_THRESHOLD);
    }

    #[test]
    fn gate_window_is_centred_on_its_frame() {
        let signal: Vec<f64> = (1..=10_000).map(f64::from).collect();
        let window = frame_window(&signal, 5_000);
        assert_eq!(window.len(), PITCH_FRAME_LENGTH);
        assert_eq!(window[PITCH_FRAME_LENGTH / 2], signal[5_000]);
        assert_eq!(window[0], signal[5_000 - PITCH_FRAME_LENGTH / 2]);
    }

    #[test]
    fn gate_window_is_zero_padded_at_clip_edges() {
        let signal = vec![1.0; 4_096];
        let first = frame_window(&signal, 0);
        assert!(first[..PITCH_FRAME_LENGTH / 2].iter().all(|&v| v == 0.0));
        assert!(first[PITCH_FRAME_LENGTH / 2..].iter().all(|&v| v == 1.0));

        let last = frame_window(&signal, 4_095);
        assert_eq!(last[PITCH_FRAME_LENGTH / 2], 1.0);
        assert_eq!(last[PITCH_FRAME_LENGTH / 2 + 1], 0.0);
    }

    #[test]
    fn gate_windows_follow_tracker_timestamps() {
        let sample_rate = 22_050;
        let signal = sine(150.0, sample_rate as usize, sample_rate);
        let (timestamps, _, _, _) =
            analysis::pyin_pitch_estimator(&signal, sample_rate, 80.0, 400.0, PITCH_FRAME_LENGTH);
        assert!(timestamps.len() > 2);
        let hop = PITCH_FRAME_LENGTH / 4;
        for (idx, &time) in timestamps.iter().enumerate() {
            let centre = frame_centre(time, sample_rate);
            assert_eq!(centre, idx * hop, "frame {idx}");
            let expected = signal.get(centre).copied().unwrap_or(0.0);
            assert_eq!(frame_window(&signal, centre)[PITCH_FRAME_LENGTH / 2], expected);
        }
    }

    #[test]
    fn tracker_panics_become_errors() {
        let outcome: Result<(), String> = run_quietly(|| panic!("tracker exploded"));
        assert_eq!(outcome.unwrap_err(), "tracker exploded");
        assert_eq!(run_quietly(|| 7), Ok(7));
    }

    #[test]
    fn panic_payloads_become_reasons() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("index out of bounds");
        assert_eq!(panic_message(payload.as_ref()), "index out of bounds");
    }
}
