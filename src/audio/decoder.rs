use crate::error::{Result, VoiceError};
use crate::types::AudioData;
use anyhow::Context;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::debug;

/// Decode an audio file to raw PCM samples (mono, f32)
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    let source_name = path.display().to_string();

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))
        .map_err(|err| decode_error(&source_name, err))?;

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    decode_source(Box::new(file), hint).map_err(|err| decode_error(&source_name, err))
}

/// Decode an in-memory audio stream, e.g. an uploaded file.
///
/// `extension` is only a probing hint; the container is detected from the bytes.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioData> {
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }
    decode_source(Box::new(Cursor::new(bytes)), hint)
        .map_err(|err| decode_error("in-memory stream", err))
}

fn decode_error(source_name: &str, err: anyhow::Error) -> VoiceError {
    VoiceError::Decode {
        source_name: source_name.to_string(),
        message: format!("{err:#}"),
    }
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> anyhow::Result<AudioData> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;

    let mut format = probe_result.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate not specified in audio stream")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut all_samples = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err).context("Failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => all_samples.extend(convert_to_mono_f32(&decoded)),
            // A corrupt packet is recoverable; the next one may decode fine.
            Err(SymphoniaError::DecodeError(_)) => skipped_packets += 1,
            Err(err) => return Err(err).context("Failed to decode audio packet"),
        }
    }

    anyhow::ensure!(
        !all_samples.is_empty() || skipped_packets == 0,
        "No decodable audio packets ({} corrupt)",
        skipped_packets
    );

    debug!(
        samples = all_samples.len(),
        sample_rate, skipped_packets, "decoded audio stream"
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

/// Convert any audio buffer format to mono f32 samples in [-1.0, 1.0]
fn convert_to_mono_f32(buffer: &AudioBufferRef) -> Vec<f32> {
    match buffer {
        AudioBufferRef::U8(buf) => mix_to_mono(&**buf),
        AudioBufferRef::U16(buf) => mix_to_mono(&**buf),
        AudioBufferRef::U24(buf) => mix_to_mono(&**buf),
        AudioBufferRef::U32(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S8(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S16(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S24(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S32(buf) => mix_to_mono(&**buf),
        AudioBufferRef::F32(buf) => mix_to_mono(&**buf),
        AudioBufferRef::F64(buf) => mix_to_mono(&**buf),
    }
}

/// Average all channels of a planar buffer into one f32 channel.
fn mix_to_mono<S>(buffer: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample + IntoSample<f32>,
{
    let num_channels = buffer.spec().channels.count();
    let frames = buffer.frames();
    if num_channels == 0 {
        return Vec::new();
    }
    if num_channels == 1 {
        return buffer.chan(0).iter().map(|&s| s.into_sample()).collect();
    }

    let mut mono_samples = vec![0.0_f32; frames];
    for ch in 0..num_channels {
        for (acc, &sample) in mono_samples.iter_mut().zip(buffer.chan(ch)) {
            let value: f32 = sample.into_sample();
            *acc += value;
        }
    }
    let scale = 1.0 / num_channels as f32;
    mono_samples.iter_mut().for_each(|s| *s *= scale);
    mono_samples
}
