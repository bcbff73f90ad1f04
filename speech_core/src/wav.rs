use std::io::Cursor;
use std::path::Path;

use anyhow::Context;

use crate::pcm::DecodedAudio;

fn wav_spec(audio: &DecodedAudio) -> hound::WavSpec {
    hound::WavSpec {
        channels: audio.channel_count(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_samples<W>(writer: &mut hound::WavWriter<W>, audio: &DecodedAudio) -> anyhow::Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    // Interleave back to frame order; f32 [-1.0, 1.0) -> i16
    for i in 0..audio.frame_count() {
        for c in 0..audio.channel_count() as usize {
            let s = audio.channel(c).map(|ch| ch[i]).unwrap_or(0.0);
            let v = (s.clamp(-1.0, 1.0) * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
    }
    Ok(())
}

/// Encode decoded audio as a 16-bit PCM WAV (RIFF) byte buffer.
pub fn encode_wav(audio: &DecodedAudio) -> anyhow::Result<Vec<u8>> {
    // WAV header (44 bytes) + 2 bytes per sample
    let estimated_size = 44 + audio.frame_count() * audio.channel_count() as usize * 2;
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(estimated_size));

    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(audio))
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;
        write_samples(&mut writer, audio)?;
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }

    Ok(cursor.into_inner())
}

/// Write decoded audio to a WAV file on disk.
pub fn write_wav<P: AsRef<Path>>(audio: &DecodedAudio, path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut writer = hound::WavWriter::create(path, wav_spec(audio))
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_samples(&mut writer, audio)?;
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize {}", path.display()))?;
    Ok(())
}
