//! WAV container codec.
//!
//! Encodes and decodes the fixed 44-byte RIFF/WAVE header that precedes the
//! raw interleaved PCM payload, and validates decoded headers against the
//! format the playback path can handle.

use crate::models::error::WavError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Format code for uncompressed PCM.
pub const PCM_FORMAT: u16 = 1;

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// RIFF chunk size (file size - 8).
    pub riff_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Payload size in bytes.
    pub data_size: u32,
}

impl WavHeader {
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }
}

/// Format the reader expects a file to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// A validated header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedHeader {
    pub header: WavHeader,
    /// Payload samples, all channels counted.
    pub total_samples: usize,
    /// The file declares a different rate than expected. Playback still
    /// proceeds at the sink's fixed rate.
    pub rate_mismatch: bool,
}

/// Generate a 44-byte WAV RIFF header.
///
/// Layout (all fields little-endian):
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bits_per_sample / 8
/// [32-33]  block_align = channels * bits_per_sample / 8
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size = samples_per_channel * channels * bits_per_sample / 8
/// ```
pub fn encode_header(
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    samples_per_channel: u32,
) -> Result<[u8; WAV_HEADER_SIZE], WavError> {
    if channels == 0 || channels > 8 {
        return Err(WavError::InvalidChannelCount(channels));
    }
    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(WavError::UnsupportedBitDepth(bits_per_sample));
    }

    let bytes_per_sample = u32::from(bits_per_sample / 8);
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or(WavError::PayloadTooLarge)?;
    let data_size = samples_per_channel
        .checked_mul(u32::from(channels))
        .and_then(|n| n.checked_mul(bytes_per_sample))
        .ok_or(WavError::PayloadTooLarge)?;
    let riff_size = data_size
        .checked_add(36)
        .ok_or(WavError::PayloadTooLarge)?;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    Ok(header)
}

/// Decode and validate a header.
///
/// Checks run in order: RIFF tag, WAVE tag, PCM format, channel count,
/// bit depth (all fatal), then sample rate (warning only).
pub fn decode_header(bytes: &[u8], expected: &ExpectedFormat) -> Result<DecodedHeader, WavError> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(WavError::Truncated(bytes.len()));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(WavError::InvalidRiff);
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(WavError::InvalidWave);
    }

    let header = WavHeader {
        riff_size: read_u32(bytes, 4),
        audio_format: read_u16(bytes, 20),
        channels: read_u16(bytes, 22),
        sample_rate: read_u32(bytes, 24),
        byte_rate: read_u32(bytes, 28),
        block_align: read_u16(bytes, 32),
        bits_per_sample: read_u16(bytes, 34),
        data_size: read_u32(bytes, 40),
    };

    if header.audio_format != PCM_FORMAT {
        return Err(WavError::UnsupportedFormat(header.audio_format));
    }
    if header.channels != expected.channels {
        return Err(WavError::ChannelMismatch {
            expected: expected.channels,
            found: header.channels,
        });
    }
    if header.bits_per_sample != expected.bits_per_sample {
        return Err(WavError::BitDepthMismatch {
            expected: expected.bits_per_sample,
            found: header.bits_per_sample,
        });
    }
    if header.bits_per_sample != 8 && header.bits_per_sample != 16 {
        return Err(WavError::UnsupportedBitDepth(header.bits_per_sample));
    }

    let rate_mismatch = header.sample_rate != expected.sample_rate;
    if rate_mismatch {
        log::warn!(
            "Sample rate {} Hz differs from output rate {} Hz; playing at output rate",
            header.sample_rate,
            expected.sample_rate
        );
    }

    let total_samples = (header.data_size / u32::from(header.bytes_per_sample())) as usize;

    Ok(DecodedHeader {
        header,
        total_samples,
        rate_mismatch,
    })
}

/// Append 16-bit samples to `out` as little-endian bytes.
pub fn samples_to_le_bytes(samples: &[i16], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Decode little-endian 16-bit samples. A trailing odd byte is ignored.
pub fn le_bytes_to_samples(bytes: &[u8], out: &mut [i16]) -> usize {
    let count = (bytes.len() / 2).min(out.len());
    for (i, pair) in bytes.chunks_exact(2).take(count).enumerate() {
        out[i] = i16::from_le_bytes([pair[0], pair[1]]);
    }
    count
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEREO_16K: ExpectedFormat = ExpectedFormat {
        sample_rate: 16000,
        channels: 2,
        bits_per_sample: 16,
    };

    #[test]
    fn header_size_is_44_bytes() {
        let header = encode_header(16000, 2, 16, 0).unwrap();
        assert_eq!(header.len(), WAV_HEADER_SIZE);
        let header = encode_header(8000, 8, 8, 1234).unwrap();
        assert_eq!(header.len(), WAV_HEADER_SIZE);
    }

    #[test]
    fn header_riff_magic() {
        let header = encode_header(16000, 2, 16, 0).unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_16khz_stereo_16bit() {
        let header = encode_header(16000, 2, 16, 16000).unwrap();

        assert_eq!(read_u32(&header, 16), 16);
        assert_eq!(read_u16(&header, 20), 1);
        assert_eq!(read_u16(&header, 22), 2);
        assert_eq!(read_u32(&header, 24), 16000);
        assert_eq!(read_u32(&header, 28), 64000); // 16000 * 2 * 16/8
        assert_eq!(read_u16(&header, 32), 4); // 2 * 16/8
        assert_eq!(read_u16(&header, 34), 16);
        assert_eq!(read_u32(&header, 40), 64000);
        assert_eq!(read_u32(&header, 4), 36 + 64000);
    }

    #[test]
    fn encode_rejects_bad_format() {
        assert_eq!(encode_header(16000, 0, 16, 10), Err(WavError::InvalidChannelCount(0)));
        assert_eq!(encode_header(16000, 9, 16, 10), Err(WavError::InvalidChannelCount(9)));
        assert_eq!(encode_header(16000, 2, 24, 10), Err(WavError::UnsupportedBitDepth(24)));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        assert_eq!(encode_header(16000, 2, 16, u32::MAX / 2), Err(WavError::PayloadTooLarge));
    }

    #[test]
    fn decode_recovers_encoded_fields() {
        for &(rate, channels, bits) in &[(16000, 2, 16), (16000, 1, 16), (8000, 1, 8), (44100, 2, 8)] {
            let header = encode_header(rate, channels, bits, 1000).unwrap();
            let expected = ExpectedFormat {
                sample_rate: rate,
                channels,
                bits_per_sample: bits,
            };
            let decoded = decode_header(&header, &expected).unwrap();
            assert_eq!(decoded.header.sample_rate, rate);
            assert_eq!(decoded.header.channels, channels);
            assert_eq!(decoded.header.bits_per_sample, bits);
            assert_eq!(decoded.total_samples, 1000 * channels as usize);
            assert!(!decoded.rate_mismatch);
        }
    }

    #[test]
    fn decode_rejects_bad_tags() {
        let mut header = encode_header(16000, 2, 16, 10).unwrap();
        header[0] = b'X';
        assert_eq!(decode_header(&header, &STEREO_16K), Err(WavError::InvalidRiff));

        let mut header = encode_header(16000, 2, 16, 10).unwrap();
        header[8..12].copy_from_slice(b"AVI ");
        assert_eq!(decode_header(&header, &STEREO_16K), Err(WavError::InvalidWave));
    }

    #[test]
    fn decode_rejects_compressed_formats() {
        let mut header = encode_header(16000, 2, 16, 10).unwrap();
        header[20..22].copy_from_slice(&3u16.to_le_bytes()); // IEEE float
        assert_eq!(decode_header(&header, &STEREO_16K), Err(WavError::UnsupportedFormat(3)));
    }

    #[test]
    fn decode_rejects_channel_and_depth_mismatch() {
        let header = encode_header(16000, 1, 16, 10).unwrap();
        assert_eq!(
            decode_header(&header, &STEREO_16K),
            Err(WavError::ChannelMismatch { expected: 2, found: 1 })
        );

        let header = encode_header(16000, 2, 8, 10).unwrap();
        assert_eq!(
            decode_header(&header, &STEREO_16K),
            Err(WavError::BitDepthMismatch { expected: 16, found: 8 })
        );
    }

    #[test]
    fn validation_order_puts_format_before_channels() {
        let mut header = encode_header(16000, 1, 8, 10).unwrap();
        header[20..22].copy_from_slice(&2u16.to_le_bytes()); // ADPCM
        assert_eq!(decode_header(&header, &STEREO_16K), Err(WavError::UnsupportedFormat(2)));
    }

    #[test]
    fn sample_rate_mismatch_is_only_a_warning() {
        let header = encode_header(48000, 2, 16, 480).unwrap();
        let decoded = decode_header(&header, &STEREO_16K).unwrap();
        assert!(decoded.rate_mismatch);
        assert_eq!(decoded.total_samples, 960);
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(decode_header(&[0u8; 20], &STEREO_16K), Err(WavError::Truncated(20)));
    }

    #[test]
    fn sample_byte_conversion() {
        let mut bytes = Vec::new();
        samples_to_le_bytes(&[1, -2, i16::MAX], &mut bytes);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0xFF, 0x7F]);

        let mut samples = [0i16; 4];
        assert_eq!(le_bytes_to_samples(&bytes, &mut samples), 3);
        assert_eq!(&samples[..3], &[1, -2, i16::MAX]);
    }
}
