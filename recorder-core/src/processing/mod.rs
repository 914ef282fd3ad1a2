pub mod capture_buffer;
pub mod playback_cursor;
pub mod wav_format;
