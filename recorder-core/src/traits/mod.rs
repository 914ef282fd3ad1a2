pub mod byte_store;
pub mod capture_source;
pub mod playback_sink;
pub mod recorder_delegate;
