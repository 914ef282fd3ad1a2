pub mod capture;
pub mod command;
pub mod events;
pub mod playback;
pub mod recorder;
pub(crate) mod storage;
