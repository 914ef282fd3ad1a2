pub mod memory_store;
pub mod naming;
pub mod wav_writer;
