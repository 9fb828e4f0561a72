pub mod command_builder;
pub mod ffmpeg;

pub use command_builder::{EncodeConfig, Tune};
pub use ffmpeg::{concat_stream_copy, encode, extract_stream_copy};
