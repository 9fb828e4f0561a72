pub mod ffprobe;
pub mod metadata;
pub mod scenes;

pub use ffprobe::probe;
pub use metadata::MediaMetadata;
pub use scenes::{SceneCut, detect_scene_cuts};
