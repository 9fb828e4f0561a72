pub mod deps;
pub mod disk_space;
pub mod filtergraph;
pub mod humanize;
pub mod logger;
pub mod process;

pub use deps::DependencyStatus;
pub use disk_space::has_enough_space;
pub use filtergraph::escape_filter_value;
pub use humanize::{format_duration, format_file_size, format_kbps};
pub use logger::init_logging;
pub use process::{CancelFlag, run_command};
