pub mod vmaf;

pub use vmaf::{VmafOptions, VmafResult, measure_vmaf};
