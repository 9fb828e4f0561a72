use std::process::Command;

/// Status of the external tools the search depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
    pub libvmaf: bool,
}

impl DependencyStatus {
    /// Check all dependencies
    pub fn check() -> Self {
        let ffmpeg = check_command("ffmpeg", &["-version"]);
        Self {
            ffmpeg,
            ffprobe: check_command("ffprobe", &["-version"]),
            libvmaf: ffmpeg && check_vmaf_available(),
        }
    }

    pub fn all_present(&self) -> bool {
        self.ffmpeg && self.ffprobe && self.libvmaf
    }

    /// Names of the missing tools, for error reporting
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.ffmpeg {
            missing.push("ffmpeg");
        }
        if !self.ffprobe {
            missing.push("ffprobe");
        }
        if self.ffmpeg && !self.libvmaf {
            missing.push("libvmaf (ffmpeg built without --enable-libvmaf)");
        }
        missing
    }
}

/// Check if a command is available
fn check_command(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Check if VMAF is available in FFmpeg
fn check_vmaf_available() -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .output()
        .ok()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains("libvmaf"))
        .unwrap_or(false)
}
