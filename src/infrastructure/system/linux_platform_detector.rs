use super::linux_host_inspector::read_os_release;
use crate::domain::provisioning::{Platform, PlatformDetector, RunConfig};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct LinuxPlatformDetector {
    root: PathBuf,
}

impl Default for LinuxPlatformDetector {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl LinuxPlatformDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn is_raspbian(&self) -> bool {
        let os_release = read_os_release(&self.root.join("etc/os-release"));
        let mentions_raspbian = ["ID", "ID_LIKE"].iter().any(|key| {
            os_release
                .get(*key)
                .is_some_and(|value| value.split_whitespace().any(|id| id == "raspbian"))
        });
        if mentions_raspbian {
            return true;
        }

        // Raspberry Pi OS reports plain Debian since bookworm
        if self.root.join("etc/rpi-issue").exists() {
            return true;
        }

        if let Ok(model) = fs::read_to_string(self.root.join("proc/device-tree/model")) {
            let model = model.trim_end_matches('\0');
            debug!("Device tree model: {}", model);
            if model.contains("Raspberry Pi") {
                return true;
            }
        }

        false
    }
}

impl PlatformDetector for LinuxPlatformDetector {
    fn detect(&self, config: &RunConfig) -> Platform {
        Platform {
            raspbian: self.is_raspbian(),
            image_build: config.image_build,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_plain_debian() {
        let dir = root_with(&[("etc/os-release", "ID=debian\n")]);
        let platform = LinuxPlatformDetector::with_root(dir.path()).detect(&RunConfig::default());
        assert_eq!(platform, Platform::default());
    }

    #[test]
    fn test_raspbian_from_os_release() {
        let dir = root_with(&[("etc/os-release", "ID=raspbian\nID_LIKE=debian\n")]);
        let detector = LinuxPlatformDetector::with_root(dir.path());
        assert!(detector.detect(&RunConfig::default()).raspbian);
    }

    #[test]
    fn test_raspberry_pi_from_device_tree() {
        let dir = root_with(&[
            ("etc/os-release", "ID=debian\n"),
            ("proc/device-tree/model", "Raspberry Pi 4 Model B Rev 1.4\0"),
        ]);
        let detector = LinuxPlatformDetector::with_root(dir.path());
        assert!(detector.detect(&RunConfig::default()).raspbian);
    }

    #[test]
    fn test_image_build_comes_from_config() {
        let dir = root_with(&[("etc/os-release", "ID=debian\n")]);
        let config = RunConfig {
            image_build: true,
            ..RunConfig::default()
        };
        let platform = LinuxPlatformDetector::with_root(dir.path()).detect(&config);
        assert!(platform.image_build);
        assert!(!platform.raspbian);
    }
}
