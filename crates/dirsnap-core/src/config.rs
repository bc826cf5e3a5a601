//! What a scan looks at and how it reports on itself.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Settings for one call to the scanner.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Directory whose tree is snapshotted.
    pub root: PathBuf,

    /// Scan the targets of symbolic links instead of skipping them.
    ///
    /// Links that resolve to a directory already on the current branch are
    /// skipped so a loop can't recurse forever.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Worker threads for this scan; 0 uses rayon's global pool.
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Publish a progress update every this many directories.
    ///
    /// 0 turns periodic updates off; the final update is always sent.
    #[builder(default = "256")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    256
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root.as_deref() {
            None => Err("a root directory must be given".to_string()),
            Some(root) if root.as_os_str().is_empty() => {
                Err("the root directory can't be an empty path".to_string())
            }
            Some(_) => Ok(()),
        }
    }
}

impl ScanConfig {
    /// Start building a config.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Config for `root` with every other setting at its default.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            threads: 0,
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user")
            .threads(4usize)
            .follow_symlinks(true)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.threads, 4);
        assert!(config.follow_symlinks);
        assert_eq!(config.progress_interval, 256);
    }

    #[test]
    fn test_config_simple() {
        let config = ScanConfig::new("/home/user");
        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert!(!config.follow_symlinks);
        assert_eq!(config.threads, 0);
    }

    #[test]
    fn test_builder_rejects_missing_or_empty_root() {
        assert!(ScanConfig::builder().build().is_err());
        assert!(ScanConfig::builder().root("").build().is_err());
    }

    #[test]
    fn test_zero_progress_interval_is_accepted() {
        let built = ScanConfig::builder()
            .root("/x")
            .progress_interval(0u64)
            .build()
            .unwrap();
        assert_eq!(built.progress_interval, 0);

        let parsed: ScanConfig =
            serde_json::from_str(r#"{"root": "/x", "progress_interval": 0}"#).unwrap();
        assert_eq!(parsed.progress_interval, 0);

        let defaulted: ScanConfig = serde_json::from_str(r#"{"root": "/x"}"#).unwrap();
        assert_eq!(defaulted.progress_interval, 256);
        assert!(!defaulted.follow_symlinks);
    }
}
