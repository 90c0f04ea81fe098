//! Configuration validation with range checks.

use std::path::Component;
use std::path::Path;

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.jpeg_quality == 0 || self.processing.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "processing.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if !is_single_component(&self.watch.output_dir) {
            return Err(ConfigError::ValidationError(
                "watch.output_dir must be a single directory name".into(),
            ));
        }
        Ok(())
    }

    /// Reasons the configuration cannot run a watch session yet.
    ///
    /// An empty list means the watch directory and profile are both set and
    /// present on disk.
    pub fn readiness_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match self.watch_dir() {
            None => issues.push("Watch directory is not set".to_string()),
            Some(dir) if !dir.exists() => {
                issues.push(format!("Watch directory does not exist: {}", dir.display()))
            }
            Some(_) => {}
        }

        match self.profile_path() {
            None => issues.push("Color profile is not set".to_string()),
            Some(path) if !path.exists() => issues.push(format!(
                "Color profile file does not exist: {}",
                path.display()
            )),
            Some(_) => {}
        }

        issues
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        let mut config = Config::default();
        config.processing.jpeg_quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.decode_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decode_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_nested_output_dir() {
        let mut config = Config::default();
        for bad in ["", "a/b", "..", "/abs"] {
            config.watch.output_dir = bad.to_string();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("output_dir"), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_readiness_issues_for_empty_config() {
        let issues = Config::default().readiness_issues();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("Watch directory"));
        assert!(issues[1].contains("profile"));
    }

    #[test]
    fn test_readiness_issues_missing_paths() {
        let mut config = Config::default();
        config.watch.dir = Some(PathBuf::from("/definitely/not/here"));
        config.profile.path = Some(PathBuf::from("/definitely/not/here.icc"));
        let issues = config.readiness_issues();
        assert!(issues[0].contains("does not exist"));
        assert!(issues[1].contains("does not exist"));
    }

    #[test]
    fn test_readiness_ok_when_paths_exist() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("scanner.icc");
        std::fs::write(&profile, b"profile").unwrap();

        let mut config = Config::default();
        config.watch.dir = Some(dir.path().to_path_buf());
        config.profile.path = Some(profile);
        assert!(config.readiness_issues().is_empty());
    }
}
