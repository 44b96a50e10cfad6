use crate::manifest::{read, DecodeError, ManifestError, RawEnvelope};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema kind of the common configuration document.
pub const COMMON_CONFIG_V0_KIND: &str = "torcx-config-v0";

/// Envelope of the on-disk common configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigV0 {
    pub kind: String,
    pub value: CommonConfig,
}

/// Runtime configuration shared by every subcommand.
///
/// Directories are explicit inputs. This crate does not fill in host
/// defaults for unset values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub store_paths: Vec<PathBuf>,
}

impl CommonConfig {
    /// Overlay `other` on top of `self`: set fields in `other` win, and a
    /// non-empty store path list replaces the current one.
    #[must_use]
    pub fn overlay(mut self, other: CommonConfig) -> Self {
        if other.base_dir.is_some() {
            self.base_dir = other.base_dir;
        }
        if other.run_dir.is_some() {
            self.run_dir = other.run_dir;
        }
        if other.conf_dir.is_some() {
            self.conf_dir = other.conf_dir;
        }
        if !other.store_paths.is_empty() {
            self.store_paths = other.store_paths;
        }
        self
    }
}

/// Inputs of the `apply` subcommand: resolved lower profile paths and the
/// optional upper profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyConfig {
    pub common: CommonConfig,
    pub lower_profiles: Vec<PathBuf>,
    pub upper_profile: Option<PathBuf>,
}

/// Inputs of the `profile` subcommand family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    pub common: CommonConfig,
    pub lower_profile_names: Vec<String>,
    pub user_profile_name: Option<String>,
    pub current_profile_path: Option<PathBuf>,
    pub next_profile: Option<PathBuf>,
}

pub fn parse_config_str(input: &str) -> Result<ConfigV0, DecodeError> {
    parse_config_slice(input.as_bytes())
}

pub fn parse_config_slice(input: &[u8]) -> Result<ConfigV0, DecodeError> {
    let raw: RawEnvelope<CommonConfig> = serde_json::from_slice(input)?;
    raw.check_kind(COMMON_CONFIG_V0_KIND)?;
    Ok(ConfigV0 {
        kind: raw.kind,
        value: raw.value,
    })
}

pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV0, ManifestError> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_config_slice(&content).map_err(|source| ManifestError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ErrorKind;

    #[test]
    fn parses_full_config() {
        let input = r#"{
            "kind": "torcx-config-v0",
            "value": {
                "base_dir": "/var/lib/torcx",
                "run_dir": "/run/torcx",
                "conf_dir": "/etc/torcx",
                "store_paths": ["/usr/share/torcx/store", "/var/lib/torcx/store"]
            }
        }"#;
        let cfg = parse_config_str(input).unwrap();
        assert_eq!(cfg.value.run_dir.as_deref(), Some(Path::new("/run/torcx")));
        assert_eq!(cfg.value.store_paths.len(), 2);
    }

    #[test]
    fn parses_partial_config() {
        let input = r#"{"kind":"torcx-config-v0","value":{"conf_dir":"/etc/torcx"}}"#;
        let cfg = parse_config_str(input).unwrap();
        assert!(cfg.value.base_dir.is_none());
        assert!(cfg.value.store_paths.is_empty());
    }

    #[test]
    fn rejects_wrong_kind() {
        let input = r#"{"kind":"profile-manifest-v0","value":{}}"#;
        assert!(matches!(
            parse_config_str(input),
            Err(DecodeError::KindMismatch { .. })
        ));
    }

    #[test]
    fn overlay_prefers_set_fields() {
        let base = CommonConfig {
            base_dir: Some("/var/lib/torcx".into()),
            run_dir: Some("/run/torcx".into()),
            conf_dir: None,
            store_paths: vec!["/usr/share/torcx/store".into()],
        };
        let over = CommonConfig {
            run_dir: Some("/tmp/run".into()),
            conf_dir: Some("/tmp/etc".into()),
            ..CommonConfig::default()
        };
        let merged = base.overlay(over);
        assert_eq!(merged.base_dir.as_deref(), Some(Path::new("/var/lib/torcx")));
        assert_eq!(merged.run_dir.as_deref(), Some(Path::new("/tmp/run")));
        assert_eq!(merged.conf_dir.as_deref(), Some(Path::new("/tmp/etc")));
        assert_eq!(merged.store_paths.len(), 1);
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let json = serde_json::to_string(&CommonConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn load_invalid_utf8_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            b"{\"kind\":\"torcx-config-v0\",\"value\":{\"conf_dir\":\"/etc/\xc3\"}}",
        )
        .unwrap();
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn load_missing_config_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("config.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
