use crate::profile::ProfileLayout;
use std::path::PathBuf;
use torcx_schema::seal::{
    SEAL_BINDIR, SEAL_LOWER_PROFILES, SEAL_RUN_PROFILE_PATH, SEAL_UNPACKDIR, SEAL_UPPER_PROFILE,
};

/// Resolved state of one apply run, as handed to downstream processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    pub upper_profile: String,
    pub lower_profiles: Vec<PathBuf>,
    pub run_profile_path: PathBuf,
    pub bindir: PathBuf,
    pub unpackdir: PathBuf,
}

impl Seal {
    pub fn new(layout: &ProfileLayout, upper_profile: &str, lower_profiles: Vec<PathBuf>) -> Self {
        Self {
            upper_profile: upper_profile.to_owned(),
            lower_profiles,
            run_profile_path: layout.run_profile_path(),
            bindir: layout.run_bindir(),
            unpackdir: layout.run_unpackdir(),
        }
    }

    /// Key/value pairs in `SEAL_KEYS` order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let lowers = self
            .lower_profiles
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        vec![
            (SEAL_UPPER_PROFILE, self.upper_profile.clone()),
            (SEAL_LOWER_PROFILES, lowers),
            (
                SEAL_RUN_PROFILE_PATH,
                self.run_profile_path.display().to_string(),
            ),
            (SEAL_BINDIR, self.bindir.display().to_string()),
            (SEAL_UNPACKDIR, self.unpackdir.display().to_string()),
        ]
    }
}
