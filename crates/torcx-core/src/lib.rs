//! Profile resolution for torcx.
//!
//! This crate combines vendor (lower) profiles and the user (upper) profile
//! into the effective image list (`merge_images`, `fold_profiles`), locates
//! profiles on disk (`ProfileLayout`, `find_profile`, `list_profiles`),
//! runs the apply-time resolution (`resolve`), persists the run profile
//! atomically, and assembles the seal handed to downstream processes.

pub mod merge;
pub mod profile;
pub mod seal;

pub use merge::{fold_profiles, merge_images};
pub use profile::{
    find_profile, list_profiles, profile_file, read_next_profile, resolve, validate_profile_name,
    write_run_profile, ProfileLayout, PROFILE_EXTENSION, RUN_PROFILE_MODE,
};
pub use seal::Seal;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("manifest error: {0}")]
    Manifest(#[from] torcx_schema::ManifestError),
    #[error("profile not found: {0}")]
    NotFound(String),
    #[error("invalid profile name '{0}': must not be empty or contain path separators")]
    InvalidName(String),
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
