//! Manifest types and codecs for torcx.
//!
//! This crate defines the schema layer: the profile data model (`Image`,
//! `Images`, `ProfileManifestV0`), the archive format discriminator
//! (`ImageFormat`), the JSON codec for profile, image, and config manifests,
//! and the seal key vocabulary shared with downstream processes.

pub mod config;
pub mod format;
pub mod manifest;
pub mod seal;
pub mod types;

pub use config::{
    load_config, parse_config_slice, parse_config_str, ApplyConfig, CommonConfig, ConfigV0,
    ProfileConfig, COMMON_CONFIG_V0_KIND,
};
pub use format::{FormatError, ImageFormat};
pub use manifest::{
    load_image_manifest, load_profile, parse_image_manifest_slice, parse_image_manifest_str,
    parse_profile_slice, parse_profile_str, save_profile, DecodeError, ErrorKind, ImageManifestV0,
    ManifestError, ProfileManifestV0, IMAGE_MANIFEST_V0_KIND, PROFILE_MANIFEST_V0_KIND,
};
pub use types::{Archive, Assets, Image, Images};
