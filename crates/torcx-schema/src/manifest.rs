use crate::format::{FormatError, ImageFormat};
use crate::types::{Assets, Image, Images};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Schema kind of a v0 profile manifest.
pub const PROFILE_MANIFEST_V0_KIND: &str = "profile-manifest-v0";
/// Schema kind of a v0 image (assets) manifest.
pub const IMAGE_MANIFEST_V0_KIND: &str = "image-manifest-v0";

/// Coarse classification of a manifest failure, for callers that only need
/// to tell storage problems from content problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
}

/// Failure to decode a manifest document from its text.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected manifest kind '{found}', expected '{expected}'")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("image '{name}': {source}")]
    InvalidFormat {
        name: String,
        #[source]
        source: FormatError,
    },
    #[error("image '{name}' is listed more than once")]
    DuplicateImage { name: String },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write manifest '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error(
        "refusing to write manifest '{}' with kind '{found}', expected '{expected}'",
        path.display()
    )]
    InvalidKind {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ManifestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManifestError::Read { .. } | ManifestError::Write { .. } => ErrorKind::Io,
            ManifestError::Decode { .. }
            | ManifestError::InvalidKind { .. }
            | ManifestError::Serialize(_) => ErrorKind::Parse,
        }
    }

    /// The manifest path the failure refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ManifestError::Read { path, .. }
            | ManifestError::Write { path, .. }
            | ManifestError::Decode { path, .. }
            | ManifestError::InvalidKind { path, .. } => Some(path),
            ManifestError::Serialize(_) => None,
        }
    }
}

/// A versioned profile: the ordered images a host should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileManifestV0 {
    pub kind: String,
    pub value: Images,
}

impl ProfileManifestV0 {
    pub fn new(value: Images) -> Self {
        Self {
            kind: PROFILE_MANIFEST_V0_KIND.to_owned(),
            value,
        }
    }
}

/// A versioned image manifest listing the assets an archive propagates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageManifestV0 {
    pub kind: String,
    pub value: Assets,
}

impl ImageManifestV0 {
    pub fn new(value: Assets) -> Self {
        Self {
            kind: IMAGE_MANIFEST_V0_KIND.to_owned(),
            value,
        }
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub(crate) struct RawEnvelope<T> {
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) value: T,
}

impl<T> RawEnvelope<T> {
    pub(crate) fn check_kind(&self, expected: &'static str) -> Result<(), DecodeError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(DecodeError::KindMismatch {
                expected,
                found: self.kind.clone(),
            })
        }
    }
}

#[derive(Default, Deserialize)]
struct RawImages {
    #[serde(default)]
    images: Option<Vec<RawImage>>,
}

// `format` stays a plain string here; it is resolved by `ImageFormat::parse`.
#[derive(Deserialize)]
struct RawImage {
    name: String,
    reference: String,
    #[serde(default)]
    format: Option<String>,
}

impl RawImage {
    fn decode(self) -> Result<Image, DecodeError> {
        let format = match ImageFormat::parse(self.format.as_deref().unwrap_or_default()) {
            Ok(f) => f,
            Err(source) => {
                return Err(DecodeError::InvalidFormat {
                    name: self.name,
                    source,
                })
            }
        };
        Ok(Image {
            name: self.name,
            reference: self.reference,
            format,
        })
    }
}

/// Decode a profile manifest document.
///
/// Every image's `format` is resolved, and an image name may appear only
/// once. Nothing is returned unless the whole document is valid.
pub fn parse_profile_str(input: &str) -> Result<ProfileManifestV0, DecodeError> {
    parse_profile_slice(input.as_bytes())
}

/// Same as [`parse_profile_str`], for raw file content. Invalid UTF-8 is a
/// decode failure.
pub fn parse_profile_slice(input: &[u8]) -> Result<ProfileManifestV0, DecodeError> {
    let raw: RawEnvelope<RawImages> = serde_json::from_slice(input)?;
    raw.check_kind(PROFILE_MANIFEST_V0_KIND)?;

    let entries = raw.value.images.unwrap_or_default();
    let mut seen = HashSet::with_capacity(entries.len());
    let mut images = Vec::with_capacity(entries.len());
    for entry in entries {
        let image = entry.decode()?;
        if !seen.insert(image.name.clone()) {
            return Err(DecodeError::DuplicateImage { name: image.name });
        }
        images.push(image);
    }

    Ok(ProfileManifestV0 {
        kind: raw.kind,
        value: Images { images },
    })
}

pub fn load_profile(path: impl AsRef<Path>) -> Result<ProfileManifestV0, ManifestError> {
    let path = path.as_ref();
    let content = read(path)?;
    let manifest = parse_profile_slice(&content).map_err(|source| ManifestError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "loaded profile {} ({} images)",
        path.display(),
        manifest.value.len()
    );
    Ok(manifest)
}

/// Write `manifest` to `path` as pretty-printed JSON with permission bits
/// `mode`.
///
/// The write is not atomic; callers that need crash safety write to a
/// temporary path and rename it over the target. A manifest whose `kind`
/// is not [`PROFILE_MANIFEST_V0_KIND`] is rejected before anything is
/// written.
pub fn save_profile(
    path: impl AsRef<Path>,
    mode: u32,
    manifest: &ProfileManifestV0,
) -> Result<(), ManifestError> {
    let path = path.as_ref();
    if manifest.kind != PROFILE_MANIFEST_V0_KIND {
        return Err(ManifestError::InvalidKind {
            path: path.to_path_buf(),
            expected: PROFILE_MANIFEST_V0_KIND,
            found: manifest.kind.clone(),
        });
    }
    let mut content = serde_json::to_string_pretty(manifest).map_err(ManifestError::Serialize)?;
    content.push('\n');
    write_with_mode(path, mode, content.as_bytes()).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "wrote profile {} ({} images)",
        path.display(),
        manifest.value.len()
    );
    Ok(())
}

pub fn parse_image_manifest_str(input: &str) -> Result<ImageManifestV0, DecodeError> {
    parse_image_manifest_slice(input.as_bytes())
}

pub fn parse_image_manifest_slice(input: &[u8]) -> Result<ImageManifestV0, DecodeError> {
    let raw: RawEnvelope<Assets> = serde_json::from_slice(input)?;
    raw.check_kind(IMAGE_MANIFEST_V0_KIND)?;
    Ok(ImageManifestV0 {
        kind: raw.kind,
        value: raw.value,
    })
}

pub fn load_image_manifest(path: impl AsRef<Path>) -> Result<ImageManifestV0, ManifestError> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_image_manifest_slice(&content).map_err(|source| ManifestError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

// Content is decoded by serde_json so that invalid UTF-8 is a parse failure.
pub(crate) fn read(path: &Path) -> Result<Vec<u8>, ManifestError> {
    fs::read(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn write_with_mode(path: &Path, mode: u32, content: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(content)?;
    // `mode` only applies on creation and is filtered by the umask.
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_with_mode(path: &Path, _mode: u32, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}
