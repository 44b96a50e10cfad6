use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid image format '{value}': must be one of \"tgz\", \"squashfs\"")]
pub struct FormatError {
    pub value: String,
}

/// Archive format of an addon image.
///
/// Decoding is done explicitly through [`ImageFormat::parse`], invoked once
/// per image by the manifest codec. Serialization always writes the literal
/// name, so a defaulted format is persisted as `"tgz"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    #[default]
    Tgz,
    Squashfs,
}

impl ImageFormat {
    /// Parse the `format` field of an image entry.
    ///
    /// An empty value maps to [`ImageFormat::Tgz`] for manifests written
    /// before the field existed.
    pub fn parse(value: &str) -> Result<Self, FormatError> {
        match value {
            "" | "tgz" => Ok(ImageFormat::Tgz),
            "squashfs" => Ok(ImageFormat::Squashfs),
            other => Err(FormatError {
                value: other.to_owned(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Tgz => "tgz",
            ImageFormat::Squashfs => "squashfs",
        }
    }

    /// File extension an archive of this format carries in a store.
    pub fn file_suffix(self) -> &'static str {
        match self {
            ImageFormat::Tgz => ".torcx.tgz",
            ImageFormat::Squashfs => ".torcx.squashfs",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ImageFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
