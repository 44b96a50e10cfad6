//! Core data types shared by the manifest codec and the merge engine.

use crate::format::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One addon entry of a profile: an archive name plus a reference.
///
/// Images are not deserialized directly; decoding goes through
/// [`crate::manifest::parse_profile_str`], which resolves `format` explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub name: String,
    /// Usually a version or tag. An empty reference in an upper profile
    /// removes the image of the same name.
    pub reference: String,
    pub format: ImageFormat,
}

impl Image {
    pub fn new(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
            format: ImageFormat::Tgz,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// A tombstone deletes an inherited entry instead of naming a version.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.reference.is_empty()
    }

    /// Store lookup key: `<name>:<reference><suffix>`.
    pub fn archive_file_name(&self) -> String {
        format!(
            "{}:{}{}",
            self.name,
            self.reference,
            self.format.file_suffix()
        )
    }
}

/// Ordered list of images. Order is kept for display and deterministic
/// output; `name` is the merge key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Images {
    pub images: Vec<Image>,
}

impl Images {
    pub fn new(images: Vec<Image>) -> Self {
        Self { images }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn get(&self, name: &str) -> Option<&Image> {
        self.images.iter().find(|img| img.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Image> {
        self.images.iter()
    }
}

impl From<Vec<Image>> for Images {
    fn from(images: Vec<Image>) -> Self {
        Self { images }
    }
}

impl FromIterator<Image> for Images {
    fn from_iter<T: IntoIterator<Item = Image>>(iter: T) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Images {
    type Item = Image;
    type IntoIter = std::vec::IntoIter<Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.into_iter()
    }
}

impl<'a> IntoIterator for &'a Images {
    type Item = &'a Image;
    type IntoIter = std::slice::Iter<'a, Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

/// An image resolved to an archive file on disk by a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
    #[serde(flatten)]
    pub image: Image,
    pub filepath: PathBuf,
}

/// Paths an image propagates from its archive onto the host, relative to
/// the unpacked archive root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(rename = "bin", default, skip_serializing_if = "Vec::is_empty")]
    pub binaries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sysusers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tmpfiles: Vec<String>,
}

impl Assets {
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
            && self.network.is_empty()
            && self.units.is_empty()
            && self.sysusers.is_empty()
            && self.tmpfiles.is_empty()
    }
}
