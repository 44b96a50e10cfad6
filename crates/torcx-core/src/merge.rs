//! Layered profile merging.
//!
//! Lower (vendor) profiles form the baseline, the upper (user) profile
//! overrides or removes entries by name. The merge is pure and total: every
//! pair of decoded profiles has a defined result.

use std::collections::HashMap;
use torcx_schema::{Image, Images};
use tracing::debug;

/// Images keyed by name, in first-seen order.
///
/// Re-inserting a name replaces its value in place.
#[derive(Debug, Default)]
struct OrderedImages {
    entries: Vec<Image>,
    index: HashMap<String, usize>,
}

impl OrderedImages {
    fn upsert(&mut self, image: Image) {
        if let Some(&slot) = self.index.get(&image.name) {
            self.entries[slot] = image;
        } else {
            self.index.insert(image.name.clone(), self.entries.len());
            self.entries.push(image);
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn into_images(self) -> Images {
        Images::new(self.entries)
    }
}

impl<'a> FromIterator<&'a Image> for OrderedImages {
    fn from_iter<T: IntoIterator<Item = &'a Image>>(iter: T) -> Self {
        let mut out = OrderedImages::default();
        for image in iter {
            out.upsert(image.clone());
        }
        out
    }
}

/// Merge `upper` on top of `lower`.
///
/// Lower entries whose name the upper profile does not mention keep their
/// relative order and come first. Upper entries follow in upper order; an
/// entry with an empty reference is a tombstone and only removes the name.
/// A name repeated within one side keeps its first position and its last
/// value.
pub fn merge_images(lower: &Images, upper: &Images) -> Images {
    let overrides: OrderedImages = upper.iter().collect();

    let mut merged: OrderedImages = lower
        .iter()
        .filter(|img| !overrides.contains(&img.name))
        .collect();
    for image in overrides.entries {
        if !image.is_tombstone() {
            merged.upsert(image);
        }
    }

    let merged = merged.into_images();
    debug!(
        "merged {} lower + {} upper images into {}",
        lower.len(),
        upper.len(),
        merged.len()
    );
    merged
}

/// Fold lower profiles left to right, then apply the upper profile on top.
pub fn fold_profiles(lowers: &[Images], upper: Option<&Images>) -> Images {
    let base = lowers
        .iter()
        .fold(Images::default(), |acc, layer| merge_images(&acc, layer));
    match upper {
        Some(upper) => merge_images(&base, upper),
        None => base,
    }
}
