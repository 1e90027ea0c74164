// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Dataset loading
//!
//! A [`DatasetLoader`] turns one annotation file plus its image directory into
//! dataset items of a given split. Labels are shared across calls: the caller
//! passes the same vector for the train, validation and test splits, and the
//! loader appends any label it has not seen yet.

use crate::entities::{Annotation, BoundingBox, DatasetItem, Label, Subset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Cannot read annotation file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed annotation file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid dataset: {0}")]
    Invalid(String),
}

pub trait DatasetLoader: Send + Sync {
    fn load_items(
        &self,
        annotation_path: &Path,
        images_dir: &Path,
        subset: Subset,
        labels: &mut Vec<Label>,
    ) -> Result<Vec<DatasetItem>, DatasetError>;
}

/// Annotation and image locations of the three splits of one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetParameters {
    pub annotations_train: PathBuf,
    pub images_train_dir: PathBuf,
    pub annotations_val: PathBuf,
    pub images_val_dir: PathBuf,
    pub annotations_test: PathBuf,
    pub images_test_dir: PathBuf,
}

impl DatasetParameters {
    /// `(annotations, images, subset)` in train, validation, test order.
    pub fn splits(&self) -> [(&Path, &Path, Subset); 3] {
        [
            (&self.annotations_train, &self.images_train_dir, Subset::Training),
            (&self.annotations_val, &self.images_val_dir, Subset::Validation),
            (&self.annotations_test, &self.images_test_dir, Subset::Testing),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct CocoFile {
    images: Vec<CocoImage>,
    #[serde(default)]
    annotations: Vec<CocoAnnotation>,
    categories: Vec<CocoCategory>,
}

#[derive(Debug, Deserialize)]
struct CocoImage {
    id: u64,
    file_name: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct CocoAnnotation {
    image_id: u64,
    category_id: u64,
    /// `[x, y, width, height]` in pixels.
    bbox: [f64; 4],
    #[serde(default)]
    iscrowd: u8,
}

#[derive(Debug, Deserialize)]
struct CocoCategory {
    id: u64,
    name: String,
}

/// Loader for COCO-format detection annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CocoLoader;

impl CocoLoader {
    pub fn new() -> Self {
        Self
    }

    fn read(path: &Path) -> Result<CocoFile, DatasetError> {
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn label_for(labels: &mut Vec<Label>, name: &str) -> Label {
    if let Some(label) = labels.iter().find(|l| l.name == name) {
        return label.clone();
    }
    let label = Label::new(labels.len() as u32, name);
    labels.push(label.clone());
    label
}

impl DatasetLoader for CocoLoader {
    fn load_items(
        &self,
        annotation_path: &Path,
        images_dir: &Path,
        subset: Subset,
        labels: &mut Vec<Label>,
    ) -> Result<Vec<DatasetItem>, DatasetError> {
        let coco = Self::read(annotation_path)?;

        let mut categories = HashMap::with_capacity(coco.categories.len());
        for category in &coco.categories {
            categories.insert(category.id, label_for(labels, &category.name));
        }

        let mut index = HashMap::with_capacity(coco.images.len());
        let mut items = Vec::with_capacity(coco.images.len());
        for image in &coco.images {
            if image.width == 0 || image.height == 0 {
                return Err(DatasetError::Invalid(format!(
                    "image {} has zero size",
                    image.file_name
                )));
            }
            index.insert(image.id, items.len());
            items.push(DatasetItem {
                media: images_dir.join(&image.file_name),
                width: image.width,
                height: image.height,
                subset,
                annotations: Vec::new(),
            });
        }

        let mut skipped = 0usize;
        for annotation in &coco.annotations {
            let slot = *index.get(&annotation.image_id).ok_or_else(|| {
                DatasetError::Invalid(format!(
                    "annotation refers to unknown image {}",
                    annotation.image_id
                ))
            })?;
            let label = categories.get(&annotation.category_id).ok_or_else(|| {
                DatasetError::Invalid(format!(
                    "annotation refers to unknown category {}",
                    annotation.category_id
                ))
            })?;

            let [x, y, w, h] = annotation.bbox;
            if annotation.iscrowd != 0 || w <= 0.0 || h <= 0.0 {
                skipped += 1;
                continue;
            }

            let item = &mut items[slot];
            let (iw, ih) = (f64::from(item.width), f64::from(item.height));
            let bbox = BoundingBox::new(
                (x / iw).clamp(0.0, 1.0),
                (y / ih).clamp(0.0, 1.0),
                ((x + w) / iw).clamp(0.0, 1.0),
                ((y + h) / ih).clamp(0.0, 1.0),
            );
            item.annotations.push(Annotation {
                label: label.clone(),
                bbox,
                probability: 1.0,
            });
        }

        tracing::debug!(
            "Loaded {} {:?} items from {:?} ({} annotations skipped)",
            items.len(),
            subset,
            annotation_path,
            skipped
        );
        Ok(items)
    }
}
