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

use super::label::Label;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Split a dataset item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    Training,
    Validation,
    Testing,
    Unassigned,
}

/// Axis-aligned box with coordinates normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub label: Label,
    pub bbox: BoundingBox,
    /// 1.0 for ground truth, model confidence for predictions.
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetItem {
    pub media: PathBuf,
    pub width: u32,
    pub height: u32,
    pub subset: Subset,
    pub annotations: Vec<Annotation>,
}

/// An ordered collection of dataset items spanning all splits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntity {
    items: Vec<DatasetItem>,
}

impl DatasetEntity {
    pub fn new(items: Vec<DatasetItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[DatasetItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items of one split, in their original order.
    pub fn get_subset(&self, subset: Subset) -> DatasetEntity {
        DatasetEntity {
            items: self
                .items
                .iter()
                .filter(|item| item.subset == subset)
                .cloned()
                .collect(),
        }
    }

    pub fn count(&self, subset: Subset) -> usize {
        self.items.iter().filter(|item| item.subset == subset).count()
    }

    /// Copy of the dataset with every annotation removed; used as inference input.
    pub fn with_empty_annotations(&self) -> DatasetEntity {
        DatasetEntity {
            items: self
                .items
                .iter()
                .map(|item| DatasetItem {
                    annotations: Vec::new(),
                    ..item.clone()
                })
                .collect(),
        }
    }
}
