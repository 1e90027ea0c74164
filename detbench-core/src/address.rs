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

//! Dot-separated addresses into nested result bundles.
//!
//! `metrics.accuracy.f-measure` names the value reached by looking up
//! `metrics`, then `accuracy`, then `f-measure`. The same resolver serves
//! metric extraction from a stage's own result and `base` references that
//! point into another stage's result.

use crate::value::{Bundle, StageValue};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Cannot find address '{address}': key '{key}' is absent (available keys: [{available}])")]
    MissingKey {
        address: String,
        key: String,
        available: String,
    },

    #[error("Cannot find address '{address}': cannot look up '{key}' inside a value of kind {kind}")]
    NotAMapping {
        address: String,
        key: String,
        kind: &'static str,
    },
}

impl AddressError {
    pub(crate) fn missing_key<'k>(
        address: &str,
        key: &str,
        available: impl Iterator<Item = &'k str>,
    ) -> Self {
        AddressError::MissingKey {
            address: address.to_string(),
            key: key.to_string(),
            available: available.collect::<Vec<_>>().join(", "),
        }
    }
}

/// A borrowed view of whatever an address resolved to.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Map(&'a Bundle),
    Value(&'a StageValue),
}

impl<'a> Node<'a> {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Map(_) => None,
            Node::Value(value) => value.as_f64(),
        }
    }

    pub fn as_bundle(&self) -> Option<&'a Bundle> {
        match self {
            Node::Map(bundle) => Some(bundle),
            Node::Value(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Map(_) => "map",
            Node::Value(value) => value.kind(),
        }
    }
}

/// Resolve a dot-separated address inside `root`.
///
/// The empty address resolves to `root` itself.
pub fn resolve<'a>(root: &'a Bundle, address: &str) -> Result<Node<'a>, AddressError> {
    if address.is_empty() {
        return Ok(Node::Map(root));
    }
    descend(Node::Map(root), address, address.split('.'))
}

pub(crate) fn descend<'a, 'k>(
    mut node: Node<'a>,
    address: &str,
    keys: impl Iterator<Item = &'k str>,
) -> Result<Node<'a>, AddressError> {
    for key in keys {
        let map = match node {
            Node::Map(map) => map,
            Node::Value(value) => {
                return Err(AddressError::NotAMapping {
                    address: address.to_string(),
                    key: key.to_string(),
                    kind: value.kind(),
                })
            }
        };

        let next = map
            .get(key)
            .ok_or_else(|| AddressError::missing_key(address, key, map.keys().map(String::as_str)))?;

        node = match next {
            StageValue::Map(inner) => Node::Map(inner),
            other => Node::Value(other),
        };
    }
    Ok(node)
}
