// ============================================
// File: crates/otafleet-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes how a managed node is named, so the id that goes into the
//! `nodeId` header is the same value used for the local firmware file and
//! the outcome record.
//!
//! ## Main Functionality
//! - `NodeId`: Validated node identifier
//! - `NodeIdentity`: Immutable (node id, device type) pair sent on every request
//! - `NodeRange`: Prefix + index range that expands into node ids
//!
//! ## ⚠️ Important Note for Next Developer
//! - `NodeId` is used verbatim as an HTTP header value and as a file stem;
//!   keep the allowed character set narrow
//! - `NodeIdentity` is not a credential with expiry; it is re-sent per request
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

// ============================================
// Constants
// ============================================

/// Maximum length of a node identifier in characters.
pub const MAX_NODE_ID_LEN: usize = 64;

/// Maximum number of nodes a single `NodeRange` may span.
pub const MAX_NODE_RANGE_LEN: u32 = 1_000_000;

// ============================================
// NodeId
// ============================================

/// Identifier of a managed node.
///
/// Allowed characters are ASCII alphanumerics plus `-`, `_` and `.`.
///
/// # Example
/// ```
/// use otafleet_common::NodeId;
///
/// let id: NodeId = "a42".parse().unwrap();
/// assert_eq!(id.as_str(), "a42");
/// assert!("a 42".parse::<NodeId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a validated `NodeId`.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the id is empty, too long, or contains
    /// characters outside the allowed set.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(CommonError::invalid_input("node_id", "cannot be empty"));
        }
        if id.len() > MAX_NODE_ID_LEN {
            return Err(CommonError::invalid_input(
                "node_id",
                format!("cannot exceed {MAX_NODE_ID_LEN} characters"),
            ));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(CommonError::invalid_input(
                "node_id",
                format!("invalid character {bad:?}"),
            ));
        }
        Ok(())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================
// NodeIdentity
// ============================================

/// Identity a node presents to the control server.
///
/// Sent as the `nodeId` and `deviceType` headers on every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    node_id: NodeId,
    device_type: String,
}

impl NodeIdentity {
    /// Creates a new identity.
    ///
    /// # Errors
    /// Returns `InvalidInput` if `device_type` is empty or contains
    /// characters that cannot travel in a header.
    pub fn new(node_id: NodeId, device_type: impl Into<String>) -> Result<Self> {
        let device_type = device_type.into();
        if device_type.trim().is_empty() {
            return Err(CommonError::invalid_input("device_type", "cannot be empty"));
        }
        if !device_type.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CommonError::invalid_input(
                "device_type",
                "must be printable ASCII without spaces",
            ));
        }
        Ok(Self {
            node_id,
            device_type,
        })
    }

    /// Returns the node id.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Returns the device type.
    #[must_use]
    pub fn device_type(&self) -> &str {
        &self.device_type
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.node_id, self.device_type)
    }
}

// ============================================
// NodeRange
// ============================================

/// A contiguous range of node identifiers: `{prefix}{start}` .. `{prefix}{end - 1}`.
///
/// # Example
/// ```
/// use otafleet_common::NodeRange;
///
/// let range = NodeRange::new("a", 0, 3).unwrap();
/// let ids: Vec<String> = range.iter().map(|(_, id)| id.to_string()).collect();
/// assert_eq!(ids, ["a0", "a1", "a2"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRange {
    prefix: String,
    start: u32,
    end: u32,
}

impl NodeRange {
    /// Creates a new half-open range.
    ///
    /// # Errors
    /// Returns an error if `start > end`, if the range spans more than
    /// [`MAX_NODE_RANGE_LEN`] nodes, or if the prefix would produce invalid
    /// node ids.
    pub fn new(prefix: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        let prefix = prefix.into();
        if start > end {
            return Err(CommonError::out_of_range(start, 0, end));
        }
        if end - start > MAX_NODE_RANGE_LEN {
            return Err(CommonError::out_of_range(
                end - start,
                0,
                MAX_NODE_RANGE_LEN,
            ));
        }
        // Validate with the widest id the range can produce.
        NodeId::validate(&format!("{prefix}{}", end.max(1) - 1))?;
        Ok(Self { prefix, start, end })
    }

    /// Returns the id prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the number of nodes in the range.
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Returns `true` if the range contains no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Builds the node id for a given index.
    ///
    /// # Errors
    /// Returns an error if the generated id is invalid.
    pub fn node_id(&self, index: u32) -> Result<NodeId> {
        NodeId::new(format!("{}{}", self.prefix, index))
    }

    /// Iterates over `(index, NodeId)` pairs in ascending order.
    ///
    /// Ids are validated at construction, so iteration cannot fail.
    pub fn iter(&self) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        (self.start..self.end).map(move |i| (i, NodeId(format!("{}{}", self.prefix, i))))
    }
}

impl<'de> Deserialize<'de> for NodeRange {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            prefix: String,
            start: u32,
            end: u32,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.prefix, raw.start, raw.end).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for NodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{})", self.prefix, self.start, self.end)
    }
}

// ============================================
// Tests
// ============================================
