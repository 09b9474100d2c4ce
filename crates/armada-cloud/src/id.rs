//! Remote object identity model
//!
//! A remote object is addressed by a hierarchical path of typed segments:
//!
//! ```text
//! /subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Compute/hostGroups/{hostGroupName}/hosts/{hostName}
//! ```
//!
//! Every resource kind declares the exact sequence of segments it expects as
//! an [`IdShape`]. Parsing validates an input string against that shape;
//! formatting reproduces the canonical string the remote API accepts.
//!
//! Path keywords (`resourceGroups`, `providers`, ...) are fixed and
//! case-sensitive on output. User-supplied names are stored verbatim but
//! compared case-insensitively, because the API does not always echo back the
//! casing it was given at creation time.

use crate::error::{CloudError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};

/// How the value of a segment is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentValue {
    /// Fixed by the resource kind, e.g. the provider namespace
    Static(&'static str),
    /// Supplied by the user (or echoed back by the API)
    UserSpecified,
}

/// One `/{keyword}/{value}` pair of an ID shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    /// Path keyword, e.g. `resourceGroups`
    pub keyword: &'static str,
    /// Logical name of the value, e.g. `resourceGroupName`
    pub name: &'static str,
    pub value: SegmentValue,
}

impl SegmentSpec {
    pub const fn user(keyword: &'static str, name: &'static str) -> Self {
        Self {
            keyword,
            name,
            value: SegmentValue::UserSpecified,
        }
    }

    pub const fn fixed(keyword: &'static str, name: &'static str, value: &'static str) -> Self {
        Self {
            keyword,
            name,
            value: SegmentValue::Static(value),
        }
    }
}

/// The statically-known layout of one resource kind's ID
#[derive(Debug)]
pub struct IdShape {
    /// Human readable kind, used in error messages
    pub kind: &'static str,
    pub segments: &'static [SegmentSpec],
}

impl IdShape {
    pub const fn new(kind: &'static str, segments: &'static [SegmentSpec]) -> Self {
        Self { kind, segments }
    }

    /// Number of segments whose value comes from the user
    pub fn user_segment_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.value == SegmentValue::UserSpecified)
            .count()
    }

    /// Template string such as `/subscriptions/{subscriptionId}/...`
    pub fn template(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s.value {
                SegmentValue::Static(v) => format!("/{}/{}", s.keyword, v),
                SegmentValue::UserSpecified => format!("/{}/{{{}}}", s.keyword, s.name),
            })
            .collect()
    }

    /// Whether `self` is a strict prefix of `other` (e.g. host group of host)
    fn is_prefix_of(&self, other: &IdShape) -> bool {
        self.segments.len() < other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a.keyword == b.keyword && a.value == b.value)
    }
}

/// Globally unique identifier of a remote object
///
/// Immutable once constructed. Equality and hashing are structural: keywords
/// must match exactly, names match case-insensitively.
#[derive(Debug, Clone)]
pub struct RemoteObjectId {
    shape: &'static IdShape,
    values: Vec<String>,
}

impl RemoteObjectId {
    /// Parse an ID whose keywords must use their canonical casing
    pub fn parse(raw: &str, shape: &'static IdShape) -> Result<Self> {
        Self::parse_with(raw, shape, false)
    }

    /// Parse an ID accepting any keyword casing
    ///
    /// Used for IDs echoed back by the API, which is known to lower-case
    /// keywords such as `resourcegroups`. Formatting restores canonical casing.
    pub fn parse_insensitively(raw: &str, shape: &'static IdShape) -> Result<Self> {
        Self::parse_with(raw, shape, true)
    }

    fn parse_with(raw: &str, shape: &'static IdShape, insensitive: bool) -> Result<Self> {
        let malformed = |reason: String| {
            CloudError::malformed_id(
                raw,
                format!(
                    "{reason}; expected a {} ID like {:?}",
                    shape.kind,
                    shape.template()
                ),
            )
        };

        let path = raw
            .strip_prefix('/')
            .ok_or_else(|| malformed("ID must start with '/'".to_string()))?;

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() % 2 != 0 {
            return Err(malformed(format!(
                "odd number of path components ({})",
                parts.len()
            )));
        }
        if parts.len() != shape.segments.len() * 2 {
            return Err(malformed(format!(
                "expected {} segments but got {}",
                shape.segments.len(),
                parts.len() / 2
            )));
        }

        let mut values = Vec::with_capacity(shape.segments.len());
        for (position, (spec, pair)) in shape.segments.iter().zip(parts.chunks(2)).enumerate() {
            let (keyword, value) = match pair {
                [keyword, value] => (*keyword, *value),
                _ => return Err(malformed("incomplete segment".to_string())),
            };

            let keyword_matches = if insensitive {
                keyword.eq_ignore_ascii_case(spec.keyword)
            } else {
                keyword == spec.keyword
            };
            if !keyword_matches {
                return Err(malformed(format!(
                    "segment {} should be {:?} but was {:?}",
                    position, spec.keyword, keyword
                )));
            }

            if value.is_empty() {
                return Err(malformed(format!("{} is empty", spec.name)));
            }

            match spec.value {
                SegmentValue::Static(expected) => {
                    if !value.eq_ignore_ascii_case(expected) {
                        return Err(malformed(format!(
                            "{} should be {:?} but was {:?}",
                            spec.name, expected, value
                        )));
                    }
                    values.push(expected.to_string());
                }
                SegmentValue::UserSpecified => values.push(value.to_string()),
            }
        }

        Ok(Self { shape, values })
    }

    /// Build an ID from the user-specified segment values, in order
    pub fn new(shape: &'static IdShape, user_values: &[&str]) -> Result<Self> {
        let expected = shape.user_segment_count();
        if user_values.len() != expected {
            return Err(CloudError::malformed_id(
                user_values.join("/"),
                format!(
                    "{} IDs need {} values but {} were given",
                    shape.kind,
                    expected,
                    user_values.len()
                ),
            ));
        }

        let mut supplied = user_values.iter();
        let mut values = Vec::with_capacity(shape.segments.len());
        for spec in shape.segments {
            match spec.value {
                SegmentValue::Static(v) => values.push(v.to_string()),
                SegmentValue::UserSpecified => {
                    let value = supplied.next().copied().unwrap_or_default();
                    if value.is_empty() || value.contains('/') {
                        return Err(CloudError::malformed_id(
                            value,
                            format!("{} must be non-empty and must not contain '/'", spec.name),
                        ));
                    }
                    values.push(value.to_string());
                }
            }
        }

        Ok(Self { shape, values })
    }

    pub fn shape(&self) -> &'static IdShape {
        self.shape
    }

    pub fn kind(&self) -> &'static str {
        self.shape.kind
    }

    /// `(keyword, value)` pairs in path order
    pub fn segments(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.shape
            .segments
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| (spec.keyword, value.as_str()))
    }

    /// Value of a segment by its logical name, e.g. `hostGroupName`
    pub fn segment(&self, name: &str) -> Option<&str> {
        self.shape
            .segments
            .iter()
            .position(|s| s.name == name)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// The object's own name (the final segment)
    pub fn leaf_name(&self) -> &str {
        self.values.last().map(String::as_str).unwrap_or_default()
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.segment("subscriptionId")
    }

    pub fn resource_group(&self) -> Option<&str> {
        self.segment("resourceGroupName")
    }

    /// The ID of an enclosing scope, e.g. the host group of a dedicated host
    pub fn scope(&self, parent: &'static IdShape) -> Result<Self> {
        if !parent.is_prefix_of(self.shape) {
            return Err(CloudError::malformed_id(
                self.to_string(),
                format!("{} is not nested in a {}", self.shape.kind, parent.kind),
            ));
        }
        Ok(Self {
            shape: parent,
            values: self.values[..parent.segments.len()].to_vec(),
        })
    }

    /// Key used to serialize operations on one object within a process
    pub fn lock_key(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

/// Validate that `raw` is a well-formed ID of the given shape
pub fn validate_id(raw: &str, shape: &'static IdShape) -> Result<()> {
    RemoteObjectId::parse(raw, shape).map(|_| ())
}

impl fmt::Display for RemoteObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (keyword, value) in self.segments() {
            write!(f, "/{}/{}", keyword, value)?;
        }
        Ok(())
    }
}

impl PartialEq for RemoteObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.shape.segments.len() == other.shape.segments.len()
            && self.segments().zip(other.segments()).all(|(a, b)| {
                a.0 == b.0 && a.1.eq_ignore_ascii_case(b.1)
            })
    }
}

impl Eq for RemoteObjectId {}

impl Hash for RemoteObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (keyword, value) in self.segments() {
            keyword.hash(state);
            value.to_ascii_lowercase().hash(state);
        }
    }
}
