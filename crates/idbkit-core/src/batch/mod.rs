//! Batch request/response contract and the cursor walk behind it
//!
//! ```text
//! {skip?, take?, typeDiscriminator?, typeDiscriminatorValue?, continuationKey?}
//!     -> {items[], continuationKey?}
//! ```
//!
//! The request/result pair is the wire contract between the lazy query layer
//! and a storage engine. Field names and shape must stay stable. A hierarchical
//! discriminator travels as a value with a trailing `*`.

mod pager;
mod walk;

pub use pager::{BatchPager, PagerState};
pub use walk::walk_batch;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discriminator::Discriminator;
use crate::key::ContinuationKey;

/// Maximum records returned by one batch unless configured otherwise.
pub const DEFAULT_BATCH_CEILING: usize = 20;

/// Suffix marking a prefix (hierarchical) discriminator value on the wire.
pub const PREFIX_WILDCARD: char = '*';

/// One `get-batch` call.
///
/// `skip` only applies to the first call of a chain; engines ignore it when a
/// continuation key is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_discriminator_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_key: Option<ContinuationKey>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn after(mut self, key: ContinuationKey) -> Self {
        self.continuation_key = Some(key);
        self
    }

    pub fn with_discriminator(mut self, discriminator: &Discriminator) -> Self {
        self.type_discriminator = Some(discriminator.name.clone());
        self.type_discriminator_value = Some(if discriminator.hierarchical {
            format!("{}{}", discriminator.value, PREFIX_WILDCARD)
        } else {
            discriminator.value.clone()
        });
        self
    }

    /// The discriminator filter this request asks for, if both halves are set.
    pub fn discriminator(&self) -> Option<Discriminator> {
        let name = self.type_discriminator.as_deref()?;
        let value = self.type_discriminator_value.as_deref()?;
        Some(match value.strip_suffix(PREFIX_WILDCARD) {
            Some(prefix) => Discriminator::prefix(name, prefix),
            None => Discriminator::exact(name, value),
        })
    }

    /// Skip to apply in this call: zero once the chain has resumed.
    pub fn effective_skip(&self) -> usize {
        if self.continuation_key.is_some() {
            0
        } else {
            self.skip.unwrap_or(0)
        }
    }
}

/// Records returned by one `get-batch` call.
///
/// An absent `continuation_key` means the chain is exhausted. A present one
/// only promises the cursor has not reached the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult<R = Value> {
    pub items: Vec<R>,
    pub continuation_key: Option<ContinuationKey>,
}

impl<R> BatchResult<R> {
    /// The terminal `{items: [], continuationKey: null}` result.
    pub fn exhausted() -> Self {
        Self {
            items: Vec::new(),
            continuation_key: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.continuation_key.is_none()
    }
}

impl<R> Default for BatchResult<R> {
    fn default() -> Self {
        Self::exhausted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_wire_shape() {
        let request = BatchRequest::new()
            .take(20)
            .with_discriminator(&Discriminator::exact("$type", "Note"))
            .after(ContinuationKey::new("20"));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "take": 20,
                "typeDiscriminator": "$type",
                "typeDiscriminatorValue": "Note",
                "continuationKey": "20"
            })
        );

        let parsed: BatchRequest = serde_json::from_str(r#"{"skip":3}"#).unwrap();
        assert_eq!(parsed, BatchRequest::new().skip(3));
    }

    #[test]
    fn test_result_serializes_null_key() {
        let result: BatchResult = BatchResult::exhausted();
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"items":[],"continuationKey":null}"#
        );
    }

    #[test]
    fn test_hierarchical_discriminator_round_trips_through_wildcard() {
        let d = Discriminator::prefix("kind", "Animal");
        let request = BatchRequest::new().with_discriminator(&d);
        assert_eq!(request.type_discriminator_value.as_deref(), Some("Animal*"));
        assert_eq!(request.discriminator(), Some(d));

        let half = BatchRequest {
            type_discriminator: Some("kind".into()),
            ..Default::default()
        };
        assert_eq!(half.discriminator(), None);
    }

    #[test]
    fn test_skip_ignored_after_continuation() {
        let first = BatchRequest::new().skip(5);
        assert_eq!(first.effective_skip(), 5);
        let resumed = first.after(ContinuationKey::new("9"));
        assert_eq!(resumed.effective_skip(), 0);
    }
}
