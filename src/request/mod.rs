//! Request descriptors.
//!
//! A request string such as `"value,alarm,timeStamp"` or
//! `"putField(argument)getField(result)"` selects which sub-fields of a
//! channel's value an operation transfers. [`RequestBuilder`] turns the
//! string into a structured [`PvRequest`]; [`CreateRequest`] is the
//! built-in implementation.

mod create_request;
pub use create_request::*;


use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

use crate::RequestError;

/// One selected field, addressed by its dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequest {
    pub path: String,
    pub options: BTreeMap<String, String>,
}

impl FieldRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            options: BTreeMap::new(),
        }
    }
}

/// Structured field selection derived from a request string
///
/// An absent section means "not specified"; an empty `field()` section
/// selects the whole top-level structure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PvRequest {
    pub(crate) record_options: BTreeMap<String, String>,
    pub(crate) field: Option<Vec<FieldRequest>>,
    pub(crate) put_field: Option<Vec<FieldRequest>>,
    pub(crate) get_field: Option<Vec<FieldRequest>>,
}

impl PvRequest {
    pub fn record_options(&self) -> &BTreeMap<String, String> {
        &self.record_options
    }

    pub fn record_option(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.record_options.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &[FieldRequest] {
        self.field.as_deref().unwrap_or_default()
    }

    pub fn put_fields(&self) -> &[FieldRequest] {
        self.put_field.as_deref().unwrap_or_default()
    }

    pub fn get_fields(&self) -> &[FieldRequest] {
        self.get_field.as_deref().unwrap_or_default()
    }

    pub fn has_put_get_sections(&self) -> bool {
        self.put_field.is_some() && self.get_field.is_some()
    }

    /// True when nothing was selected and no options were given
    pub fn is_empty(&self) -> bool {
        self.record_options.is_empty()
            && self.fields().is_empty()
            && self.put_fields().is_empty()
            && self.get_fields().is_empty()
    }

    /// True if `path` is selected in the `field` section
    pub fn selects(
        &self,
        path: &str,
    ) -> bool {
        self.fields().iter().any(|f| f.path == path)
    }
}

/// Builds descriptors from request strings
#[cfg_attr(test, automock)]
pub trait RequestBuilder: Send + Sync + 'static {
    fn build(
        &self,
        request: &str,
    ) -> std::result::Result<PvRequest, RequestError>;
}
