use std::any::Any;

use bytes::Bytes;

use super::{AttrType, Attribute};
use crate::error::AttrError;

/// An attribute of a kind nobody registered a decoder for.
///
/// Only optional (noskip = false) attributes end up here. The raw value is
/// preserved so it can be forwarded unchanged; negotiation logic ignores it.
#[derive(Debug, Clone)]
pub struct OpaqueAttr {
    attr_type: AttrType,
    value: Bytes,
    noskip: bool,
}

impl OpaqueAttr {
    pub fn new(attr_type: AttrType, value: Bytes) -> Self {
        Self {
            attr_type,
            value,
            noskip: false,
        }
    }
}

impl Attribute for OpaqueAttr {
    fn identify(&self) -> AttrType {
        self.attr_type
    }

    fn serialize(&mut self) -> Bytes {
        self.value.clone()
    }

    fn parse(&mut self) -> Result<(), AttrError> {
        Ok(())
    }

    fn value(&self) -> &Bytes {
        &self.value
    }

    fn is_mandatory(&self) -> bool {
        self.noskip
    }

    fn set_mandatory(&mut self, noskip: bool) {
        self.noskip = noskip;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
