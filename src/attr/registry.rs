use std::collections::HashMap;

use bytes::Bytes;

use super::ietf::{Assessment, PaTncError};
use super::opaque::OpaqueAttr;
use super::pts::{
    DhNonceFinish, DhNonceParamsReq, DhNonceParamsResp, FileMeas, MeasAlgo, MeasAlgoSelection,
    ProtoCaps, ReqFileMeas, ReqProtoCaps,
};
use super::{Attr, AttrBody, AttrHeader, AttrType, Attribute, Pen};
use crate::error::AttrError;

/// Builds an unparsed attribute around its raw value bytes.
pub type AttrConstructor = fn(Bytes) -> Box<dyn Attribute>;

/// Maps (vendor id, type) to the constructor of the matching attribute kind.
///
/// Populate it once before any session runs, then share it read-only
/// (typically behind an `Arc`); lookups need no synchronization.
#[derive(Debug, Clone, Default)]
pub struct AttrRegistry {
    decoders: HashMap<AttrType, AttrConstructor>,
}

impl AttrRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every attribute kind this crate implements.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_body::<PaTncError>();
        registry.register_body::<Assessment>();
        registry.register_body::<ReqProtoCaps>();
        registry.register_body::<ProtoCaps>();
        registry.register_body::<DhNonceParamsReq>();
        registry.register_body::<DhNonceParamsResp>();
        registry.register_body::<DhNonceFinish>();
        registry.register_body::<MeasAlgo>();
        registry.register_body::<MeasAlgoSelection>();
        registry.register_body::<ReqFileMeas>();
        registry.register_body::<FileMeas>();
        registry
    }

    /// Install a decoder. Returns the constructor it replaced, if any.
    pub fn register(
        &mut self,
        vendor: Pen,
        code: u32,
        constructor: AttrConstructor,
    ) -> Option<AttrConstructor> {
        self.decoders
            .insert(AttrType::new(vendor, code), constructor)
    }

    /// Install the decoder for a typed attribute kind.
    pub fn register_body<B: AttrBody>(&mut self) -> Option<AttrConstructor> {
        self.register(B::TYPE.vendor, B::TYPE.code, Attr::<B>::construct)
    }

    pub fn contains(&self, attr_type: AttrType) -> bool {
        self.decoders.contains_key(&attr_type)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Construct the registered attribute kind around `value`, unparsed.
    /// Returns `None` if nothing is registered for (vendor, code).
    pub fn decode(&self, vendor: Pen, code: u32, value: Bytes) -> Option<Box<dyn Attribute>> {
        let constructor = self.decoders.get(&AttrType::new(vendor, code))?;
        Some(constructor(value))
    }

    /// Resolve an inbound attribute from its header.
    ///
    /// Unknown optional attributes come back as [`OpaqueAttr`]; unknown
    /// mandatory ones fail with [`AttrError::UnknownMandatory`]. The noskip
    /// flag of the header is carried over in both the known and opaque case.
    pub fn dispatch(
        &self,
        header: &AttrHeader,
        value: Bytes,
    ) -> Result<Box<dyn Attribute>, AttrError> {
        let noskip = header.flags.is_noskip();
        let mut attr = match self.decode(header.attr_type.vendor, header.attr_type.code, value.clone())
        {
            Some(attr) => attr,
            None if noskip => {
                tracing::warn!(
                    attr_type = %header.attr_type,
                    "unsupported mandatory attribute"
                );
                return Err(AttrError::UnknownMandatory(header.attr_type));
            }
            None => {
                tracing::debug!(
                    attr_type = %header.attr_type,
                    len = value.len(),
                    "skipping unsupported attribute"
                );
                Box::new(OpaqueAttr::new(header.attr_type, value))
            }
        };
        attr.set_mandatory(noskip);
        Ok(attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{pts, AttrFlags, ATTR_HEADER_SIZE};

    fn header(attr_type: AttrType, noskip: bool, value_len: usize) -> AttrHeader {
        AttrHeader {
            flags: AttrFlags::noskip(noskip),
            attr_type,
            length: (ATTR_HEADER_SIZE + value_len) as u32,
        }
    }

    #[test]
    fn standard_registers_pts_kinds() {
        let registry = AttrRegistry::standard();
        assert_eq!(registry.len(), 11);
        assert!(registry.contains(pts::DH_NONCE_PARAMS_RESP));
        assert!(!registry.contains(AttrType::new(Pen::TCG, 0x8D00)));
    }

    #[test]
    fn decode_known_kind() {
        let registry = AttrRegistry::standard();
        let value = Bytes::from_static(&[0, 0, 0, 0x04]);
        let attr = registry
            .decode(Pen::TCG, pts::PROTO_CAPS.code, value.clone())
            .unwrap();
        assert_eq!(attr.identify(), pts::PROTO_CAPS);
        assert_eq!(attr.value(), &value);
        assert!(attr.is::<ProtoCaps>());
    }

    #[test]
    fn decode_unknown_returns_none() {
        let registry = AttrRegistry::new();
        assert!(registry.decode(Pen::IETF, 1, Bytes::new()).is_none());
    }

    #[test]
    fn dispatch_unknown_optional_is_opaque() {
        let registry = AttrRegistry::standard();
        let unknown = AttrType::new(Pen::new(2636), 5);
        let value = Bytes::from_static(b"vendor data");
        let attr = registry
            .dispatch(&header(unknown, false, value.len()), value.clone())
            .unwrap();
        assert_eq!(attr.identify(), unknown);
        assert_eq!(attr.value(), &value);
        assert!(attr.as_any().is::<OpaqueAttr>());
        assert!(!attr.is_mandatory());
    }

    #[test]
    fn dispatch_unknown_mandatory_fails() {
        let registry = AttrRegistry::standard();
        let unknown = AttrType::new(Pen::new(2636), 5);
        let err = registry
            .dispatch(&header(unknown, true, 0), Bytes::new())
            .unwrap_err();
        assert_eq!(err, AttrError::UnknownMandatory(unknown));
    }

    #[test]
    fn dispatch_keeps_noskip_flag() {
        let registry = AttrRegistry::standard();
        let attr = registry
            .dispatch(&header(pts::MEAS_ALGO, true, 4), Bytes::from_static(&[0, 0, 0x40, 0]))
            .unwrap();
        assert!(attr.is_mandatory());
    }

    #[test]
    fn custom_registration_replaces() {
        fn as_opaque(value: Bytes) -> Box<dyn Attribute> {
            Box::new(OpaqueAttr::new(pts::PROTO_CAPS, value))
        }
        let mut registry = AttrRegistry::standard();
        assert!(registry.register(Pen::TCG, pts::PROTO_CAPS.code, as_opaque).is_some());
        let attr = registry
            .decode(Pen::TCG, pts::PROTO_CAPS.code, Bytes::new())
            .unwrap();
        assert!(!attr.is::<ProtoCaps>());
    }
}
