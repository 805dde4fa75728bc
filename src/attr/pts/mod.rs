//! TCG Platform Trust Service attributes (PTS Protocol: Binding to TNC IF-M).

pub mod caps;
pub mod dh_nonce;
pub mod file_meas;

use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;

use super::{AttrType, Pen};

pub use caps::{MeasAlgo, MeasAlgoSelection, ProtoCaps, PtsCapabilities, ReqProtoCaps};
pub use dh_nonce::{DhNonceFinish, DhNonceParamsReq, DhNonceParamsResp};
pub use file_meas::{FileMeas, FileMeasurement, ReqFileMeas};

pub const REQ_FILE_MEAS: AttrType = AttrType::new(Pen::TCG, 0x0000_0C00);
pub const FILE_MEAS: AttrType = AttrType::new(Pen::TCG, 0x0000_0D00);
pub const REQ_PROTO_CAPS: AttrType = AttrType::new(Pen::TCG, 0x0000_8000);
pub const PROTO_CAPS: AttrType = AttrType::new(Pen::TCG, 0x0000_8100);
pub const DH_NONCE_PARAMS_REQ: AttrType = AttrType::new(Pen::TCG, 0x0000_8200);
pub const DH_NONCE_PARAMS_RESP: AttrType = AttrType::new(Pen::TCG, 0x0000_8300);
pub const DH_NONCE_FINISH: AttrType = AttrType::new(Pen::TCG, 0x0000_8400);
pub const MEAS_ALGO: AttrType = AttrType::new(Pen::TCG, 0x0000_8500);
pub const MEAS_ALGO_SELECTION: AttrType = AttrType::new(Pen::TCG, 0x0000_8600);

/// Diffie-Hellman group identifier (one bit of the 16-bit group field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DhGroup(pub(crate) u16);

impl DhGroup {
    pub const NONE: DhGroup = DhGroup(0);
    pub const IKE2: DhGroup = DhGroup(1 << 15);
    pub const IKE5: DhGroup = DhGroup(1 << 14);
    pub const IKE14: DhGroup = DhGroup(1 << 13);
    pub const IKE19: DhGroup = DhGroup(1 << 12);
    pub const IKE20: DhGroup = DhGroup(1 << 11);

    pub const MODP1024: DhGroup = Self::IKE2;
    pub const MODP1536: DhGroup = Self::IKE5;
    pub const MODP2048: DhGroup = Self::IKE14;
    pub const ECP256: DhGroup = Self::IKE19;
    pub const ECP384: DhGroup = Self::IKE20;

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Exactly one group bit is set.
    pub const fn is_single(self) -> bool {
        self.0.is_power_of_two()
    }

    /// Relative strength, higher is stronger; 0 for unknown groups.
    pub const fn strength(self) -> u8 {
        match self {
            Self::IKE20 => 5,
            Self::IKE19 => 4,
            Self::IKE14 => 3,
            Self::IKE5 => 2,
            Self::IKE2 => 1,
            _ => 0,
        }
    }

    /// Public value size in bytes for the group.
    pub const fn public_value_len(self) -> usize {
        match self {
            Self::IKE2 => 128,
            Self::IKE5 => 192,
            Self::IKE14 => 256,
            Self::IKE19 => 64,
            Self::IKE20 => 96,
            _ => 0,
        }
    }
}

impl fmt::Display for DhGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.write_str("none"),
            Self::IKE2 => f.write_str("MODP1024"),
            Self::IKE5 => f.write_str("MODP1536"),
            Self::IKE14 => f.write_str("MODP2048"),
            Self::IKE19 => f.write_str("ECP256"),
            Self::IKE20 => f.write_str("ECP384"),
            Self(other) => write!(f, "group {other:#06x}"),
        }
    }
}

/// Measurement hash algorithm (one bit of the 16-bit algorithm field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashAlgo(pub(crate) u16);

impl HashAlgo {
    pub const NONE: HashAlgo = HashAlgo(0);
    pub const SHA1: HashAlgo = HashAlgo(1 << 15);
    pub const SHA256: HashAlgo = HashAlgo(1 << 14);
    pub const SHA384: HashAlgo = HashAlgo(1 << 13);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn strength(self) -> u8 {
        match self {
            Self::SHA384 => 3,
            Self::SHA256 => 2,
            Self::SHA1 => 1,
            _ => 0,
        }
    }

    /// Digest size in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::SHA1 => 20,
            Self::SHA256 => 32,
            Self::SHA384 => 48,
            _ => 0,
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.write_str("none"),
            Self::SHA1 => f.write_str("SHA1"),
            Self::SHA256 => f.write_str("SHA256"),
            Self::SHA384 => f.write_str("SHA384"),
            Self(other) => write!(f, "algorithm {other:#06x}"),
        }
    }
}

macro_rules! bit_set {
    ($(#[$meta:meta])* $set:ident of $member:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $set(u16);

        impl $set {
            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn from_raw(bits: u16) -> Self {
                Self(bits)
            }

            pub const fn raw(self) -> u16 {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn contains(self, member: $member) -> bool {
                member.0 != 0 && self.0 & member.0 == member.0
            }

            pub const fn intersection(self, other: Self) -> Self {
                Self(self.0 & other.0)
            }

            pub fn insert(&mut self, member: $member) {
                self.0 |= member.0;
            }

            /// Single-bit members, most significant bit first.
            pub fn iter(self) -> impl Iterator<Item = $member> {
                (0..16u16)
                    .rev()
                    .map(|bit| 1u16 << bit)
                    .filter(move |mask| self.0 & mask != 0)
                    .map($member)
            }

            /// Member ranked highest by `preference`, if any.
            pub fn select(self, preference: Preference<$member>) -> Option<$member> {
                self.iter().max_by(|a, b| preference(*a, *b))
            }
        }

        impl From<$member> for $set {
            fn from(member: $member) -> Self {
                Self(member.0)
            }
        }

        impl BitOr for $member {
            type Output = $set;

            fn bitor(self, rhs: Self) -> $set {
                $set(self.0 | rhs.0)
            }
        }

        impl BitOr<$member> for $set {
            type Output = $set;

            fn bitor(self, rhs: $member) -> $set {
                $set(self.0 | rhs.0)
            }
        }

        impl BitOr for $set {
            type Output = $set;

            fn bitor(self, rhs: Self) -> $set {
                $set(self.0 | rhs.0)
            }
        }

        impl FromIterator<$member> for $set {
            fn from_iter<I: IntoIterator<Item = $member>>(iter: I) -> Self {
                iter.into_iter().fold(Self::empty(), |set, member| set | member)
            }
        }

        impl fmt::Display for $set {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut first = true;
                for member in self.iter() {
                    if !first {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                    first = false;
                }
                if first {
                    f.write_str("none")?;
                }
                Ok(())
            }
        }
    };
}

bit_set! {
    /// Set of DH groups as carried in the 16-bit group bitmask.
    DhGroupSet of DhGroup
}

bit_set! {
    /// Set of hash algorithms as carried in the 16-bit algorithm bitmask.
    HashAlgoSet of HashAlgo
}

/// Ordering used to pick one member out of a negotiated overlap; the
/// greatest member wins.
pub type Preference<T> = fn(T, T) -> Ordering;

/// Default DH group preference: strongest group wins.
pub fn prefer_strongest_group(a: DhGroup, b: DhGroup) -> Ordering {
    a.strength().cmp(&b.strength())
}

/// Default hash algorithm preference: strongest digest wins.
pub fn prefer_strongest_hash(a: HashAlgo, b: HashAlgo) -> Ordering {
    a.strength().cmp(&b.strength())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership() {
        let set = DhGroup::IKE14 | DhGroup::IKE19;
        assert!(set.contains(DhGroup::MODP2048));
        assert!(!set.contains(DhGroup::IKE2));
        assert!(!set.contains(DhGroup::NONE));
        assert_eq!(set.raw(), 0x3000);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![DhGroup::IKE14, DhGroup::IKE19]);
    }

    #[test]
    fn select_strongest() {
        let groups = DhGroup::IKE2 | DhGroup::IKE20 | DhGroup::IKE14;
        assert_eq!(groups.select(prefer_strongest_group), Some(DhGroup::IKE20));

        let algos = HashAlgo::SHA1 | HashAlgo::SHA256;
        assert_eq!(algos.select(prefer_strongest_hash), Some(HashAlgo::SHA256));

        assert_eq!(DhGroupSet::empty().select(prefer_strongest_group), None);
    }

    #[test]
    fn injected_preference_overrides_strength() {
        fn prefer_weakest(a: HashAlgo, b: HashAlgo) -> Ordering {
            b.strength().cmp(&a.strength())
        }
        let algos = HashAlgo::SHA1 | HashAlgo::SHA256 | HashAlgo::SHA384;
        assert_eq!(algos.select(prefer_weakest), Some(HashAlgo::SHA1));
    }

    #[test]
    fn intersection_and_display() {
        let ours = HashAlgo::SHA256 | HashAlgo::SHA384;
        let theirs = HashAlgo::SHA1 | HashAlgo::SHA256;
        let common = ours.intersection(theirs);
        assert_eq!(common, HashAlgoSet::from(HashAlgo::SHA256));
        assert_eq!(ours.to_string(), "SHA256,SHA384");
        assert_eq!(HashAlgoSet::empty().to_string(), "none");
    }
}
