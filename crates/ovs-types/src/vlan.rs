//! VLAN match/set-field values with the OpenFlow tag-presence encoding.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit marking a VLAN field value as "a tag is present".
pub const OFPVID_PRESENT: u16 = 0x1000;

/// Field value for "no VLAN tag".
pub const OFPVID_NONE: u16 = 0x0000;

/// Largest 12-bit VLAN id.
pub const MAX_VID: u16 = 4095;

/// Value of the `vlan_vid` match field / set-field action.
///
/// A tagged value always carries [`OFPVID_PRESENT`]; the untagged value is
/// [`OFPVID_NONE`]. Constructing a tagged value from a raw id performs the
/// encoding, so callers never OR the bit in themselves.
///
/// ```
/// use ovs_types::VlanVid;
///
/// let vid = VlanVid::tagged(777).unwrap();
/// assert_eq!(vid.raw(), 777 | 0x1000);
/// assert_eq!(VlanVid::UNTAGGED.raw(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanVid(u16);

impl VlanVid {
    pub const UNTAGGED: VlanVid = VlanVid(OFPVID_NONE);

    /// The reserved VLAN used to park ports that must not forward.
    pub const DEAD: VlanVid = VlanVid(MAX_VID | OFPVID_PRESENT);

    /// Tagged value for `vid`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidVlanId`] when `vid` does not fit 12 bits.
    pub const fn tagged(vid: u16) -> Result<Self, ParseError> {
        if vid <= MAX_VID {
            Ok(VlanVid(vid | OFPVID_PRESENT))
        } else {
            Err(ParseError::InvalidVlanId(vid))
        }
    }

    /// Tagged value for `Some(vid)`, untagged for `None`.
    pub fn from_segment(segmentation_id: Option<u16>) -> Result<Self, ParseError> {
        match segmentation_id {
            Some(vid) => Self::tagged(vid),
            None => Ok(Self::UNTAGGED),
        }
    }

    /// Value as it appears on the wire.
    pub const fn raw(&self) -> u16 {
        self.0
    }

    pub const fn is_tagged(&self) -> bool {
        self.0 & OFPVID_PRESENT != 0
    }

    /// The 12-bit id, or `None` when untagged.
    pub const fn vid(&self) -> Option<u16> {
        if self.is_tagged() {
            Some(self.0 & MAX_VID)
        } else {
            None
        }
    }
}

impl fmt::Display for VlanVid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vid() {
            Some(vid) => write!(f, "{vid}/present"),
            None => f.write_str("none"),
        }
    }
}

impl TryFrom<u16> for VlanVid {
    type Error = ParseError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        if raw == OFPVID_NONE {
            Ok(Self::UNTAGGED)
        } else if raw & OFPVID_PRESENT != 0 && raw & !(OFPVID_PRESENT | MAX_VID) == 0 {
            Ok(VlanVid(raw))
        } else {
            Err(ParseError::InvalidVlanId(raw))
        }
    }
}

impl From<VlanVid> for u16 {
    fn from(vid: VlanVid) -> u16 {
        vid.0
    }
}
