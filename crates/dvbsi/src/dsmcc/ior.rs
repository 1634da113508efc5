//! Interoperable Object References.
//!
//! An IOR points at a BIOP object by carousel, module and object key. It is
//! carried in the DSI for the service gateway and in every directory binding.

use smallvec::SmallVec;

use crate::utils::BytesExt;

/// profileId_tag of a BIOP profile body.
pub const TAG_BIOP: u32 = 0x49534F06;
/// profileId_tag of a Lite Options profile body.
pub const TAG_LITE_OPTIONS: u32 = 0x49534F05;
/// componentId_tag of BIOP::ObjectLocation.
pub const TAG_OBJECT_LOCATION: u32 = 0x49534F50;
/// componentId_tag of DSM::ConnBinder.
pub const TAG_CONN_BINDER: u32 = 0x49534F40;

/// Location of a BIOP object inside a carousel, used as arena key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectAddress {
    /// moduleId
    pub module_id: u16,
    /// objectKey
    pub object_key: SmallVec<[u8; 4]>,
}

impl ObjectAddress {
    /// Creates an `ObjectAddress`.
    #[inline]
    pub fn new(module_id: u16, object_key: &[u8]) -> ObjectAddress {
        ObjectAddress {
            module_id,
            object_key: SmallVec::from_slice(object_key),
        }
    }
}

/// BIOP::Tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tap {
    /// id
    pub id: u16,
    /// use
    pub use_: u16,
    /// association_tag
    pub association_tag: u16,
    /// selector bytes.
    pub selector: Box<[u8]>,
}

impl Tap {
    /// BIOP_DELIVERY_PARA_USE
    pub const DELIVERY_PARA_USE: u16 = 0x0016;
    /// BIOP_OBJECT_USE
    pub const OBJECT_USE: u16 = 0x0017;

    /// Reads one tap and returns it with the remainder.
    pub fn read(data: &[u8]) -> Option<(Tap, &[u8])> {
        if data.len() < 7 {
            log::debug!("invalid Tap");
            return None;
        }

        let id = data[0..=1].read_be_16();
        let use_ = data[2..=3].read_be_16();
        let association_tag = data[4..=5].read_be_16();
        let Some((selector, rem)) = data[7..].split_at_checked(data[6] as usize) else {
            log::debug!("invalid Tap::selector");
            return None;
        };

        Some((
            Tap {
                id,
                use_,
                association_tag,
                selector: selector.into(),
            },
            rem,
        ))
    }

    /// Returns the transaction id of a delivery parameter selector.
    pub fn transaction_id(&self) -> Option<u32> {
        match *self.selector {
            [0x00, 0x01, ref rem @ ..] if rem.len() >= 8 => Some(rem[0..=3].read_be_32()),
            _ => None,
        }
    }
}

/// BIOP::ObjectLocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// carouselId
    pub carousel_id: u32,
    /// moduleId
    pub module_id: u16,
    /// version.major
    pub version_major: u8,
    /// version.minor
    pub version_minor: u8,
    /// objectKey
    pub object_key: SmallVec<[u8; 4]>,
}

impl ObjectLocation {
    fn read(data: &[u8]) -> Option<ObjectLocation> {
        if data.len() < 9 {
            log::debug!("invalid ObjectLocation");
            return None;
        }

        let carousel_id = data[0..=3].read_be_32();
        let module_id = data[4..=5].read_be_16();
        let version_major = data[6];
        let version_minor = data[7];
        let Some(object_key) = data[9..].get(..data[8] as usize) else {
            log::debug!("invalid ObjectLocation::object_key");
            return None;
        };

        Some(ObjectLocation {
            carousel_id,
            module_id,
            version_major,
            version_minor,
            object_key: SmallVec::from_slice(object_key),
        })
    }

    /// Returns the arena key of the located object.
    #[inline]
    pub fn address(&self) -> ObjectAddress {
        ObjectAddress {
            module_id: self.module_id,
            object_key: self.object_key.clone(),
        }
    }
}

/// DSM::ConnBinder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnBinder {
    /// Taps, the first of which is normally a delivery parameter tap.
    pub taps: Vec<Tap>,
}

impl ConnBinder {
    fn read(data: &[u8]) -> Option<ConnBinder> {
        let [taps_count, ref data @ ..] = *data else {
            log::debug!("invalid ConnBinder");
            return None;
        };

        let mut data = data;
        let mut taps = Vec::with_capacity(taps_count as usize);
        for _ in 0..taps_count {
            let (tap, rem) = Tap::read(data)?;
            data = rem;
            taps.push(tap);
        }
        Some(ConnBinder { taps })
    }
}

/// TAG_BIOP profile body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiopProfile {
    /// Where the object lives.
    pub object_location: ObjectLocation,
    /// How to reach the module.
    pub conn_binder: ConnBinder,
}

impl BiopProfile {
    fn read(data: &[u8]) -> Option<BiopProfile> {
        let [_byte_order, component_count, ref data @ ..] = *data else {
            log::debug!("invalid BiopProfile");
            return None;
        };

        let mut data = data;
        let mut object_location = None;
        let mut conn_binder = None;
        for _ in 0..component_count {
            if data.len() < 5 {
                log::debug!("invalid BiopProfile::component");
                return None;
            }
            let tag = data[0..=3].read_be_32();
            let Some((component, rem)) = data[5..].split_at_checked(data[4] as usize) else {
                log::debug!("invalid BiopProfile::component_data");
                return None;
            };
            data = rem;

            match tag {
                TAG_OBJECT_LOCATION => object_location = Some(ObjectLocation::read(component)?),
                TAG_CONN_BINDER => conn_binder = Some(ConnBinder::read(component)?),
                _ => {}
            }
        }

        let Some(object_location) = object_location else {
            log::debug!("invalid BiopProfile::object_location");
            return None;
        };
        Some(BiopProfile {
            object_location,
            conn_binder: conn_binder.unwrap_or(ConnBinder { taps: Vec::new() }),
        })
    }
}

/// A tagged profile of an [`Ior`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedProfile {
    /// TAG_BIOP
    Biop(BiopProfile),
    /// Any other profile, kept raw.
    Other {
        /// profileId_tag
        tag: u32,
        /// profile_data_byte
        data: Box<[u8]>,
    },
}

/// IOP::IOR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ior {
    /// type_id, e.g. `b"dir\0"`.
    pub type_id: Box<[u8]>,
    /// Tagged profiles.
    pub profiles: Vec<TaggedProfile>,
}

impl Ior {
    /// Reads an IOR and returns it with the remainder.
    pub fn read(data: &[u8]) -> Option<(Ior, &[u8])> {
        if data.len() < 4 {
            log::debug!("invalid Ior");
            return None;
        }

        let type_id_length = data[0..=3].read_be_32() as usize;
        let Some((type_id, data)) = data[4..].split_at_checked(type_id_length) else {
            log::debug!("invalid Ior::type_id");
            return None;
        };
        if data.len() < 4 {
            log::debug!("invalid Ior::tagged_profiles_count");
            return None;
        }

        let count = data[0..=3].read_be_32();
        let mut data = &data[4..];
        let mut profiles = Vec::new();
        for _ in 0..count {
            if data.len() < 8 {
                log::debug!("invalid Ior::tagged_profile");
                return None;
            }
            let tag = data[0..=3].read_be_32();
            let length = data[4..=7].read_be_32() as usize;
            let Some((profile, rem)) = data[8..].split_at_checked(length) else {
                log::debug!("invalid Ior::profile_data");
                return None;
            };
            data = rem;

            profiles.push(match tag {
                TAG_BIOP => TaggedProfile::Biop(BiopProfile::read(profile)?),
                _ => TaggedProfile::Other {
                    tag,
                    data: profile.into(),
                },
            });
        }

        Some((
            Ior {
                type_id: type_id.into(),
                profiles,
            },
            data,
        ))
    }

    /// Returns the first BIOP profile.
    pub fn biop_profile(&self) -> Option<&BiopProfile> {
        self.profiles.iter().find_map(|p| match p {
            TaggedProfile::Biop(biop) => Some(biop),
            TaggedProfile::Other { .. } => None,
        })
    }

    /// Returns the arena key of the referenced object.
    #[inline]
    pub fn address(&self) -> Option<ObjectAddress> {
        self.biop_profile().map(|p| p.object_location.address())
    }
}
