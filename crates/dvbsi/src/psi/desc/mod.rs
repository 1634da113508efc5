//! Descriptors and the registry that decodes them.
//!
//! [`Descriptor::read`] dispatches on the tag byte together with the
//! [`DescriptorScope`] of the table being read. Tags that are unknown in the
//! scope, and payloads that fail to decode, come back as
//! [`Descriptor::Opaque`]. Either way the cursor advances by `2 + length`.

mod base;
mod dvb;
mod ext;
mod iso;
mod private;

use thiserror::Error;

pub use base::*;
pub use dvb::*;
pub use ext::*;
pub use iso::*;
pub use private::*;

/// Table context a descriptor loop is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorScope {
    /// NIT network and transport stream loops.
    Network,
    /// BAT bouquet and transport stream loops.
    Bouquet,
    /// SDT service loop.
    ServiceDescription,
    /// PMT program and elementary stream loops.
    ProgramMap,
    /// EIT event loop.
    EventInformation,
}

/// Error returned by [`Descriptor::read`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// The declared length runs past the end of the buffer.
    ///
    /// The contained `usize` is the number of bytes the descriptor declares.
    #[error("truncated descriptor ({0} bytes declared)")]
    Truncated(usize),
}

/// extension_descriptor tag.
pub const EXTENSION_TAG: u8 = 0x7F;

/// A decoded descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Descriptor {
    ConditionalAccess(ConditionalAccessDescriptor),
    CarouselId(CarouselIdDescriptor),
    AssociationTag(AssociationTagDescriptor),
    NetworkName(NetworkNameDescriptor),
    ServiceList(ServiceListDescriptor),
    SatelliteDeliverySystem(SatelliteDeliverySystemDescriptor),
    CableDeliverySystem(CableDeliverySystemDescriptor),
    BouquetName(BouquetNameDescriptor),
    Service(ServiceDescriptor),
    CountryAvailability(CountryAvailabilityDescriptor),
    Linkage(LinkageDescriptor),
    ShortEvent(ShortEventDescriptor),
    ExtendedEvent(ExtendedEventDescriptor),
    Component(ComponentDescriptor),
    StreamIdentifier(StreamIdentifierDescriptor),
    CaIdentifier(CaIdentifierDescriptor),
    Content(ContentDescriptor),
    ParentalRating(ParentalRatingDescriptor),
    TerrestrialDeliverySystem(TerrestrialDeliverySystemDescriptor),
    PrivateDataSpecifier(PrivateDataSpecifierDescriptor),
    FrequencyList(FrequencyListDescriptor),
    DataBroadcast(DataBroadcastDescriptor),
    DataBroadcastId(DataBroadcastIdDescriptor),
    DefaultAuthority(DefaultAuthorityDescriptor),
    ContentIdentifier(ContentIdentifierDescriptor),
    ImageIcon(ImageIconDescriptor),
    T2DeliverySystem(T2DeliverySystemDescriptor),
    TargetRegion(TargetRegionDescriptor),
    TargetRegionName(TargetRegionNameDescriptor),
    LogicalChannel(LogicalChannelDescriptor),
    FreesatChannel(FreesatChannelDescriptor),
    FreesatRegion(FreesatRegionDescriptor),
    /// Unknown in the scope, or failed to decode.
    Opaque(OpaqueDescriptor),
}

macro_rules! decode_as {
    ($variant:ident, $ty:ty, $data:expr) => {
        <$ty as DecodeDescriptor>::read($data).map(Descriptor::$variant)
    };
}

macro_rules! decode_ext_as {
    ($variant:ident, $ty:ty, $data:expr) => {
        <$ty as DecodeExtensionDescriptor>::read($data).map(Descriptor::$variant)
    };
}

impl Descriptor {
    /// Reads the descriptor starting at `buf[cursor]`.
    ///
    /// Returns the descriptor and the cursor just past it, which is always
    /// `cursor + 2 + descriptor_length`.
    pub fn read(
        buf: &[u8],
        cursor: usize,
        scope: DescriptorScope,
    ) -> Result<(Descriptor, usize), DescriptorError> {
        let rem = buf.get(cursor..).unwrap_or_default();
        let [tag, length, ref rem @ ..] = *rem else {
            return Err(DescriptorError::Truncated(rem.len().max(2)));
        };
        let Some(data) = rem.get(..length as usize) else {
            return Err(DescriptorError::Truncated(2 + length as usize));
        };
        let next = cursor + 2 + length as usize;

        let descriptor = Descriptor::decode(tag, data, scope).unwrap_or_else(|| {
            Descriptor::Opaque(OpaqueDescriptor {
                tag,
                data: data.into(),
            })
        });
        Ok((descriptor, next))
    }

    fn decode(tag: u8, data: &[u8], scope: DescriptorScope) -> Option<Descriptor> {
        use DescriptorScope::*;

        match (tag, scope) {
            (0x09, ProgramMap) => decode_as!(ConditionalAccess, ConditionalAccessDescriptor, data),
            (0x13, ProgramMap) => decode_as!(CarouselId, CarouselIdDescriptor, data),
            (0x14, ProgramMap) => decode_as!(AssociationTag, AssociationTagDescriptor, data),
            (0x40, Network) => decode_as!(NetworkName, NetworkNameDescriptor, data),
            (0x41, Network | Bouquet) => decode_as!(ServiceList, ServiceListDescriptor, data),
            (0x43, Network) => decode_as!(
                SatelliteDeliverySystem,
                SatelliteDeliverySystemDescriptor,
                data
            ),
            (0x44, Network) => {
                decode_as!(CableDeliverySystem, CableDeliverySystemDescriptor, data)
            }
            (0x47, Bouquet | ServiceDescription) => {
                decode_as!(BouquetName, BouquetNameDescriptor, data)
            }
            (0x48, ServiceDescription) => decode_as!(Service, ServiceDescriptor, data),
            (0x49, Bouquet | ServiceDescription) => {
                decode_as!(CountryAvailability, CountryAvailabilityDescriptor, data)
            }
            (0x4A, Network | Bouquet | ServiceDescription | EventInformation) => {
                decode_as!(Linkage, LinkageDescriptor, data)
            }
            (0x4D, EventInformation) => decode_as!(ShortEvent, ShortEventDescriptor, data),
            (0x4E, EventInformation) => decode_as!(ExtendedEvent, ExtendedEventDescriptor, data),
            (0x50, ServiceDescription | EventInformation) => {
                decode_as!(Component, ComponentDescriptor, data)
            }
            (0x52, ProgramMap) => decode_as!(StreamIdentifier, StreamIdentifierDescriptor, data),
            (0x53, Bouquet | ServiceDescription | EventInformation) => {
                decode_as!(CaIdentifier, CaIdentifierDescriptor, data)
            }
            (0x54, EventInformation) => decode_as!(Content, ContentDescriptor, data),
            (0x55, EventInformation) => decode_as!(ParentalRating, ParentalRatingDescriptor, data),
            (0x5A, Network) => decode_as!(
                TerrestrialDeliverySystem,
                TerrestrialDeliverySystemDescriptor,
                data
            ),
            (0x5F, _) => decode_as!(PrivateDataSpecifier, PrivateDataSpecifierDescriptor, data),
            (0x62, Network) => decode_as!(FrequencyList, FrequencyListDescriptor, data),
            (0x64, ServiceDescription | EventInformation) => {
                decode_as!(DataBroadcast, DataBroadcastDescriptor, data)
            }
            (0x66, ProgramMap) => decode_as!(DataBroadcastId, DataBroadcastIdDescriptor, data),
            (0x73, Network | Bouquet | ServiceDescription) => {
                decode_as!(DefaultAuthority, DefaultAuthorityDescriptor, data)
            }
            (0x76, EventInformation) => {
                decode_as!(ContentIdentifier, ContentIdentifierDescriptor, data)
            }
            (EXTENSION_TAG, _) => Descriptor::decode_extension(data, scope),
            (0x83, Network | Bouquet) => decode_as!(LogicalChannel, LogicalChannelDescriptor, data),
            (0xD3, Bouquet) => decode_as!(FreesatChannel, FreesatChannelDescriptor, data),
            (0xD4, Bouquet) => decode_as!(FreesatRegion, FreesatRegionDescriptor, data),
            _ => None,
        }
    }

    fn decode_extension(data: &[u8], scope: DescriptorScope) -> Option<Descriptor> {
        use DescriptorScope::*;

        let [tag_extension, ref data @ ..] = *data else {
            log::debug!("invalid extension_descriptor");
            return None;
        };
        match (tag_extension, scope) {
            (0x00, _) => decode_ext_as!(ImageIcon, ImageIconDescriptor, data),
            (0x04, Network) => decode_ext_as!(T2DeliverySystem, T2DeliverySystemDescriptor, data),
            (0x09, Network | Bouquet | ServiceDescription | EventInformation) => {
                decode_ext_as!(TargetRegion, TargetRegionDescriptor, data)
            }
            (0x0A, Network | Bouquet) => {
                decode_ext_as!(TargetRegionName, TargetRegionNameDescriptor, data)
            }
            _ => None,
        }
    }

    /// Returns descriptor_tag.
    pub fn tag(&self) -> u8 {
        match self {
            Descriptor::ConditionalAccess(_) => ConditionalAccessDescriptor::TAG,
            Descriptor::CarouselId(_) => CarouselIdDescriptor::TAG,
            Descriptor::AssociationTag(_) => AssociationTagDescriptor::TAG,
            Descriptor::NetworkName(_) => NetworkNameDescriptor::TAG,
            Descriptor::ServiceList(_) => ServiceListDescriptor::TAG,
            Descriptor::SatelliteDeliverySystem(_) => SatelliteDeliverySystemDescriptor::TAG,
            Descriptor::CableDeliverySystem(_) => CableDeliverySystemDescriptor::TAG,
            Descriptor::BouquetName(_) => BouquetNameDescriptor::TAG,
            Descriptor::Service(_) => ServiceDescriptor::TAG,
            Descriptor::CountryAvailability(_) => CountryAvailabilityDescriptor::TAG,
            Descriptor::Linkage(_) => LinkageDescriptor::TAG,
            Descriptor::ShortEvent(_) => ShortEventDescriptor::TAG,
            Descriptor::ExtendedEvent(_) => ExtendedEventDescriptor::TAG,
            Descriptor::Component(_) => ComponentDescriptor::TAG,
            Descriptor::StreamIdentifier(_) => StreamIdentifierDescriptor::TAG,
            Descriptor::CaIdentifier(_) => CaIdentifierDescriptor::TAG,
            Descriptor::Content(_) => ContentDescriptor::TAG,
            Descriptor::ParentalRating(_) => ParentalRatingDescriptor::TAG,
            Descriptor::TerrestrialDeliverySystem(_) => TerrestrialDeliverySystemDescriptor::TAG,
            Descriptor::PrivateDataSpecifier(_) => PrivateDataSpecifierDescriptor::TAG,
            Descriptor::FrequencyList(_) => FrequencyListDescriptor::TAG,
            Descriptor::DataBroadcast(_) => DataBroadcastDescriptor::TAG,
            Descriptor::DataBroadcastId(_) => DataBroadcastIdDescriptor::TAG,
            Descriptor::DefaultAuthority(_) => DefaultAuthorityDescriptor::TAG,
            Descriptor::ContentIdentifier(_) => ContentIdentifierDescriptor::TAG,
            Descriptor::ImageIcon(_)
            | Descriptor::T2DeliverySystem(_)
            | Descriptor::TargetRegion(_)
            | Descriptor::TargetRegionName(_) => EXTENSION_TAG,
            Descriptor::LogicalChannel(_) => LogicalChannelDescriptor::TAG,
            Descriptor::FreesatChannel(_) => FreesatChannelDescriptor::TAG,
            Descriptor::FreesatRegion(_) => FreesatRegionDescriptor::TAG,
            Descriptor::Opaque(d) => d.tag,
        }
    }

    /// Returns `true` if the descriptor was kept undecoded.
    #[inline]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Descriptor::Opaque(_))
    }
}

/// Reads every descriptor of a loop.
///
/// Reading stops at a descriptor whose declared length overruns `buf`;
/// everything before it is returned.
pub fn read_loop(buf: &[u8], scope: DescriptorScope) -> Vec<Descriptor> {
    let mut descriptors = Vec::new();
    let mut cursor = 0;
    while cursor < buf.len() {
        match Descriptor::read(buf, cursor, scope) {
            Ok((descriptor, next)) => {
                descriptors.push(descriptor);
                cursor = next;
            }
            Err(e) => {
                log::debug!("descriptor loop at {}: {}", cursor, e);
                break;
            }
        }
    }
    descriptors
}

/// Finds the first descriptor of a variant in a decoded loop.
///
/// ```
/// # use dvbsi::psi::desc::{find_descriptor, read_loop, DescriptorScope};
/// let descriptors = read_loop(b"\x40\x03BBC", DescriptorScope::Network);
/// let name = find_descriptor!(descriptors, NetworkName).unwrap();
/// assert_eq!(name.network_name.decode(), "BBC");
/// ```
#[macro_export]
macro_rules! find_descriptor {
    ($descriptors:expr, $variant:ident) => {
        $descriptors.iter().find_map(|d| match d {
            $crate::psi::desc::Descriptor::$variant(inner) => Some(inner),
            _ => None,
        })
    };
}

#[doc(inline)]
pub use crate::find_descriptor;

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_dispatch_by_scope() {
        let buf = b"\x40\x03BBC";
        assert_matches!(
            Descriptor::read(buf, 0, DescriptorScope::Network),
            Ok((Descriptor::NetworkName(d), 5)) if d.network_name.decode() == "BBC"
        );
        // network_name is not registered for SDT
        assert_matches!(
            Descriptor::read(buf, 0, DescriptorScope::ServiceDescription),
            Ok((Descriptor::Opaque(OpaqueDescriptor { tag: 0x40, .. }), 5))
        );
    }

    #[test]
    fn test_length_invariant() {
        // short_event whose inner text length overruns the descriptor,
        // an unknown tag, an empty descriptor, then a valid component
        let buf = hex!(
            "4D 06 656E67 03 4142"
            "A0 03 010203"
            "5F 00"
            "50 06 01 03 01 656E67"
        );

        let mut cursor = 0;
        let mut seen = Vec::new();
        while cursor < buf.len() {
            let (descriptor, next) =
                Descriptor::read(&buf, cursor, DescriptorScope::EventInformation).unwrap();
            assert_eq!(next, cursor + 2 + buf[cursor + 1] as usize);
            seen.push(descriptor);
            cursor = next;
        }

        assert_eq!(cursor, buf.len());
        assert_eq!(seen.len(), 4);
        assert_matches!(&seen[0], Descriptor::Opaque(OpaqueDescriptor { tag: 0x4D, data }) if data.len() == 6);
        assert_matches!(&seen[1], Descriptor::Opaque(OpaqueDescriptor { tag: 0xA0, .. }));
        assert_matches!(&seen[2], Descriptor::Opaque(d) if d.tag == 0x5F && d.total_len() == 2);
        assert_matches!(&seen[3], Descriptor::Component(c) if c.component_tag == 1);
    }

    #[test]
    fn test_truncated() {
        let buf = hex!("5F 04 0000233A 4D 09 656E67");
        let (d, next) = Descriptor::read(&buf, 0, DescriptorScope::Network).unwrap();
        assert_matches!(
            d,
            Descriptor::PrivateDataSpecifier(PrivateDataSpecifierDescriptor {
                private_data_specifier: PrivateDataSpecifierDescriptor::UK_DTG,
            })
        );
        assert_eq!(
            Descriptor::read(&buf, next, DescriptorScope::EventInformation),
            Err(DescriptorError::Truncated(11)),
        );
        assert_eq!(
            Descriptor::read(&buf, buf.len() - 1, DescriptorScope::Network),
            Err(DescriptorError::Truncated(2)),
        );

        let descriptors = read_loop(&buf, DescriptorScope::EventInformation);
        assert_eq!(descriptors.len(), 1);
    }

    #[test]
    fn test_extension() {
        let buf = hex!("7F 05 04 00 3001 00");
        // trailing byte makes the T2 parameters incomplete
        assert_matches!(
            Descriptor::read(&buf, 0, DescriptorScope::Network),
            Ok((Descriptor::Opaque(_), 7))
        );

        let buf = hex!("7F 04 04 00 3001");
        let (d, _) = Descriptor::read(&buf, 0, DescriptorScope::Network).unwrap();
        assert_eq!(d.tag(), EXTENSION_TAG);
        assert_matches!(d, Descriptor::T2DeliverySystem(t2) if t2.t2_system_id == 0x3001);

        let (d, _) = Descriptor::read(&buf, 0, DescriptorScope::EventInformation).unwrap();
        assert!(d.is_opaque());
    }

    #[test]
    fn test_private_scopes() {
        let buf = hex!("83 04 1044 FC01");
        let (d, _) = Descriptor::read(&buf, 0, DescriptorScope::Bouquet).unwrap();
        assert_matches!(d, Descriptor::LogicalChannel(_));
        let (d, _) = Descriptor::read(&buf, 0, DescriptorScope::ProgramMap).unwrap();
        assert_matches!(d, Descriptor::Opaque(_));
    }
}
