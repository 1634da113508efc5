//! Descriptors and related types defined by MPEG-2 Systems and DSM-CC.

use crate::pid::Pid;
use crate::utils::BytesExt;

use super::base::DecodeDescriptor;

/// stream_type of a PMT elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamType(pub u8);

impl StreamType {
    /// ISO/IEC 11172-2 video.
    pub const MPEG1_VIDEO: StreamType = StreamType(0x01);
    /// ITU-T H.262 | ISO/IEC 13818-2 video.
    pub const MPEG2_VIDEO: StreamType = StreamType(0x02);
    /// ISO/IEC 11172-3 audio.
    pub const MPEG1_AUDIO: StreamType = StreamType(0x03);
    /// ISO/IEC 13818-3 audio.
    pub const MPEG2_AUDIO: StreamType = StreamType(0x04);
    /// Private sections.
    pub const PRIVATE_SECTIONS: StreamType = StreamType(0x05);
    /// PES packets containing private data.
    pub const PRIVATE_DATA: StreamType = StreamType(0x06);
    /// ISO/IEC 13818-6 type B (DSM-CC U-N messages, object carousels).
    pub const DSMCC_TYPE_B: StreamType = StreamType(0x0B);
    /// ISO/IEC 13818-6 type C (stream descriptors).
    pub const DSMCC_TYPE_C: StreamType = StreamType(0x0C);
    /// ISO/IEC 13818-6 type D (any DSM-CC sections).
    pub const DSMCC_TYPE_D: StreamType = StreamType(0x0D);
    /// ISO/IEC 13818-7 audio with ADTS transport syntax.
    pub const AAC: StreamType = StreamType(0x0F);
    /// ISO/IEC 14496-3 audio with LATM transport syntax.
    pub const MPEG4_AUDIO: StreamType = StreamType(0x11);
    /// ITU-T H.264 | ISO/IEC 14496-10 video.
    pub const H264: StreamType = StreamType(0x1B);
    /// HEVC video.
    pub const H265: StreamType = StreamType(0x24);

    /// Returns `true` if the stream may carry DSM-CC sections.
    #[inline]
    pub fn is_dsmcc(&self) -> bool {
        matches!(self.0, 0x0A..=0x0D)
    }
}

/// CA_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalAccessDescriptor {
    /// CA_system_id
    pub ca_system_id: u16,
    /// CA_PID
    pub ca_pid: Pid,
    /// private_data_byte
    pub private_data: Box<[u8]>,
}

impl DecodeDescriptor for ConditionalAccessDescriptor {
    const TAG: u8 = 0x09;

    fn read(data: &[u8]) -> Option<ConditionalAccessDescriptor> {
        if data.len() < 4 {
            log::debug!("invalid ConditionalAccessDescriptor");
            return None;
        }

        let ca_system_id = data[0..=1].read_be_16();
        let ca_pid = Pid::read(&data[2..=3]);
        let private_data = data[4..].into();

        Some(ConditionalAccessDescriptor {
            ca_system_id,
            ca_pid,
            private_data,
        })
    }
}

/// carousel_identifier_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselIdDescriptor {
    /// carousel_id
    pub carousel_id: u32,
    /// FormatID (0 = standard boot, 1 = enhanced boot).
    pub format_id: u8,
    /// Format specifier bytes.
    pub private_data: Box<[u8]>,
}

impl DecodeDescriptor for CarouselIdDescriptor {
    const TAG: u8 = 0x13;

    fn read(data: &[u8]) -> Option<CarouselIdDescriptor> {
        if data.len() < 5 {
            log::debug!("invalid CarouselIdDescriptor");
            return None;
        }

        Some(CarouselIdDescriptor {
            carousel_id: data[0..=3].read_be_32(),
            format_id: data[4],
            private_data: data[5..].into(),
        })
    }
}

/// association_tag_descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationTagDescriptor {
    /// association_tag
    pub association_tag: u16,
    /// use
    pub use_: u16,
    /// selector bytes.
    pub selector: Box<[u8]>,
    /// private_data_byte
    pub private_data: Box<[u8]>,
}

impl DecodeDescriptor for AssociationTagDescriptor {
    const TAG: u8 = 0x14;

    fn read(data: &[u8]) -> Option<AssociationTagDescriptor> {
        if data.len() < 5 {
            log::debug!("invalid AssociationTagDescriptor");
            return None;
        }

        let association_tag = data[0..=1].read_be_16();
        let use_ = data[2..=3].read_be_16();
        let selector_length = data[4] as usize;
        let Some((selector, private_data)) = data[5..].split_at_checked(selector_length) else {
            log::debug!("invalid AssociationTagDescriptor::selector");
            return None;
        };

        Some(AssociationTagDescriptor {
            association_tag,
            use_,
            selector: selector.into(),
            private_data: private_data.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditional_access_descriptor() {
        let desc = ConditionalAccessDescriptor::read(&[0x09, 0x63, 0xE1, 0x01, 0xAA]).unwrap();
        assert_eq!(desc.ca_system_id, 0x0963);
        assert_eq!(desc.ca_pid, Pid::new(0x0101));
        assert_eq!(&*desc.private_data, &[0xAA]);
        assert!(ConditionalAccessDescriptor::read(&[0x09, 0x63, 0xE1]).is_none());
    }

    #[test]
    fn test_association_tag_descriptor() {
        let desc = AssociationTagDescriptor::read(&[
            0x00, 0x0B, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF,
        ])
        .unwrap();
        assert_eq!(desc.association_tag, 0x000B);
        assert_eq!(desc.selector.len(), 5);
        assert_eq!(&*desc.private_data, &[0xFF]);
        assert!(AssociationTagDescriptor::read(&[0x00, 0x0B, 0x00, 0x00, 0x05, 0x00]).is_none());
    }

    #[test]
    fn test_carousel_id_descriptor() {
        let desc = CarouselIdDescriptor::read(&[0x00, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(desc.carousel_id, 1);
        assert_eq!(desc.format_id, 0);
    }
}
