//! Tables defined by MPEG-2 Systems.

use crate::pid::Pid;
use crate::psi::desc::{
    AssociationTagDescriptor, CarouselIdDescriptor, DataBroadcastIdDescriptor, Descriptor,
    DescriptorScope, StreamType,
};
use crate::psi::{PsiTable, Section};
use crate::utils::BytesExt;

use super::{read_descriptors, ServiceId, TableError, TransportStreamId};

/// A program of [`Pat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatProgram {
    /// program_number
    pub program_number: ServiceId,
    /// PID carrying the program's PMT.
    pub program_map_pid: Pid,
}

/// PAT (Program Association Table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    /// transport_stream_id
    pub transport_stream_id: TransportStreamId,
    /// PID carrying the NIT.
    pub network_pid: Pid,
    /// Programs.
    pub programs: Vec<PatProgram>,
}

impl Pat {
    /// table_id of PAT.
    pub const TABLE_ID: u8 = 0x00;

    /// Returns the PMT PID of `program_number`.
    pub fn pmt_pid(&self, program_number: ServiceId) -> Option<Pid> {
        self.programs
            .iter()
            .find(|p| p.program_number == program_number)
            .map(|p| p.program_map_pid)
    }
}

impl PsiTable for Pat {
    fn read(section: &Section) -> Result<Pat, TableError> {
        if section.table_id != Self::TABLE_ID {
            return Err(TableError::UnexpectedTableId(section.table_id));
        }
        let Some(syntax) = section.syntax.as_ref() else {
            log::debug!("invalid Pat::syntax");
            return Err(TableError::MissingSyntax);
        };

        let mut network_pid = Pid::NIT;
        let mut programs = Vec::new();
        for chunk in section.data.chunks_exact(4) {
            let program_number = chunk[0..=1].read_be_16();
            let pid = Pid::read(&chunk[2..=3]);

            if program_number == 0 {
                network_pid = pid;
            } else {
                programs.push(PatProgram {
                    program_number: ServiceId::new(program_number),
                    program_map_pid: pid,
                });
            }
        }

        Ok(Pat {
            transport_stream_id: TransportStreamId::new(syntax.table_id_extension),
            network_pid,
            programs,
        })
    }
}

/// An elementary stream of [`ProgramMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStream {
    /// stream_type
    pub stream_type: StreamType,
    /// elementary_PID
    pub elementary_pid: Pid,
    /// ES_info descriptors.
    pub descriptors: Vec<Descriptor>,
}

impl ElementaryStream {
    /// Returns component_tag of the stream_identifier_descriptor.
    pub fn component_tag(&self) -> Option<u8> {
        crate::find_descriptor!(self.descriptors, StreamIdentifier).map(|d| d.component_tag)
    }

    /// Returns the association tags of the stream.
    pub fn association_tags(&self) -> impl Iterator<Item = &AssociationTagDescriptor> + '_ {
        self.descriptors.iter().filter_map(|d| match d {
            Descriptor::AssociationTag(d) => Some(d),
            _ => None,
        })
    }

    /// Returns the carousel_identifier_descriptor, if any.
    pub fn carousel_id(&self) -> Option<&CarouselIdDescriptor> {
        crate::find_descriptor!(self.descriptors, CarouselId)
    }

    /// Returns the data_broadcast_id_descriptor, if any.
    pub fn data_broadcast_id(&self) -> Option<&DataBroadcastIdDescriptor> {
        crate::find_descriptor!(self.descriptors, DataBroadcastId)
    }
}

/// PMT (Program Map Table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMap {
    /// program_number
    pub program_number: ServiceId,
    /// PCR_PID
    pub pcr_pid: Pid,
    /// program_info descriptors.
    pub descriptors: Vec<Descriptor>,
    /// Elementary streams.
    pub streams: Vec<ElementaryStream>,
}

impl ProgramMap {
    /// table_id of PMT.
    pub const TABLE_ID: u8 = 0x02;

    /// Returns the first stream that looks like an object carousel.
    ///
    /// A stream qualifies if it carries a carousel_identifier_descriptor, or a
    /// data_broadcast_id_descriptor for object carousels or MHEG-5, on a
    /// DSM-CC stream_type.
    pub fn object_carousel(&self) -> Option<&ElementaryStream> {
        self.streams.iter().find(|s| {
            s.carousel_id().is_some()
                || (s.stream_type.is_dsmcc()
                    && s.data_broadcast_id().map_or(false, |d| {
                        matches!(
                            d.data_broadcast_id,
                            DataBroadcastIdDescriptor::OBJECT_CAROUSEL
                                | DataBroadcastIdDescriptor::MHEG5
                        )
                    }))
        })
    }

    /// Returns the stream whose component_tag equals `component_tag`.
    pub fn stream_by_component_tag(&self, component_tag: u8) -> Option<&ElementaryStream> {
        self.streams
            .iter()
            .find(|s| s.component_tag() == Some(component_tag))
    }
}

impl PsiTable for ProgramMap {
    fn read(section: &Section) -> Result<ProgramMap, TableError> {
        if section.table_id != Self::TABLE_ID {
            return Err(TableError::UnexpectedTableId(section.table_id));
        }
        let Some(syntax) = section.syntax.as_ref() else {
            log::debug!("invalid ProgramMap::syntax");
            return Err(TableError::MissingSyntax);
        };

        let data = section.data;
        if data.len() < 4 {
            log::debug!("invalid ProgramMap");
            return Err(TableError::Truncated("ProgramMap"));
        }

        let program_number = ServiceId::new(syntax.table_id_extension);
        let pcr_pid = Pid::read(&data[0..=1]);
        let (descriptors, mut data) = read_descriptors(
            &data[2..],
            DescriptorScope::ProgramMap,
            "ProgramMap::descriptors",
        )?;

        let mut streams = Vec::new();
        while !data.is_empty() {
            if data.len() < 5 {
                log::debug!("invalid ElementaryStream");
                return Err(TableError::Truncated("ElementaryStream"));
            }

            let stream_type = StreamType(data[0]);
            let elementary_pid = Pid::read(&data[1..=2]);
            let (descriptors, rem) = read_descriptors(
                &data[3..],
                DescriptorScope::ProgramMap,
                "ElementaryStream::descriptors",
            )?;
            data = rem;

            streams.push(ElementaryStream {
                stream_type,
                elementary_pid,
                descriptors,
            });
        }

        Ok(ProgramMap {
            program_number,
            pcr_pid,
            descriptors,
            streams,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use hex_literal::hex;

    use crate::psi::build_section;

    use super::*;

    #[test]
    fn test_pat() {
        let buf = build_section(0x00, 0x1044, 0, 0, 0, &hex!("0000 E010 1100 E100 1140 E140"));
        let (section, _) = Section::parse(&buf).unwrap();
        let pat = Pat::read(&section).unwrap();
        assert_eq!(pat.transport_stream_id, TransportStreamId::new(0x1044));
        assert_eq!(pat.network_pid, Pid::NIT);
        assert_eq!(pat.programs.len(), 2);
        assert_eq!(pat.pmt_pid(ServiceId::new(0x1140)), Some(Pid::new(0x0140)));
        assert_eq!(pat.pmt_pid(ServiceId::new(0x1200)), None);
    }

    #[test]
    fn test_pmt() {
        let buf = build_section(
            0x02,
            0x1100,
            1,
            0,
            0,
            &hex!(
                "E065 F000"
                "1B E065 F003 52 01 01"
                "0B E0C8 F012 52 01 0B 66 02 0106 13 05 00000001 00 14 02 000B"
            ),
        );
        let (section, _) = Section::parse(&buf).unwrap();
        let pmt = ProgramMap::read(&section).unwrap();
        assert_eq!(pmt.pcr_pid, Pid::new(0x0065));
        assert!(pmt.descriptors.is_empty());
        assert_eq!(pmt.streams.len(), 2);
        assert_eq!(pmt.streams[0].component_tag(), Some(1));

        let carousel = pmt.object_carousel().unwrap();
        assert_eq!(carousel.elementary_pid, Pid::new(0x00C8));
        assert_eq!(carousel.carousel_id().map(|c| c.carousel_id), Some(1));
        // association_tag descriptor shorter than its fixed fields
        assert_matches!(carousel.descriptors.last(), Some(Descriptor::Opaque(_)));
        assert_eq!(pmt.stream_by_component_tag(0x0B), Some(carousel));
    }

    #[test]
    fn test_pmt_truncated() {
        let buf = build_section(0x02, 0x1100, 1, 0, 0, &hex!("E065 F000 1B E065 F009 52 01 01"));
        let (section, _) = Section::parse(&buf).unwrap();
        assert_eq!(
            ProgramMap::read(&section),
            Err(TableError::Truncated("ElementaryStream::descriptors")),
        );

        let buf = build_section(0x42, 0x1100, 1, 0, 0, &[]);
        let (section, _) = Section::parse(&buf).unwrap();
        assert_eq!(ProgramMap::read(&section), Err(TableError::UnexpectedTableId(0x42)));
    }
}
