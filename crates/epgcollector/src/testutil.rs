//! Section builders for tests.

/// Builds a section with the extended header and a valid CRC.
pub(crate) fn section(
    table_id: u8,
    table_id_extension: u16,
    version: u8,
    section_number: u8,
    last_section_number: u8,
    payload: &[u8],
) -> Vec<u8> {
    let section_length = (5 + payload.len() + 4) as u16;
    let mut buf = vec![
        table_id,
        0xF0 | (section_length >> 8) as u8,
        section_length as u8,
    ];
    buf.extend_from_slice(&table_id_extension.to_be_bytes());
    buf.push(0xC1 | (version << 1));
    buf.push(section_number);
    buf.push(last_section_number);
    buf.extend_from_slice(payload);
    let crc = dvbsi::crc::checksum(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}
