//! BIOP messages stored in carousel modules.

use std::fmt;

use smallvec::SmallVec;

use crate::psi::desc::split_len8;
use crate::utils::BytesExt;

use super::ior::Ior;

/// Kind of a BIOP object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// `srg`: the service gateway, i.e. the root directory.
    ServiceGateway,
    /// `dir`
    Directory,
    /// `fil`
    File,
    /// `str`
    Stream,
    /// `ste`
    StreamEvent,
    /// Anything else.
    Other([u8; 4]),
}

impl ObjectKind {
    /// Reads an objectKind or a name component kind.
    pub fn from_bytes(kind: &[u8]) -> ObjectKind {
        let kind = kind.strip_suffix(b"\0").unwrap_or(kind);
        match kind {
            b"srg" => ObjectKind::ServiceGateway,
            b"dir" => ObjectKind::Directory,
            b"fil" => ObjectKind::File,
            b"str" => ObjectKind::Stream,
            b"ste" => ObjectKind::StreamEvent,
            _ => {
                let mut raw = [0; 4];
                let len = kind.len().min(4);
                raw[..len].copy_from_slice(&kind[..len]);
                ObjectKind::Other(raw)
            }
        }
    }

    /// Returns `true` for directories and the service gateway.
    #[inline]
    pub fn is_directory(&self) -> bool {
        matches!(self, ObjectKind::ServiceGateway | ObjectKind::Directory)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectKind::ServiceGateway => f.write_str("srg"),
            ObjectKind::Directory => f.write_str("dir"),
            ObjectKind::File => f.write_str("fil"),
            ObjectKind::Stream => f.write_str("str"),
            ObjectKind::StreamEvent => f.write_str("ste"),
            ObjectKind::Other(raw) => write!(f, "{:02X?}", raw),
        }
    }
}

/// A name bound in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Name of the entry.
    pub name: String,
    /// Kind of the bound object.
    pub kind: ObjectKind,
    /// bindingType, 1 for nobject and 2 for ncontext.
    pub binding_type: u8,
    /// Reference to the bound object.
    pub ior: Ior,
}

impl Binding {
    fn read(data: &[u8]) -> Option<(Binding, &[u8])> {
        let [name_components_count, ref data @ ..] = *data else {
            log::debug!("invalid Binding");
            return None;
        };

        let mut data = data;
        let mut names: SmallVec<[String; 1]> = SmallVec::new();
        let mut kind = ObjectKind::Other([0; 4]);
        for _ in 0..name_components_count {
            let Some((id, rem)) = split_len8(data) else {
                log::debug!("invalid Binding::id");
                return None;
            };
            let Some((kind_bytes, rem)) = split_len8(rem) else {
                log::debug!("invalid Binding::kind");
                return None;
            };
            data = rem;

            let id = id.strip_suffix(b"\0").unwrap_or(id);
            names.push(String::from_utf8_lossy(id).into_owned());
            kind = ObjectKind::from_bytes(kind_bytes);
        }

        let Some((&binding_type, data)) = data.split_first() else {
            log::debug!("invalid Binding::binding_type");
            return None;
        };
        let (ior, data) = Ior::read(data)?;
        if data.len() < 2 {
            log::debug!("invalid Binding::object_info");
            return None;
        }
        let Some(data) = data[2..].get(data[0..=1].read_be_16() as usize..) else {
            log::debug!("invalid Binding::object_info");
            return None;
        };

        Some((
            Binding {
                name: names.join("/"),
                kind,
                binding_type,
                ior,
            },
            data,
        ))
    }
}

/// Body of a BIOP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    /// Content of a file.
    File(Box<[u8]>),
    /// Bindings of a directory or the service gateway.
    Directory(Vec<Binding>),
    /// Body of any other kind, kept raw.
    Other(Box<[u8]>),
}

/// A BIOP message describing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiopMessage {
    /// objectKey
    pub object_key: SmallVec<[u8; 4]>,
    /// objectKind
    pub kind: ObjectKind,
    /// objectInfo
    pub object_info: Box<[u8]>,
    /// Decoded messageBody.
    pub body: ObjectBody,
}

impl BiopMessage {
    /// magic of a BIOP message.
    pub const MAGIC: &'static [u8; 4] = b"BIOP";

    /// Reads one message and returns it with the total message length.
    ///
    /// A message whose header is intact but whose body cannot be read still
    /// reports its length so the caller can skip it.
    pub fn read(data: &[u8]) -> Result<(BiopMessage, usize), Option<usize>> {
        if data.len() < 12 || &data[0..4] != Self::MAGIC {
            log::debug!("invalid BiopMessage::magic");
            return Err(None);
        }
        if data[4..=5] != [0x01, 0x00] {
            log::debug!("invalid BiopMessage::version");
            return Err(None);
        }

        let message_size = data[8..=11].read_be_32() as usize;
        let total = 12 + message_size;
        let Some(message) = data.get(12..total) else {
            log::debug!("invalid BiopMessage::message_size");
            return Err(None);
        };

        BiopMessage::read_message(message)
            .map(|message| (message, total))
            .ok_or(Some(total))
    }

    fn read_message(data: &[u8]) -> Option<BiopMessage> {
        let Some((object_key, data)) = split_len8(data) else {
            log::debug!("invalid BiopMessage::object_key");
            return None;
        };
        if data.len() < 4 {
            log::debug!("invalid BiopMessage::object_kind");
            return None;
        }
        let Some((kind, data)) = data[4..].split_at_checked(data[0..=3].read_be_32() as usize)
        else {
            log::debug!("invalid BiopMessage::object_kind");
            return None;
        };
        let kind = ObjectKind::from_bytes(kind);

        if data.len() < 2 {
            log::debug!("invalid BiopMessage::object_info");
            return None;
        }
        let Some((object_info, data)) =
            data[2..].split_at_checked(data[0..=1].read_be_16() as usize)
        else {
            log::debug!("invalid BiopMessage::object_info");
            return None;
        };

        let Some((&service_context_count, mut data)) = data.split_first() else {
            log::debug!("invalid BiopMessage::service_context_list");
            return None;
        };
        for _ in 0..service_context_count {
            if data.len() < 6 {
                log::debug!("invalid BiopMessage::service_context");
                return None;
            }
            let Some(rem) = data[6..].get(data[4..=5].read_be_16() as usize..) else {
                log::debug!("invalid BiopMessage::service_context");
                return None;
            };
            data = rem;
        }

        if data.len() < 4 {
            log::debug!("invalid BiopMessage::message_body");
            return None;
        }
        let Some(body) = data[4..].get(..data[0..=3].read_be_32() as usize) else {
            log::debug!("invalid BiopMessage::message_body");
            return None;
        };

        let body = match kind {
            ObjectKind::File => {
                if body.len() < 4 {
                    log::debug!("invalid BiopMessage::content");
                    return None;
                }
                let Some(content) = body[4..].get(..body[0..=3].read_be_32() as usize) else {
                    log::debug!("invalid BiopMessage::content");
                    return None;
                };
                ObjectBody::File(content.into())
            }
            ObjectKind::ServiceGateway | ObjectKind::Directory => {
                if body.len() < 2 {
                    log::debug!("invalid BiopMessage::bindings");
                    return None;
                }
                let count = body[0..=1].read_be_16();
                let mut body = &body[2..];
                let mut bindings = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (binding, rem) = Binding::read(body)?;
                    body = rem;
                    bindings.push(binding);
                }
                ObjectBody::Directory(bindings)
            }
            _ => ObjectBody::Other(body.into()),
        };

        Some(BiopMessage {
            object_key: SmallVec::from_slice(object_key),
            kind,
            object_info: object_info.into(),
            body,
        })
    }

    /// Returns the bindings of a directory.
    #[inline]
    pub fn bindings(&self) -> Option<&[Binding]> {
        match &self.body {
            ObjectBody::Directory(bindings) => Some(bindings),
            _ => None,
        }
    }
}

/// Reads every message of a module payload.
///
/// Messages whose body is malformed are skipped. Reading stops at the first
/// message whose header cannot be read.
pub fn read_all(mut data: &[u8]) -> Vec<BiopMessage> {
    let mut messages = Vec::new();
    while !data.is_empty() {
        match BiopMessage::read(data) {
            Ok((message, len)) => {
                messages.push(message);
                data = &data[len..];
            }
            Err(Some(len)) => {
                log::debug!("skipped BiopMessage of {} bytes", len);
                data = &data[len..];
            }
            Err(None) => break,
        }
    }
    messages
}
