//! Object carousel assembly and path resolution.

use fxhash::FxHashMap;
use indexmap::IndexMap;
use thiserror::Error;

use crate::psi::Section;

use super::biop::{self, BiopMessage, Binding, ObjectBody};
use super::ior::ObjectAddress;
use super::message::{DownloadDataBlock, DownloadInfoIndication, DownloadServerInitiate, DsmccMessage};
use super::module::Module;

/// Errors returned by [`Carousel`].
#[derive(Debug, Error)]
pub enum CarouselError {
    /// No DSI has announced the service gateway yet.
    #[error("no service gateway")]
    NoRoot,

    /// The path does not name an object that has been downloaded.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A path component names something other than a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The path names something other than a file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// A block carries a version other than the one currently announced.
    #[error("module {module_id} is at version {announced}, block has {received}")]
    VersionConflict {
        /// moduleId
        module_id: u16,
        /// Version announced by the latest DII.
        announced: u8,
        /// Version carried by the block.
        received: u8,
    },

    /// A compressed module could not be inflated.
    #[error("failed to inflate module {module_id}")]
    Inflate {
        /// moduleId
        module_id: u16,
        /// Error raised by the decoder.
        #[source]
        source: std::io::Error,
    },
}

/// How far a [`Carousel`] has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CarouselState {
    /// No DSI has been seen.
    NoRoot,
    /// The service gateway is known but no DII has been seen.
    RootKnown,
    /// Modules are announced but none is complete.
    ModulesKnown,
    /// At least one module is complete and its objects can be resolved.
    ObjectsAvailable,
}

#[derive(Debug, Clone)]
struct Root {
    transaction_id: u32,
    carousel_id: u32,
    service_gateway: ObjectAddress,
}

/// An object carousel assembled from DSI, DII and DDB messages.
///
/// Objects extracted from complete modules are kept in an arena keyed by
/// module id and object key, and directories refer to their children by
/// that key. A module whose version changes is dropped together with every
/// object extracted from it.
#[derive(Debug, Default)]
pub struct Carousel {
    root: Option<Root>,
    dii_seen: bool,
    announced: IndexMap<u16, u8>,
    modules: FxHashMap<u16, Module>,
    objects: FxHashMap<ObjectAddress, BiopMessage>,
}

impl Carousel {
    /// Creates an empty `Carousel`.
    #[inline]
    pub fn new() -> Carousel {
        Carousel::default()
    }

    /// Feeds a section with table_id 0x3B or 0x3C.
    ///
    /// Returns `Ok(true)` if the section changed the carousel.
    pub fn on_section(&mut self, section: &Section) -> Result<bool, CarouselError> {
        match DsmccMessage::read(section) {
            Some(DsmccMessage::Dsi(dsi)) => Ok(self.on_dsi(&dsi)),
            Some(DsmccMessage::Dii(dii)) => Ok(self.on_dii(&dii) > 0),
            Some(DsmccMessage::Ddb(ddb)) => self.on_ddb(&ddb),
            None => Ok(false),
        }
    }

    /// Handles a DSI and returns whether the root was replaced.
    pub fn on_dsi(&mut self, dsi: &DownloadServerInitiate) -> bool {
        let Some(profile) = dsi.service_gateway.as_ref().and_then(|ior| ior.biop_profile()) else {
            log::debug!("Carousel: DSI without a BIOP profile");
            return false;
        };

        if let Some(root) = &self.root {
            if root.transaction_id == dsi.transaction_id() {
                return false;
            }
        }

        let location = &profile.object_location;
        log::info!(
            "Carousel: service gateway at carousel {} module {} (transaction 0x{:08X})",
            location.carousel_id,
            location.module_id,
            dsi.transaction_id()
        );
        self.root = Some(Root {
            transaction_id: dsi.transaction_id(),
            carousel_id: location.carousel_id,
            service_gateway: location.address(),
        });
        true
    }

    /// Handles a DII and returns the number of modules (re)started.
    pub fn on_dii(&mut self, dii: &DownloadInfoIndication) -> usize {
        self.dii_seen = true;

        let mut started = 0;
        for module in &dii.modules {
            let id = module.module_id;
            match self.modules.get(&id) {
                Some(current) if current.version() == module.module_version => {}
                Some(current) => {
                    log::warn!(
                        "Carousel: module {} changed version {} -> {}",
                        id,
                        current.version(),
                        module.module_version
                    );
                    self.drop_module(id);
                    if let Some(new) = Module::new(dii, module) {
                        self.modules.insert(id, new);
                        started += 1;
                    }
                }
                None => {
                    log::debug!(
                        "Carousel: module {} version {} ({} bytes)",
                        id,
                        module.module_version,
                        module.module_size
                    );
                    if let Some(new) = Module::new(dii, module) {
                        self.modules.insert(id, new);
                        started += 1;
                    }
                }
            }
            self.announced.insert(id, module.module_version);
        }
        started
    }

    /// Handles a DDB and returns whether it completed a module.
    ///
    /// Blocks of modules not yet announced are ignored. A block whose version
    /// differs from the announced one yields
    /// [`CarouselError::VersionConflict`] and leaves the carousel unchanged.
    pub fn on_ddb(&mut self, ddb: &DownloadDataBlock) -> Result<bool, CarouselError> {
        let Some(module) = self.modules.get_mut(&ddb.module_id) else {
            return Ok(false);
        };
        if module.version() != ddb.module_version {
            return Err(CarouselError::VersionConflict {
                module_id: ddb.module_id,
                announced: module.version(),
                received: ddb.module_version,
            });
        }
        if module.is_complete() || !module.store(ddb) || !module.is_complete() {
            return Ok(false);
        }

        let module_id = module.module_id();
        let messages = match module.payload() {
            Some(Ok(payload)) => Ok(biop::read_all(&payload)),
            Some(Err(source)) => Err(source),
            None => return Ok(false),
        };
        let messages = match messages {
            Ok(messages) => messages,
            Err(source) => {
                module.reset();
                return Err(CarouselError::Inflate { module_id, source });
            }
        };

        log::debug!(
            "Carousel: module {} complete with {} objects",
            module_id,
            messages.len()
        );
        for message in messages {
            let address = ObjectAddress {
                module_id,
                object_key: message.object_key.clone(),
            };
            self.objects.insert(address, message);
        }
        Ok(true)
    }

    fn drop_module(&mut self, module_id: u16) {
        self.modules.remove(&module_id);
        self.objects.retain(|address, _| address.module_id != module_id);
    }

    /// Returns how far the carousel has progressed.
    pub fn state(&self) -> CarouselState {
        if self.root.is_none() {
            CarouselState::NoRoot
        } else if self.modules.values().any(|m| m.is_complete()) {
            CarouselState::ObjectsAvailable
        } else if self.dii_seen {
            CarouselState::ModulesKnown
        } else {
            CarouselState::RootKnown
        }
    }

    /// carouselId of the service gateway, once known.
    #[inline]
    pub fn carousel_id(&self) -> Option<u32> {
        self.root.as_ref().map(|root| root.carousel_id)
    }

    /// Returns `(complete, announced)` module counts.
    pub fn progress(&self) -> (usize, usize) {
        let complete = self
            .announced
            .iter()
            .filter(|(id, version)| self.is_module_complete(**id, **version))
            .count();
        (complete, self.announced.len())
    }

    fn is_module_complete(&self, module_id: u16, version: u8) -> bool {
        self.modules
            .get(&module_id)
            .map_or(false, |m| m.version() == version && m.is_complete())
    }

    /// Returns whether every announced module has been downloaded.
    ///
    /// This requires a root and at least one DII.
    pub fn all_data_processed(&self) -> bool {
        self.root.is_some()
            && self.dii_seen
            && !self.announced.is_empty()
            && self
                .announced
                .iter()
                .all(|(id, version)| self.is_module_complete(*id, *version))
    }

    /// Resolves a slash-separated path from the service gateway.
    pub fn resolve(&self, path: &str) -> Result<&BiopMessage, CarouselError> {
        let root = self.root.as_ref().ok_or(CarouselError::NoRoot)?;
        let mut current = self
            .objects
            .get(&root.service_gateway)
            .ok_or_else(|| CarouselError::ObjectNotFound(String::from("/")))?;

        let mut walked = String::new();
        for name in path.split('/').filter(|s| !s.is_empty()) {
            let Some(bindings) = current.bindings() else {
                return Err(CarouselError::NotADirectory(walked));
            };
            walked.push('/');
            walked.push_str(name);

            current = bindings
                .iter()
                .find(|b| b.name == name)
                .and_then(|b| b.ior.address())
                .and_then(|address| self.objects.get(&address))
                .ok_or_else(|| CarouselError::ObjectNotFound(walked.clone()))?;
        }
        Ok(current)
    }

    /// Returns the content of the file at `path`.
    pub fn read_file(&self, path: &str) -> Result<&[u8], CarouselError> {
        match &self.resolve(path)?.body {
            ObjectBody::File(content) => Ok(content),
            _ => Err(CarouselError::NotAFile(path.to_string())),
        }
    }

    /// Returns the bindings of the directory at `path`.
    pub fn list_directory(&self, path: &str) -> Result<&[Binding], CarouselError> {
        self.resolve(path)?
            .bindings()
            .ok_or_else(|| CarouselError::NotADirectory(path.to_string()))
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        *self = Carousel::default();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::dsmcc::testutil;
    use crate::dsmcc::ObjectKind;

    use super::*;

    fn feed(carousel: &mut Carousel, buf: &[u8]) -> Result<bool, CarouselError> {
        let (section, _) = Section::parse(buf).unwrap();
        carousel.on_section(&section)
    }

    /// Module 1 holds the gateway and `epg/`, module 2 holds `epg/data`.
    fn modules(content: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut module1 = testutil::biop_message(
            &[0, 0, 0, 1],
            b"srg\0",
            &[],
            &testutil::dir_body(&[("epg", b"dir\0", testutil::ior(b"dir\0", 1, &[0, 0, 0, 2]))]),
        );
        module1.extend_from_slice(&testutil::biop_message(
            &[0, 0, 0, 2],
            b"dir\0",
            &[],
            &testutil::dir_body(&[("data", b"fil\0", testutil::ior(b"fil\0", 2, &[0, 0, 0, 3]))]),
        ));
        let module2 = testutil::biop_message(
            &[0, 0, 0, 3],
            b"fil\0",
            &[],
            &testutil::file_body(content),
        );
        (module1, module2)
    }

    fn dii(m1: &[u8], v1: u8, m2: &[u8], v2: u8) -> Vec<u8> {
        testutil::dii(
            0x20,
            4066,
            &[
                (1, m1.len() as u32, v1, testutil::module_info(None)),
                (2, m2.len() as u32, v2, testutil::module_info(None)),
            ],
        )
    }

    #[test]
    fn test_assemble_and_resolve() {
        let (m1, m2) = modules(b"payload");
        let mut carousel = Carousel::new();
        assert_eq!(carousel.state(), CarouselState::NoRoot);
        assert_matches!(carousel.resolve("epg"), Err(CarouselError::NoRoot));

        // blocks before the DII are ignored
        assert_matches!(feed(&mut carousel, &testutil::ddb(0x20, 1, 1, 0, &m1)), Ok(false));

        let srg = testutil::ior(b"srg\0", 1, &[0, 0, 0, 1]);
        assert_matches!(feed(&mut carousel, &testutil::dsi(0x8000_0000, &srg)), Ok(true));
        assert_matches!(feed(&mut carousel, &testutil::dsi(0x8000_0000, &srg)), Ok(false));
        assert_eq!(carousel.state(), CarouselState::RootKnown);
        assert_eq!(carousel.carousel_id(), Some(1));

        assert_matches!(feed(&mut carousel, &dii(&m1, 1, &m2, 1)), Ok(true));
        assert_eq!(carousel.state(), CarouselState::ModulesKnown);
        assert_eq!(carousel.progress(), (0, 2));

        assert_matches!(feed(&mut carousel, &testutil::ddb(0x20, 1, 1, 0, &m1)), Ok(true));
        assert_eq!(carousel.state(), CarouselState::ObjectsAvailable);
        assert!(!carousel.all_data_processed());
        assert_matches!(
            carousel.read_file("epg/data"),
            Err(CarouselError::ObjectNotFound(path)) if path == "/epg/data"
        );

        assert_matches!(feed(&mut carousel, &testutil::ddb(0x20, 2, 1, 0, &m2)), Ok(true));
        assert!(carousel.all_data_processed());
        assert_eq!(carousel.progress(), (2, 2));

        assert_eq!(carousel.read_file("/epg/data").unwrap(), b"payload");
        let listing = carousel.list_directory("epg").unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].kind, ObjectKind::File);
        assert_eq!(carousel.list_directory("").unwrap()[0].name, "epg");
        assert_matches!(carousel.read_file("epg"), Err(CarouselError::NotAFile(_)));
        assert_matches!(
            carousel.resolve("epg/data/more"),
            Err(CarouselError::NotADirectory(path)) if path == "/epg/data"
        );
        assert_matches!(carousel.resolve("nothing"), Err(CarouselError::ObjectNotFound(_)));
    }

    #[test]
    fn test_version_change_invalidates_objects() {
        let (m1, m2) = modules(b"old");
        let mut carousel = Carousel::new();
        let srg = testutil::ior(b"srg\0", 1, &[0, 0, 0, 1]);
        feed(&mut carousel, &testutil::dsi(0x8000_0000, &srg)).unwrap();
        feed(&mut carousel, &dii(&m1, 1, &m2, 1)).unwrap();
        feed(&mut carousel, &testutil::ddb(0x20, 1, 1, 0, &m1)).unwrap();
        feed(&mut carousel, &testutil::ddb(0x20, 2, 1, 0, &m2)).unwrap();
        assert_eq!(carousel.read_file("epg/data").unwrap(), b"old");

        let (_, new_m2) = modules(b"new content");
        assert_matches!(feed(&mut carousel, &dii(&m1, 1, &new_m2, 2)), Ok(true));
        assert!(!carousel.all_data_processed());
        assert_eq!(carousel.progress(), (1, 2));
        assert_matches!(carousel.read_file("epg/data"), Err(CarouselError::ObjectNotFound(_)));
        // objects of the unchanged module survive
        assert_eq!(carousel.list_directory("epg").unwrap().len(), 1);

        assert_matches!(
            feed(&mut carousel, &testutil::ddb(0x20, 2, 1, 0, &m2)),
            Err(CarouselError::VersionConflict {
                module_id: 2,
                announced: 2,
                received: 1,
            })
        );
        assert_matches!(feed(&mut carousel, &testutil::ddb(0x20, 2, 2, 0, &new_m2)), Ok(true));
        assert!(carousel.all_data_processed());
        assert_eq!(carousel.read_file("epg/data").unwrap(), b"new content");
    }

    #[test]
    fn test_oversized_module_stays_incomplete() {
        let (m1, _) = modules(b"unused");
        let mut carousel = Carousel::new();
        let srg = testutil::ior(b"srg\0", 1, &[0, 0, 0, 1]);
        feed(&mut carousel, &testutil::dsi(0x8000_0000, &srg)).unwrap();

        let dii = testutil::dii(
            0x20,
            1,
            &[
                (1, m1.len() as u32, 1, testutil::module_info(None)),
                (2, u32::MAX, 1, testutil::module_info(None)),
            ],
        );
        assert_matches!(feed(&mut carousel, &dii), Ok(true));
        assert_eq!(carousel.progress(), (0, 2));
        assert_matches!(feed(&mut carousel, &testutil::ddb(0x20, 2, 1, 0, b"x")), Ok(false));
        assert!(!carousel.all_data_processed());
    }

    #[test]
    fn test_new_transaction_replaces_root() {
        let mut carousel = Carousel::new();
        let srg = testutil::ior(b"srg\0", 1, &[0, 0, 0, 1]);
        assert!(feed(&mut carousel, &testutil::dsi(0x8000_0000, &srg)).unwrap());
        let moved = testutil::ior(b"srg\0", 4, &[0, 0, 0, 9]);
        assert!(feed(&mut carousel, &testutil::dsi(0x8000_0002, &moved)).unwrap());
        assert_matches!(
            carousel.resolve(""),
            Err(CarouselError::ObjectNotFound(path)) if path == "/"
        );

        carousel.clear();
        assert_eq!(carousel.state(), CarouselState::NoRoot);
    }
}
