pub mod boxes;
pub mod container;
pub mod factory;
pub mod known_boxes;
pub mod leaves;
pub mod metadata;
pub mod parser;
pub mod sample_entry;
pub mod stream;
pub mod util;

pub use boxes::{Atom, AtomBody, AtomHeader, ContainerAtom, FourCC, FullHeader, OpaqueAtom, Preamble};
pub use factory::{AtomFactory, TypeHandler};
pub use leaves::LeafAtom;
pub use metadata::MetadataHandler;
pub use parser::{AtomError, Result};
pub use stream::ByteStream;
