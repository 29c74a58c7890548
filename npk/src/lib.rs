//! Reader for the npk archive format.
//!
//! An npk package stores many named, optionally compressed and optionally
//! encrypted byte blobs ("entities") in one container file with
//! random-access retrieval by name. This crate parses every supported
//! on-disk generation of the format, indexes the entity directory for
//! name lookup, and decodes entity data with the decrypt/decompress
//! ordering each entity's flags record.
//!
//! ```no_run
//! use npk::{Package, TeaKey};
//!
//! # fn main() -> npk::Result<()> {
//! let key = TeaKey::new([1, 2, 3, 4]);
//! let package = Package::open("assets.npk", &key)?;
//! let data = package.read_by_name("textures/hero.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! Writing packages is out of scope; this crate only reads.

pub mod entity;
pub mod error;
pub mod format;
pub mod package;
pub mod progress;

mod index;
mod io;
mod parser;
mod read;

pub use entity::{Entity, EntityId};
pub use error::{Error, Result};
pub use format::EntityFlags;
pub use package::{Package, PackageOptions};
pub use progress::{Progress, ProgressKind};

// The package key type, re-exported for convenience.
pub use npk_crypto::TeaKey;
