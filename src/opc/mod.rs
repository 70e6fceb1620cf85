//! Open Packaging Conventions (OPC) package model.
//!
//! Loads OOXML packages (`.pptx`/`.potx`, `.docx`/`.dotx`, `.xlsx`/`.xltx`)
//! into memory, classifies each entry as an XML part or an opaque binary
//! part, and writes them back losslessly.
//!
//! # Example
//!
//! ```no_run
//! use kumquat::opc::Package;
//!
//! let mut pkg = Package::open("brand.potx")?;
//! if let Some(main) = pkg.main_document_part().map(str::to_string) {
//!     pkg.mutate_part(&main, |doc| {
//!         let root = doc.document_element();
//!         println!("root: {:?}", root);
//!     })?;
//! }
//! pkg.save("out.potx")?;
//! # Ok::<(), kumquat::opc::PackageError>(())
//! ```

pub mod constants;
pub mod content_types;
pub mod error;
pub mod package;
pub mod packuri;
pub mod part;
pub mod rel;

#[cfg(test)]
pub(crate) mod fixtures;

pub use content_types::ContentTypeMap;
pub use error::{PackageError, Result};
pub use package::{Compression, DocumentFormat, DocumentKind, Package, file_lock_key};
pub use packuri::PackURI;
pub use part::{PackagePart, PartKind};
pub use rel::{Relationship, Relationships, parse_relationships};
