//! # xbind model
//!
//! Declarative type model for the xbind XML data-binding engine.
//!
//! A model is a set of packages. Each package owns one XML namespace URI,
//! has a short prefix, and declares types with properties. Types support
//! multiple inheritance (`superClass`), property redefinition (`redefines`)
//! and grafting properties onto foreign types (`extends`).
//!
//! ```ignore
//! use xbind_model::Model;
//!
//! let model = Model::from_files(["model/props.json"])?;
//! let root = model.get_type("props:Root").unwrap();
//! for property in root.properties() {
//!     println!("{} ({:?})", property.ns_name, property.role());
//! }
//! ```

pub mod definition;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod registry;

pub use definition::{
    PackageDefinition, PackageXml, PropertyDefinition, PropertyXml, Serialization, TagAlias,
    TypeDefinition,
};
pub use descriptor::{
    ANY_ELEMENT, NsName, Primitive, PropertyDescriptor, PropertyRole, PropertyType,
    TypeDescriptor,
};
pub use error::{ModelError, Result};
pub use loader::{load_package_file, parse_package};
pub use registry::{Model, Package};
