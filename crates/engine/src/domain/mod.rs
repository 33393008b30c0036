pub mod builder;
pub mod catalog;
pub mod conformance;
pub mod creator;
pub mod creators;
pub mod error;
pub mod family;
pub mod path;
pub mod pdf;
pub mod policy;
pub mod revocation;
pub mod selector;
pub mod types;
pub mod validation;
pub mod verify;
