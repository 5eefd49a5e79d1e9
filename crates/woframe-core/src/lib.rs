#![forbid(unsafe_code)]

//! Core value layer for woframe: dynamic values, key-value coding,
//! associations, the element ID cursor and the request/response envelope.

pub mod association;
pub mod element_id;
pub mod kvc;
pub mod locale;
pub mod message;
pub mod pattern;
pub mod value;

pub use association::{
    constant, key_path, Association, AssociationError, AssociationFactory, AssociationRef,
    AssociationRegistry, ResourceLocator,
};
pub use element_id::ElementId;
pub use kvc::{
    take_value_for_key_path, value_for_key_path, Attributes, KeyValueCoding, KvcError, Record,
};
pub use locale::Locale;
pub use message::{status, Cookie, Request, Response, SESSION_ID_KEY};
pub use value::{ObjectRef, Value};
