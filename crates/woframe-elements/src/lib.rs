#![forbid(unsafe_code)]

//! Stateless dynamic elements for woframe templates.
//!
//! Each element is built once from its binding map and then shared by every
//! request that renders the template. Elements that contain other elements
//! keep the element ID cursor balanced: every segment pushed on the way in
//! is popped on the way out, in all four phases.
//!
//! | Element | Segments |
//! |---------|----------|
//! | [`Compound`] | one, counting children |
//! | [`Conditional`] | one (`1`) while the branch is shown |
//! | [`Repetition`] | one, counting iterations; none for an empty list |
//! | [`Form`], [`Hyperlink`], inputs | none |
//! | [`ChildComponentReference`], [`ComponentContent`] | none |

pub mod child_component;
pub mod component_content;
pub mod compound;
pub mod conditional;
pub mod dynamic;
pub mod error;
pub mod form;
pub mod hyperlink;
pub mod input;
pub mod repetition;
pub mod string;
pub mod submit_button;
pub mod text_field;

#[cfg(test)]
mod testing;

pub use child_component::ChildComponentReference;
pub use component_content::ComponentContent;
pub use compound::Compound;
pub use conditional::Conditional;
pub use dynamic::{ActionTarget, ExtraAttributes};
pub use error::ElementError;
pub use form::Form;
pub use hyperlink::Hyperlink;
pub use input::InputCore;
pub use repetition::Repetition;
pub use string::DynamicString;
pub use submit_button::SubmitButton;
pub use text_field::TextField;
