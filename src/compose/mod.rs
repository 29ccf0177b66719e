//! Document composition.

pub mod composer;
pub mod markup;

pub use composer::{
    compose, needs_creative_runtime, ComposeOptions, ComposedDocument, Composer,
    DEFAULT_CREATIVE_RUNTIME_URL, DEFAULT_RESET_STYLESHEET,
};
