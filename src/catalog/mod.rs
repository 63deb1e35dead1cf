//! Category tree data model

mod node;
mod reference;

pub use node::{AncestorPath, ArticleId, CategoryId, CategoryNode, NewCategory};
pub use reference::{
    decode_references, CategoryPath, CategoryReference, RawCategoryRef, DEFAULT_SEPARATOR,
};
