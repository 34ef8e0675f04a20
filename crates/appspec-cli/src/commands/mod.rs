pub mod document;
pub mod validate;
