pub mod anchor;
pub mod bounds;
pub mod inference;
pub mod normalizer;
pub mod records;
