pub mod summary;
pub mod tree;
pub mod trunk;
