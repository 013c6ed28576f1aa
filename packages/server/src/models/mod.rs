pub mod build;
pub mod shared;
