pub mod backend;
pub mod image;
pub mod repos;
