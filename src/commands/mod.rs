pub mod import;
pub mod render;
pub mod status;
