pub mod config;
pub mod segment;
pub mod track;

pub use config::*;
pub use segment::*;
pub use track::*;
