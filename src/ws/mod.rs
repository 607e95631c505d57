pub mod actor;
pub mod handler;
pub mod visibility;
pub mod writer;

pub use actor::*;
pub use handler::*;
pub use visibility::*;
pub use writer::*;
