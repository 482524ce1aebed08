pub mod common;
pub mod completions;
pub mod shift;
pub mod status;
pub mod sync;
