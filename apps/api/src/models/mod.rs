pub mod resume;
pub mod usage;
pub mod user;
