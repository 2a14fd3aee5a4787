pub mod middleware;
pub mod models;

pub use models::AccessMode;
