pub mod ip_extraction;
pub mod json;
pub mod params;
