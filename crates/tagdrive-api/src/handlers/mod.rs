pub mod data;
pub mod files;
pub mod login;
pub mod share;
pub mod tags;
