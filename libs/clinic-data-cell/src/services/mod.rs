pub mod auth;
pub mod demo;
pub mod facade;

pub use auth::*;
pub use demo::*;
pub use facade::*;
