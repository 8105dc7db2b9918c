pub mod appointment;
pub mod auth;
pub mod error;
pub mod lenient;
pub mod patient;
pub mod payment;
pub mod record;
pub mod session;

pub use appointment::*;
pub use auth::*;
pub use error::AppError;
pub use patient::*;
pub use payment::*;
pub use record::*;
pub use session::*;
