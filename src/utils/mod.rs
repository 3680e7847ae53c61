pub mod error;
pub mod logging;
pub mod retry;
pub mod shutdown;

pub use error::AppError;
pub use logging::{init_logging, LogSettings};
pub use shutdown::shutdown_signal;
