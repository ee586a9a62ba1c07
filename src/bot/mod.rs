//! Bot module - Telegram-facing adapters around the router.

pub mod dispatcher;
pub mod reporter;
pub mod runtime;
pub mod transport;

pub use dispatcher::{AppState, build_dispatcher};
pub use reporter::TelegramReporter;
pub use runtime::IngestionLoop;
pub use transport::TelegramTransport;
