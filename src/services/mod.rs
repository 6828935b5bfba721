pub mod api_client;
pub mod cache;
pub mod diff;
pub mod error;
pub mod roles;
pub mod session;
pub mod sync;

pub use api_client::ApiClient;
pub use cache::TtlCache;
pub use error::PlankError;
pub use session::Session;
pub use sync::BoardSync;
