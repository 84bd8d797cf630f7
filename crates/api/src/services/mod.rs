//! Application services.

pub mod fanout;
pub mod identity;
pub mod session;

pub use fanout::NotificationFanout;
pub use identity::{AuthenticatedUser, IdentityError, IdentityProvider, StaticIdentityProvider};
pub use session::SessionManager;
