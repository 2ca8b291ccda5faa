//! Authentication: tokens, persistence, sessions, device flow

pub mod device;
pub mod refresh;
pub mod session;
pub mod store;
pub mod token;

pub use device::{DeviceAuthClient, DeviceFlowStart, DevicePoll};
pub use refresh::{OAuthTokenRefresher, TokenRefresher};
pub use session::TokenSession;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::Token;
