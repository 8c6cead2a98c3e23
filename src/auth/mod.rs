/// Authentication module
///
/// Token issuance/verification, credential hashing, and the session manager
/// that ties them to the session store.

mod claims;
mod jwt;
mod password;
mod session;

pub use claims::Claims;
pub use claims::TokenKind;
pub use jwt::TokenError;
pub use jwt::TokenKeys;
pub use jwt::TokenPair;
pub use password::hash_password;
pub use password::verify_password;
pub use session::LoginOutcome;
pub use session::SessionManager;
