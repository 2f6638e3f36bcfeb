//! OTP/token lifecycle: issuance, verification, and rotating-token auth.

pub mod error;
pub mod principal;
pub mod request_otp;
pub mod session;
pub mod state;
pub mod storage;
pub mod token;
pub mod types;
pub mod utils;
pub mod validate_otp;

pub use self::error::AuthError;
pub use self::principal::{authenticate, AuthenticatedAccount};
pub use self::request_otp::request_otp;
pub use self::session::update_session;
pub use self::state::{AuthConfig, AuthState};
pub use self::validate_otp::validate_otp;
