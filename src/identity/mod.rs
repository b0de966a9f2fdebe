pub mod fingerprint;
pub mod ticker;
pub mod token;

pub use fingerprint::{fingerprint, DeviceFingerprint, DeviceProfile};
pub use ticker::{TokenHandle, TokenTicker};
pub use token::{RotatingToken, RotatingTokenValue, DEFAULT_WINDOW_SECS};
