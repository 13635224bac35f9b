pub mod error;
pub mod puncher;
pub mod tls;

pub use error::PunchError;
pub use puncher::{Channel, PunchState, Puncher};
pub use tls::{LocalIdentity, PeerVerification, TlsFloor, client_config};
