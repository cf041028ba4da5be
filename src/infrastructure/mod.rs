pub mod logging;
pub mod transport;

pub use transport::{connect_http, ChainIdentity, HttpIdentity};
