//! Language server client: transport seam, process supervisor, and the
//! typed request/notify handle.

pub mod capabilities;
pub mod config;
pub mod handle;
pub mod local_transport;
pub mod transport;

mod api;

pub use capabilities::client_capabilities;
pub use config::{ServerConfig, ServerId};
pub use handle::ClientHandle;
pub use local_transport::LocalTransport;
pub use transport::{LspTransport, StartedServer, TransportEvent, TransportStatus};
