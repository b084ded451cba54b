//! Realtime push channel over the WebSocket gateway.

pub mod channel;
pub mod events;
pub mod handlers;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use channel::{ChannelBuilder, ConnectionState, RealtimeChannel};
pub use events::{Activity, EventKind, RealtimeEvent};
pub use handlers::HandlerTable;
pub use registry::ChannelRegistry;
pub use supervisor::RealtimeSupervisor;
pub use transport::RetryPolicy;
