pub mod gateway;
pub mod id;

pub use gateway::{ClientMessage, EventName, GatewayMessage};
pub use id::PrefixedId;
