pub mod client;
pub mod types;

pub use client::DeviceRpcClient;
pub use types::{CommandRequest, CommandResponse};
