pub mod client;
pub mod protocol;
pub mod simulated;

pub use client::{TcpGateway, TcpLink};
pub use simulated::{GatewayCounters, GatewayScript, SimulatedGateway, SimulatedLink};
