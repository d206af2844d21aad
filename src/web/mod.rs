//! HTTP surface: the survey API, coaching proxy, telemetry intake and the
//! cookie-protected admin views, plus a client for talking to it.

pub mod auth;
pub mod client;
pub mod handlers;
pub mod server;
pub mod types;

pub use auth::AdminAuth;
pub use client::GatewayClient;
pub use server::{GatewayState, build_router, start_server};
