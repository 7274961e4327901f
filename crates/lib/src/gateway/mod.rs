//! Gateway: HTTP host for the relay.
//!
//! The channel POSTs activities to `/api/messages`; each one is handled on its own task so that
//! reply polling never holds up the webhook response.

mod server;

pub use server::{router, run_gateway, GatewayState};
