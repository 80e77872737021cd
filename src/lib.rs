//! Client for the Helius Atlas `transactionSubscribe` websocket stream.
//!
//! A [`session::SessionController`] owns a single websocket connection and
//! drives it through idle, connecting, open and closed states, appending
//! every received frame to a [`sink::NotificationSink`]. Addresses to watch
//! live in an [`registry::AddressRegistry`] and are turned into the JSON RPC
//! subscribe request by [`rpc::build`].

pub mod error;
pub mod registry;
pub mod rpc;
pub mod session;
pub mod sink;
