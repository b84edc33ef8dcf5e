//! The `client` module defines the router-side representation of an attached
//! subscriber connection.
//!
//! It provides the `ClientLink` struct, which holds the subscriber's unique
//! identifier and the bounded channel the router delivers messages into.

pub mod link;
pub use link::{ClientId, ClientLink, OUTBOUND_CAPACITY};

#[cfg(test)]
mod tests;
