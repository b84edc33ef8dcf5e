//! # PopRoute
//!
//! `poproute` is an in-memory, topic-routed message router built with Rust.
//! Subscribers attach over WebSockets and receive every message the router
//! emits; a static routing table rewrites each inbound topic into zero or
//! more output topics. Routers federate by dialling each other, so a message
//! can hop across several routers, relabelled at every hop.
//!
//! ## Core Modules
//!
//! - `broker`: the `Message` type, the routing table and the dispatch loop.
//! - `client`: the router's record of one attached subscriber.
//! - `peer`: self-healing links to peer routers and the bridges that plug them into the router.
//! - `config`: loading settings from files and the environment.
//! - `transport`: the WebSocket attach endpoint and the frame codec.
//! - `utils`: the crate error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod peer;
pub mod transport;
pub mod utils;
