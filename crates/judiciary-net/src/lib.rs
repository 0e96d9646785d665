//! Judiciary Net - UDP request client and serve loop

pub mod client;
pub mod server;

pub use client::request;
pub use server::{serve, Handler};
