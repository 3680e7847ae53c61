//! Discord REST adapter implementing the relay's sink and provisioner seams

pub mod client;
pub mod dto;

pub use client::DiscordClient;
