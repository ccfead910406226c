//! parley-bot: a conversational session bot for Discord.
//!
//! The bot runs bounded conversation sessions per channel. A session is
//! started and ended with slash commands, buffers its transcript up to a
//! quota, expires on inactivity, and is persisted when it ends. Replies are
//! produced by a completion provider speaking as a configured persona.

#![warn(clippy::all)]

pub mod bridge;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod persona;
pub mod provider;
pub mod session;
pub mod store;
