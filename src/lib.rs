//! wxwake — wake-word WeChat group bot.
//!
//! Watches allow-listed conversations through a desktop automation
//! layer, reconciles each raw transcript to find peer messages the bot
//! has not yet answered, and relays triggered messages to a
//! chat-completion provider for a reply.

pub mod bot;
pub mod channels;
pub mod config;
pub mod listen;
pub mod providers;
pub mod transcript;
pub mod trigger;
