//! livemsg - interactive chat messages that re-render in place.
//!
//! An interactive message is posted once and then edited as its state
//! changes. Users drive it with reactions (triggers) and, when a view needs
//! free-form input, by answering a prompt. Per-message locking keeps renders,
//! triggers and teardown from racing each other.
//!
//! ```text
//!  command handler ── Engine::create(ctx, view) ──► InteractiveMessage ── update() ──► Transport
//!  Transport events ── Engine::dispatch ──► ReactionTrigger::invoke / InteractiveInput
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod settings;
pub mod transport;
pub mod views;
