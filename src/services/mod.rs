//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room state and business logic so route handlers can
//! stay focused on protocol translation and the admin gate. The store and
//! engine mutate rooms and return events; only the broadcast module touches
//! live connections.

pub mod broadcast;
pub mod game;
pub mod room;
