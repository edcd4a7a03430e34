//! Terminal client for the key-spam game server.
//!
//! An external collaborator of the server core: it speaks the wire
//! protocol from the `shared` crate and nothing more. Typed input
//! becomes `press`/`start` frames; `state` and `game_over` broadcasts
//! become console output.

pub mod network;
