//! GlorGames store server internals, shared by the `glor-store` and
//! `glor-admin` binaries.

pub mod server;
