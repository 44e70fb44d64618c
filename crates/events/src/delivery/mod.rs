//! External delivery channels for status changes.

pub mod callback;
