//! Outer adapters feeding data into the application layer.

pub mod csv;
