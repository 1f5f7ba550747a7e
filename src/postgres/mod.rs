// ABOUTME: PostgreSQL backend for backup export and restore
// ABOUTME: Connection setup, SqlValue parameter binding, and typed row reads

pub mod connection;
pub mod converter;
pub mod reader;

pub use connection::connect;
