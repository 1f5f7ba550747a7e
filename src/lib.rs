// ABOUTME: Library module for schema-backup
// ABOUTME: Exports the backup engine, backends and CLI commands for use in binary and tests

pub mod backup;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod convert;
pub mod db;
pub mod dialect;
pub mod error;
pub mod filters;
pub mod postgres;
pub mod sqlite;
pub mod utils;
