// ABOUTME: Library module for table-shuttle
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod accessor;
pub mod commands;
pub mod row;
pub mod sqlite;
pub mod transfer;
