//! Process wiring for the lifecheck runner: configuration bootstrap,
//! adapter construction and the operator commands shared by the binary.

pub mod commands;
pub mod db;
pub mod infra;
