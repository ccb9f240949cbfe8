//! Core modules of the inspection engine.
//!
//! Dependency-ordered: the data model and pure logic (scoring, lifecycle,
//! aggregation, pagination) sit below the repositories, which sit below the
//! instance manager and the report compiler.

pub mod aggregate;
pub mod broker;
pub mod catalog;
pub mod db;
pub mod error;
pub mod external;
pub mod instance;
pub mod layout;
pub mod lifecycle;
pub mod model;
pub mod output;
pub mod repo;
pub mod report;
pub mod schemas;
pub mod score;
pub mod sqlite_repo;
pub mod time;
