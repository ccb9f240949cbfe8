//! fabqc: quality-control inspection tracking for fabrication projects.
//!
//! Checklist templates are instantiated per project phase, inspectors record
//! pass/fail results, results are scored and reviewed, and everything compiles
//! into a multi-section, renderer-agnostic report layout plan.
//!
//! # Architecture
//!
//! - **Instance manager** ([`core::instance`]): instantiates a template into an
//!   inspection run and applies every mutation as an all-or-nothing write.
//! - **Weighted scorer** ([`core::score`]): pure 0-100 completion score;
//!   N/A items are exempt from both sides of the ratio.
//! - **Lifecycle** ([`core::lifecycle`]): draft -> submitted -> approved /
//!   rejected / needs-rework, with approved and rejected terminal.
//! - **Phase aggregator** ([`core::aggregate`]): merges re-inspections of one
//!   phase into a single authoritative view, keeping the full item history.
//! - **Report compiler** ([`core::report`] + [`core::layout`]): deterministic
//!   greedy pagination into pages of positioned blocks; a rasterizer turns the
//!   plan into PDF/HTML elsewhere.
//!
//! Persistence sits behind repository traits ([`core::repo`]); the bundled
//! SQLite implementation ([`core::sqlite_repo`]) routes writes through a
//! serialized broker with a JSONL audit trail. External collaborators
//! (attachment byte storage, AI analysis) are traits in [`core::external`];
//! the report compiler bounds the analysis call with a timeout and omits the
//! section on failure instead of failing the report.

pub mod cli;
pub mod core;
