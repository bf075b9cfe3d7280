//! # annotation-scanner
//!
//! Finds the classes on a classpath that carry one of a configured set of
//! annotations and are publicly reachable (public, and static if nested),
//! by reading class files directly. Nothing is loaded, linked or executed.
//!
//! ## Architecture
//!
//! - **descriptor**: structural class file reader producing header, annotation and inner-class events
//! - **matcher**: configured annotation descriptors
//! - **scope**: public / static-nested eligibility from access flags
//! - **filter**: per-record state machine, verdicts and the ordered match set
//! - **resolve**: binary name to type handle through a loading context
//! - **classpath**: class directories and jar archives (memory-mapped zip)
//! - **scanner**: parallel verdicts, sequential in-order collection, error reports
//! - **cache**: LMDB verdict cache keyed by class bytes digest

pub mod cache;
pub mod classpath;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod resolve;
pub mod scanner;
pub mod scope;

#[cfg(test)]
mod fixture;
