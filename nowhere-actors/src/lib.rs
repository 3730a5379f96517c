//! Minimal actor runtime used by the research agent.
//!
//! [`actor`] provides the mailbox/`Addr`/`Context` primitives; [`rate`] is
//! the sliding-window rate limiter that serializes access to shared,
//! multiply-mutated timestamp state behind a single mailbox-processing task.

pub mod actor;
pub mod rate;
