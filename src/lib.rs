//! Switchyard - Intelligent request router for LLM inference backends
//!
//! Selects, per inference request, which backend instance should serve it,
//! subject to live load, per-model specialization, cost budget, and
//! failure-isolation constraints. The routing decision is a bounded,
//! synchronous computation; dispatching to the chosen backend and reporting
//! the outcome back are the embedding application's job.

pub mod balancer;
pub mod breaker;
pub mod cache;
pub mod classify;
pub mod config;
pub mod cost;
pub mod logging;
pub mod registry;
pub mod routing;
