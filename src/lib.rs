//! quotagate - Multi-dimensional admission control
//!
//! This crate implements the in-memory admission-control core of an HTTP
//! service: for every inbound request it decides admit or reject against
//! independent fixed-window quota counters keyed by client IP, authenticated
//! principal, endpoint, and tenant. Counter state is bounded by capacity
//! with LRU eviction, so memory stays `O(capacity)` per dimension no matter
//! how many distinct keys traffic produces.
//!
//! The HTTP server, routing, authentication, and tenant resolution live
//! outside this crate; they populate a [`ratelimit::RequestContext`] and
//! translate the returned [`ratelimit::Decision`] into a response.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
