//! Test support
//!
//! Mock implementations of the broker seam so the tool layer and callers can
//! be exercised without a live MQTT broker.

pub mod mocks;
