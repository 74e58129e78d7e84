//! Integration test crate for the enchal encoder HAL.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! Everything runs against the host-memory device; no GPU required.


#[cfg(test)]
mod allocator;

#[cfg(test)]
mod lifecycle;

#[cfg(test)]
mod resolution;
