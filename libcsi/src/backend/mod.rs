//! Volume store backends.
//!
//! Each backend module provides a concrete [`VolumeStore`](crate::VolumeStore).

pub mod baggageclaim;
