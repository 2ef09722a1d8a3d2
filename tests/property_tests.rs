// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to verify replay properties that must hold
//! for every event history a query model can see.

mod fixtures;
mod property;
