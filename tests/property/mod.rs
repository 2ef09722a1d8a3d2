// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Replay properties of the projection engine: determinism, snapshots as
//! pure resume points, and filtering of foreign events.

mod replay_properties;
