// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Configuration records describing the studio's desired cloud state, the
//! deployment aggregate that owns them, and the structural checks run over it.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure data and invariants; no I/O beyond config loading

pub mod resource;
pub mod network;
pub mod iam;
pub mod compute;
pub mod storage;
pub mod dns;
pub mod directory;
pub mod backup;
pub mod deployment;
pub mod deployment_config;
pub mod policy;
