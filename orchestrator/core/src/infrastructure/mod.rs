// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod bootstrap_templates;
pub mod cloudformation;
pub mod dependency_graph;

pub use bootstrap_templates::{ScriptContext, ScriptTemplateEngine};
pub use cloudformation::{CloudAssembly, StackArtifact, SynthError, Synthesizer};
pub use dependency_graph::DependencyGraph;
