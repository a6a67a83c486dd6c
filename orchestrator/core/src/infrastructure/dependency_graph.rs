// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dependency Graph
//!
//! Directed graph over stacks (or over the resources of one stack) with an
//! edge from every prerequisite to its consumer. Edges come from the deferred
//! values a resource carries plus its explicit `depends_on` list.

use petgraph::algo::is_cyclic_directed;
use petgraph::dot::{Config, Dot};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use super::cloudformation::SynthError;
use crate::domain::deployment::{Deployment, Stack};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Node labels, indexed by node id; declaration order
    labels: Vec<String>,
    graph: DiGraphMap<usize, ()>,
}

impl DependencyGraph {
    fn with_labels(labels: Vec<String>) -> Self {
        let mut graph = DiGraphMap::new();
        for i in 0..labels.len() {
            graph.add_node(i);
        }
        Self { labels, graph }
    }

    /// Stack-level graph: stack B depends on stack A when any resource in B
    /// refers to a resource owned by A.
    pub fn for_stacks(deployment: &Deployment) -> Result<Self, SynthError> {
        let labels: Vec<String> = deployment.stacks.iter().map(|s| s.name.to_string()).collect();
        let index: HashMap<&str, usize> = labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
        let mut g = Self::with_labels(labels.clone());

        for (consumer, stack) in deployment.stacks.iter().enumerate() {
            for resource in &stack.resources {
                for dep in resource.dependencies() {
                    if dep.stack == stack.name {
                        continue;
                    }
                    let producer = *index.get(dep.stack.as_str()).ok_or_else(|| SynthError::DanglingReference {
                        from: resource.id.to_string(),
                        to: dep.clone(),
                    })?;
                    g.graph.add_edge(producer, consumer, ());
                }
            }
        }

        Ok(g)
    }

    /// Resource-level graph inside one stack. Cross-stack references are
    /// ordered by the stack graph and skipped here.
    pub fn for_resources(stack: &Stack) -> Result<Self, SynthError> {
        let labels: Vec<String> = stack.resources.iter().map(|r| r.id.logical.to_string()).collect();
        let mut g = Self::with_labels(labels);
        let index: HashMap<_, usize> = stack.resources.iter().enumerate().map(|(i, r)| (&r.id, i)).collect();

        for (consumer, resource) in stack.resources.iter().enumerate() {
            for dep in resource.dependencies() {
                if dep.stack != stack.name {
                    continue;
                }
                let producer = *index.get(&dep).ok_or_else(|| SynthError::DanglingReference {
                    from: resource.id.to_string(),
                    to: dep.clone(),
                })?;
                g.graph.add_edge(producer, consumer, ());
            }
        }

        Ok(g)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Labels of the direct prerequisites of `label`, in declaration order.
    pub fn dependencies_of(&self, label: &str) -> Vec<&str> {
        let Some(node) = self.labels.iter().position(|l| l == label) else {
            return Vec::new();
        };
        let mut deps: Vec<usize> = self.graph.neighbors_directed(node, Direction::Incoming).collect();
        deps.sort_unstable();
        deps.into_iter().map(|i| self.labels[i].as_str()).collect()
    }

    /// Topological order that keeps declaration order wherever the edges allow.
    pub fn deployment_order(&self) -> Result<Vec<&str>, SynthError> {
        if self.is_cyclic() {
            return Err(SynthError::CycleDetected {
                members: self.labels.join(", "),
            });
        }

        let mut in_degree: Vec<usize> = (0..self.labels.len())
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<usize> = (0..self.labels.len()).filter(|n| in_degree[*n] == 0).collect();
        let mut order = Vec::with_capacity(self.labels.len());

        while let Some(node) = ready.pop_first() {
            order.push(self.labels[node].as_str());
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        Ok(order)
    }

    /// Graphviz rendering with node labels
    pub fn to_dot(&self) -> String {
        let graph = self
            .graph
            .clone()
            .into_graph::<u32>()
            .map(|_, node| self.labels[*node].clone(), |_, _| String::new());
        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}
