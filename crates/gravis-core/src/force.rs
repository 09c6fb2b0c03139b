//! `LayoutEngine` backed by the `force_graph` crate.
//!
//! `force_graph` supplies node repulsion, link springs, and damping. It has
//! no cooling schedule and no centering force, so both are layered on here:
//! each tick advances the simulation by `dt * energy`, then translates the
//! layout so its centre of mass sits on the configured centre.
//!
//! `force_graph` springs have no rest length. `link_distance` is mapped onto
//! spring stiffness instead: a longer target distance gives a softer spring.

use crate::model::Point;
use crate::simulation::{Energy, ForceParams, LayoutEngine};
use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use std::convert::Infallible;

/// Charge and spring units differ between d3-style params and `force_graph`.
const CHARGE_SCALE: f32 = 50.0;
const SPRING_SCALE: f32 = 0.05;
const REFERENCE_DISTANCE: f32 = 50.0;
const NODE_MASS: f32 = 10.0;
const TICK_DT: f32 = 0.016;

pub struct ForceGraphEngine {
    graph: ForceGraph<usize, ()>,
    params: ForceParams,
    nodes: Vec<DefaultNodeIdx>,
    energy: Energy,
}

impl Default for ForceGraphEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceGraphEngine {
    pub fn new() -> Self {
        let params = ForceParams::default();
        Self {
            graph: ForceGraph::new(simulation_parameters(&params)),
            params,
            nodes: Vec::new(),
            energy: Energy::default(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl std::fmt::Debug for ForceGraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceGraphEngine")
            .field("params", &self.params)
            .field("nodes", &self.nodes.len())
            .field("energy", &self.energy)
            .finish()
    }
}

fn simulation_parameters(params: &ForceParams) -> SimulationParameters {
    let distance = params.link_distance.max(1.0);
    SimulationParameters {
        force_charge: -params.charge_strength * CHARGE_SCALE,
        force_spring: params.link_strength * SPRING_SCALE * (REFERENCE_DISTANCE / distance),
        force_max: 100.0,
        node_speed: 3000.0,
        damping_factor: 1.0 - params.velocity_decay,
    }
}

impl LayoutEngine for ForceGraphEngine {
    type Error = Infallible;

    fn configure(&mut self, params: &ForceParams) {
        self.params = *params;
    }

    fn set_entities(&mut self, nodes: &[Point], edges: &[(usize, usize)]) -> Result<(), Infallible> {
        let mut graph = ForceGraph::new(simulation_parameters(&self.params));
        self.nodes = nodes
            .iter()
            .enumerate()
            .map(|(slot, p)| {
                graph.add_node(NodeData {
                    x: p.x,
                    y: p.y,
                    mass: NODE_MASS,
                    is_anchor: false,
                    user_data: slot,
                })
            })
            .collect();
        for &(s, t) in edges {
            // Self-loops carry no spring force.
            if s == t {
                continue;
            }
            if let (Some(&a), Some(&b)) = (self.nodes.get(s), self.nodes.get(t)) {
                graph.add_edge(a, b, EdgeData::default());
            }
        }
        self.graph = graph;
        Ok(())
    }

    fn restart(&mut self, energy: f32) {
        self.energy.restart(energy);
    }

    fn energy(&self) -> f32 {
        if self.energy.is_active() {
            self.energy.alpha()
        } else {
            0.0
        }
    }

    fn step(&mut self, positions: &mut [Point]) -> Result<bool, Infallible> {
        if !self.energy.is_active() {
            return Ok(false);
        }
        let alpha = self.energy.cool();

        self.graph.visit_nodes_mut(|node| {
            if let Some(p) = positions.get(node.data.user_data) {
                node.data.x = p.x;
                node.data.y = p.y;
            }
        });
        self.graph.update(TICK_DT * alpha);
        self.graph.visit_nodes(|node| {
            if let Some(p) = positions.get_mut(node.data.user_data) {
                let (x, y) = (node.x(), node.y());
                if x.is_finite() && y.is_finite() {
                    *p = Point::new(x, y);
                }
            }
        });

        if let Some(center) = self.params.centering
            && !positions.is_empty()
        {
            let n = positions.len() as f32;
            let (sx, sy) = positions
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            let (dx, dy) = (center.x - sx / n, center.y - sy / n);
            for p in positions.iter_mut() {
                p.x += dx;
                p.y += dy;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_mapping() {
        let p = simulation_parameters(&ForceParams::default());
        assert_eq!(p.force_charge, 150.0);
        assert!((p.force_spring - 0.05).abs() < 1e-6);
        assert!((p.damping_factor - 0.9).abs() < 1e-6);
    }

    #[test]
    fn step_moves_toward_centre_and_settles() {
        let mut engine = ForceGraphEngine::new();
        engine.configure(&ForceParams {
            centering: Some(Point::new(100.0, 100.0)),
            ..ForceParams::default()
        });
        let mut positions = vec![Point::new(10.0, 10.0), Point::new(30.0, 10.0)];
        engine.set_entities(&positions, &[(0, 1)]).unwrap();
        engine.restart(1.0);

        assert!(engine.step(&mut positions).unwrap());
        let cx = (positions[0].x + positions[1].x) / 2.0;
        let cy = (positions[0].y + positions[1].y) / 2.0;
        assert!((cx - 100.0).abs() < 1e-3 && (cy - 100.0).abs() < 1e-3);

        let mut ticks = 1;
        while engine.step(&mut positions).unwrap() {
            ticks += 1;
            assert!(ticks < 1000, "never settled");
        }
        assert_eq!(engine.energy(), 0.0);
    }

    #[test]
    fn self_loops_and_bad_indices_are_skipped() {
        let mut engine = ForceGraphEngine::new();
        let positions = vec![Point::new(1.0, 1.0)];
        engine.set_entities(&positions, &[(0, 0), (0, 7)]).unwrap();
        assert_eq!(engine.node_count(), 1);
    }
}
