//! Layout adapter.
//!
//! Feeds the model's node/link set to a force-layout engine, lets it run on
//! the host's timer, and writes the resulting positions back into the model,
//! clamped to the viewport. This is the only place node positions change
//! after creation.

use crate::id::EntityId;
use crate::model::{GraphModel, Point};
use serde::Serialize;
use std::collections::HashMap;
use std::f32::consts::PI;

/// The canvas (viewport) dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Hard-clamp into `[pad, dimension - pad]` on both axes.
    ///
    /// Applied as "raise to pad, then lower to limit" so a viewport narrower
    /// than `2 * pad` still yields a finite answer instead of panicking.
    pub fn clamp(&self, p: Point, pad: f32) -> Point {
        let bound = |v: f32, limit: f32| {
            let v = if v < pad { pad } else { v };
            if v > limit - pad { limit - pad } else { v }
        };
        Point::new(bound(p.x, self.width), bound(p.y, self.height))
    }
}

/// Force configuration handed to the layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    /// Many-body strength; negative repels.
    pub charge_strength: f32,
    pub link_distance: f32,
    pub link_strength: f32,
    /// Pull the layout's centre of mass here, if set.
    pub centering: Option<Point>,
    /// Fraction of velocity lost per tick.
    pub velocity_decay: f32,
}

impl ForceParams {
    pub fn for_viewport(viewport: Viewport) -> Self {
        Self {
            charge_strength: -3.0,
            link_distance: 50.0,
            link_strength: 1.0,
            centering: Some(viewport.center()),
            velocity_decay: 0.1,
        }
    }
}

impl Default for ForceParams {
    fn default() -> Self {
        Self::for_viewport(Viewport::default())
    }
}

/// Cooling schedule: energy decays from 1 towards 0, and the layout idles
/// once it drops under `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Energy {
    alpha: f32,
    min: f32,
    decay: f32,
    target: f32,
}

impl Default for Energy {
    fn default() -> Self {
        let min = 0.001_f32;
        Self {
            alpha: 1.0,
            min,
            // Reaches `min` after ~300 ticks.
            decay: 1.0 - min.powf(1.0 / 300.0),
            target: 0.0,
        }
    }
}

impl Energy {
    pub fn restart(&mut self, energy: f32) {
        self.alpha = energy.clamp(0.0, 1.0);
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_active(&self) -> bool {
        self.alpha >= self.min
    }

    /// Advance the schedule one tick and return the new energy.
    pub fn cool(&mut self) -> f32 {
        self.alpha += (self.target - self.alpha) * self.decay;
        self.alpha
    }
}

/// A force-layout engine. Pure data in, positions out.
pub trait LayoutEngine {
    type Error: std::error::Error;

    fn configure(&mut self, params: &ForceParams);

    /// Replace the simulated set. Edge endpoints index into `nodes`.
    fn set_entities(&mut self, nodes: &[Point], edges: &[(usize, usize)])
    -> Result<(), Self::Error>;

    fn restart(&mut self, energy: f32);

    /// Current energy; exactly 0 once settled.
    fn energy(&self) -> f32;

    /// Advance one tick, reading and writing `positions` in place.
    /// Returns `false` without touching anything once the layout has settled.
    fn step(&mut self, positions: &mut [Point]) -> Result<bool, Self::Error>;
}

/// Positions produced by one tick, ready for the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub nodes: Vec<(EntityId, Point)>,
    /// `(link, source position, target position)`.
    pub links: Vec<(EntityId, Point, Point)>,
}

/// Bridges the graph model and a `LayoutEngine`.
#[derive(Debug)]
pub struct SimulationAdapter<L> {
    engine: L,
    viewport: Viewport,
    pad: f32,
    params: ForceParams,
    slots: Vec<EntityId>,
    buffer: Vec<Point>,
    seeded: Option<u64>,
}

/// Spread for nodes that enter without a position.
const INITIAL_RADIUS: f32 = 10.0;

impl<L: LayoutEngine> SimulationAdapter<L> {
    pub fn new(mut engine: L, viewport: Viewport, pad: f32, params: ForceParams) -> Self {
        engine.configure(&params);
        Self {
            engine,
            viewport,
            pad,
            params,
            slots: Vec::new(),
            buffer: Vec::new(),
            seeded: None,
        }
    }

    /// Hand the full current node/link set to the engine and restart it at
    /// full energy. Unplaced nodes are first spread on a spiral around the
    /// viewport centre.
    pub fn reseed(&mut self, model: &mut GraphModel) -> Result<(), L::Error> {
        let center = self.viewport.center();
        let golden = PI * (3.0 - 5.0_f32.sqrt());
        let unplaced: Vec<(EntityId, Point)> = model
            .nodes()
            .enumerate()
            .filter(|(_, n)| !n.is_placed())
            .map(|(i, n)| {
                let radius = INITIAL_RADIUS * (0.5 + i as f32).sqrt();
                let angle = i as f32 * golden;
                let p = Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                );
                (n.id(), p)
            })
            .collect();
        for (id, p) in unplaced {
            model.place(id, p);
        }

        self.slots = model.nodes().map(|n| n.id()).collect();
        self.buffer = model.nodes().map(|n| n.position()).collect();
        let slot_of: HashMap<EntityId, usize> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        let edges: Vec<(usize, usize)> = model
            .links()
            .filter_map(|l| Some((*slot_of.get(&l.source())?, *slot_of.get(&l.target())?)))
            .collect();

        self.engine.set_entities(&self.buffer, &edges)?;
        self.engine.restart(1.0);
        self.seeded = Some(model.revision());
        log::debug!(
            "layout reseeded: {} nodes, {} links",
            self.slots.len(),
            edges.len()
        );
        Ok(())
    }

    /// One timer tick: step, clamp, write back, and return the frame to draw.
    /// `None` once the layout has settled.
    pub fn tick(&mut self, model: &mut GraphModel) -> Result<Option<Frame>, L::Error> {
        if self.seeded != Some(model.revision()) {
            log::debug!("model changed since last reseed");
            self.reseed(model)?;
        }

        for (slot, id) in self.slots.iter().enumerate() {
            if let Some(node) = model.node(*id) {
                self.buffer[slot] = node.position();
            }
        }
        if !self.engine.step(&mut self.buffer)? {
            return Ok(None);
        }
        for (slot, id) in self.slots.iter().enumerate() {
            let p = self.viewport.clamp(self.buffer[slot], self.pad);
            self.buffer[slot] = p;
            model.place(*id, p);
        }
        log::trace!("tick: energy {:.4}", self.engine.energy());
        Ok(Some(self.frame(model)))
    }

    /// Current positions of every node and link endpoint.
    pub fn frame(&self, model: &GraphModel) -> Frame {
        Frame {
            nodes: model.nodes().map(|n| (n.id(), n.position())).collect(),
            links: model
                .links()
                .filter_map(|l| {
                    let (s, t) = model.endpoints(l)?;
                    Some((l.id(), s.position(), t.position()))
                })
                .collect(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.engine.energy() <= 0.0
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(center) = self.params.centering.as_mut() {
            *center = viewport.center();
        }
        self.engine.configure(&self.params);
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pad(&self) -> f32 {
        self.pad
    }

    pub fn params(&self) -> &ForceParams {
        &self.params
    }

    pub fn engine(&self) -> &L {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut L {
        &mut self.engine
    }
}
