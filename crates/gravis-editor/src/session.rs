//! Editing session: the whole pipeline behind one handle.
//!
//! raw event → `GestureRouter` → `Intent` → `InteractionState` →
//! `GraphModel` change → `Reconciler` → `SimulationAdapter` → renderer.
//!
//! The session holds the authoritative model. Hosts feed it raw events and
//! timer ticks; everything else happens synchronously inside those calls.

use crate::gesture::{CreateModifier, GestureRouter, Intent, Propagation};
use crate::input::{RawEvent, RawKind};
use crate::interaction::InteractionState;
use gravis_core::{
    Change, Delta, Entity, EntityKey, ForceParams, GraphModel, LayoutEngine, Reconciler,
    Renderer, SimulationAdapter, Viewport,
};
use serde_json::Value;

/// Session configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorConfig {
    pub viewport: Viewport,
    /// Margin kept between nodes and the viewport edge.
    pub pad: f32,
    pub forces: ForceParams,
    pub create_modifier: CreateModifier,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            viewport,
            pad: 10.0,
            forces: ForceParams::for_viewport(viewport),
            create_modifier: CreateModifier::default(),
        }
    }
}

impl EditorConfig {
    /// Defaults sized to `viewport`.
    pub fn for_viewport(viewport: Viewport) -> Self {
        Self {
            viewport,
            forces: ForceParams::for_viewport(viewport),
            ..Self::default()
        }
    }
}

/// A renderer or layout engine failure, passed through as-is.
#[derive(Debug, thiserror::Error)]
pub enum SessionError<R, L> {
    #[error("renderer: {0}")]
    Render(R),
    #[error("layout engine: {0}")]
    Layout(L),
}

pub type SessionResult<T, R, L> =
    Result<T, SessionError<<R as Renderer>::Error, <L as LayoutEngine>::Error>>;

pub struct Session<R: Renderer, L: LayoutEngine> {
    model: GraphModel,
    reconciler: Reconciler<R::Handle>,
    simulation: SimulationAdapter<L>,
    router: GestureRouter,
    interaction: InteractionState,
    renderer: R,
}

impl<R, L> std::fmt::Debug for Session<R, L>
where
    R: Renderer + std::fmt::Debug,
    L: LayoutEngine + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model", &self.model)
            .field("reconciler", &self.reconciler)
            .field("simulation", &self.simulation)
            .field("interaction", &self.interaction)
            .field("renderer", &self.renderer)
            .finish()
    }
}

impl<R: Renderer, L: LayoutEngine> Session<R, L> {
    pub fn new(renderer: R, engine: L, config: EditorConfig) -> Self {
        log::info!(
            "session started: {}x{} viewport, pad {}",
            config.viewport.width,
            config.viewport.height,
            config.pad
        );
        Self {
            model: GraphModel::new(),
            reconciler: Reconciler::new(),
            simulation: SimulationAdapter::new(
                engine,
                config.viewport,
                config.pad,
                config.forces,
            ),
            router: GestureRouter::new(config.create_modifier),
            interaction: InteractionState::new(),
            renderer,
        }
    }

    // ─── Model edits ─────────────────────────────────────────────────────

    /// Add an entity. Call `update` to push the change to the renderer.
    pub fn add(&mut self, entity: impl Into<Entity>) -> Change {
        self.model.add(entity)
    }

    /// Add a loose entity value. Malformed values are ignored.
    pub fn add_value(&mut self, value: &Value) -> Change {
        self.model.add_value(value)
    }

    /// Remove an entity (cascading). Call `update` afterwards.
    pub fn remove(&mut self, key: EntityKey) -> Change {
        self.model.remove(key)
    }

    pub fn remove_value(&mut self, value: &Value) -> Change {
        self.model.remove_value(value)
    }

    // ─── Pipeline ────────────────────────────────────────────────────────

    /// Bring the renderer and layout in line with the model.
    ///
    /// Interaction state of vanished entities is dropped, bindings are
    /// reconciled, and if the entity set changed the layout is reseeded at
    /// full energy. Newly bound entities get their current highlight;
    /// finally the current positions and any pending highlights are pushed
    /// to the renderer.
    pub fn update(&mut self) -> SessionResult<Delta, R, L> {
        self.interaction.forget_missing(&self.model);
        let delta = self
            .reconciler
            .reconcile(&self.model, &mut self.renderer)
            .map_err(SessionError::Render)?;
        if delta.is_structural() {
            self.simulation
                .reseed(&mut self.model)
                .map_err(SessionError::Layout)?;
        }
        // Entities selected or hovered before they were bound.
        for key in &delta.enter {
            let status = self.interaction.status(*key);
            if !status.is_empty() {
                self.reconciler
                    .highlight(*key, status.highlight(), &mut self.renderer)
                    .map_err(SessionError::Render)?;
            }
        }
        let frame = self.simulation.frame(&self.model);
        self.reconciler
            .present(&frame, &mut self.renderer)
            .map_err(SessionError::Render)?;
        self.flush_highlights()?;
        Ok(delta)
    }

    /// Route one raw event through gestures and interaction.
    ///
    /// Returns whether the host should stop the event from bubbling.
    pub fn handle_event(&mut self, event: &RawEvent) -> SessionResult<Propagation, R, L> {
        self.interaction.forget_missing(&self.model);
        let mut event = event.clone();
        if let Some(target) = event.target
            && !self.model.contains(target)
        {
            log::trace!("{target}: stale event target dropped");
            event.target = None;
        }

        match event.kind {
            RawKind::Mouseenter => self.interaction.hover_enter(event.target),
            RawKind::Mouseleave => self.interaction.hover_leave(),
            _ => {}
        }

        let (intent, propagation) = self.router.dispatch(&event, self.interaction.selected());
        if let Some(intent) = intent {
            self.apply(&intent)?;
        }
        self.flush_highlights()?;
        Ok(propagation)
    }

    /// Apply an intent directly, bypassing gesture classification.
    ///
    /// `Select` and `Toggle` of entities not in the model are ignored.
    pub fn apply(&mut self, intent: &Intent) -> SessionResult<Change, R, L> {
        self.interaction.forget_missing(&self.model);
        if let Intent::Select(key) | Intent::Toggle(key) = intent
            && !self.model.contains(*key)
        {
            log::debug!("{} of {key} ignored: not in model", intent.name());
            return Ok(Change::default());
        }
        let change = self.interaction.apply(intent, &mut self.model);
        if !change.is_empty() {
            self.update()?;
        }
        Ok(change)
    }

    /// Advance the layout one step. Returns `false` once it has settled.
    pub fn tick(&mut self) -> SessionResult<bool, R, L> {
        let frame = self
            .simulation
            .tick(&mut self.model)
            .map_err(SessionError::Layout)?;
        match frame {
            Some(frame) => {
                self.reconciler
                    .present(&frame, &mut self.renderer)
                    .map_err(SessionError::Render)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn resize(&mut self, viewport: Viewport) -> SessionResult<(), R, L> {
        self.simulation.resize(viewport);
        self.simulation
            .reseed(&mut self.model)
            .map_err(SessionError::Layout)
    }

    fn flush_highlights(&mut self) -> SessionResult<(), R, L> {
        for (key, highlight) in self.interaction.take_highlight_changes() {
            self.reconciler
                .highlight(key, highlight, &mut self.renderer)
                .map_err(SessionError::Render)?;
        }
        Ok(())
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn router(&self) -> &GestureRouter {
        &self.router
    }

    pub fn reconciler(&self) -> &Reconciler<R::Handle> {
        &self.reconciler
    }

    pub fn simulation(&self) -> &SimulationAdapter<L> {
        &self.simulation
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
