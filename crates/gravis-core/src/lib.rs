pub mod entity;
pub mod force;
pub mod id;
pub mod model;
pub mod reconcile;
pub mod renderer;
pub mod simulation;

pub use entity::{Entity, EntityError, EntityKey, EntityKind, LinkSpec, NodeSpec};
pub use force::ForceGraphEngine;
pub use id::EntityId;
pub use model::{Change, GraphModel, IntegrityError, Link, Node, Point, Snapshot};
pub use reconcile::{Binding, Delta, Reconciler};
pub use renderer::{EntityView, Highlight, RecordingRenderer, RenderCall, Renderer, Status};
pub use simulation::{Energy, ForceParams, Frame, LayoutEngine, SimulationAdapter, Viewport};
