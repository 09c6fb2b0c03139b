pub mod bus;
pub mod gesture;
pub mod input;
pub mod interaction;
pub mod session;

pub use bus::{BusError, Dispatcher, Handler};
pub use gesture::{CreateModifier, GestureRouter, Intent, Propagation};
pub use input::{Modifiers, RawEvent, RawKind};
pub use interaction::{Action, Hover, InteractionState, Selection};
pub use session::{EditorConfig, Session, SessionError, SessionResult};
