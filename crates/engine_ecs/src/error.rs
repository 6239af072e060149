//! Engine error types.

use engine_component::ComponentError;

use crate::entity::EntityId;
use crate::listener::ListenerId;

/// Errors returned by [`Engine`](crate::Engine) operations.
///
/// Every variant is a rejected call: the engine's state is left exactly as it
/// was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The entity was never added to this engine, or has already been removed.
    #[error("{0} is not known to this engine")]
    EntityNotFound(EntityId),

    /// A system of this type is already attached (or queued for attachment).
    #[error("system '{0}' is already added")]
    SystemAlreadyAdded(&'static str),

    /// No system of this type is attached (or it is already queued for removal).
    #[error("system '{0}' is not added")]
    SystemNotFound(&'static str),

    /// The listener handle does not refer to a registered listener.
    #[error("{0} is not registered")]
    ListenerNotFound(ListenerId),

    /// `update` was called while an update pass or listener notification was
    /// already running.
    #[error("re-entrant update: the engine is already updating")]
    ReentrantUpdate,

    /// A component kind could not be registered.
    #[error(transparent)]
    Component(#[from] ComponentError),
}
