//! Component-layer error types.

/// Errors raised while registering component kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    /// More distinct component kinds were registered than the build-time
    /// bitset width allows. This is a configuration error.
    #[error("cannot register component '{name}': capacity of {capacity} component kinds exhausted")]
    CapacityExceeded {
        /// Name of the kind whose registration failed.
        name: &'static str,
        /// The configured capacity.
        capacity: usize,
    },
}
