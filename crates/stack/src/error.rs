use thiserror::Error as ThisError;

/// Failures reported by [GuardedStack](crate::GuardedStack) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// `pop` or `top` on an empty but structurally valid stack. Recoverable.
    #[error("stack underflow")]
    Underflow,

    /// The validity predicate failed on entry: the control block was
    /// corrupted externally or the instance was moved from. The instance
    /// should be abandoned.
    #[error("stack control block failed validation")]
    InvalidState,

    /// The allocator could not satisfy a grow or shrink request. The stack
    /// keeps its pre-call state.
    #[error("stack buffer allocation failed")]
    AllocationFailure,
}
