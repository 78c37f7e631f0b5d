//! A self-validating stack.
//!
//! [GuardedStack] is a dynamic-array stack whose control block (buffer
//! pointer, capacity, length) is defended by two boundary canaries and a
//! one-byte rolling digest. Every public operation re-derives the digest and
//! checks the canaries before touching memory, so corruption of the
//! bookkeeping (an overrun from a neighboring object, a stray write, use of
//! a moved-from instance) is reported as [Error::InvalidState] instead of
//! becoming an out-of-bounds access.
//!
//! The protection is tamper *evidence*, not tamper proofing: the digest is a
//! single byte and collisions are easy to construct on purpose. The target
//! is accidental corruption and careless misuse.

mod error;
mod raw;
mod stack;

pub use error::Error;
pub use stack::GuardedStack;
