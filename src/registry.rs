//! The registry handles model resolution. Callers address models by stable identifiers,
//! and the registry binds each identifier to a handle on a backend.
//!
//! Which models exist may only be known at runtime. When configured for a discovery
//! backend, the registry asks the backend for its listing the first time a model is
//! needed, and this happens once per process. If discovery is disabled, fails, or does
//! not mention an identifier, the static catalog is used instead.
//!
//! Resolution of an identifier proceeds in order:
//! 1. A role identifier (e.g. `chat-model`) bound in the alias table resolves to the
//!    bound model.
//! 2. An identifier claimed by discovery resolves to itself.
//! 3. An identifier from the static catalog resolves to itself.
//! 4. Anything else is used literally. Unknown models are a generation-time error.

pub(crate) mod aliases;
pub(crate) mod discovery;
pub(crate) mod populate;
pub(crate) mod registry;
