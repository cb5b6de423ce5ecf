//! Workspace root crate.
//!
//! Carries no functionality of its own — it exists to host the end-to-end
//! integration test suites under `tests/integration/`, which exercise the
//! `server` binary's HTTP/WS/backend-TCP surfaces together the way a real
//! deployment would. The actual implementation lives in `crates/` and
//! `services/`.
