//! Property-based tests for ordering and assembly guarantees

mod assembly_determinism;
mod ordering_invariant;
