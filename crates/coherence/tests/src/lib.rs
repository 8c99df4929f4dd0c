//! End-to-end and property suites for the coherence workspace live under `tests/`.
