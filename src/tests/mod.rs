//! Router-level end-to-end tests.
