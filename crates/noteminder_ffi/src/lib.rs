//! Flutter-facing FFI crate for Noteminder.
//!
//! Exposes use-case level functions from `api`; generated bridge glue is
//! produced by `flutter_rust_bridge_codegen` on the host side.

pub mod api;
