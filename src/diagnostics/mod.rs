//! Diagnostics for the pooled allocator and resource lists.
//!
//! This module provides:
//! - **Runtime diagnostics**: coded messages written to the `log` facade
//! - **Fatal faults**: corruption and misuse that must stop the engine
//! - **Strict mode**: optional panic-on-warning for CI
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                        |
//! |-------|--------------------------------|
//! | SP0xx | Pooled allocator               |
//! | SP1xx | Resource lists                 |
//! | SP2xx | Handles and keys               |
//! | SP9xx | Internal errors                |

pub mod emit;
pub mod kind;
pub mod strict;

pub use emit::{emit, emit_with_context, fatal, is_suppressed, suppress_diagnostics};
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

pub use kind::{
    SP001, SP002, SP003, SP004, SP005, SP006, SP007, SP008, SP009, SP010, SP011, SP101, SP102,
    SP103, SP104, SP201, SP901, SP902,
};
