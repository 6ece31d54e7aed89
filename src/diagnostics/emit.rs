//! Diagnostic emission backend.
//!
//! Writes diagnostics to the `log` facade and raises fatal faults.

use std::sync::atomic::{AtomicBool, Ordering};

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::{should_panic, should_panic_on_warning};

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Suppress all diagnostic output.
///
/// Fatal faults still panic while output is suppressed.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic to the log.
pub fn emit(diag: &Diagnostic) {
    if !is_suppressed() {
        write_to_log(diag, None);
    }

    check_strict(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    if !is_suppressed() {
        write_to_log(diag, Some(context));
    }

    check_strict(diag, Some(context));
}

/// Log a fatal diagnostic with its context and abort the current operation.
///
/// Allocator metadata cannot be trusted past a fatal fault, so this never
/// returns. Callers must release any internal locks before raising.
#[cold]
#[track_caller]
pub fn fatal(diag: &Diagnostic, context: &str) -> ! {
    if !is_suppressed() {
        write_to_log(diag, Some(context));
    }

    panic!("[slotpool][{}] {}: {}", diag.code, diag.message, context);
}

fn check_strict(diag: &Diagnostic, context: Option<&str>) {
    let escalate = match diag.kind {
        DiagnosticKind::Error => should_panic(),
        DiagnosticKind::Warning => should_panic_on_warning(),
        DiagnosticKind::Note | DiagnosticKind::Help => false,
    };

    if escalate {
        panic!(
            "[slotpool][{}] {}\nContext: {}\nStrict mode enabled - {}s are fatal.",
            diag.code,
            diag.message,
            context.unwrap_or("<none>"),
            diag.kind.prefix()
        );
    }
}

fn write_to_log(diag: &Diagnostic, context: Option<&str>) {
    let level = diag.kind.log_level();

    log::log!(level, "[slotpool][{}] {}: {}", diag.code, diag.kind.prefix(), diag.message);

    if let Some(context) = context {
        log::log!(level, "  context: {}", context);
    }
    if let Some(note) = diag.note {
        log::log!(level, "  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::log!(level, "  help: {}", help);
    }
}
