//! Build script for slotpool.
//!
//! Prints feature notes so integrators know which debugging aids are compiled in.

use std::env;

fn main() {
    // Re-run if features change
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let parking_lot_enabled = env::var("CARGO_FEATURE_PARKING_LOT").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // =========================================================================
    // Feature-specific diagnostics
    // =========================================================================

    if debug_enabled {
        emit_info("Debug features enabled");
        emit_note("Pooled allocations capture a backtrace at their allocation site.");
        emit_note("Backtraces are printed by dump_allocation() and by leak reports at shutdown.");

        if is_release {
            emit_warning("Debug features enabled in release build!");
            emit_note("Backtrace capture on every allocation is slow. Consider disabling for production.");
        }
    }

    if parking_lot_enabled {
        emit_info("Using parking_lot for the shared allocator lock");
    }
}

// =============================================================================
// Diagnostic emission helpers
// =============================================================================

fn emit_info(msg: &str) {
    println!("cargo:warning=[slotpool] {}", msg);
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[slotpool]    {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[slotpool] warning: {}", msg);
}
