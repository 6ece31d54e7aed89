//! Diagnostic kinds and predefined diagnostics.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error - something is definitely wrong.
    Error,
    /// A warning - something is probably wrong or suboptimal.
    Warning,
    /// Additional context about another diagnostic.
    Note,
    /// Actionable suggestion to fix the issue.
    Help,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
            DiagnosticKind::Help => "help",
        }
    }

    /// The log level this kind is written at.
    pub fn log_level(&self) -> log::Level {
        match self {
            DiagnosticKind::Error => log::Level::Error,
            DiagnosticKind::Warning => log::Level::Warn,
            DiagnosticKind::Note | DiagnosticKind::Help => log::Level::Info,
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `SP0xx` - Pooled allocator faults and warnings
/// - `SP1xx` - Resource list warnings
/// - `SP2xx` - Handle and key issues
/// - `SP9xx` - Internal bookkeeping failures
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "SP001").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[slotpool][{}] {}: {}", self.code, self.kind.prefix(), self.message)
    }
}

// =============================================================================
// Predefined diagnostics (SP0xx - Pooled allocator)
// =============================================================================

/// SP001: Zero-byte allocation request.
pub const SP001: Diagnostic = Diagnostic::error(
    "SP001",
    "request to allocate zero bytes"
).with_help("allocations must have a non-zero payload size");

/// SP002: Counter overflow.
pub const SP002: Diagnostic = Diagnostic::error(
    "SP002",
    "allocation would overflow a pool counter"
).with_note("the requested size pushes a category's byte or allocation counter past its maximum");

/// SP003: Counter underflow.
pub const SP003: Diagnostic = Diagnostic::error(
    "SP003",
    "freeing would underflow a pool counter"
).with_note("the pool's bookkeeping no longer matches its allocations");

/// SP004: Head guard overwritten.
pub const SP004: Diagnostic = Diagnostic::error(
    "SP004",
    "head guard was trashed"
).with_note("something wrote before the start of the payload (buffer underrun)");

/// SP005: Tail guard overwritten.
pub const SP005: Diagnostic = Diagnostic::error(
    "SP005",
    "tail guard was trashed"
).with_note("something wrote past the end of the payload (buffer overrun)");

/// SP006: Null pointer freed.
pub const SP006: Diagnostic = Diagnostic::error(
    "SP006",
    "null pointer provided to free"
);

/// SP007: Stale pool pointer.
pub const SP007: Diagnostic = Diagnostic::error(
    "SP007",
    "pool pointer does not refer to a live allocation"
).with_note("the allocation was already freed (double free) or reclaimed at shutdown")
 .with_help("ensure every allocation is freed exactly once");

/// SP008: Allocator not initialised.
pub const SP008: Diagnostic = Diagnostic::error(
    "SP008",
    "pooled allocator was not initialised"
).with_help("call init() before allocating, and do not use the allocator after shutdown()");

/// SP009: Outstanding allocations at shutdown.
pub const SP009: Diagnostic = Diagnostic::warning(
    "SP009",
    "allocations were still outstanding at shutdown"
).with_note("shutdown reclaimed them, but each one is a leak")
 .with_help("free or destroy resources before shutting the allocator down");

/// SP010: Dump requested without debugging.
pub const SP010: Diagnostic = Diagnostic::warning(
    "SP010",
    "allocation dumps require pool debugging"
).with_help("enable debugging with set_debugging_enabled(true) or SLOTPOOL_DEBUG=1");

/// SP011: Element count overflow.
pub const SP011: Diagnostic = Diagnostic::error(
    "SP011",
    "element count times element size overflows"
);

// =============================================================================
// Predefined diagnostics (SP1xx - Resource lists)
// =============================================================================

/// SP101: Capacity truncated to a bucket multiple.
pub const SP101: Diagnostic = Diagnostic::warning(
    "SP101",
    "items per bucket did not divide capacity"
).with_note("the list capacity was truncated to a whole number of buckets");

/// SP102: Resource list full.
pub const SP102: Diagnostic = Diagnostic::warning(
    "SP102",
    "resource list reached its maximum number of instances"
).with_help("unload unused resources or raise the list capacity");

/// SP103: Loader failed.
pub const SP103: Diagnostic = Diagnostic::warning(
    "SP103",
    "failed to load resource item"
).with_note("the slot reserved for the item was released again");

/// SP104: Invalid path.
pub const SP104: Diagnostic = Diagnostic::warning(
    "SP104",
    "resource path was empty"
);

// =============================================================================
// Predefined diagnostics (SP2xx - Handles)
// =============================================================================

/// SP201: Key mint perturbed.
pub const SP201: Diagnostic = Diagnostic {
    kind: DiagnosticKind::Note,
    code: "SP201",
    message: "minted key would have been zero",
    note: Some("the key clock was advanced to produce a non-zero key"),
    help: None,
};

// =============================================================================
// Predefined diagnostics (SP9xx - Internal)
// =============================================================================

/// SP901: Counter reconciliation failure.
pub const SP901: Diagnostic = Diagnostic::error(
    "SP901",
    "pool counters do not match the allocation list"
).with_note("this indicates a bug in slotpool");

/// SP902: Free slot search failed.
pub const SP902: Diagnostic = Diagnostic::error(
    "SP902",
    "expected to find a free resource slot"
).with_note("the list reported spare capacity but no bucket had a free slot");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_kinds() {
        assert!(SP004.is_error());
        assert!(!SP009.is_error());
        assert_eq!(SP201.kind, DiagnosticKind::Note);
        assert_eq!(SP009.kind.log_level(), log::Level::Warn);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SP006.to_string(),
            "[slotpool][SP006] error: null pointer provided to free"
        );
    }
}
