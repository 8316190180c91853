//! ---
//! cupang_section: "10-logging"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Structured logging helpers."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---

/// Emit an informational log enriched with artifact context.
#[macro_export]
macro_rules! cu_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            artifact = ctx.artifact.unwrap_or(""),
            updater = ctx.updater.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::cu_info!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a debug log enriched with artifact context.
#[macro_export]
macro_rules! cu_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            artifact = ctx.artifact.unwrap_or(""),
            updater = ctx.updater.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::cu_debug!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a warning enriched with artifact context.
#[macro_export]
macro_rules! cu_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            artifact = ctx.artifact.unwrap_or(""),
            updater = ctx.updater.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::cu_warn!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit an error log enriched with artifact context.
#[macro_export]
macro_rules! cu_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            artifact = ctx.artifact.unwrap_or(""),
            updater = ctx.updater.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::cu_error!(context = $crate::LogContext::default(), $($arg)+)
    }};
}
