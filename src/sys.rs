//! Safe wrappers for platform-specific unsafe operations.
//!
//! Every `unsafe` block in the codebase lives here. Call sites use the safe
//! public API and never touch `unsafe` directly.

/// Restore the default `SIGPIPE` action.
///
/// The Rust runtime ignores `SIGPIPE`, which turns `tcpspeech ... | head`
/// into a stream of "Broken pipe" errors. With the default action the process
/// exits quietly when the reader goes away, like other pipeline tools.
///
/// Must be called before spawning threads.
#[cfg(unix)]
pub fn reset_sigpipe() {
    // SAFETY: signal() with SIG_DFL installs no handler code; called at
    // startup before any threads exist.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
pub fn reset_sigpipe() {}
