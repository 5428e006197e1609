// Environment detection used when presenting URLs

use std::sync::atomic::{AtomicBool, Ordering};

/// Set by `--headless`; forces URLs to be printed instead of opened
static FORCE_HEADLESS: AtomicBool = AtomicBool::new(false);

pub fn set_headless_override(headless: bool) {
    FORCE_HEADLESS.store(headless, Ordering::Relaxed);
}

/// True when no browser can reasonably be opened for the user
pub fn is_headless_environment() -> bool {
    if FORCE_HEADLESS.load(Ordering::Relaxed) {
        tracing::debug!("Headless mode: forced by --headless flag");
        return true;
    }
    detect_headless(|key| std::env::var(key).ok())
}

/// Headless if this is an SSH session, CI, a dumb terminal, or (off macOS) there is no display
fn detect_headless<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    for key in ["SSH_TTY", "SSH_CONNECTION", "CI"] {
        if lookup(key).is_some() {
            tracing::debug!("Headless detected: {} set", key);
            return true;
        }
    }

    if matches!(lookup("TERM").as_deref(), Some("dumb") | Some("")) {
        tracing::debug!("Headless detected: dumb terminal");
        return true;
    }

    if cfg!(all(unix, not(target_os = "macos")))
        && lookup("DISPLAY").is_none()
        && lookup("WAYLAND_DISPLAY").is_none()
    {
        tracing::debug!("Headless detected: no DISPLAY or WAYLAND_DISPLAY");
        return true;
    }

    false
}
