/// Environment variable that switches on `[VERBOSE]` diagnostics on stderr.
pub const VERBOSE_ENV: &str = "NUPD_VERBOSE";

pub fn verbose_enabled() -> bool {
    std::env::var_os(VERBOSE_ENV).is_some()
}

/// Print a diagnostic line to stderr when verbose output is enabled.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::utils::log::verbose_enabled() {
            eprintln!("[VERBOSE] {}", format!($($arg)*));
        }
    };
}
