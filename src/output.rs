use std::io::Write;

/// Abstraction over user-facing output.
///
/// Command modules write through this trait instead of `println!` so that
/// what the operator sees stays separate from the tracing log on stderr.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "Stopping all services...")
    fn status(&self, message: &str);

    /// Success message (e.g., "backend: started (pid 4242)")
    fn success(&self, message: &str);

    /// Warning message (e.g., "sync: no template, not created")
    fn warning(&self, message: &str);

    /// Error message (e.g., "frontend: runtime environment is missing")
    fn error(&self, message: &str);

    /// Inline progress (no trailing newline). Call `finish_progress` after.
    fn progress(&self, message: &str);

    /// Finish an inline progress line with a result.
    fn finish_progress(&self, result: &str);

    /// Raw data (JSON, log lines) printed exactly as given.
    fn data(&self, text: &str);

    fn blank(&self);
}

/// Standard CLI output. Writes to stdout/stderr with ANSI colors.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m✓\x1b[0m {}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m!\x1b[0m {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m✗ {}\x1b[0m", message);
    }

    fn progress(&self, message: &str) {
        print!("{}", message);
        std::io::stdout().flush().ok();
    }

    fn finish_progress(&self, result: &str) {
        println!("{}", result);
    }

    fn data(&self, text: &str) {
        println!("{}", text);
    }

    fn blank(&self) {
        println!();
    }
}
