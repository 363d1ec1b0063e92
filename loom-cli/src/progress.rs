//! CLI progress display utilities
//!
//! Step indicators and a spinner that follows the importer's progress
//! callbacks.

use std::sync::Arc;
use std::time::Duration;

use console::{Emoji, style};
use gltfloom::{ImportPhase, ImportProgress, ImportProgressCallback};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

// =============================================================================
// Emoji Constants (with ASCII fallbacks for terminals without emoji support)
// =============================================================================

/// Magnifying glass - for reading/scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - for container operations
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Floppy disk - for writing/saving operations
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
/// Cube - for scene construction
pub static CUBE: Emoji<'_, '_> = Emoji("📐 ", "");

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Create a spinner for indeterminate progress
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn simple_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Route import progress callbacks into `pb`.
#[must_use]
pub fn import_callback(pb: &ProgressBar) -> ImportProgressCallback {
    let pb = pb.clone();
    Arc::new(move |progress: &ImportProgress| {
        let mut msg = progress.phase.as_str().to_string();
        if progress.phase != ImportPhase::Complete && progress.total > 0 {
            msg.push_str(&format!(" ({}/{})", progress.current, progress.total));
        }
        if let Some(item) = &progress.current_item {
            msg.push_str(&format!(" {}", style(item).dim()));
        }
        pb.set_message(msg);
    })
}
