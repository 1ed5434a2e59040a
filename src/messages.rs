//! User-visible notification texts
//!
//! Plain text only. Internal error detail is logged, never put here, with
//! the exception of relay failure reasons, which the requester sees
//! verbatim.

use crate::storage::{human_size, SweepProgress, UsageSummary};

pub fn unauthorized() -> String {
    "⛔️ You are not authorized to use this bot.\n\
     If you believe you should have access, contact the administrator."
        .to_string()
}

pub fn welcome() -> String {
    "👋 Welcome to Droplink!\n\n\
     📤 Upload files and get a private download link.\n\
     🔒 Access to this bot is limited to approved users only."
        .to_string()
}

pub fn file_uploaded(link: &str, expires: &str) -> String {
    format!("✅ File uploaded!\n📎 Download: {link}\n🕒 Link expires: {expires}")
}

pub fn relay_started(file_name: &str, size_bytes: u64) -> String {
    format!(
        "📦 {file_name} ({}) is over the direct limit and is being handed to the relay.\n\
         You will get a link when it is ready.",
        human_size(size_bytes)
    )
}

pub fn relay_ready(file_name: &str, link: &str, expires: &str) -> String {
    format!("✅ Large file ready: {file_name}\n📎 Download: {link}\n🕒 Link expires: {expires}")
}

pub fn relay_failed(reason: &str) -> String {
    format!("❌ Large file upload failed: {reason}")
}

pub fn relay_unavailable() -> String {
    "❌ The relay is not reachable right now. Please try again later.".to_string()
}

pub fn relay_notice(text: &str) -> String {
    format!("📨 Relay: {text}")
}

pub fn too_large(ceiling_bytes: u64) -> String {
    format!(
        "❌ This file is too large. The transport only supports files up to {}.",
        human_size(ceiling_bytes)
    )
}

pub fn invalid_file_type() -> String {
    "❌ This file type is not allowed.".to_string()
}

pub fn invalid_file_name() -> String {
    "❌ This file name is not allowed.".to_string()
}

pub fn upload_failed() -> String {
    "❌ Could not save the file. Please try again later.".to_string()
}

pub fn status(summary: &UsageSummary, pending_relays: usize, ttl_hours: u64) -> String {
    format!(
        "📊 Status:\n📁 {} files\n💾 {:.2} MB used\n⏳ {pending_relays} large file(s) in transit\n\
         🧹 Files are deleted after {ttl_hours}h",
        summary.count,
        summary.total_mb()
    )
}

pub fn status_unavailable() -> String {
    "❌ Could not read the storage status. Check the logs.".to_string()
}

pub fn cleanup_started(total: usize) -> String {
    format!("🧹 Cleanup started: {total} file(s) to delete.")
}

pub fn cleanup_progress(progress: &SweepProgress) -> String {
    format!(
        "🧹 Cleanup {}%: {}/{} deleted.",
        progress.percent(),
        progress.deleted,
        progress.total
    )
}

pub fn cleanup_done(deleted: usize) -> String {
    format!("🧹 Manual cleanup done: {deleted} file(s) deleted.")
}

pub fn cleanup_busy() -> String {
    "⚠️ A cleanup is already running. Try again when it finishes.".to_string()
}

pub fn cleanup_incomplete(deleted: usize, failed: usize) -> String {
    format!(
        "⚠️ Manual cleanup finished: {deleted} file(s) deleted, {failed} could not be deleted. \
         Check the logs."
    )
}

pub fn cleanup_aborted(deleted: usize) -> String {
    format!("❌ Cleanup stopped early after deleting {deleted} file(s). Check the logs.")
}

pub fn log_alert(label: &str, threshold_mb: u64, size_bytes: u64) -> String {
    let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
    let prefix = if label.is_empty() {
        String::new()
    } else {
        format!("{label} ")
    };
    format!("⚠️ {prefix}Log file > {threshold_mb}MB ({size_mb:.2}MB)")
}
