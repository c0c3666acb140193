use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ctrl-C 只設定旗標，目前的單位處理完才停止
#[must_use]
pub fn setup_shutdown_signal() -> Arc<AtomicBool> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_clone = Arc::clone(&shutdown_signal);

    if let Err(e) = ctrlc::set_handler(move || {
        signal_clone.store(true, Ordering::SeqCst);
        eprintln!("\n收到中斷信號，完成目前的項目後停止...");
    }) {
        log::warn!("無法設定 Ctrl-C 處理器: {e}");
    }

    shutdown_signal
}
