use env_logger::{Builder, Env};

/// 初始化日誌：verbose 時為 info，否則只顯示 warn 以上；`RUST_LOG` 優先
pub fn init(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
