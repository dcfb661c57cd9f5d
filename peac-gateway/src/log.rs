use camino::Utf8Path;
use peac_log::StaticLogConfig;

pub struct GatewayLog;

impl StaticLogConfig for GatewayLog {
    const MAX_BYTES_PER_LOG_FILE: u64 = 3_000_000; // 3 MB;
    const MAX_LOG_FILES: usize = 10;
    const LOG_FILE_PREFIX: &'static str = "gateway";
}

pub fn init_logging(log_file: &Utf8Path) -> anyhow::Result<peac_log::LoggerGuard> {
    peac_log::init::<GatewayLog>(log_file, "info", std::env::var("PEAC_GATEWAY_LOG").ok().as_deref())
}
