//! CLI 模块
//!
//! ```bash
//! # 随机模式，监听 8081
//! mock-accrual --port 8081 --mode random
//!
//! # 只返回预设答复，并限制每分钟 10 次请求
//! mock-accrual --mode scripted --rate-limit 10
//! ```

use clap::Parser;

use crate::services::Mode;

/// 积分计算系统模拟服务
#[derive(Parser, Debug)]
#[command(name = "mock-accrual")]
#[command(version, about = "积分计算系统模拟服务")]
pub struct Cli {
    /// 服务端口
    #[arg(short, long, default_value = "8081")]
    pub port: u16,

    /// 未预设订单的答复方式
    #[arg(short, long, value_enum, default_value = "random")]
    pub mode: Mode,

    /// 每分钟请求上限，超过后返回 429
    #[arg(long)]
    pub rate_limit: Option<u32>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["mock-accrual"]);
        assert_eq!(cli.port, 8081);
        assert_eq!(cli.mode, Mode::Random);
        assert!(cli.rate_limit.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "mock-accrual",
            "--port",
            "9000",
            "--mode",
            "scripted",
            "--rate-limit",
            "5",
        ]);
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.mode, Mode::Scripted);
        assert_eq!(cli.rate_limit, Some(5));
    }
}
