//! pcm-extract - 主程序入口
//!
//! 纯流程控制器：解析参数 → 初始化日志 → 解码单个文件 → 展示结果。

use anyhow::Context;
use pcm_extract::{
    error::{AudioError, ErrorCategory},
    tools,
};
use std::process;

/// 错误退出码定义
mod exit_codes {
    /// 通用错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 格式/输入错误
    pub const FORMAT_ERROR: i32 = 2;
    /// 解码失败
    pub const DECODING_ERROR: i32 = 3;
    /// I/O错误（输入不可读、输出不可写）
    pub const IO_ERROR: i32 = 4;
    /// 资源/内存错误
    pub const RESOURCE_ERROR: i32 = 5;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &AudioError) -> &'static str {
    // 优先通过具体错误类型匹配，提供更精确的建议
    match error {
        AudioError::InvalidInput(_) => {
            "检查命令行参数是否正确，使用 --help 查看完整用法 / Check if command-line arguments are correct, use --help to see full usage"
        }
        AudioError::StreamNotFound => {
            "文件中没有音频流 / The file contains no audio stream"
        }
        AudioError::SinkUnavailable { .. } => {
            "检查输出目录是否存在且可写，或使用 --lenient-sink 忽略 / Check that the output directory exists and is writable, or pass --lenient-sink"
        }
        AudioError::OutOfMemory => {
            "内存不足 / Out of memory"
        }
        // 对于其他错误，使用分类建议
        _ => match ErrorCategory::from_audio_error(error) {
            ErrorCategory::Io => {
                "检查文件路径是否正确，文件是否存在且可读 / Check if file path is correct, file exists and is readable"
            }
            ErrorCategory::Format => {
                "确保输入文件为支持的容器格式 / Ensure input file is in a supported container format"
            }
            ErrorCategory::Decoding => {
                "文件可能损坏或使用不支持的音频编码 / File may be corrupted or use unsupported audio encoding"
            }
            ErrorCategory::Resource => {
                "资源不可用，请检查系统资源或重试 / Resource unavailable, check system resources or retry"
            }
            ErrorCategory::Other => {
                "请检查输入文件和参数设置 / Please check input file and parameter settings"
            }
        },
    }
}

/// 错误处理和建议
fn handle_error(error: anyhow::Error) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error:#}");

    let Some(audio_error) = error.downcast_ref::<AudioError>() else {
        process::exit(exit_codes::GENERAL_ERROR);
    };

    let category = ErrorCategory::from_audio_error(audio_error);
    eprintln!(
        "[INFO] 建议 / Suggestion: {}",
        get_error_suggestion(audio_error)
    );

    let exit_code = match category {
        ErrorCategory::Format => exit_codes::FORMAT_ERROR,
        ErrorCategory::Decoding => exit_codes::DECODING_ERROR,
        ErrorCategory::Io => exit_codes::IO_ERROR,
        ErrorCategory::Resource => exit_codes::RESOURCE_ERROR,
        ErrorCategory::Other => exit_codes::GENERAL_ERROR,
    };
    process::exit(exit_code);
}

/// 应用程序主逻辑（便于测试和复用）
fn run() -> anyhow::Result<()> {
    // 1. 解析命令行参数（参数个数错误时 clap 打印用法并以非零状态退出）
    let config = tools::parse_args();

    // 2. 初始化日志并显示启动信息
    tools::init_logging(config.verbose);
    tools::show_startup_info(&config);

    // 3. 解码
    let report = tools::process_file(&config)
        .with_context(|| format!("解码失败 / decoding {}", config.input_path.display()))?;

    // 4. 展示结果
    tools::show_report(&config, &report);
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        handle_error(error);
    }
}
