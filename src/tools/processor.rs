//! 单文件处理流程
//!
//! 打开输出端 → 解码（当前线程或后台线程）→ 刷新输出 → 展示结果和可选的JSON报告。

use std::fs;
use std::io;

use super::cli::AppConfig;
use super::playback_hint;
use crate::audio::worker::DEFAULT_CHANNEL_CAPACITY;
use crate::audio::{DecodeReport, DecodeSession, DecodeWorker, FileSink};
use crate::error::AudioResult;

/// 按配置解码一个文件并写出原始PCM
pub fn process_file(config: &AppConfig) -> AudioResult<DecodeReport> {
    // 严格模式下输出端不可用在解码开始前报错
    let mut sink = if config.lenient_sink {
        FileSink::create_lenient(&config.output_path)
    } else {
        FileSink::create(&config.output_path)?
    };

    let options = config.session_options();
    let report = if config.threaded {
        DecodeWorker::spawn(&config.input_path, options, DEFAULT_CHANNEL_CAPACITY)?
            .drain_into(&mut sink)?
    } else {
        DecodeSession::with_options(options).run_to_end(&config.input_path, &mut sink)?
    };
    sink.finish()?;

    if let Some(report_path) = &config.report_path {
        write_report(&report, report_path)?;
    }
    Ok(report)
}

/// 把报告写为格式化JSON
pub fn write_report(report: &DecodeReport, path: &std::path::Path) -> AudioResult<()> {
    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    fs::write(path, json)?;
    Ok(())
}

/// 展示解码结果
pub fn show_report(config: &AppConfig, report: &DecodeReport) {
    if config.verbose {
        println!("音频流 / Stream: #{} ({})", report.stream.index, report.stream.codec);
        println!("解码器格式 / Decoder format: {}", report.output_format);
        println!(
            "已写入 / Written: {} bytes ({:.2} seconds)",
            report.bytes_written,
            report.duration_seconds()
        );
        println!(
            "数据包 / Packets: {} read, {} decoded, {} discarded, {} failed",
            report.stats.packets_read,
            report.stats.packets_decoded,
            report.stats.packets_discarded,
            report.stats.submit_failures
        );
    }

    if report.output_format.sample_format.is_planar() {
        println!(
            "[WARNING] 解码器输出为平面格式 ({})，只写入第一个声道 / decoder produced a planar sample format ({}), only the first channel is written",
            report.output_format.sample_format, report.output_format.sample_format
        );
    }

    if config.no_hint {
        return;
    }
    match playback_hint::ffplay_command(&report.reported_format, &config.output_path) {
        Some(command) => {
            println!("播放输出文件 / Play the output audio file with the command:");
            println!("{command}");
        }
        None => {
            println!(
                "[WARNING] 样本格式 {} 没有对应的播放提示 / no playback hint for sample format {}",
                report.reported_format.sample_format, report.reported_format.sample_format
            );
        }
    }
}
