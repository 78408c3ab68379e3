//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::audio::SessionOptions;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 输入媒体文件路径
    pub input_path: PathBuf,

    /// 原始PCM输出文件路径
    pub output_path: PathBuf,

    /// 是否显示详细信息
    pub verbose: bool,

    /// 输出文件无法打开时静默丢弃数据，而不是报错
    pub lenient_sink: bool,

    /// 不打印播放提示
    pub no_hint: bool,

    /// 解码结束时校验输出（后端支持时）
    pub verify: bool,

    /// 启用无缝播放裁剪
    pub gapless: bool,

    /// 在后台线程解码，通过有界通道写出
    pub threaded: bool,

    /// JSON 报告输出路径（可选）
    pub report_path: Option<PathBuf>,
}

impl AppConfig {
    /// 会话选项
    #[inline]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            verify: self.verify,
            gapless: self.gapless,
        }
    }
}

fn build_command() -> Command {
    Command::new("pcm-extract")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("MacinMeter Team")
        .arg(
            Arg::new("INPUT")
                .help("输入媒体文件 (WAV, FLAC, MP3, AAC, OGG, MKV, MP4 等) / input media file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("OUTPUT")
                .help("原始PCM输出文件（无文件头，仅第一个声道）/ raw PCM output file")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("lenient-sink")
                .long("lenient-sink")
                .help("输出文件无法打开时静默丢弃数据 / drop bytes silently if the output cannot be opened")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-hint")
                .long("no-hint")
                .help("不打印 ffplay 播放提示 / do not print the playback hint")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verify")
                .long("verify")
                .help("解码结束时校验输出（如 FLAC MD5）/ verify decoded output when supported")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("gapless")
                .long("gapless")
                .help("去除编码器延迟和填充 / trim encoder delay and padding")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("threaded")
                .long("threaded")
                .help("在后台线程解码 / decode on a background worker thread")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("把解码报告写为JSON / write the decode report as JSON")
                .value_name("FILE"),
        )
}

fn config_from_matches(matches: &ArgMatches) -> AppConfig {
    AppConfig {
        input_path: matches
            .get_one::<String>("INPUT")
            .map(PathBuf::from)
            .unwrap_or_default(),
        output_path: matches
            .get_one::<String>("OUTPUT")
            .map(PathBuf::from)
            .unwrap_or_default(),
        verbose: matches.get_flag("verbose"),
        lenient_sink: matches.get_flag("lenient-sink"),
        no_hint: matches.get_flag("no-hint"),
        verify: matches.get_flag("verify"),
        gapless: matches.get_flag("gapless"),
        threaded: matches.get_flag("threaded"),
        report_path: matches.get_one::<String>("report").map(PathBuf::from),
    }
}

/// 解析命令行参数并创建配置
///
/// 参数个数错误时打印用法并以非零状态退出。
pub fn parse_args() -> AppConfig {
    let matches = build_command().get_matches();
    config_from_matches(&matches)
}

/// 从给定参数列表解析（不退出进程）
pub fn parse_args_from<I, T>(args: I) -> Result<AppConfig, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    Ok(config_from_matches(&matches))
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    if config.verbose {
        println!("pcm-extract v{VERSION}");
        println!("{DESCRIPTION}");
        println!("输入 / Input:  {}", config.input_path.display());
        println!("输出 / Output: {}", config.output_path.display());
        println!();
    }
}
