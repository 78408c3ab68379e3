//! 工具层集成测试：命令行配置 → 处理流程 → 输出文件和JSON报告


use audio_test_fixtures::*;
use pcm_extract::audio::SampleFormat;
use pcm_extract::error::AudioError;
use pcm_extract::tools::{self, AppConfig};

fn config(input: &str, output: &str, extra: &[&str]) -> AppConfig {
    let input = fixture_path(input);
    let output = output_path(output);
    let mut args = vec!["pcm-extract".to_string()];
    args.extend(extra.iter().map(|s| s.to_string()));
    args.push(input.to_string_lossy().into_owned());
    args.push(output.to_string_lossy().into_owned());
    tools::parse_args_from(args).expect("参数解析失败")
}

#[test]
fn test_process_file_writes_raw_pcm() {
    ensure_fixtures_generated();

    let config = config("mono_s16.wav", "tools_mono.pcm", &[]);
    let report = tools::process_file(&config).expect("处理失败");

    assert_eq!(report.reported_format.sample_format, SampleFormat::S16);
    assert_eq!(read_output(&config.output_path), ne_bytes_i16(&mono_s16_samples()));

    let hint = tools::ffplay_command(&report.reported_format, &config.output_path)
        .expect("S16 应有播放提示");
    assert!(hint.contains(&format!("-ac 1 -ar {MONO_S16_RATE}")));
}

#[test]
fn test_process_file_threaded() {
    ensure_fixtures_generated();

    let config = config("stereo_s16.wav", "tools_stereo.pcm", &["--threaded"]);
    let report = tools::process_file(&config).expect("处理失败");

    assert_eq!(report.reported_format.channels, 1);
    assert_eq!(read_output(&config.output_path), ne_bytes_i16(&stereo_s16_left()));
}

#[test]
fn test_json_report_written() {
    ensure_fixtures_generated();

    let report_path = output_path("tools_report.json");
    let report_arg = report_path.to_string_lossy().into_owned();
    let config = config(
        "stereo_f32.wav",
        "tools_f32.pcm",
        &["--report", &report_arg],
    );
    tools::process_file(&config).expect("处理失败");

    let json: serde_json::Value =
        serde_json::from_slice(&read_output(&report_path)).expect("报告应为合法JSON");
    assert_eq!(json["output_format"]["sample_format"], "f32p");
    assert_eq!(json["reported_format"]["sample_format"], "f32");
    assert_eq!(json["reported_format"]["channels"], 1);
    assert_eq!(json["stats"]["frames"].as_u64().map(|f| f > 0), Some(true));
}

#[test]
fn test_strict_sink_fails_before_decoding() {
    ensure_fixtures_generated();

    let config = AppConfig {
        output_path: "/nonexistent/dir/out.pcm".into(),
        ..config("mono_s16.wav", "unused.pcm", &[])
    };
    assert!(matches!(
        tools::process_file(&config),
        Err(AudioError::SinkUnavailable { .. })
    ));

    let lenient = AppConfig {
        lenient_sink: true,
        ..config
    };
    let report = tools::process_file(&lenient).expect("宽松模式应成功");
    assert!(report.bytes_written > 0);
}
