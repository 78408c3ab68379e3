//! 解码会话模块
//!
//! 把探测器和解码泵串成完整的会话状态机：
//!
//! ```text
//! Unopened → Opened → StreamSelected → DecoderReady → Draining → Flushed → Closed
//! ```
//!
//! Opened/StreamSelected/DecoderReady 阶段的任何失败进入终止状态 `Failed`，
//! 不会留下解码器；容器仍可关闭。会话被丢弃时自动执行幂等的清理。

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::decode_pump::{DecodePump, PumpStatus};
use super::engine::{MediaEngine, MediaSource, StreamInfo};
use super::format::OutputFormat;
use super::prober::{Prober, Source, StreamSelection};
use super::sink::{NullSink, OutputSink};
use super::stats::PumpStats;
use super::symphonia_engine::SymphoniaEngine;
use crate::error::{AudioError, AudioResult};

type DecoderOf<E> = <<E as MediaEngine>::Source as MediaSource>::Decoder;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unopened,
    /// 已打开并探测
    Opened,
    StreamSelected,
    DecoderReady,
    /// 泵送循环进行中
    Draining,
    /// 已冲刷，解码器和容器均已释放
    Flushed,
    Closed,
    Failed,
}

impl SessionState {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// 会话选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// 解码结束时校验输出（后端支持时）
    pub verify: bool,
    /// 启用无缝播放裁剪
    pub gapless: bool,
}

impl SessionOptions {
    /// 构建对应的 symphonia 引擎
    pub fn engine(&self) -> SymphoniaEngine {
        SymphoniaEngine::new()
            .with_verify(self.verify)
            .with_gapless(self.gapless)
    }
}

/// 一次完整解码的结果报告
#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    pub input: PathBuf,
    pub engine: &'static str,
    /// 选中的音频流
    pub stream: StreamInfo,
    /// 解码器协商的输出格式
    pub output_format: OutputFormat,
    /// 打包转换后的格式（输出文件实际对应的格式）
    pub reported_format: OutputFormat,
    pub bytes_written: u64,
    pub stats: PumpStats,
}

impl DecodeReport {
    /// 输出是否因平面格式而丢弃了其余声道
    pub fn dropped_channels(&self) -> bool {
        self.output_format.sample_format.is_planar() && self.output_format.channels > 1
    }

    /// 输出时长（秒），按写入字节数计算
    pub fn duration_seconds(&self) -> f64 {
        let bytes_per_second = self.reported_format.bytes_per_second();
        if bytes_per_second == 0 {
            0.0
        } else {
            self.bytes_written as f64 / bytes_per_second as f64
        }
    }
}

/// 解码会话
///
/// 每个会话独占一对容器和解码器，不在会话间共享任何状态。
pub struct DecodeSession<E: MediaEngine> {
    prober: Prober<E>,
    source: Option<Source<E::Source>>,
    selection: Option<StreamSelection>,
    pump: Option<DecodePump<DecoderOf<E>>>,
    state: SessionState,
    last_format: Option<OutputFormat>,
}

impl DecodeSession<SymphoniaEngine> {
    /// 使用 symphonia 后端创建会话
    pub fn with_options(options: SessionOptions) -> Self {
        Self::new(options.engine())
    }
}

impl<E: MediaEngine> DecodeSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            prober: Prober::new(engine),
            source: None,
            selection: None,
            pump: None,
            state: SessionState::Unopened,
            last_format: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 打开并探测容器
    pub fn open(&mut self, path: impl AsRef<Path>) -> AudioResult<()> {
        self.expect_state(SessionState::Unopened, "open")?;

        let mut source = match self.prober.open(path) {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e)),
        };
        let probed = self.prober.probe(&mut source);
        self.source = Some(source);
        if let Err(e) = probed {
            return Err(self.fail(e));
        }

        self.transition(SessionState::Opened);
        Ok(())
    }

    /// 选择最佳音频流；没有音频流时会话进入 `Failed`
    pub fn select_stream(&mut self) -> AudioResult<StreamSelection> {
        self.expect_state(SessionState::Opened, "select_stream")?;

        let selected = match &self.source {
            Some(source) => source.select_best_audio_stream(),
            None => Err(AudioError::ResourceError("容器不存在 / no container".to_string())),
        };
        match selected {
            Ok(selection) => {
                self.selection = Some(selection);
                self.transition(SessionState::StreamSelected);
                Ok(selection)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// 打开解码器并分配缓冲区
    pub fn open_decoder(&mut self) -> AudioResult<OutputFormat> {
        self.expect_state(SessionState::StreamSelected, "open_decoder")?;

        let opened = match (&self.source, self.selection) {
            (Some(source), Some(selection)) => {
                DecodePump::open(source, selection).and_then(|mut pump| {
                    pump.prepare_buffers()?;
                    Ok(pump)
                })
            }
            _ => Err(AudioError::ResourceError(
                "选流结果缺失 / stream selection missing".to_string(),
            )),
        };

        match opened {
            Ok(pump) => {
                let format = pump.output_format();
                self.pump = Some(pump);
                self.last_format = format;
                self.transition(SessionState::DecoderReady);
                format.ok_or_else(|| {
                    AudioError::ResourceError("解码器格式不可用 / decoder format unavailable".to_string())
                })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// 泵送一个包
    pub fn pump(&mut self, sink: &mut dyn OutputSink) -> AudioResult<PumpStatus> {
        if !matches!(
            self.state,
            SessionState::DecoderReady | SessionState::Draining
        ) {
            return Err(self.state_error("pump"));
        }
        self.transition(SessionState::Draining);

        let (Some(pump), Some(source)) = (self.pump.as_mut(), self.source.as_mut()) else {
            return Err(AudioError::ResourceError(
                "解码器不存在 / no decoder".to_string(),
            ));
        };
        let status = pump.pump_one_packet(source, sink)?;
        self.last_format = pump.output_format();
        Ok(status)
    }

    /// 当前输出格式；解码器释放后不可用
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.pump.as_ref().and_then(DecodePump::output_format)
    }

    /// 最后一次观察到的输出格式（解码器释放后仍可读取）
    pub fn last_output_format(&self) -> Option<OutputFormat> {
        self.last_format
    }

    /// 选中流的元数据
    pub fn selected_stream(&self) -> Option<&StreamInfo> {
        let selection = self.selection?;
        self.source
            .as_ref()
            .and_then(|source| source.streams().get(selection.index()))
    }

    /// 流列表；容器关闭后为空
    pub fn streams(&self) -> &[StreamInfo] {
        match &self.source {
            Some(source) => source.streams(),
            None => &[],
        }
    }

    pub fn stats(&self) -> Option<&PumpStats> {
        self.pump.as_ref().map(DecodePump::stats)
    }

    /// 冲刷解码器并释放所有资源（幂等）
    ///
    /// 解码器存在时执行最后一次冲刷，冲刷出的帧写入 `sink`；
    /// 随后按解码器 → 容器 → 缓冲区顺序释放。
    pub fn finalize(&mut self, sink: &mut dyn OutputSink) -> AudioResult<()> {
        let result = match (self.pump.as_mut(), self.source.as_mut()) {
            (Some(pump), Some(source)) => pump.finalize(source, sink),
            (None, Some(source)) => {
                source.close();
                Ok(())
            }
            _ => Ok(()),
        };

        if !self.state.is_terminal() && self.state != SessionState::Flushed {
            self.transition(SessionState::Flushed);
        }
        result
    }

    /// 关闭会话（幂等）；`Failed` 状态保持不变
    pub fn close(&mut self) -> AudioResult<()> {
        let result = self.finalize(&mut NullSink);
        self.source = None;
        if self.state != SessionState::Failed && self.state != SessionState::Closed {
            self.transition(SessionState::Closed);
        }
        result
    }

    /// 完整解码：打开 → 选流 → 打开解码器 → 泵送至输入结束 → 冲刷 → 关闭
    pub fn run_to_end(
        &mut self,
        path: impl AsRef<Path>,
        sink: &mut dyn OutputSink,
    ) -> AudioResult<DecodeReport> {
        let path = path.as_ref();
        self.open(path)?;
        self.select_stream()?;
        let stream = self
            .selected_stream()
            .cloned()
            .ok_or(AudioError::StreamNotFound)?;
        let output_format = self.open_decoder()?;

        let pumped = self.pump_until_end(sink);
        let finalized = self.finalize(sink);
        let stats = self.stats().cloned().unwrap_or_default();
        self.close()?;
        pumped?;
        finalized?;

        let reported_format = output_format.first_channel_packed();
        if output_format.sample_format.is_planar() {
            warn!(
                format = %output_format,
                "平面格式只写入第一个声道 / planar format, only the first channel is written"
            );
        }

        let report = DecodeReport {
            input: path.to_path_buf(),
            engine: self.prober.engine().name(),
            stream,
            output_format,
            reported_format,
            bytes_written: stats.bytes,
            stats,
        };
        info!(
            input = %path.display(),
            format = %report.reported_format,
            bytes = report.bytes_written,
            "解码完成 / decode finished"
        );
        Ok(report)
    }

    fn pump_until_end(&mut self, sink: &mut dyn OutputSink) -> AudioResult<()> {
        while self.pump(sink)? == PumpStatus::Advanced {}
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "会话状态 / session state");
        self.state = next;
    }

    /// 进入 `Failed`：不保留解码器，容器保持可关闭
    fn fail(&mut self, error: AudioError) -> AudioError {
        self.pump = None;
        self.transition(SessionState::Failed);
        error
    }

    fn expect_state(&self, expected: SessionState, operation: &str) -> AudioResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.state_error(operation))
        }
    }

    fn state_error(&self, operation: &str) -> AudioError {
        AudioError::ResourceError(format!(
            "会话状态 {:?} 不允许 {operation} / operation not allowed in state {:?}",
            self.state, self.state
        ))
    }
}

impl<E: MediaEngine> Drop for DecodeSession<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "会话清理失败 / session cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleFormat;
    use crate::audio::mock_engine::{Event, MockEngine, audio_stream, events, video_stream};
    use crate::error::DecoderInitKind;

    #[test]
    fn test_full_lifecycle_states() {
        let engine = MockEngine::new(
            vec![audio_stream(0, 1)],
            vec![(0, vec![1, 0]), (0, vec![2, 0])],
        );
        let mut session = DecodeSession::new(engine);
        let mut out = Vec::new();

        assert_eq!(session.state(), SessionState::Unopened);
        session.open("a.wav").unwrap();
        assert_eq!(session.state(), SessionState::Opened);
        session.select_stream().unwrap();
        assert_eq!(session.state(), SessionState::StreamSelected);
        session.open_decoder().unwrap();
        assert_eq!(session.state(), SessionState::DecoderReady);

        while session.pump(&mut out).unwrap() == PumpStatus::Advanced {
            assert_eq!(session.state(), SessionState::Draining);
        }
        session.finalize(&mut out).unwrap();
        assert_eq!(session.state(), SessionState::Flushed);
        assert!(session.output_format().is_none());
        assert_eq!(
            session.last_output_format(),
            Some(OutputFormat::new(SampleFormat::S16, 8000, 1))
        );

        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(out, vec![1, 0, 2, 0]);
    }

    #[test]
    fn test_no_audio_stream_fails_without_decoder() {
        let engine = MockEngine::new(vec![video_stream(0)], vec![(0, vec![1])]);
        let log = engine.log.clone();
        let mut session = DecodeSession::new(engine);
        let mut out = Vec::new();

        let result = session.run_to_end("video.mkv", &mut out);
        assert!(matches!(result, Err(AudioError::StreamNotFound)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.output_format().is_none());

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Failed);
        let events = events(&log);
        assert!(events.contains(&Event::SourceDropped));
        assert!(!events.contains(&Event::DecoderDropped));
    }

    #[test]
    fn test_decoder_init_failure_collapses_to_failed() {
        let mut engine = MockEngine::new(vec![audio_stream(0, 1)], vec![]);
        engine.decoder_error = Some(DecoderInitKind::ParameterCopyFailed);
        let mut session = DecodeSession::new(engine);

        session.open("a.wav").unwrap();
        session.select_stream().unwrap();
        let result = session.open_decoder();
        assert!(matches!(
            result,
            Err(AudioError::DecoderInit {
                kind: DecoderInitKind::ParameterCopyFailed,
                ..
            })
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(matches!(
            session.pump(&mut NullSink),
            Err(AudioError::ResourceError(_))
        ));
    }

    #[test]
    fn test_run_to_end_reports_packed_format() {
        let mut engine = MockEngine::new(
            vec![audio_stream(0, 2)],
            vec![(0, vec![1, 0, 2, 0]), (0, vec![3, 0])],
        );
        engine.format = OutputFormat::new(SampleFormat::F32P, 8000, 2);
        let mut session = DecodeSession::new(engine);
        let mut out = Vec::new();

        let report = session.run_to_end("stereo.mka", &mut out).unwrap();
        assert_eq!(report.output_format.channels, 2);
        assert_eq!(report.reported_format.channels, 1);
        assert_eq!(report.reported_format.sample_format, SampleFormat::F32);
        assert!(report.dropped_channels());
        assert_eq!(report.bytes_written, out.len() as u64);
        assert_eq!(report.stream.index, 0);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_drop_releases_decoder_before_source() {
        let mut engine = MockEngine::new(vec![audio_stream(0, 1)], vec![(0, vec![1, 0])]);
        engine.delay = 1;
        let log = engine.log.clone();
        {
            let mut session = DecodeSession::new(engine);
            session.open("a.wav").unwrap();
            session.select_stream().unwrap();
            session.open_decoder().unwrap();
            session.pump(&mut NullSink).unwrap();
        }

        let events = events(&log);
        let decoder = events.iter().position(|e| *e == Event::DecoderDropped);
        let source = events.iter().position(|e| *e == Event::SourceDropped);
        assert!(events.contains(&Event::Flush));
        assert!(decoder.is_some() && source.is_some());
        assert!(decoder < source);
    }

    #[test]
    fn test_open_twice_rejected() {
        let engine = MockEngine::new(vec![audio_stream(0, 1)], vec![]);
        let mut session = DecodeSession::new(engine);
        session.open("a.wav").unwrap();
        assert!(matches!(
            session.open("b.wav"),
            Err(AudioError::ResourceError(_))
        ));
        assert_eq!(session.state(), SessionState::Opened);
    }
}
