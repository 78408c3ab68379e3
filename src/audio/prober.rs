//! 容器/流探测模块
//!
//! 打开媒体源、探测流信息、选择最佳音频流。

use std::path::{Path, PathBuf};

use tracing::debug;

use super::engine::{MediaEngine, MediaSource, StreamInfo};
use crate::error::{AudioError, AudioResult};

/// 选中的音频流（容器流列表下标）
///
/// 一经计算不再改变；"未找到" 由 [`AudioError::StreamNotFound`] 表达。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamSelection(usize);

impl StreamSelection {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// 已打开的媒体源
///
/// 每个解码会话恰好一个。`close` 幂等：第二次调用观察到空句柄，直接返回。
pub struct Source<S> {
    path: PathBuf,
    inner: Option<S>,
    probed: bool,
}

impl<S: MediaSource> Source<S> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 容器句柄是否仍然存活
    #[inline]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    #[inline]
    pub fn is_probed(&self) -> bool {
        self.probed
    }

    /// 流信息列表；未探测或已关闭时为空
    pub fn streams(&self) -> &[StreamInfo] {
        match &self.inner {
            Some(inner) if self.probed => inner.streams(),
            _ => &[],
        }
    }

    /// 选择最佳音频流
    ///
    /// 使用引擎内置的启发式规则；没有音频流时返回 `StreamNotFound`。
    /// 必须在 `probe` 之后调用。
    pub fn select_best_audio_stream(&self) -> AudioResult<StreamSelection> {
        let inner = self.inner()?;
        if !self.probed {
            return Err(AudioError::ResourceError(
                "选流前必须先探测流信息 / probe must run before stream selection".to_string(),
            ));
        }

        let index = inner
            .best_audio_stream()
            .ok_or(AudioError::StreamNotFound)?;
        match inner.streams().get(index) {
            Some(info) if info.is_audio() => {
                debug!(
                    index,
                    codec = %info.codec,
                    "选中音频流 / selected audio stream"
                );
                Ok(StreamSelection(index))
            }
            _ => Err(AudioError::StreamNotFound),
        }
    }

    /// 释放容器句柄（幂等）
    ///
    /// 返回本次调用是否真正释放了句柄。
    pub fn close(&mut self) -> bool {
        match self.inner.take() {
            Some(inner) => {
                drop(inner);
                debug!(path = %self.path.display(), "容器已关闭 / container closed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn inner(&self) -> AudioResult<&S> {
        self.inner.as_ref().ok_or_else(closed_error)
    }

    pub(crate) fn inner_mut(&mut self) -> AudioResult<&mut S> {
        self.inner.as_mut().ok_or_else(closed_error)
    }
}

fn closed_error() -> AudioError {
    AudioError::ResourceError("容器已关闭 / container already closed".to_string())
}

/// 容器探测器：包装一个媒体引擎
pub struct Prober<E> {
    engine: E,
}

impl<E: MediaEngine> Prober<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 打开媒体容器；路径不可读或格式无法识别时返回 `OpenError`
    pub fn open(&self, path: impl AsRef<Path>) -> AudioResult<Source<E::Source>> {
        let path = path.as_ref();
        let inner = self.engine.open(path)?;
        debug!(
            engine = self.engine.name(),
            path = %path.display(),
            "容器已打开 / container opened"
        );
        Ok(Source {
            path: path.to_path_buf(),
            inner: Some(inner),
            probed: false,
        })
    }

    /// 探测流信息；没有可解析的流时返回 `ProbeError`
    pub fn probe(&self, source: &mut Source<E::Source>) -> AudioResult<()> {
        source.inner_mut()?.probe()?;
        source.probed = true;

        for info in source.streams() {
            debug!(
                index = info.index,
                kind = ?info.kind,
                codec = %info.codec,
                sample_rate = ?info.sample_rate,
                channels = ?info.channels,
                bits = ?info.bits_per_sample,
                frames = ?info.n_frames,
                "流信息 / stream"
            );
        }
        Ok(())
    }

    /// 打开并探测
    pub fn open_and_probe(&self, path: impl AsRef<Path>) -> AudioResult<Source<E::Source>> {
        let mut source = self.open(path)?;
        self.probe(&mut source)?;
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock_engine::{MockEngine, audio_stream, video_stream};

    #[test]
    fn test_select_in_range_audio_stream() {
        let engine = MockEngine::new(vec![video_stream(0), audio_stream(1, 2)], vec![]);
        let prober = Prober::new(engine);
        let source = prober.open_and_probe("movie.mkv").unwrap();

        let selection = source.select_best_audio_stream().unwrap();
        assert_eq!(selection.index(), 1);
        assert!(selection.index() < source.streams().len());
    }

    #[test]
    fn test_no_audio_stream_is_not_found() {
        let engine = MockEngine::new(vec![video_stream(0)], vec![]);
        let prober = Prober::new(engine);
        let source = prober.open_and_probe("silent.mkv").unwrap();

        assert!(matches!(
            source.select_best_audio_stream(),
            Err(AudioError::StreamNotFound)
        ));
    }

    #[test]
    fn test_selection_requires_probe() {
        let engine = MockEngine::new(vec![audio_stream(0, 1)], vec![]);
        let prober = Prober::new(engine);
        let source = prober.open("a.wav").unwrap();

        assert!(source.streams().is_empty());
        assert!(matches!(
            source.select_best_audio_stream(),
            Err(AudioError::ResourceError(_))
        ));
    }

    #[test]
    fn test_probe_failure_keeps_source_closable() {
        let mut engine = MockEngine::new(vec![audio_stream(0, 1)], vec![]);
        engine.fail_probe = true;
        let prober = Prober::new(engine);
        let mut source = prober.open("broken.mp4").unwrap();

        assert!(matches!(
            prober.probe(&mut source),
            Err(AudioError::ProbeError(_))
        ));
        assert!(source.close());
        assert!(!source.close());
        assert!(!source.is_open());
    }

    #[test]
    fn test_open_failure() {
        let mut engine = MockEngine::new(vec![], vec![]);
        engine.fail_open = true;
        let prober = Prober::new(engine);
        assert!(matches!(
            prober.open("missing.flac"),
            Err(AudioError::OpenError { .. })
        ));
    }
}
