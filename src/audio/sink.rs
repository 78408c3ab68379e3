//! 输出端模块
//!
//! 解码泵只要求输出端具备一个能力：按顺序接收字节缓冲区。
//! 这里提供文件、内存、闭包、通道和丢弃五种实现。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use tracing::warn;

use crate::error::{AudioError, AudioResult};

/// 输出端：接收一段解码后的原始样本字节
///
/// 在解码循环中同步内联调用；慢速输出端会直接拖慢整个解码循环。
pub trait OutputSink {
    fn accept(&mut self, data: &[u8]) -> AudioResult<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn accept(&mut self, data: &[u8]) -> AudioResult<()> {
        (**self).accept(data)
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn accept(&mut self, data: &[u8]) -> AudioResult<()> {
        (**self).accept(data)
    }
}

/// 内存输出端，按顺序追加
impl OutputSink for Vec<u8> {
    fn accept(&mut self, data: &[u8]) -> AudioResult<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// 闭包输出端
pub struct FnSink<F>(pub F);

impl<F> FnSink<F>
where
    F: FnMut(&[u8]) -> AudioResult<()>,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> OutputSink for FnSink<F>
where
    F: FnMut(&[u8]) -> AudioResult<()>,
{
    fn accept(&mut self, data: &[u8]) -> AudioResult<()> {
        (self.0)(data)
    }
}

/// 丢弃所有数据（用于无人接收时的清理冲刷）
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn accept(&mut self, _data: &[u8]) -> AudioResult<()> {
        Ok(())
    }
}

/// 文件输出端的失败处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// 打开失败立即报错，写入失败中止解码
    Strict,
    /// 打开失败时静默丢弃所有数据（只记录一次警告）
    Lenient,
}

/// 文件输出端：以二进制方式写入无头原始PCM
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    mode: SinkMode,
    bytes_written: u64,
    bytes_dropped: u64,
}

impl FileSink {
    /// 严格模式创建：文件无法打开时返回 `SinkUnavailable`
    pub fn create(path: impl AsRef<Path>) -> AudioResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| AudioError::SinkUnavailable {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            mode: SinkMode::Strict,
            bytes_written: 0,
            bytes_dropped: 0,
        })
    }

    /// 宽松模式创建：文件无法打开时不报错，之后接收的数据全部丢弃
    pub fn create_lenient(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let writer = match File::create(&path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "输出文件无法打开，解码数据将被丢弃 / output file unavailable, decoded bytes will be dropped"
                );
                None
            }
        };
        Self {
            path,
            writer,
            mode: SinkMode::Lenient,
            bytes_written: 0,
            bytes_dropped: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SinkMode {
        self.mode
    }

    /// 底层文件是否可写
    pub fn is_available(&self) -> bool {
        self.writer.is_some()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// 宽松模式下被丢弃的字节数
    pub fn bytes_dropped(&self) -> u64 {
        self.bytes_dropped
    }

    /// 刷新缓冲并返回写入的总字节数
    pub fn finish(&mut self) -> AudioResult<u64> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(self.bytes_written)
    }
}

impl OutputSink for FileSink {
    fn accept(&mut self, data: &[u8]) -> AudioResult<()> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.write_all(data)?;
                self.bytes_written += data.len() as u64;
                Ok(())
            }
            None => {
                self.bytes_dropped += data.len() as u64;
                Ok(())
            }
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

/// 通道输出端：把每段数据复制后发送给另一线程
///
/// 配合有界通道使用时，消费者跟不上会阻塞解码循环（自然背压）。
pub struct ChannelSink {
    sender: Sender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Vec<u8>>) -> Self {
        Self { sender }
    }
}

impl OutputSink for ChannelSink {
    fn accept(&mut self, data: &[u8]) -> AudioResult<()> {
        self.sender.send(data.to_vec()).map_err(|_| {
            AudioError::ResourceError("接收端已关闭 / receiver disconnected".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_appends_in_order() {
        let mut sink: Vec<u8> = Vec::new();
        sink.accept(&[1, 2]).unwrap();
        sink.accept(&[3]).unwrap();
        assert_eq!(sink, vec![1, 2, 3]);
    }

    #[test]
    fn test_fn_sink_forwards() {
        let mut total = 0usize;
        {
            let mut sink = FnSink::new(|data: &[u8]| {
                total += data.len();
                Ok(())
            });
            sink.accept(&[0; 5]).unwrap();
            sink.accept(&[0; 3]).unwrap();
        }
        assert_eq!(total, 8);
    }

    #[test]
    fn test_file_sink_strict_missing_dir() {
        let result = FileSink::create("/nonexistent/dir/out.pcm");
        assert!(matches!(result, Err(AudioError::SinkUnavailable { .. })));
    }

    #[test]
    fn test_file_sink_lenient_drops_bytes() {
        let mut sink = FileSink::create_lenient("/nonexistent/dir/out.pcm");
        assert!(!sink.is_available());
        sink.accept(&[1, 2, 3, 4]).unwrap();
        assert_eq!(sink.bytes_written(), 0);
        assert_eq!(sink.bytes_dropped(), 4);
    }

    #[test]
    fn test_file_sink_writes_bytes() {
        let path = std::env::temp_dir().join("pcm_extract_sink_unit.pcm");
        {
            let mut sink = FileSink::create(&path).unwrap();
            sink.accept(&[10, 20]).unwrap();
            sink.accept(&[30]).unwrap();
            assert_eq!(sink.finish().unwrap(), 3);
        }
        assert_eq!(std::fs::read(&path).unwrap(), vec![10, 20, 30]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_channel_sink_reports_disconnect() {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let mut sink = ChannelSink::new(sender);
        sink.accept(&[7]).unwrap();
        assert_eq!(receiver.recv().unwrap(), vec![7]);

        drop(receiver);
        assert!(matches!(
            sink.accept(&[8]),
            Err(AudioError::ResourceError(_))
        ));
    }
}
