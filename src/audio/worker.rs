//! 后台解码线程
//!
//! 专用线程独占一个解码会话，解码出的字节通过有界通道交给消费者。
//! 会话内部仍是"一包进、排空帧、下一包"的同步顺序，通道只改变字节交付的线程。
//!
//! **背压机制**：通道满时解码线程在 `send()` 上阻塞，不会无限缓冲。

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self, Receiver};
use tracing::debug;

use super::engine::MediaEngine;
use super::session::{DecodeReport, DecodeSession, SessionOptions};
use super::sink::{ChannelSink, OutputSink};
use crate::error::{AudioError, AudioResult};

/// 默认通道容量（数据块个数）
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// 后台解码线程句柄
pub struct DecodeWorker {
    receiver: Receiver<Vec<u8>>,
    handle: Option<JoinHandle<AudioResult<DecodeReport>>>,
}

impl DecodeWorker {
    /// 使用 symphonia 后端启动解码线程
    pub fn spawn(
        path: impl Into<PathBuf>,
        options: SessionOptions,
        capacity: usize,
    ) -> AudioResult<Self> {
        Self::spawn_with(options.engine(), path, capacity)
    }

    /// 使用指定引擎启动解码线程
    ///
    /// # 参数
    /// - `capacity`: 通道容量，满时解码线程阻塞（最小为1）
    pub fn spawn_with<E>(engine: E, path: impl Into<PathBuf>, capacity: usize) -> AudioResult<Self>
    where
        E: MediaEngine + Send + 'static,
    {
        let path = path.into();
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));

        let handle = thread::Builder::new()
            .name("pcm-decode".to_string())
            .spawn(move || {
                debug!(path = %path.display(), "解码线程启动 / decode worker started");
                let mut session = DecodeSession::new(engine);
                let mut sink = ChannelSink::new(sender);
                session.run_to_end(&path, &mut sink)
            })
            .map_err(|e| {
                AudioError::ResourceError(format!("解码线程创建失败 / failed to spawn worker: {e}"))
            })?;

        Ok(Self {
            receiver,
            handle: Some(handle),
        })
    }

    /// 数据块接收端；解码线程结束后通道断开
    pub fn receiver(&self) -> &Receiver<Vec<u8>> {
        &self.receiver
    }

    /// 把所有数据块按顺序写入输出端，然后等待线程结束
    pub fn drain_into(mut self, sink: &mut dyn OutputSink) -> AudioResult<DecodeReport> {
        for chunk in self.receiver.iter() {
            sink.accept(&chunk)?;
        }
        self.wait()
    }

    /// 丢弃剩余数据块并等待线程结束
    pub fn join(mut self) -> AudioResult<DecodeReport> {
        for _ in self.receiver.iter() {}
        self.wait()
    }

    fn wait(&mut self) -> AudioResult<DecodeReport> {
        let handle = self.handle.take().ok_or_else(|| {
            AudioError::ResourceError("解码线程已回收 / worker already joined".to_string())
        })?;
        handle.join().map_err(|_| {
            AudioError::ResourceError("解码线程异常退出 / decode worker panicked".to_string())
        })?
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // 先排空通道，避免解码线程阻塞在 send() 上
            for _ in self.receiver.iter() {}
            let _ = handle.join();
        }
    }
}
