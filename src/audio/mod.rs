//! 音频解复用/解码模块
//!
//! 打开媒体容器、选择最佳音频流、把压缩包泵送过解码器，并把解码后的
//! 原始样本字节转发给调用方提供的输出端。
//!
//! **使用 `DecodeSession`** - 完整的会话状态机，内部组合 `Prober` 和 `DecodePump`

pub mod decode_pump;
pub mod engine;
pub mod format;
pub mod prober;
pub mod session;
pub mod sink;
pub mod stats;
pub mod symphonia_engine;
pub mod worker;

#[cfg(test)]
pub(crate) mod mock_engine;

pub use decode_pump::{DecodePump, PumpStatus};
pub use engine::{
    Frame, MediaDecoder, MediaEngine, MediaKind, MediaSource, Packet, ReadStatus, ReceiveStatus,
    StreamInfo,
};
pub use format::{OutputFormat, SampleFormat};
pub use prober::{Prober, Source, StreamSelection};
pub use session::{DecodeReport, DecodeSession, SessionOptions, SessionState};
pub use sink::{ChannelSink, FileSink, FnSink, NullSink, OutputSink, SinkMode};
pub use stats::PumpStats;
pub use symphonia_engine::SymphoniaEngine;
pub use worker::DecodeWorker;
