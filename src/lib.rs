//! pcm-extract 媒体解码工具
//!
//! 解复用媒体容器，把选中的音频流解码为原始PCM样本，并以流式方式交给调用方提供的输出端。
//!
//! ## 核心流程
//! - 打开容器并探测流信息，选择最佳音频流
//! - 为该流打开解码器，逐包读取、送包、排空帧
//! - 每帧转发第一个声道的样本字节（平面格式不交错）
//! - 输入结束后冲刷解码器，再按解码器 → 容器 → 缓冲区顺序释放

pub mod audio;
pub mod error;
pub mod tools;

// 重新导出核心类型
pub use audio::{
    DecodePump, DecodeReport, DecodeSession, DecodeWorker, FileSink, OutputFormat, OutputSink,
    Prober, PumpStatus, SampleFormat, SessionOptions, SessionState, SymphoniaEngine,
};
pub use error::{AudioError, AudioResult};
