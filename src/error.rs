//! 统一错误处理框架
//!
//! 解码会话各阶段（打开、探测、选流、解码器初始化、送包、输出）共用的错误类型定义。

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 解码器初始化失败的具体子步骤
///
/// 调用方只关心"初始化失败"，子步骤仅用于诊断输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderInitKind {
    /// 找不到与流编解码器匹配的解码器实现
    NoDecoderAvailable,
    /// 解码器上下文分配失败
    ContextAllocationFailed,
    /// 流参数复制到解码器上下文失败（缺少采样率、声道等）
    ParameterCopyFailed,
    /// 解码器打开失败
    CodecOpenFailed,
}

impl fmt::Display for DecoderInitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoDecoderAvailable => "no decoder available / 无可用解码器",
            Self::ContextAllocationFailed => "context allocation failed / 上下文分配失败",
            Self::ParameterCopyFailed => "parameter copy failed / 参数复制失败",
            Self::CodecOpenFailed => "codec open failed / 解码器打开失败",
        };
        f.write_str(name)
    }
}

/// 音频处理相关的统一错误类型
#[derive(Debug, Error)]
pub enum AudioError {
    /// 输入验证错误
    #[error("输入验证失败 / invalid input: {0}")]
    InvalidInput(String),

    /// 文件I/O错误
    #[error("文件I/O错误 / I/O error: {0}")]
    IoError(#[from] io::Error),

    /// 路径无法读取或容器格式无法识别
    #[error("无法打开媒体源 / cannot open media source {}: {reason}", path.display())]
    OpenError { path: PathBuf, reason: String },

    /// 容器中没有可解析的流信息
    #[error("流信息探测失败 / stream probe failed: {0}")]
    ProbeError(String),

    /// 容器中没有音频流
    #[error("未找到音频流 / no audio stream found")]
    StreamNotFound,

    /// 解码器初始化失败（任一子步骤）
    #[error("解码器初始化失败 / decoder setup failed ({kind}): {detail}")]
    DecoderInit {
        kind: DecoderInitKind,
        detail: String,
    },

    /// 数据包提交到解码器失败（可按包跳过）
    #[error("数据包提交失败 / packet submission failed: {0}")]
    DecodeSubmit(String),

    /// 输出端无法打开
    #[error("输出端不可用 / output sink unavailable {}: {source}", path.display())]
    SinkUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 内存不足错误
    #[error("内存不足 / out of memory")]
    OutOfMemory,

    /// 资源访问错误（会话状态不允许的操作、工作线程异常等）
    #[error("资源访问错误 / resource error: {0}")]
    ResourceError(String),
}

/// 音频处理操作的标准Result类型
pub type AudioResult<T> = Result<T, AudioError>;

// ==================== 错误转换Helper函数 ====================
// 消除重复的 .map_err(|e| AudioError::XXX { ... }) 模式

/// 创建打开错误的helper函数
#[inline]
pub fn open_error<E: fmt::Display>(path: impl Into<PathBuf>, err: E) -> AudioError {
    AudioError::OpenError {
        path: path.into(),
        reason: err.to_string(),
    }
}

/// 创建探测错误的helper函数
#[inline]
pub fn probe_error<E: fmt::Display>(context: &str, err: E) -> AudioError {
    AudioError::ProbeError(format!("{context}: {err}"))
}

/// 创建解码器初始化错误的helper函数
#[inline]
pub fn decoder_init_error<E: fmt::Display>(kind: DecoderInitKind, err: E) -> AudioError {
    AudioError::DecoderInit {
        kind,
        detail: err.to_string(),
    }
}

/// 创建送包错误的helper函数
#[inline]
pub fn decode_submit_error<E: fmt::Display>(context: &str, err: E) -> AudioError {
    AudioError::DecodeSubmit(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于CLI退出码和错误建议

/// 错误类别枚举
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ErrorCategory {
    /// 格式相关错误（无法识别的容器、无音频流等）
    Format,
    /// 解码相关错误（解码器缺失、送包失败等）
    Decoding,
    /// I/O相关错误（文件不存在、输出端不可写等）
    Io,
    /// 资源相关错误（内存不足、会话状态异常等）
    Resource,
    /// 其他未分类错误
    Other,
}

impl ErrorCategory {
    /// 从AudioError提取错误类别
    pub fn from_audio_error(e: &AudioError) -> Self {
        match e {
            AudioError::OpenError { .. }
            | AudioError::ProbeError(_)
            | AudioError::StreamNotFound => Self::Format,
            AudioError::DecoderInit { .. } | AudioError::DecodeSubmit(_) => Self::Decoding,
            AudioError::IoError(_) | AudioError::SinkUnavailable { .. } => Self::Io,
            AudioError::OutOfMemory | AudioError::ResourceError(_) => Self::Resource,
            AudioError::InvalidInput(_) => Self::Other,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Format => "格式错误",
            Self::Decoding => "解码错误",
            Self::Io => "I/O错误",
            Self::Resource => "资源错误",
            Self::Other => "其他错误",
        }
    }
}
