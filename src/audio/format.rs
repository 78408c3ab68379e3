//! 音频格式信息模块
//!
//! 定义解码输出的样本格式和输出格式描述符

use std::fmt;

use serde::Serialize;

use crate::error::{AudioError, AudioResult};

/// 解码器输出的样本格式
///
/// 带 `P` 后缀的变体为平面格式（每个声道一个独立缓冲区），
/// 其余为打包格式（所有声道交错在同一缓冲区）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
    U8P,
    S16P,
    S32P,
    F32P,
    F64P,
}

impl SampleFormat {
    /// 每个样本占用的字节数
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::U8P => 1,
            Self::S16 | Self::S16P => 2,
            Self::S32 | Self::S32P | Self::F32 | Self::F32P => 4,
            Self::F64 | Self::F64P => 8,
        }
    }

    /// 是否为平面格式
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            Self::U8P | Self::S16P | Self::S32P | Self::F32P | Self::F64P
        )
    }

    /// 对应的打包格式（打包格式返回自身）
    pub fn packed(self) -> Self {
        match self {
            Self::U8P => Self::U8,
            Self::S16P => Self::S16,
            Self::S32P => Self::S32,
            Self::F32P => Self::F32,
            Self::F64P => Self::F64,
            other => other,
        }
    }

    /// 对应的平面格式（平面格式返回自身）
    pub fn planar(self) -> Self {
        match self {
            Self::U8 => Self::U8P,
            Self::S16 => Self::S16P,
            Self::S32 => Self::S32P,
            Self::F32 => Self::F32P,
            Self::F64 => Self::F64P,
            other => other,
        }
    }

    /// 短名称
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::U8P => "u8p",
            Self::S16P => "s16p",
            Self::S32P => "s32p",
            Self::F32P => "f32p",
            Self::F64P => "f64p",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 输出格式描述符：`(样本格式, 采样率, 声道数)`
///
/// 从解码器状态读取的快照。解码器释放后不可再获取，
/// 需要在 finalize 之前保存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputFormat {
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputFormat {
    /// 创建新的输出格式
    pub fn new(sample_format: SampleFormat, sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_format,
            sample_rate,
            channels,
        }
    }

    /// 验证格式参数的有效性
    pub fn validate(&self) -> AudioResult<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidInput("采样率不能为0".to_string()));
        }
        if self.channels == 0 {
            return Err(AudioError::InvalidInput("声道数不能为0".to_string()));
        }
        Ok(())
    }

    /// 打包转换后的格式
    ///
    /// 输出文件只包含第一个声道：平面格式转换为对应的打包格式，声道数变为1。
    /// 多声道平面数据不会被交错，这是已知限制。
    pub fn first_channel_packed(&self) -> Self {
        if self.sample_format.is_planar() {
            Self {
                sample_format: self.sample_format.packed(),
                sample_rate: self.sample_rate,
                channels: 1,
            }
        } else {
            *self
        }
    }

    /// 每秒输出字节数（按写入文件的单声道数据计算）
    pub fn bytes_per_second(&self) -> u64 {
        let packed = self.first_channel_packed();
        packed.sample_rate as u64
            * packed.channels as u64
            * packed.sample_format.bytes_per_sample() as u64
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}Hz {}ch",
            self.sample_format, self.sample_rate, self.channels
        )
    }
}
