//! 媒体编解码引擎接口
//!
//! 解复用/解码核心只依赖这里定义的窄接口：打开容器、探测流信息、
//! 选择最佳音频流、打开解码器、读包、送包、取帧。具体后端（见
//! `symphonia_engine`）负责容器解析和码流解码，核心不关心其实现。
//!
//! # 句柄所有权
//!
//! - [`MediaSource`] 由会话持有，生命周期覆盖整个解码过程
//! - [`MediaDecoder`] 由解码泵独占，必须先于容器释放
//! - [`Packet`] / [`Frame`] 分配一次、循环复用，每次使用后 `unref`

use std::path::Path;

use serde::Serialize;

use super::format::{OutputFormat, SampleFormat};
use crate::error::{AudioError, AudioResult};

/// 流的媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    /// 视频、字幕、数据等非音频流
    Other,
}

/// 单条流的元数据（探测后可用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    /// 在容器流列表中的下标
    pub index: usize,
    /// 容器内部的流/轨道ID
    pub id: u32,
    pub kind: MediaKind,
    /// 编解码器短名称（未知时为 "unknown"）
    pub codec: String,
    /// 是否存在可用的解码器实现
    pub decodable: bool,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bits_per_sample: Option<u32>,
    /// 每声道总帧数（容器声明，可能缺失）
    pub n_frames: Option<u64>,
    pub language: Option<String>,
}

impl StreamInfo {
    /// 是否为音频流
    #[inline]
    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }

    /// 参数完整度评分，用于最佳音频流选择
    pub fn completeness(&self) -> (bool, u16, u32, u32) {
        (
            self.decodable,
            self.channels.unwrap_or(0),
            self.sample_rate.unwrap_or(0),
            self.bits_per_sample.unwrap_or(0),
        )
    }
}

/// 一个解复用出的压缩数据包
///
/// 分配一次并循环复用；每次使用后调用 [`Packet::unref`] 使内容失效。
#[derive(Debug, Default)]
pub struct Packet {
    stream_index: Option<usize>,
    pts: u64,
    duration: u64,
    trim_start: u32,
    trim_end: u32,
    data: Vec<u8>,
}

impl Packet {
    /// 预分配数据缓冲区，分配失败时返回 `OutOfMemory`
    pub fn with_capacity(capacity: usize) -> AudioResult<Self> {
        let mut data = Vec::new();
        data.try_reserve(capacity)
            .map_err(|_| AudioError::OutOfMemory)?;
        Ok(Self {
            stream_index: None,
            pts: 0,
            duration: 0,
            trim_start: 0,
            trim_end: 0,
            data,
        })
    }

    /// 用新读取的包内容覆盖当前缓冲区（复用已有分配）
    pub fn fill(&mut self, stream_index: usize, pts: u64, duration: u64, data: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.stream_index = Some(stream_index);
        self.pts = pts;
        self.duration = duration;
        self.trim_start = 0;
        self.trim_end = 0;
    }

    /// 设置无缝播放裁剪量（包首/包尾需丢弃的每声道样本数）
    ///
    /// 须在 [`Packet::fill`] 之后调用；`fill` 会把裁剪量清零。
    pub fn set_trim(&mut self, trim_start: u32, trim_end: u32) {
        self.trim_start = trim_start;
        self.trim_end = trim_end;
    }

    /// 所属流下标；失效后为 `None`
    #[inline]
    pub fn stream_index(&self) -> Option<usize> {
        self.stream_index
    }

    #[inline]
    pub fn pts(&self) -> u64 {
        self.pts
    }

    #[inline]
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// 解码后从包首丢弃的样本数（编码器延迟）
    #[inline]
    pub fn trim_start(&self) -> u32 {
        self.trim_start
    }

    /// 解码后从包尾丢弃的样本数（编码器填充）
    #[inline]
    pub fn trim_end(&self) -> u32 {
        self.trim_end
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 包是否已失效（或从未填充）
    #[inline]
    pub fn is_unref(&self) -> bool {
        self.stream_index.is_none()
    }

    /// 使包内容失效，保留底层分配
    pub fn unref(&mut self) {
        self.data.clear();
        self.stream_index = None;
        self.pts = 0;
        self.duration = 0;
        self.trim_start = 0;
        self.trim_end = 0;
    }

    /// 底层缓冲区容量（字节）
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

/// 一个解码出的音频帧
///
/// 平面格式每个声道一个字节平面；打包格式只有一个平面。
/// 分配一次并循环复用；转发后调用 [`Frame::unref`] 使内容失效。
#[derive(Debug, Default)]
pub struct Frame {
    format: Option<SampleFormat>,
    channels: usize,
    samples: usize,
    planes: Vec<Vec<u8>>,
    active_planes: usize,
}

impl Frame {
    /// 预分配第一个平面，分配失败时返回 `OutOfMemory`
    pub fn with_capacity(plane_bytes: usize) -> AudioResult<Self> {
        let mut first = Vec::new();
        first
            .try_reserve(plane_bytes)
            .map_err(|_| AudioError::OutOfMemory)?;
        Ok(Self {
            format: None,
            channels: 0,
            samples: 0,
            planes: vec![first],
            active_planes: 0,
        })
    }

    /// 设置帧布局并清空所需平面，供引擎写入样本字节
    ///
    /// `samples` 为每声道样本数。平面数量：平面格式等于声道数，打包格式为1。
    pub fn set_layout(&mut self, format: SampleFormat, channels: usize, samples: usize) {
        let plane_count = if format.is_planar() {
            channels.max(1)
        } else {
            1
        };
        if self.planes.len() < plane_count {
            self.planes.resize_with(plane_count, Vec::new);
        }
        for plane in &mut self.planes[..plane_count] {
            plane.clear();
        }
        self.format = Some(format);
        self.channels = channels;
        self.samples = samples;
        self.active_planes = plane_count;
    }

    /// 可写的平面缓冲区（需先调用 `set_layout`）
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut Vec<u8>> {
        if index < self.active_planes {
            self.planes.get_mut(index)
        } else {
            None
        }
    }

    /// 只读平面数据；失效帧返回 `None`
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        if index < self.active_planes {
            self.planes.get(index).map(Vec::as_slice)
        } else {
            None
        }
    }

    /// 第一个（或唯一一个）声道的样本字节
    ///
    /// 长度 = 每声道样本数 × 每样本字节数。打包多声道帧同样只取这一长度，
    /// 与平面帧保持一致的输出语义。
    pub fn first_channel_bytes(&self) -> Option<&[u8]> {
        let format = self.format?;
        let plane = self.plane(0)?;
        let len = (self.samples * format.bytes_per_sample()).min(plane.len());
        Some(&plane[..len])
    }

    #[inline]
    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.format
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// 每声道样本数
    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// 帧是否已失效（或从未填充）
    #[inline]
    pub fn is_unref(&self) -> bool {
        self.format.is_none()
    }

    /// 使帧内容失效，保留底层分配
    pub fn unref(&mut self) {
        for plane in &mut self.planes[..self.active_planes] {
            plane.clear();
        }
        self.format = None;
        self.channels = 0;
        self.samples = 0;
        self.active_planes = 0;
    }
}

/// 读包结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// 已读到一个包
    Packet,
    /// 输入结束
    EndOfStream,
}

/// 取帧结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStatus {
    /// 已取出一帧
    Frame,
    /// 当前没有更多帧，需要继续送包
    Again,
    /// 解码器已冲刷完毕
    EndOfStream,
}

/// 媒体引擎：按路径打开容器
pub trait MediaEngine {
    type Source: MediaSource;

    /// 引擎名称
    fn name(&self) -> &'static str;

    /// 打开容器并识别格式；路径不可读或格式无法识别时失败
    fn open(&self, path: &Path) -> AudioResult<Self::Source>;
}

/// 已打开的容器
pub trait MediaSource {
    type Decoder: MediaDecoder;

    /// 读取足够的容器数据以确定流布局；没有可解析的流时失败
    fn probe(&mut self) -> AudioResult<()>;

    /// 流列表（`probe` 之前可能为空）
    fn streams(&self) -> &[StreamInfo];

    /// 引擎内置的最佳音频流选择；没有音频流时返回 `None`
    fn best_audio_stream(&self) -> Option<usize>;

    /// 为指定流查找、分配并打开解码器
    fn open_decoder(&self, stream_index: usize) -> AudioResult<Self::Decoder>;

    /// 读取下一个包到复用缓冲区
    fn read_packet(&mut self, packet: &mut Packet) -> AudioResult<ReadStatus>;
}

/// 已打开的解码器
///
/// 送包/取帧语义：`send_packet(Some)` 提交数据，`send_packet(None)` 进入冲刷；
/// 随后反复 `receive_frame` 直到 `Again` 或 `EndOfStream`。
pub trait MediaDecoder {
    /// 解码器处理的媒体类型
    fn media_kind(&self) -> MediaKind;

    /// 打开时协商的输出格式（会话期间不变）
    fn output_format(&self) -> OutputFormat;

    /// 提交一个包；`None` 表示冲刷
    fn send_packet(&mut self, packet: Option<&Packet>) -> AudioResult<()>;

    /// 取出一帧到复用缓冲区
    fn receive_frame(&mut self, frame: &mut Frame) -> AudioResult<ReceiveStatus>;
}
