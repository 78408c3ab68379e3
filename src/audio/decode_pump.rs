//! 解码泵模块
//!
//! 独占解码器状态，把压缩数据包转换为解码帧，并把样本字节转发给输出端。
//!
//! ## 资源释放顺序
//!
//! `finalize` 依次：冲刷解码器 → 释放解码器 → 关闭容器 → 释放包/帧缓冲区。
//! 解码器必须先于容器释放。`finalize` 幂等，可在任意清理路径上无条件调用。
//!
//! ## 平面格式限制
//!
//! 每帧只转发第一个声道的平面；多声道平面数据不会被交错打包。

use tracing::{debug, trace, warn};

use super::engine::{
    Frame, MediaDecoder, MediaKind, MediaSource, Packet, ReadStatus, ReceiveStatus,
};
use super::format::OutputFormat;
use super::prober::{Source, StreamSelection};
use super::sink::OutputSink;
use super::stats::PumpStats;
use crate::error::{AudioError, AudioResult};

/// 包缓冲区初始容量（字节）
const PACKET_CAPACITY: usize = 64 * 1024;

/// 帧平面初始容量（字节）：8192样本 × 8字节
const FRAME_PLANE_CAPACITY: usize = 8192 * 8;

/// 单次泵送结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// 已处理一个包（包括被丢弃的非选中流包和提交失败被跳过的包）
    Advanced,
    /// 输入结束，调用方应停止循环并进入冲刷
    EndOfStream,
}

/// 解码泵
///
/// 持有解码器和可复用的包/帧缓冲区。解码器存在当且仅当选流有效且初始化成功。
pub struct DecodePump<D> {
    decoder: Option<D>,
    stream_index: usize,
    packet: Option<Packet>,
    frame: Option<Frame>,
    stats: PumpStats,
    finalized: bool,
}

impl<D: MediaDecoder> DecodePump<D> {
    /// 为选中流打开解码器
    ///
    /// 任一子步骤失败（无解码器、上下文分配、参数复制、解码器打开）都返回
    /// `DecoderInit`，不会留下解码器状态。
    pub fn open<S>(source: &Source<S>, selection: StreamSelection) -> AudioResult<Self>
    where
        S: MediaSource<Decoder = D>,
    {
        let stream_index = selection.index();
        if stream_index >= source.streams().len() {
            return Err(AudioError::StreamNotFound);
        }

        let decoder = source.inner()?.open_decoder(stream_index)?;
        debug!(
            stream_index,
            format = %decoder.output_format(),
            "解码器已就绪 / decoder ready"
        );

        Ok(Self {
            decoder: Some(decoder),
            stream_index,
            packet: None,
            frame: None,
            stats: PumpStats::new(),
            finalized: false,
        })
    }

    /// （重新）分配可复用的包和帧缓冲区
    ///
    /// 先释放已有缓冲区再分配，重复调用安全，始终只保留一组缓冲区。
    pub fn prepare_buffers(&mut self) -> AudioResult<()> {
        if self.decoder.is_none() {
            return Err(AudioError::ResourceError(
                "解码器已释放 / decoder already released".to_string(),
            ));
        }
        self.packet = None;
        self.frame = None;

        self.packet = Some(Packet::with_capacity(PACKET_CAPACITY)?);
        self.frame = Some(Frame::with_capacity(FRAME_PLANE_CAPACITY)?);
        Ok(())
    }

    /// 包和帧缓冲区是否都已分配
    pub fn has_buffers(&self) -> bool {
        self.packet.is_some() && self.frame.is_some()
    }

    /// 解码器是否仍然存活
    pub fn is_active(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn stats(&self) -> &PumpStats {
        &self.stats
    }

    /// 解码器协商的输出格式；`finalize` 之后不可用
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.decoder.as_ref().map(MediaDecoder::output_format)
    }

    /// 读取并处理一个包
    ///
    /// - 没有更多包：返回 `EndOfStream`
    /// - 非选中流的包：丢弃，仍返回 `Advanced`
    /// - 选中流的包：送入解码器并排空帧；提交失败记录后跳过，仍返回 `Advanced`
    ///
    /// 无论结果如何，包在返回前都会失效。输出端错误为致命错误。
    pub fn pump_one_packet<S>(
        &mut self,
        source: &mut Source<S>,
        sink: &mut dyn OutputSink,
    ) -> AudioResult<PumpStatus>
    where
        S: MediaSource<Decoder = D>,
    {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(PumpStatus::EndOfStream);
        };
        let (Some(packet), Some(frame)) = (self.packet.as_mut(), self.frame.as_mut()) else {
            return Err(AudioError::ResourceError(
                "缓冲区未分配 / buffers not prepared".to_string(),
            ));
        };

        let status = source.inner_mut().and_then(|inner| inner.read_packet(packet));
        match status {
            Ok(ReadStatus::Packet) => {}
            Ok(ReadStatus::EndOfStream) => {
                packet.unref();
                debug!("输入结束 / end of input");
                return Ok(PumpStatus::EndOfStream);
            }
            Err(e) => {
                packet.unref();
                return Err(e);
            }
        }
        self.stats.packets_read += 1;

        if packet.stream_index() != Some(self.stream_index) {
            trace!(
                stream = ?packet.stream_index(),
                "丢弃非选中流数据包 / discarding packet of another stream"
            );
            packet.unref();
            self.stats.packets_discarded += 1;
            return Ok(PumpStatus::Advanced);
        }

        let result = decode_and_drain(decoder, Some(&*packet), frame, sink, &mut self.stats);
        let pts = packet.pts();
        packet.unref();

        match result {
            Ok(()) => {
                self.stats.packets_decoded += 1;
                Ok(PumpStatus::Advanced)
            }
            Err(AudioError::DecodeSubmit(reason)) => {
                self.stats.submit_failures += 1;
                warn!(pts, %reason, "数据包提交失败，跳过 / packet submission failed, skipping");
                Ok(PumpStatus::Advanced)
            }
            Err(e) => Err(e),
        }
    }

    /// 提交一个外部包（`None` 为冲刷）并排空解码器中的帧
    pub fn decode_and_drain(
        &mut self,
        packet: Option<&Packet>,
        sink: &mut dyn OutputSink,
    ) -> AudioResult<()> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Err(AudioError::ResourceError(
                "解码器已释放 / decoder already released".to_string(),
            ));
        };
        let Some(frame) = self.frame.as_mut() else {
            return Err(AudioError::ResourceError(
                "缓冲区未分配 / buffers not prepared".to_string(),
            ));
        };
        decode_and_drain(decoder, packet, frame, sink, &mut self.stats)
    }

    /// 冲刷并释放所有资源（幂等）
    ///
    /// 顺序：冲刷 → 释放解码器 → 关闭容器 → 释放包 → 释放帧。
    /// 冲刷阶段的提交失败只记录警告；输出端错误在资源全部释放后返回。
    pub fn finalize<S>(
        &mut self,
        source: &mut Source<S>,
        sink: &mut dyn OutputSink,
    ) -> AudioResult<()>
    where
        S: MediaSource<Decoder = D>,
    {
        let mut result = Ok(());

        if let Some(mut decoder) = self.decoder.take() {
            let mut frame = self.frame.take().unwrap_or_default();
            match decode_and_drain(&mut decoder, None, &mut frame, sink, &mut self.stats) {
                Ok(()) => {}
                Err(AudioError::DecodeSubmit(reason)) => {
                    warn!(%reason, "冲刷提交失败 / flush submission failed");
                }
                Err(e) => result = Err(e),
            }
            drop(decoder);
            debug!("解码器已释放 / decoder released");

            source.close();
            if let Some(mut packet) = self.packet.take() {
                packet.unref();
            }
            drop(frame);
        } else {
            source.close();
            self.packet = None;
            self.frame = None;
        }

        if !self.finalized {
            self.finalized = true;
            self.stats.finalize();
        }
        result
    }
}

/// 送包并排空帧
///
/// 提交失败时不取帧，直接返回错误。每个取出的帧（仅音频解码器）转发第一个
/// 声道的字节后立即失效。
fn decode_and_drain<D: MediaDecoder + ?Sized>(
    decoder: &mut D,
    packet: Option<&Packet>,
    frame: &mut Frame,
    sink: &mut dyn OutputSink,
    stats: &mut PumpStats,
) -> AudioResult<()> {
    decoder.send_packet(packet)?;
    let is_audio = decoder.media_kind() == MediaKind::Audio;

    loop {
        match decoder.receive_frame(frame) {
            Ok(ReceiveStatus::Frame) => {}
            Ok(ReceiveStatus::Again | ReceiveStatus::EndOfStream) => return Ok(()),
            Err(e) => {
                frame.unref();
                return Err(e);
            }
        }

        let forwarded = if is_audio {
            forward_first_channel(frame, sink, stats)
        } else {
            Ok(())
        };
        frame.unref();
        forwarded?;
    }
}

fn forward_first_channel(
    frame: &Frame,
    sink: &mut dyn OutputSink,
    stats: &mut PumpStats,
) -> AudioResult<()> {
    let Some(bytes) = frame.first_channel_bytes() else {
        return Ok(());
    };
    if !bytes.is_empty() {
        sink.accept(bytes)?;
    }
    stats.add_frame(frame.samples(), bytes.len());
    Ok(())
}
