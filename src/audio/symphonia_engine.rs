//! Symphonia 引擎后端
//!
//! 用 symphonia 实现 [`MediaEngine`] 接口：容器探测、轨道枚举、解码器创建和逐包解码。
//! symphonia 的解码器是同步的（一包进、一缓冲出），这里把它适配成送包/取帧模型：
//! 送包时立即解码并暂存一帧，取帧时交出暂存帧。

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::AudioBufferRef;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{self, CODEC_TYPE_NULL, CodecParameters, DecoderOptions};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{self as sym_formats, FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat as SymphoniaSampleFormat;
use tracing::{debug, warn};

use super::engine::{
    Frame, MediaDecoder, MediaEngine, MediaKind, MediaSource, Packet, ReadStatus, ReceiveStatus,
    StreamInfo,
};
use super::format::{OutputFormat, SampleFormat};
use crate::error::{self, AudioResult, DecoderInitKind};

/// 容器未声明每包最大帧数时的暂存帧预分配大小
const DEFAULT_FRAMES_PER_PACKET: u64 = 4096;

/// 基于 symphonia 的媒体引擎
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaEngine {
    verify: bool,
    gapless: bool,
}

impl SymphoniaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解码结束时校验输出（仅部分编解码器支持，如 FLAC 的 MD5）
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// 启用无缝播放裁剪（去除编码器延迟和填充）
    pub fn with_gapless(mut self, gapless: bool) -> Self {
        self.gapless = gapless;
        self
    }
}

impl MediaEngine for SymphoniaEngine {
    type Source = SymphoniaSource;

    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn open(&self, path: &Path) -> AudioResult<SymphoniaSource> {
        let file = File::open(path).map_err(|e| error::open_error(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension() {
            hint.with_extension(&extension.to_string_lossy());
        }

        let mut fmt_opts = FormatOptions::default();
        fmt_opts.enable_gapless = self.gapless;
        let meta_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| {
                error::open_error(path, format!("容器格式无法识别 / unrecognized container: {e}"))
            })?;

        let mut decoder_options = DecoderOptions::default();
        decoder_options.verify = self.verify;

        Ok(SymphoniaSource {
            path: path.to_path_buf(),
            reader: probed.format,
            streams: Vec::new(),
            decoder_options,
        })
    }
}

/// symphonia 打开的容器
pub struct SymphoniaSource {
    path: PathBuf,
    reader: Box<dyn FormatReader>,
    streams: Vec<StreamInfo>,
    decoder_options: DecoderOptions,
}

impl SymphoniaSource {
    fn stream_index_of(&self, track_id: u32) -> Option<usize> {
        self.streams.iter().position(|s| s.id == track_id)
    }

    fn track_params(&self, stream_index: usize) -> Option<(u32, &CodecParameters)> {
        let info = self.streams.get(stream_index)?;
        self.reader
            .tracks()
            .iter()
            .find(|t| t.id == info.id)
            .map(|t| (t.id, &t.codec_params))
    }
}

fn stream_info_from_track(index: usize, track: &sym_formats::Track) -> StreamInfo {
    let params = &track.codec_params;
    let descriptor = if params.codec == CODEC_TYPE_NULL {
        None
    } else {
        symphonia::default::get_codecs().get_codec(params.codec)
    };

    StreamInfo {
        index,
        id: track.id,
        // symphonia 只为音频轨道分配编解码器类型
        kind: if params.codec == CODEC_TYPE_NULL {
            MediaKind::Other
        } else {
            MediaKind::Audio
        },
        codec: descriptor
            .map(|d| d.short_name.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        decodable: descriptor.is_some(),
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        bits_per_sample: params.bits_per_sample,
        n_frames: params.n_frames,
        language: track.language.clone(),
    }
}

impl MediaSource for SymphoniaSource {
    type Decoder = SymphoniaDecoder;

    fn probe(&mut self) -> AudioResult<()> {
        let tracks = self.reader.tracks();
        if tracks.is_empty() {
            return Err(error::probe_error(
                "容器中没有可解析的流 / no parseable streams",
                self.path.display(),
            ));
        }

        self.streams = tracks
            .iter()
            .enumerate()
            .map(|(index, track)| stream_info_from_track(index, track))
            .collect();

        debug!(
            path = %self.path.display(),
            streams = self.streams.len(),
            "探测到流信息 / stream info probed"
        );
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn best_audio_stream(&self) -> Option<usize> {
        let default_id = self.reader.default_track().map(|t| t.id);
        select_best(&self.streams, default_id)
    }

    fn open_decoder(&self, stream_index: usize) -> AudioResult<SymphoniaDecoder> {
        let (track_id, params) = self.track_params(stream_index).ok_or_else(|| {
            error::decoder_init_error(
                DecoderInitKind::NoDecoderAvailable,
                format!("流下标越界 / stream index {stream_index} out of range"),
            )
        })?;

        let registry = symphonia::default::get_codecs();
        if params.codec == CODEC_TYPE_NULL || registry.get_codec(params.codec).is_none() {
            return Err(error::decoder_init_error(
                DecoderInitKind::NoDecoderAvailable,
                format!("codec {:?}", params.codec),
            ));
        }

        let sample_rate = params.sample_rate.ok_or_else(|| {
            error::decoder_init_error(
                DecoderInitKind::ParameterCopyFailed,
                "缺少采样率 / missing sample rate",
            )
        })?;
        let channels = params
            .channels
            .map(|c| c.count())
            .filter(|&count| count > 0)
            .ok_or_else(|| {
                error::decoder_init_error(
                    DecoderInitKind::ParameterCopyFailed,
                    "缺少声道信息 / missing channel layout",
                )
            })?;

        let base = negotiate_sample_format(params);
        let sample_format = if channels > 1 { base.planar() } else { base };
        let format = OutputFormat::new(sample_format, sample_rate, channels as u16);
        format.validate().map_err(|e| {
            error::decoder_init_error(DecoderInitKind::ParameterCopyFailed, e)
        })?;

        let frames_per_packet = params
            .max_frames_per_packet
            .unwrap_or(DEFAULT_FRAMES_PER_PACKET);
        let pending = Frame::with_capacity(staging_plane_bytes(frames_per_packet, sample_format)?)
            .map_err(|e| error::decoder_init_error(DecoderInitKind::ContextAllocationFailed, e))?;

        let inner = registry
            .make(params, &self.decoder_options)
            .map_err(|e| error::decoder_init_error(DecoderInitKind::CodecOpenFailed, e))?;

        let codec_name = registry
            .get_codec(params.codec)
            .map(|d| d.short_name)
            .unwrap_or("unknown");
        debug!(
            stream = stream_index,
            codec = codec_name,
            format = %format,
            "解码器已打开 / decoder opened"
        );

        Ok(SymphoniaDecoder {
            inner,
            track_id,
            format,
            staging: Staging::for_format(base),
            pending,
            has_pending: false,
            flushing: false,
        })
    }

    fn read_packet(&mut self, packet: &mut Packet) -> AudioResult<ReadStatus> {
        loop {
            match self.reader.next_packet() {
                Ok(next) => {
                    let Some(index) = self.stream_index_of(next.track_id()) else {
                        // 探测后新出现的轨道不在流列表中，直接丢弃
                        continue;
                    };
                    packet.fill(index, next.ts(), next.dur(), &next.data);
                    // 仅在启用无缝模式时容器才会给出非零裁剪量
                    packet.set_trim(next.trim_start, next.trim_end);
                    return Ok(ReadStatus::Packet);
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(ReadStatus::EndOfStream);
                }
                Err(SymphoniaError::ResetRequired) => {
                    // 轨道列表发生变化（链式流），单流解码到此为止
                    warn!(
                        path = %self.path.display(),
                        "轨道列表变化，停止读取 / track list changed, stopping"
                    );
                    return Ok(ReadStatus::EndOfStream);
                }
                Err(e) => {
                    // 读包失败按输入结束处理，随后进入冲刷
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "读包失败，按输入结束处理 / packet read failed, treating as end of input"
                    );
                    return Ok(ReadStatus::EndOfStream);
                }
            }
        }
    }
}

/// 暂存帧单个平面的预分配字节数；容器头中的异常帧数会导致溢出
fn staging_plane_bytes(frames_per_packet: u64, format: SampleFormat) -> AudioResult<usize> {
    usize::try_from(frames_per_packet)
        .ok()
        .and_then(|frames| frames.checked_mul(format.bytes_per_sample()))
        .ok_or_else(|| {
            error::decoder_init_error(
                DecoderInitKind::ContextAllocationFailed,
                format!("每包帧数异常 / bogus max frames per packet: {frames_per_packet}"),
            )
        })
}

/// 选择最佳音频流
///
/// 容器声明的默认轨道是音频轨道时直接选中；否则取参数最完整的音频流，
/// 完整度相同时取下标最小者。
fn select_best(streams: &[StreamInfo], default_id: Option<u32>) -> Option<usize> {
    if let Some(stream) = streams
        .iter()
        .find(|s| s.is_audio() && Some(s.id) == default_id)
    {
        return Some(stream.index);
    }

    streams
        .iter()
        .filter(|s| s.is_audio())
        .max_by(|a, b| {
            a.completeness()
                .cmp(&b.completeness())
                .then(b.index.cmp(&a.index))
        })
        .map(|s| s.index)
}

/// 根据流参数协商输出的打包样本格式
///
/// PCM 编解码器按原生位宽输出；其他整数编解码器按位深选择 16/32 位；
/// 有损编解码器输出 32 位浮点。
fn negotiate_sample_format(params: &CodecParameters) -> SampleFormat {
    match params.codec {
        // 8位 PCM 统一输出无符号 U8（有符号输入加 128 偏置）
        codecs::CODEC_TYPE_PCM_U8 | codecs::CODEC_TYPE_PCM_S8 => return SampleFormat::U8,
        codecs::CODEC_TYPE_PCM_S16LE
        | codecs::CODEC_TYPE_PCM_S16BE
        | codecs::CODEC_TYPE_PCM_U16LE
        | codecs::CODEC_TYPE_PCM_U16BE
        | codecs::CODEC_TYPE_PCM_ALAW
        | codecs::CODEC_TYPE_PCM_MULAW => return SampleFormat::S16,
        codecs::CODEC_TYPE_PCM_S24LE
        | codecs::CODEC_TYPE_PCM_S24BE
        | codecs::CODEC_TYPE_PCM_U24LE
        | codecs::CODEC_TYPE_PCM_U24BE
        | codecs::CODEC_TYPE_PCM_S32LE
        | codecs::CODEC_TYPE_PCM_S32BE
        | codecs::CODEC_TYPE_PCM_U32LE
        | codecs::CODEC_TYPE_PCM_U32BE => return SampleFormat::S32,
        codecs::CODEC_TYPE_PCM_F32LE | codecs::CODEC_TYPE_PCM_F32BE => return SampleFormat::F32,
        codecs::CODEC_TYPE_PCM_F64LE | codecs::CODEC_TYPE_PCM_F64BE => return SampleFormat::F64,
        _ => {}
    }

    match params.sample_format {
        Some(SymphoniaSampleFormat::U8 | SymphoniaSampleFormat::S8) => SampleFormat::U8,
        Some(SymphoniaSampleFormat::S16 | SymphoniaSampleFormat::U16) => SampleFormat::S16,
        Some(
            SymphoniaSampleFormat::S24
            | SymphoniaSampleFormat::S32
            | SymphoniaSampleFormat::U24
            | SymphoniaSampleFormat::U32,
        ) => SampleFormat::S32,
        Some(SymphoniaSampleFormat::F32) => SampleFormat::F32,
        Some(SymphoniaSampleFormat::F64) => SampleFormat::F64,
        None => match params.bits_per_sample {
            Some(bits) if bits <= 16 => SampleFormat::S16,
            Some(_) => SampleFormat::S32,
            None => SampleFormat::F32,
        },
    }
}

/// 可复用的格式转换缓冲区
struct StagingBuffer<S: ConvertibleSample> {
    buf: Option<SampleBuffer<S>>,
    frames: usize,
    channels: usize,
}

impl<S: ConvertibleSample + bytemuck::Pod> StagingBuffer<S> {
    fn new() -> Self {
        Self {
            buf: None,
            frames: 0,
            channels: 0,
        }
    }

    /// 把解码缓冲区转换为目标样本类型，并按声道拆分写入帧的字节平面
    fn stage(&mut self, decoded: AudioBufferRef<'_>, frame: &mut Frame, base: SampleFormat) {
        let spec = *decoded.spec();
        let frames = decoded.frames();
        let channels = spec.channels.count();
        let capacity = decoded.capacity().max(frames);

        if self.buf.is_none() || self.frames < capacity || self.channels != channels {
            self.buf = Some(SampleBuffer::<S>::new(capacity as u64, spec));
            self.frames = capacity;
            self.channels = channels;
        }
        let Some(buf) = self.buf.as_mut() else {
            return;
        };

        // 平面复制：声道0的全部样本在前，随后是声道1……
        buf.copy_planar_ref(decoded);
        let samples = buf.samples();

        let format = if channels > 1 { base.planar() } else { base };
        frame.set_layout(format, channels, frames);
        for ch in 0..channels {
            let start = ch * frames;
            let Some(channel) = samples.get(start..start + frames) else {
                break;
            };
            if let Some(plane) = frame.plane_mut(ch) {
                plane.extend_from_slice(bytemuck::cast_slice(channel));
            }
        }
    }
}

/// 按协商格式选择的转换缓冲区
enum Staging {
    U8(StagingBuffer<u8>),
    S16(StagingBuffer<i16>),
    S32(StagingBuffer<i32>),
    F32(StagingBuffer<f32>),
    F64(StagingBuffer<f64>),
}

impl Staging {
    fn for_format(base: SampleFormat) -> Self {
        match base.packed() {
            SampleFormat::U8 => Self::U8(StagingBuffer::new()),
            SampleFormat::S16 => Self::S16(StagingBuffer::new()),
            SampleFormat::S32 => Self::S32(StagingBuffer::new()),
            SampleFormat::F64 => Self::F64(StagingBuffer::new()),
            _ => Self::F32(StagingBuffer::new()),
        }
    }

    fn stage(&mut self, decoded: AudioBufferRef<'_>, frame: &mut Frame) {
        match self {
            Self::U8(buf) => buf.stage(decoded, frame, SampleFormat::U8),
            Self::S16(buf) => buf.stage(decoded, frame, SampleFormat::S16),
            Self::S32(buf) => buf.stage(decoded, frame, SampleFormat::S32),
            Self::F32(buf) => buf.stage(decoded, frame, SampleFormat::F32),
            Self::F64(buf) => buf.stage(decoded, frame, SampleFormat::F64),
        }
    }
}

/// symphonia 解码器适配
pub struct SymphoniaDecoder {
    inner: Box<dyn codecs::Decoder>,
    track_id: u32,
    format: OutputFormat,
    staging: Staging,
    pending: Frame,
    has_pending: bool,
    flushing: bool,
}

impl MediaDecoder for SymphoniaDecoder {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn output_format(&self) -> OutputFormat {
        self.format
    }

    fn send_packet(&mut self, packet: Option<&Packet>) -> AudioResult<()> {
        if self.flushing {
            return Err(error::decode_submit_error(
                "解码器已冲刷 / decoder already flushed",
                "end of stream",
            ));
        }

        let Some(packet) = packet else {
            // symphonia 解码器没有内部延迟缓冲，冲刷只需结束并校验
            self.flushing = true;
            let result = self.inner.finalize();
            match result.verify_ok {
                Some(true) => debug!("解码输出校验通过 / decoded output verified"),
                Some(false) => warn!("解码输出校验失败 / decoded output failed verification"),
                None => {}
            }
            return Ok(());
        };

        if self.has_pending {
            return Err(error::decode_submit_error(
                "上一帧尚未取出 / previous frame not received",
                "try again",
            ));
        }
        if packet.is_unref() {
            return Err(error::decode_submit_error(
                "数据包已失效 / packet was unreferenced",
                "empty",
            ));
        }

        let mut sym_packet = sym_formats::Packet::new_from_slice(
            self.track_id,
            packet.pts(),
            packet.duration(),
            packet.data(),
        );
        sym_packet.trim_start = packet.trim_start();
        sym_packet.trim_end = packet.trim_end();

        match self.inner.decode(&sym_packet) {
            Ok(decoded) => {
                if decoded.frames() == 0 {
                    return Ok(());
                }
                self.staging.stage(decoded, &mut self.pending);
                self.has_pending = true;
                Ok(())
            }
            Err(SymphoniaError::DecodeError(e)) => Err(error::decode_submit_error(
                "损坏的数据包 / corrupt packet",
                e,
            )),
            Err(SymphoniaError::ResetRequired) => {
                self.inner.reset();
                Err(error::decode_submit_error(
                    "解码器已重置 / decoder reset",
                    "reset required",
                ))
            }
            Err(e) => Err(error::decode_submit_error("解码失败 / decode failed", e)),
        }
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> AudioResult<ReceiveStatus> {
        if self.has_pending {
            // 交换缓冲区：调用方拿到暂存帧，暂存位复用调用方的旧分配
            std::mem::swap(frame, &mut self.pending);
            self.pending.unref();
            self.has_pending = false;
            return Ok(ReceiveStatus::Frame);
        }

        if self.flushing {
            Ok(ReceiveStatus::EndOfStream)
        } else {
            Ok(ReceiveStatus::Again)
        }
    }
}
