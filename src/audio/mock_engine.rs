//! 脚本化的模拟引擎（仅测试使用）
//!
//! 按预设脚本产出数据包；解码器把包内容原样作为帧数据输出，
//! 并可配置延迟若干包（模拟解码器内部缓冲，冲刷时吐出）。
//! 所有关键动作记录到共享事件日志，用于验证调用顺序。

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::engine::{
    Frame, MediaDecoder, MediaEngine, MediaKind, MediaSource, Packet, ReadStatus, ReceiveStatus,
    StreamInfo,
};
use super::format::{OutputFormat, SampleFormat};
use crate::error::{self, AudioError, AudioResult, DecoderInitKind};

/// 送包时以此字节开头的包会被解码器拒绝
pub(crate) const REJECT_MARKER: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Submitted(usize, Vec<u8>),
    Flush,
    FrameOut(Vec<u8>),
    DecoderDropped,
    SourceDropped,
}

pub(crate) type EventLog = Arc<Mutex<Vec<Event>>>;

pub(crate) fn record(log: &EventLog, event: Event) {
    if let Ok(mut events) = log.lock() {
        events.push(event);
    }
}

pub(crate) fn events(log: &EventLog) -> Vec<Event> {
    log.lock().map(|e| e.clone()).unwrap_or_default()
}

pub(crate) fn audio_stream(index: usize, channels: u16) -> StreamInfo {
    StreamInfo {
        index,
        id: index as u32,
        kind: MediaKind::Audio,
        codec: "pcm_s16le".to_string(),
        decodable: true,
        sample_rate: Some(8000),
        channels: Some(channels),
        bits_per_sample: Some(16),
        n_frames: None,
        language: None,
    }
}

pub(crate) fn video_stream(index: usize) -> StreamInfo {
    StreamInfo {
        index,
        id: index as u32,
        kind: MediaKind::Other,
        codec: "h264".to_string(),
        decodable: false,
        sample_rate: None,
        channels: None,
        bits_per_sample: None,
        n_frames: None,
        language: None,
    }
}

#[derive(Clone)]
pub(crate) struct MockEngine {
    pub streams: Vec<StreamInfo>,
    pub packets: Vec<(usize, Vec<u8>)>,
    pub format: OutputFormat,
    pub decoder_kind: MediaKind,
    /// 解码器内部缓冲的包数（冲刷时才输出）
    pub delay: usize,
    pub fail_open: bool,
    pub fail_probe: bool,
    pub decoder_error: Option<DecoderInitKind>,
    pub log: EventLog,
}

impl MockEngine {
    pub fn new(streams: Vec<StreamInfo>, packets: Vec<(usize, Vec<u8>)>) -> Self {
        Self {
            streams,
            packets,
            format: OutputFormat::new(SampleFormat::S16, 8000, 1),
            decoder_kind: MediaKind::Audio,
            delay: 0,
            fail_open: false,
            fail_probe: false,
            decoder_error: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MediaEngine for MockEngine {
    type Source = MockSource;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&self, path: &Path) -> AudioResult<MockSource> {
        if self.fail_open {
            return Err(error::open_error(path, "scripted open failure"));
        }
        Ok(MockSource {
            engine: self.clone(),
            streams: Vec::new(),
            cursor: 0,
        })
    }
}

pub(crate) struct MockSource {
    engine: MockEngine,
    streams: Vec<StreamInfo>,
    cursor: usize,
}

impl MediaSource for MockSource {
    type Decoder = MockDecoder;

    fn probe(&mut self) -> AudioResult<()> {
        if self.engine.fail_probe || self.engine.streams.is_empty() {
            return Err(error::probe_error("mock", "no streams"));
        }
        self.streams = self.engine.streams.clone();
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn best_audio_stream(&self) -> Option<usize> {
        self.streams.iter().position(StreamInfo::is_audio)
    }

    fn open_decoder(&self, stream_index: usize) -> AudioResult<MockDecoder> {
        if let Some(kind) = self.engine.decoder_error {
            return Err(error::decoder_init_error(kind, "scripted"));
        }
        Ok(MockDecoder {
            stream_index,
            format: self.engine.format,
            kind: self.engine.decoder_kind,
            delay: self.engine.delay,
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            flushing: false,
            log: self.engine.log.clone(),
        })
    }

    fn read_packet(&mut self, packet: &mut Packet) -> AudioResult<ReadStatus> {
        match self.engine.packets.get(self.cursor) {
            Some((stream, data)) => {
                packet.fill(*stream, self.cursor as u64, 1, data);
                self.cursor += 1;
                Ok(ReadStatus::Packet)
            }
            None => Ok(ReadStatus::EndOfStream),
        }
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        record(&self.engine.log, Event::SourceDropped);
    }
}

pub(crate) struct MockDecoder {
    stream_index: usize,
    format: OutputFormat,
    kind: MediaKind,
    delay: usize,
    pending: VecDeque<Vec<u8>>,
    ready: VecDeque<Vec<u8>>,
    flushing: bool,
    log: EventLog,
}

impl MediaDecoder for MockDecoder {
    fn media_kind(&self) -> MediaKind {
        self.kind
    }

    fn output_format(&self) -> OutputFormat {
        self.format
    }

    fn send_packet(&mut self, packet: Option<&Packet>) -> AudioResult<()> {
        let Some(packet) = packet else {
            record(&self.log, Event::Flush);
            self.flushing = true;
            self.ready.extend(self.pending.drain(..));
            return Ok(());
        };
        if self.flushing {
            return Err(AudioError::DecodeSubmit("already flushing".to_string()));
        }
        if packet.data().first() == Some(&REJECT_MARKER) {
            return Err(AudioError::DecodeSubmit("scripted rejection".to_string()));
        }
        record(
            &self.log,
            Event::Submitted(self.stream_index, packet.data().to_vec()),
        );
        self.pending.push_back(packet.data().to_vec());
        while self.pending.len() > self.delay {
            if let Some(data) = self.pending.pop_front() {
                self.ready.push_back(data);
            }
        }
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> AudioResult<ReceiveStatus> {
        let Some(data) = self.ready.pop_front() else {
            return Ok(if self.flushing {
                ReceiveStatus::EndOfStream
            } else {
                ReceiveStatus::Again
            });
        };
        let format = self.format.sample_format;
        let channels = self.format.channels as usize;
        let samples = data.len() / format.bytes_per_sample();
        frame.set_layout(format, channels, samples);
        if format.is_planar() {
            for ch in 0..channels {
                if let Some(plane) = frame.plane_mut(ch) {
                    if ch == 0 {
                        plane.extend_from_slice(&data);
                    } else {
                        plane.extend(data.iter().map(|b| b.wrapping_add(ch as u8)));
                    }
                }
            }
        } else if let Some(plane) = frame.plane_mut(0) {
            plane.extend_from_slice(&data);
        }
        Ok(ReceiveStatus::Frame)
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        record(&self.log, Event::DecoderDropped);
    }
}
