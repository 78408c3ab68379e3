//! 解码泵统计模块
//!
//! 记录读包、送包、丢弃和输出的计数，以及帧大小分布

use serde::Serialize;
use tracing::{debug, trace};

/// 解码泵运行统计
#[derive(Debug, Clone, Serialize)]
pub struct PumpStats {
    /// 从容器读出的包总数（含非选中流）
    pub packets_read: u64,
    /// 成功提交给解码器的包数
    pub packets_decoded: u64,
    /// 属于其他流而被丢弃的包数
    pub packets_discarded: u64,
    /// 提交失败被跳过的包数
    pub submit_failures: u64,
    /// 转发到输出端的帧数
    pub frames: u64,
    /// 转发到输出端的字节数
    pub bytes: u64,
    /// 帧大小范围（每声道样本数）
    pub min_frame_samples: usize,
    pub max_frame_samples: usize,
    pub mean_frame_samples: f64,
    #[serde(skip)]
    samples_sum: u64,
}

impl Default for PumpStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpStats {
    pub fn new() -> Self {
        Self {
            packets_read: 0,
            packets_decoded: 0,
            packets_discarded: 0,
            submit_failures: 0,
            frames: 0,
            bytes: 0,
            min_frame_samples: usize::MAX,
            max_frame_samples: 0,
            mean_frame_samples: 0.0,
            samples_sum: 0,
        }
    }

    /// 记录一帧输出
    ///
    /// # 参数
    /// * `samples` - 每声道样本数
    /// * `bytes` - 实际转发给输出端的字节数
    pub fn add_frame(&mut self, samples: usize, bytes: usize) {
        self.frames += 1;
        self.bytes = self.bytes.saturating_add(bytes as u64);
        self.samples_sum = self.samples_sum.saturating_add(samples as u64);
        self.min_frame_samples = self.min_frame_samples.min(samples);
        self.max_frame_samples = self.max_frame_samples.max(samples);

        if self.frames <= 5 || self.frames % 500 == 0 {
            trace!(
                frame = self.frames,
                samples,
                bytes,
                "输出帧 / forwarded frame"
            );
        }
    }

    /// 每声道样本总数
    pub fn total_samples(&self) -> u64 {
        self.samples_sum
    }

    /// 结束统计：计算平均值并修正空统计的边界值
    pub fn finalize(&mut self) {
        if self.frames > 0 {
            self.mean_frame_samples = self.samples_sum as f64 / self.frames as f64;
        }
        if self.min_frame_samples == usize::MAX {
            self.min_frame_samples = 0;
        }

        debug!(
            packets_read = self.packets_read,
            packets_decoded = self.packets_decoded,
            packets_discarded = self.packets_discarded,
            submit_failures = self.submit_failures,
            frames = self.frames,
            bytes = self.bytes,
            "解码统计 / pump statistics"
        );
        if self.frames > 0 {
            debug!(
                "帧大小范围 / frame size range: {} ~ {} samples/channel, 平均 / mean {:.1}",
                self.min_frame_samples, self.max_frame_samples, self.mean_frame_samples
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_finalize() {
        let mut stats = PumpStats::new();
        stats.finalize();
        assert_eq!(stats.min_frame_samples, 0);
        assert_eq!(stats.max_frame_samples, 0);
        assert_eq!(stats.mean_frame_samples, 0.0);
    }

    #[test]
    fn test_frame_accumulation() {
        let mut stats = PumpStats::new();
        stats.add_frame(1152, 2304);
        stats.add_frame(576, 1152);
        stats.finalize();

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.bytes, 3456);
        assert_eq!(stats.total_samples(), 1728);
        assert_eq!(stats.min_frame_samples, 576);
        assert_eq!(stats.max_frame_samples, 1152);
        assert!((stats.mean_frame_samples - 864.0).abs() < f64::EPSILON);
    }
}
