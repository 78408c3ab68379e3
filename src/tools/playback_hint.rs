//! 播放提示
//!
//! 根据最终输出格式生成可直接播放原始PCM文件的 ffplay 命令。

use std::path::Path;

use crate::audio::{OutputFormat, SampleFormat};

/// 样本格式对应的 ffplay `-f` 格式标签（按主机字节序）
///
/// 只识别 u8/s16/s32/f32/f64 五种打包格式，其余返回 `None`。
pub fn format_tag(format: SampleFormat) -> Option<String> {
    let endian = if cfg!(target_endian = "little") {
        "le"
    } else {
        "be"
    };
    let tag = match format {
        SampleFormat::U8 => return Some("u8".to_string()),
        SampleFormat::S16 => "s16",
        SampleFormat::S32 => "s32",
        SampleFormat::F32 => "f32",
        SampleFormat::F64 => "f64",
        _ => return None,
    };
    Some(format!("{tag}{endian}"))
}

/// 生成播放命令；格式无法识别时返回 `None`
pub fn ffplay_command(format: &OutputFormat, output: &Path) -> Option<String> {
    let tag = format_tag(format.sample_format)?;
    Some(format!(
        "ffplay -f {tag} -ac {} -ar {} {}",
        format.channels,
        format.sample_rate,
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tags() {
        let suffix = if cfg!(target_endian = "little") {
            "le"
        } else {
            "be"
        };
        assert_eq!(format_tag(SampleFormat::U8).as_deref(), Some("u8"));
        assert_eq!(format_tag(SampleFormat::S16), Some(format!("s16{suffix}")));
        assert_eq!(format_tag(SampleFormat::F64), Some(format!("f64{suffix}")));
        assert_eq!(format_tag(SampleFormat::S16P), None);
    }

    #[test]
    fn test_ffplay_command() {
        let format = OutputFormat::new(SampleFormat::S16, 44100, 1);
        let command = ffplay_command(&format, Path::new("out.pcm")).unwrap();
        assert!(command.starts_with("ffplay -f s16"));
        assert!(command.ends_with("-ac 1 -ar 44100 out.pcm"));

        let planar = OutputFormat::new(SampleFormat::F32P, 48000, 2);
        assert!(ffplay_command(&planar, Path::new("out.pcm")).is_none());
    }
}
