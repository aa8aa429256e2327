//! FFmpeg-backed frame decoder.
//!
//! Frames are streamed from an `ffmpeg` child process as raw RGB24 on
//! stdout, one frame-sized read at a time, so memory stays bounded by a
//! single frame regardless of video length.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::command::{check_ffmpeg, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::frame::{FrameSource, RgbFrame, VideoOpener};
use crate::probe::probe_video;

/// Trailing FFmpeg stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Opens videos by probing them and spawning a raw-frame `ffmpeg` decode.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl VideoOpener for FfmpegDecoder {
    type Source = FfmpegFrameSource;

    fn open(&self, path: &Path, max_frames: usize) -> MediaResult<FfmpegFrameSource> {
        let info = probe_video(path)?;
        let ffmpeg = check_ffmpeg()?;

        let cmd = FfmpegCommand::new(path).max_frames(max_frames).raw_rgb();
        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;
        // FFmpeg blocks once the stderr pipe fills, so drain it alongside stdout.
        let stderr = child.stderr.take().map(drain_stderr);

        // FFmpeg autorotates, so frames come out in display orientation.
        let (width, height) = info.display_dimensions();
        debug!(
            width,
            height,
            rotation = info.rotation,
            fps = ?info.fps,
            codec = %info.codec,
            "Opened video for decoding"
        );

        Ok(FfmpegFrameSource {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            width,
            height,
            fps: info.fps,
            frames_read: 0,
            finished: false,
        })
    }
}

/// Live `ffmpeg` decode of one video.
///
/// Dropping the source kills and reaps the child process.
pub struct FfmpegFrameSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    fps: Option<f64>,
    frames_read: usize,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Wait for FFmpeg after stdout closed and surface a failed decode.
    fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = self.join_stderr();

        if status.success() {
            return Ok(());
        }

        if self.frames_read == 0 {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg produced no frames",
                Some(stderr),
                status.code(),
            ));
        }

        warn!(
            frames = self.frames_read,
            exit_code = ?status.code(),
            stderr = %stderr,
            "FFmpeg exited with an error after decoding some frames"
        );
        Ok(())
    }

    fn join_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl FrameSource for FfmpegFrameSource {
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn next_frame(&mut self) -> MediaResult<Option<RgbFrame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; RgbFrame::byte_len(self.width, self.height)];
        let filled = read_full(&mut self.stdout, &mut buf)?;

        if filled < buf.len() {
            if filled > 0 {
                warn!(
                    bytes = filled,
                    expected = buf.len(),
                    "Discarding truncated trailing frame"
                );
            }
            self.finish()?;
            return Ok(None);
        }

        self.frames_read += 1;
        RgbFrame::new(self.width, self.height, buf).map(Some)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.join_stderr();
        }
    }
}

fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || stderr_tail(BufReader::new(stderr), STDERR_TAIL_LINES))
}

/// Read `reader` to EOF, keeping only the last `max_lines` lines.
fn stderr_tail<R: BufRead>(reader: R, max_lines: usize) -> String {
    let mut tail = VecDeque::with_capacity(max_lines);
    for line in reader.split(b'\n') {
        let Ok(line) = line else { break };
        if tail.len() == max_lines {
            tail.pop_front();
        }
        tail.push_back(String::from_utf8_lossy(&line).trim_end().to_string());
    }
    Vec::from(tail).join("\n")
}

/// Read until `buf` is full or the reader hits EOF; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
