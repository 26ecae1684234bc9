//! In-place frame writer.
//!
//! Owns the output sink on behalf of the render loop; nothing else ever
//! writes to it. Each frame is assembled into one buffer and flushed with a
//! single write: the cursor is moved up over the previous frame and
//! everything below is cleared first, so the new frame fully replaces the
//! old one regardless of line-count changes.

use std::io::{self, Write};

use crossterm::{
    cursor::MoveUp,
    queue,
    terminal::{Clear, ClearType},
};

pub(crate) struct FrameWriter<W: Write> {
    out: W,
    /// Line count of the previous frame, i.e. how far to rewind.
    lines: usize,
}

impl<W: Write> FrameWriter<W> {
    pub(crate) fn new(out: W) -> Self {
        FrameWriter { out, lines: 0 }
    }

    /// Replace the previous frame with `lines`.
    pub(crate) fn write_frame(&mut self, lines: &[String]) -> io::Result<()> {
        if self.lines == 0 && lines.is_empty() {
            return Ok(());
        }
        let mut buf: Vec<u8> = Vec::new();
        if self.lines > 0 {
            let up = u16::try_from(self.lines).unwrap_or(u16::MAX);
            queue!(buf, MoveUp(up), Clear(ClearType::FromCursorDown))?;
        }
        for line in lines {
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        self.out.write_all(&buf)?;
        self.out.flush()?;
        self.lines = lines.len();
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_frame_writes_without_repositioning() {
        let mut w = FrameWriter::new(Vec::new());
        assert!(w.write_frame(&lines(&["a", "b"])).is_ok());
        assert_eq!(w.out, b"a\nb\n");
    }

    #[test]
    fn second_frame_rewinds_and_clears() {
        let mut w = FrameWriter::new(Vec::new());
        assert!(w.write_frame(&lines(&["a", "b"])).is_ok());
        assert!(w.write_frame(&lines(&["c"])).is_ok());
        let out = String::from_utf8_lossy(&w.out);
        // rewind over two lines, clear down, then the shrunk frame
        assert!(out.contains("\x1b[2A\x1b[Jc\n"), "got {out:?}");
    }

    #[test]
    fn empty_frame_after_content_clears_the_region() {
        let mut w = FrameWriter::new(Vec::new());
        assert!(w.write_frame(&lines(&["a"])).is_ok());
        assert!(w.write_frame(&[]).is_ok());
        let out = String::from_utf8_lossy(&w.out);
        assert!(out.ends_with("\x1b[1A\x1b[J"), "got {out:?}");
    }

    #[test]
    fn nothing_written_while_there_are_no_frames() {
        let mut w = FrameWriter::new(Vec::new());
        assert!(w.write_frame(&[]).is_ok());
        assert!(w.out.is_empty());
    }
}
