//! Output channels that render markup.
//!
//! Every write goes through [`cadence_markup::format`] with the channel's own
//! `posix` flag: escape sequences on capable terminals, plain text elsewhere.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::settings::Settings;

/// Which output stream a channel writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Out,
    Err,
}

/// A writer plus the flag deciding how markup is rendered on it.
pub struct Channel {
    writer: Box<dyn Write>,
    posix: bool,
}

impl Channel {
    pub fn new(writer: impl Write + 'static, posix: bool) -> Self {
        Self {
            writer: Box::new(writer),
            posix,
        }
    }

    /// Returns true if markup becomes escape sequences on this channel.
    pub fn posix(&self) -> bool {
        self.posix
    }

    pub fn set_posix(&mut self, posix: bool) {
        self.posix = posix;
    }

    /// Formats `text` and writes it, flushing afterwards.
    pub fn write(&mut self, text: &str) -> io::Result<()> {
        let rendered = cadence_markup::format(text, self.posix);
        self.writer.write_all(rendered.as_bytes())?;
        self.writer.flush()
    }

    /// Like [`write`](Self::write), followed by a newline.
    pub fn writeln(&mut self, text: &str) -> io::Result<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.write(&line)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("posix", &self.posix)
            .finish_non_exhaustive()
    }
}

/// The out and err channels a command writes to.
#[derive(Debug)]
pub struct Stdio {
    out: Channel,
    err: Channel,
}

impl Stdio {
    pub fn new(out: Channel, err: Channel) -> Self {
        Self { out, err }
    }

    /// Binds the process stdout and stderr, deciding escape codes per stream
    /// from the color setting.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            out: Channel::new(io::stdout(), settings.color.resolve(Stream::Out)),
            err: Channel::new(io::stderr(), settings.color.resolve(Stream::Err)),
        }
    }

    /// In-memory channels, returned with handles to read what was written.
    pub fn captured(posix: bool) -> (Self, Capture, Capture) {
        let out = Capture::new();
        let err = Capture::new();
        let stdio = Self::new(
            Channel::new(out.clone(), posix),
            Channel::new(err.clone(), posix),
        );
        (stdio, out, err)
    }

    pub fn out(&mut self, text: &str) -> io::Result<()> {
        self.out.write(text)
    }

    pub fn outln(&mut self, text: &str) -> io::Result<()> {
        self.out.writeln(text)
    }

    pub fn err(&mut self, text: &str) -> io::Result<()> {
        self.err.write(text)
    }

    pub fn errln(&mut self, text: &str) -> io::Result<()> {
        self.err.writeln(text)
    }

    pub fn channel(&mut self, stream: Stream) -> &mut Channel {
        match stream {
            Stream::Out => &mut self.out,
            Stream::Err => &mut self.err,
        }
    }
}

/// A shared in-memory writer. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
