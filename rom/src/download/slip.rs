// Licensed under the Apache-2.0 license

//! SLIP framing (RFC 1055) as spoken by the serial loader.

pub const END: u8 = 0xc0;
pub const ESC: u8 = 0xdb;
pub const ESC_END: u8 = 0xdc;
pub const ESC_ESC: u8 = 0xdd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between frames; everything but END is line noise.
    Idle,
    InFrame,
    Escape,
    /// Frame overflowed or carried a bad escape; wait for its END.
    Discard,
}

/// Incremental SLIP decoder writing into a caller-provided buffer.
pub struct SlipDecoder<'a> {
    buf: &'a mut [u8],
    len: usize,
    state: State,
}

impl<'a> SlipDecoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        SlipDecoder {
            buf,
            len: 0,
            state: State::Idle,
        }
    }

    /// Feeds one byte. Returns the frame length once a non-empty frame has
    /// been closed; the frame is then available from [`Self::frame`] until
    /// the next call.
    pub fn push(&mut self, byte: u8) -> Option<usize> {
        match (self.state, byte) {
            (State::Idle, END) => {
                self.len = 0;
                self.state = State::InFrame;
            }
            (State::Idle, _) => {}
            (State::InFrame, END) if self.len == 0 => {}
            (State::InFrame, END) => {
                self.state = State::Idle;
                return Some(self.len);
            }
            (State::InFrame, ESC) => self.state = State::Escape,
            (State::InFrame, b) => self.store(b),
            (State::Escape, ESC_END) => {
                self.state = State::InFrame;
                self.store(END);
            }
            (State::Escape, ESC_ESC) => {
                self.state = State::InFrame;
                self.store(ESC);
            }
            (State::Escape, END) | (State::Discard, END) => {
                // the terminator of a bad frame opens the next one
                self.len = 0;
                self.state = State::InFrame;
            }
            (State::Escape, _) => self.state = State::Discard,
            (State::Discard, _) => {}
        }
        None
    }

    fn store(&mut self, byte: u8) {
        match self.buf.get_mut(self.len) {
            Some(slot) => {
                *slot = byte;
                self.len += 1;
            }
            None => self.state = State::Discard,
        }
    }

    /// The most recently completed frame.
    pub fn frame(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Emits `data` as one SLIP frame through `emit`, in as few slices as the
/// escapes allow.
pub fn encode(data: &[u8], mut emit: impl FnMut(&[u8])) {
    emit(&[END]);
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        let escaped: &[u8] = match b {
            END => &[ESC, ESC_END],
            ESC => &[ESC, ESC_ESC],
            _ => continue,
        };
        if start < i {
            emit(&data[start..i]);
        }
        emit(escaped);
        start = i + 1;
    }
    if start < data.len() {
        emit(&data[start..]);
    }
    emit(&[END]);
}
