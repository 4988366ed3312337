//! Per-endpoint flow-control buffer: a FIFO of DATA frames
//! awaiting window capacity, with split-on-drain semantics.

use crate::error::{H2Error, Result};
use crate::frame::Frame;
use bytes::Bytes;

const MAX_WINDOW: i64 = (1u32 << 31) as i64 - 1;

#[derive(Debug, Clone)]
struct Pending {
    stream_id: u32,
    payload: Bytes,
    end_stream: bool,
}

/// Holds outbound DATA that could not be sent immediately because it
/// did not fit in the remote flow-control window.
#[derive(Debug, Default)]
pub struct FlowBuffer {
    queue: std::collections::VecDeque<Pending>,
    /// Signed: RFC 7540 permits the window to go negative after a
    /// SETTINGS-driven shrink.
    pub remote_window: i64,
}

impl FlowBuffer {
    pub fn new(initial_window: u32) -> Self {
        Self {
            queue: std::collections::VecDeque::new(),
            remote_window: initial_window as i64,
        }
    }

    /// Attempt to send `payload` for `stream_id` right away, or enqueue
    /// it for later draining.
    pub fn send_data(&mut self, stream_id: u32, payload: Bytes, end_stream: bool) -> Vec<Frame> {
        let fits_immediately =
            self.queue.is_empty() && (payload.len() as i64) <= self.remote_window;
        let is_empty_end_stream = payload.is_empty() && end_stream;

        if fits_immediately || is_empty_end_stream {
            self.remote_window -= payload.len() as i64;
            return vec![Frame::Data {
                stream_id,
                end_stream,
                padding: None,
                payload,
            }];
        }

        self.queue.push_back(Pending {
            stream_id,
            payload,
            end_stream,
        });
        self.drain()
    }

    /// Repeatedly emit from the head of the queue while window allows
    /// Splits a pending chunk at the window boundary when only part fits.
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        loop {
            let Some(head) = self.queue.front() else {
                break;
            };
            let len = head.payload.len() as i64;

            if len == 0 && head.end_stream {
                let head = self.queue.pop_front().unwrap();
                out.push(Frame::Data {
                    stream_id: head.stream_id,
                    end_stream: true,
                    padding: None,
                    payload: head.payload,
                });
                continue;
            }

            if self.remote_window <= 0 {
                break;
            }

            if len <= self.remote_window {
                let head = self.queue.pop_front().unwrap();
                self.remote_window -= len;
                out.push(Frame::Data {
                    stream_id: head.stream_id,
                    end_stream: head.end_stream,
                    padding: None,
                    payload: head.payload,
                });
            } else {
                let head = self.queue.front_mut().unwrap();
                let window = self.remote_window as usize;
                let sent = head.payload.slice(0..window);
                head.payload = head.payload.slice(window..);
                let stream_id = head.stream_id;
                self.remote_window -= window as i64;
                out.push(Frame::Data {
                    stream_id,
                    end_stream: false,
                    padding: None,
                    payload: sent,
                });
                break;
            }
        }
        out
    }

    /// Apply a WINDOW_UPDATE increment and drain whatever now fits
    /// Applies a WINDOW_UPDATE increment and drains what now fits.
    pub fn process_window_update(&mut self, increment: u32) -> Result<Vec<Frame>> {
        if increment == 0 {
            return Err(H2Error::protocol("WINDOW_UPDATE increment must be nonzero"));
        }
        let new_window = self.remote_window + increment as i64;
        if new_window > MAX_WINDOW {
            return Err(H2Error::flow_control("flow control window overflow"));
        }
        self.remote_window = new_window;
        Ok(self.drain())
    }

    /// Adjust the window by `delta` (from a SETTINGS `initial_window_size`
    /// change), which may be negative and may drive the window negative.
    pub fn adjust_window(&mut self, delta: i64) {
        self.remote_window += delta;
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Push a not-fully-transmitted chunk back onto the head of the
    /// queue, crediting its length back to the window. Used by the
    /// connection when its own (shared) window blocks a send that a
    /// stream's own window already allowed (connection-level
    /// and stream-level buffers are separate instances of this type).
    pub fn requeue_front(&mut self, stream_id: u32, payload: Bytes, end_stream: bool) {
        self.remote_window += payload.len() as i64;
        self.queue.push_front(Pending {
            stream_id,
            payload,
            end_stream,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_immediately_when_window_allows() {
        let mut fb = FlowBuffer::new(100);
        let frames = fb.send_data(1, Bytes::from_static(b"hello"), false);
        assert_eq!(frames.len(), 1);
        assert_eq!(fb.remote_window, 95);
    }

    #[test]
    fn enqueues_when_window_too_small_and_drains_on_update() {
        let mut fb = FlowBuffer::new(2);
        let frames = fb.send_data(1, Bytes::from_static(b"hello"), false);
        assert!(frames.is_empty());
        assert!(!fb.is_empty());

        let frames = fb.process_window_update(10).unwrap();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Data { payload, .. } => assert_eq!(payload.as_ref(), b"hello"),
            _ => panic!("expected data frame"),
        }
    }

    #[test]
    fn splits_large_frame_across_window_increments() {
        let mut fb = FlowBuffer::new(0);
        fb.send_data(1, Bytes::from_static(b"hello world"), true);
        let frames = fb.process_window_update(5).unwrap();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Data {
                payload,
                end_stream,
                ..
            } => {
                assert_eq!(payload.as_ref(), b"hello");
                assert!(!end_stream);
            }
            _ => panic!("expected data frame"),
        }

        let frames = fb.process_window_update(10).unwrap();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::Data {
                payload,
                end_stream,
                ..
            } => {
                assert_eq!(payload.as_ref(), b" world");
                assert!(end_stream);
            }
            _ => panic!("expected data frame"),
        }
    }

    #[test]
    fn empty_end_stream_sends_even_with_zero_window() {
        let mut fb = FlowBuffer::new(0);
        let frames = fb.send_data(1, Bytes::new(), true);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn zero_increment_is_protocol_error() {
        let mut fb = FlowBuffer::new(10);
        assert!(fb.process_window_update(0).is_err());
    }

    #[test]
    fn overflowing_window_is_flow_control_error() {
        let mut fb = FlowBuffer::new(u32::MAX);
        assert!(fb.process_window_update(u32::MAX).is_err());
    }
}
