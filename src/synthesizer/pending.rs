use crate::ast::RecorderCall;

/// Recorder calls collected while visiting blocks, one frame per open block.
///
/// A nested block owns its frame: popping it hands the calls back to the
/// block that created them and leaves the enclosing frame as it was.
#[derive(Debug, Default)]
pub(crate) struct PendingStack {
    frames: Vec<Vec<RecorderCall>>,
    emitted: usize,
}

impl PendingStack {
    pub(crate) fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub(crate) fn pop_frame(&mut self) -> Vec<RecorderCall> {
        self.frames.pop().unwrap_or_default()
    }

    pub(crate) fn push(&mut self, call: RecorderCall) {
        self.emitted += 1;
        match self.frames.last_mut() {
            Some(frame) => frame.push(call),
            None => self.frames.push(vec![call]),
        }
    }

    /// Number of calls in the innermost frame.
    pub(crate) fn current_len(&self) -> usize {
        self.frames.last().map_or(0, Vec::len)
    }

    /// Total calls pushed over the lifetime of the stack.
    pub(crate) fn emitted(&self) -> usize {
        self.emitted
    }
}
