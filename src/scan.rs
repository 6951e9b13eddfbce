use crate::foundation::error::{MoshError, MoshResult};

/// `00dc`: the AVI chunk id of a compressed video frame, which ends the previous frame.
pub const FRAME_TERMINATOR: [u8; 4] = [0x30, 0x30, 0x64, 0x63];
/// Tail of the MPEG-4 visual object sequence start code that opens a keyframe.
pub const KEYFRAME_MARKER: [u8; 3] = [0x00, 0x01, 0xB0];
/// Byte offset of [`KEYFRAME_MARKER`] inside a frame (after the 4-byte chunk size).
pub const KEYFRAME_MARKER_OFFSET: usize = 5;

/// Byte patterns used to split and classify an intermediate stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Markers {
    pub terminator: Vec<u8>,
    pub keyframe: Vec<u8>,
    pub keyframe_offset: usize,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            terminator: FRAME_TERMINATOR.to_vec(),
            keyframe: KEYFRAME_MARKER.to_vec(),
            keyframe_offset: KEYFRAME_MARKER_OFFSET,
        }
    }
}

impl Markers {
    pub fn validate(&self) -> MoshResult<()> {
        if self.terminator.is_empty() {
            return Err(MoshError::validation("frame terminator must be non-empty"));
        }
        if self.keyframe.is_empty() {
            return Err(MoshError::validation("keyframe marker must be non-empty"));
        }
        Ok(())
    }

    /// Classifies a frame payload; payloads too short to hold the marker are deltas.
    pub fn classify(&self, payload: &[u8]) -> FrameKind {
        let window = self
            .keyframe_offset
            .checked_add(self.keyframe.len())
            .and_then(|end| payload.get(self.keyframe_offset..end));
        match window {
            Some(w) if w == self.keyframe.as_slice() => FrameKind::Keyframe,
            _ => FrameKind::Delta,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FrameKind {
    Keyframe,
    Delta,
}

/// One terminator-delimited span of the decoded buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Position in split order (not a timestamp).
    pub index: usize,
    pub bytes: &'a [u8],
    pub kind: FrameKind,
    /// `false` only for the trailing remainder after the last terminator.
    pub terminated: bool,
}

impl Frame<'_> {
    pub fn is_keyframe(&self) -> bool {
        self.kind == FrameKind::Keyframe
    }
}

/// Splits `buffer` on `markers.terminator` and classifies every span.
///
/// Always yields at least one frame: the remainder after the last terminator is
/// appended even when empty.
pub fn scan<'a>(buffer: &'a [u8], markers: &Markers) -> Vec<Frame<'a>> {
    let term = markers.terminator.as_slice();
    let mut frames = Vec::new();
    let mut start = 0usize;

    while let Some(at) = find(&buffer[start..], term) {
        let bytes = &buffer[start..start + at];
        frames.push(Frame {
            index: frames.len(),
            bytes,
            kind: markers.classify(bytes),
            terminated: true,
        });
        start += at + term.len();
    }

    let tail = &buffer[start..];
    frames.push(Frame {
        index: frames.len(),
        bytes: tail,
        kind: markers.classify(tail),
        terminated: false,
    });

    tracing::debug!(
        frames = frames.len(),
        keyframes = frames.iter().filter(|f| f.is_keyframe()).count(),
        bytes = buffer.len(),
        "scanned frame stream"
    );
    frames
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
