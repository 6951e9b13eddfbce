//! Keyframe suppression and delta-frame repetition over a scanned frame stream.
//!
//! The pass never edits bytes inside a frame; it only keeps, drops, or repeats whole
//! frames and re-attaches terminators. Frames outside the effect window keep the
//! termination they had in the input, so a pass that glitches nothing reproduces the
//! input exactly.

use crate::{
    scan::{Frame, Markers, scan},
    timeline::{EffectWindow, Region},
};

/// Opens on the first keyframe seen in scan order and never closes.
///
/// Until it opens no frame is glitched: a mosh needs a real picture to smear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyframeGate {
    open: bool,
}

impl KeyframeGate {
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns `true` only on the call that opened the gate.
    pub fn observe(&mut self, frame: &Frame<'_>) -> bool {
        if self.open || !frame.is_keyframe() {
            return false;
        }
        self.open = true;
        true
    }
}

/// A frame as it will be written out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutFrame<'a> {
    pub bytes: &'a [u8],
    pub terminated: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MoshStats {
    pub input_frames: usize,
    pub keyframes: usize,
    /// Split index of the keyframe that opened the gate.
    pub gate_opened_at: Option<usize>,
    pub keyframes_dropped: usize,
    /// Delta frames inside the window (each emitted `repeat` times).
    pub deltas_repeated: usize,
    pub output_frames: usize,
    /// Buffer sizes, filled in by [`mosh_bytes`].
    pub input_bytes: usize,
    pub output_bytes: usize,
}

/// Single-pass transform state.
#[derive(Debug)]
pub struct Mosher<'w> {
    window: &'w EffectWindow,
    repeat: usize,
    gate: KeyframeGate,
    stats: MoshStats,
}

impl<'w> Mosher<'w> {
    pub fn new(window: &'w EffectWindow, repeat: usize) -> Self {
        Self {
            window,
            repeat,
            gate: KeyframeGate::default(),
            stats: MoshStats::default(),
        }
    }

    /// Feeds the next frame in scan order, appending whatever it turns into to `out`.
    pub fn push<'a>(&mut self, frame: &Frame<'a>, out: &mut Vec<OutFrame<'a>>) {
        self.stats.input_frames += 1;
        if frame.is_keyframe() {
            self.stats.keyframes += 1;
        }

        // Nothing left after the last terminator.
        if frame.bytes.is_empty() && !frame.terminated {
            return;
        }

        let glitch = self.gate.is_open() && self.window.classify(frame.index) == Region::Glitch;
        if !glitch {
            self.emit(out, frame.bytes, frame.terminated);
            if self.gate.observe(frame) {
                self.stats.gate_opened_at = Some(frame.index);
                tracing::debug!(index = frame.index, "keyframe gate opened");
            }
            return;
        }

        if frame.is_keyframe() {
            self.stats.keyframes_dropped += 1;
            return;
        }

        self.stats.deltas_repeated += 1;
        for _ in 0..self.repeat {
            self.emit(out, frame.bytes, true);
        }
    }

    fn emit<'a>(&mut self, out: &mut Vec<OutFrame<'a>>, bytes: &'a [u8], terminated: bool) {
        self.stats.output_frames += 1;
        out.push(OutFrame { bytes, terminated });
    }

    pub fn finish(self) -> MoshStats {
        self.stats
    }
}

/// Runs the whole stream through a fresh [`Mosher`].
pub fn transform<'a>(
    frames: &[Frame<'a>],
    window: &EffectWindow,
    repeat: usize,
) -> (Vec<OutFrame<'a>>, MoshStats) {
    let mut mosher = Mosher::new(window, repeat);
    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        mosher.push(frame, &mut out);
    }
    (out, mosher.finish())
}

/// Concatenates frames, appending `terminator` after every terminated one.
pub fn join(frames: &[OutFrame<'_>], terminator: &[u8]) -> Vec<u8> {
    let len = frames
        .iter()
        .map(|f| f.bytes.len() + if f.terminated { terminator.len() } else { 0 })
        .sum();
    let mut buf = Vec::with_capacity(len);
    for f in frames {
        buf.extend_from_slice(f.bytes);
        if f.terminated {
            buf.extend_from_slice(terminator);
        }
    }
    buf
}

/// Scan, transform and re-join in one call.
pub fn mosh_bytes(
    buffer: &[u8],
    markers: &Markers,
    window: &EffectWindow,
    repeat: usize,
) -> (Vec<u8>, MoshStats) {
    let frames = scan(buffer, markers);
    let (out, mut stats) = transform(&frames, window, repeat);
    let moshed = join(&out, &markers.terminator);
    stats.input_bytes = buffer.len();
    stats.output_bytes = moshed.len();
    (moshed, stats)
}
