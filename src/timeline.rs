use crate::foundation::{
    core::Fps,
    error::{MoshError, MoshResult},
};

/// Effect bounds as the user gives them: seconds on the original, untrimmed footage.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectTimes {
    pub start_effect_sec: f64,
    pub end_effect_sec: f64,
    /// Seconds cut from the front of the source before scanning.
    pub trim_start_sec: f64,
}

impl EffectTimes {
    /// Re-bases the effect onto the trimmed timeline.
    ///
    /// Returns `(effective_start, effective_end)` in seconds. Needs no frame rate, so it
    /// can run before anything is probed or decoded.
    pub fn rebase(&self) -> MoshResult<(f64, f64)> {
        for (name, v) in [
            ("start effect", self.start_effect_sec),
            ("end effect", self.end_effect_sec),
            ("trim start", self.trim_start_sec),
        ] {
            if !v.is_finite() {
                return Err(MoshError::configuration(format!(
                    "{name} time must be finite (got {v})"
                )));
            }
        }

        let hold = self.end_effect_sec - self.start_effect_sec;
        let start = self.start_effect_sec - self.trim_start_sec;
        let end = start + hold;
        if start > end {
            return Err(MoshError::configuration(format!(
                "no effect window: effect starts at {}s but ends at {}s",
                self.start_effect_sec, self.end_effect_sec
            )));
        }
        Ok((start, end))
    }

    pub fn window(&self, fps: Fps) -> MoshResult<EffectWindow> {
        let (start, end) = self.rebase()?;
        Ok(EffectWindow {
            pre_roll_cut: self.trim_start_sec,
            start: fps.secs_to_frames_floor(start),
            end: fps.secs_to_frames_floor(end),
        })
    }
}

/// Frame-index range (inclusive on both ends) where keyframes are dropped and
/// delta frames repeated.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectWindow {
    pub pre_roll_cut: f64,
    pub start: i64,
    pub end: i64, // inclusive, >= start
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    Passthrough,
    Glitch,
}

impl EffectWindow {
    pub fn new(pre_roll_cut: f64, start: i64, end: i64) -> MoshResult<Self> {
        if start > end {
            return Err(MoshError::configuration(format!(
                "no effect window: start frame {start} is after end frame {end}"
            )));
        }
        Ok(Self {
            pre_roll_cut,
            start,
            end,
        })
    }

    pub fn classify(&self, frame_index: usize) -> Region {
        let i = i64::try_from(frame_index).unwrap_or(i64::MAX);
        if self.start <= i && i <= self.end {
            Region::Glitch
        } else {
            Region::Passthrough
        }
    }

    pub fn len_frames(&self) -> u64 {
        self.end.abs_diff(self.start) + 1
    }
}

/// Builds the effect window for a stream resampled to `fps`.
pub fn compute_window(
    start_effect_sec: f64,
    end_effect_sec: f64,
    trim_start_sec: f64,
    fps: Fps,
) -> MoshResult<EffectWindow> {
    EffectTimes {
        start_effect_sec,
        end_effect_sec,
        trim_start_sec,
    }
    .window(fps)
}
