use crate::foundation::error::{MoshError, MoshResult};

/// Whole frames per second of the intermediate stream.
///
/// ffmpeg is asked to resample the source to exactly this rate before scanning, so
/// the frame index of a split segment maps to time as `index / fps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Fps(u32);

impl Fps {
    pub fn new(per_sec: u32) -> MoshResult<Self> {
        if per_sec == 0 {
            return Err(MoshError::configuration("fps must be > 0"));
        }
        Ok(Self(per_sec))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Frame index containing `secs`, rounded toward negative infinity.
    pub fn secs_to_frames_floor(self, secs: f64) -> i64 {
        (secs * self.as_f64()).floor() as i64
    }

    /// Parses an ffprobe rate such as `30000/1001` or `25` and rounds it to whole frames.
    ///
    /// Returns `None` for malformed input, a zero denominator, or a rate that rounds to 0.
    pub fn parse_ratio(s: &str) -> Option<Self> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim().parse::<u64>().ok()?, d.trim().parse::<u64>().ok()?),
            None => (s.parse::<u64>().ok()?, 1),
        };
        if den == 0 {
            return None;
        }
        let rounded = (num + den / 2) / den;
        let per_sec = u32::try_from(rounded).ok()?;
        Self::new(per_sec).ok()
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
