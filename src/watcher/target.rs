use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;

/// Regions smaller than this on either side are almost always a mis-drag.
pub const MIN_REGION_SIDE: i32 = 10;

/// What the watcher captures each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CaptureTarget {
    Region {
        left: i32,
        top: i32,
        width: i32,
        height: i32,
    },
    Window {
        id: u32,
    },
}

impl CaptureTarget {
    /// Structural checks only; a stale window id surfaces later as
    /// `CaptureUnavailable` from the capture provider.
    pub fn validate(&self) -> Result<(), WatchError> {
        match *self {
            CaptureTarget::Region { width, height, .. } => {
                if width <= 0 || height <= 0 {
                    return Err(WatchError::invalid(
                        "region",
                        format!("{width}x{height} has a non-positive side"),
                    ));
                }
                if width < MIN_REGION_SIDE || height < MIN_REGION_SIDE {
                    return Err(WatchError::invalid(
                        "region",
                        format!("{width}x{height} is smaller than {MIN_REGION_SIDE}x{MIN_REGION_SIDE}"),
                    ));
                }
                Ok(())
            }
            CaptureTarget::Window { id } => {
                if id == 0 {
                    return Err(WatchError::invalid("window", "handle 0 is not a window"));
                }
                Ok(())
            }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            CaptureTarget::Region { .. } => "region",
            CaptureTarget::Window { .. } => "window",
        }
    }
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTarget::Region {
                left,
                top,
                width,
                height,
            } => write!(f, "region left={left} top={top} w={width} h={height}"),
            CaptureTarget::Window { id } => write!(f, "window #{id}"),
        }
    }
}

/// Parses `LEFT,TOP,WIDTH,HEIGHT` as typed on the command line.
impl FromStr for CaptureTarget {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|err| WatchError::invalid("region", format!("'{s}': {err}")))?;

        match parts.as_slice() {
            [left, top, width, height] => Ok(CaptureTarget::Region {
                left: *left,
                top: *top,
                width: *width,
                height: *height,
            }),
            _ => Err(WatchError::invalid(
                "region",
                format!("'{s}' must be LEFT,TOP,WIDTH,HEIGHT"),
            )),
        }
    }
}
