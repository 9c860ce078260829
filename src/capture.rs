use anyhow::{anyhow, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use xcap::{Monitor, Window};

use crate::error::WatchError;
use crate::watcher::{CaptureTarget, FrameSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: u32,
    pub title: String,
    pub app_name: String,
}

/// Captures regions and windows through the platform screen APIs.
pub struct ScreenCapture;

impl FrameSource for ScreenCapture {
    fn capture(&self, target: &CaptureTarget) -> Result<DynamicImage, WatchError> {
        match *target {
            CaptureTarget::Region {
                left,
                top,
                width,
                height,
            } => capture_region(left, top, width, height),
            CaptureTarget::Window { id } => capture_window(id),
        }
    }
}

/// Grabs the monitor under the region's top-left corner and crops to it.
///
/// Monitor images may be in physical pixels while coordinates are logical,
/// so offsets are scaled by the ratio between the two.
pub fn capture_region(
    left: i32,
    top: i32,
    width: i32,
    height: i32,
) -> Result<DynamicImage, WatchError> {
    let monitor = Monitor::from_point(left, top).map_err(|err| {
        WatchError::CaptureUnavailable(format!("no monitor at ({left}, {top}): {err}"))
    })?;
    let shot = monitor
        .capture_image()
        .map_err(|err| WatchError::CaptureUnavailable(format!("screen grab failed: {err}")))?;

    let scale = f64::from(shot.width()) / f64::from(monitor.width().max(1));
    let offset_x = scaled(left - monitor.x(), scale);
    let offset_y = scaled(top - monitor.y(), scale);
    let crop_w = scaled(width, scale).min(shot.width().saturating_sub(offset_x));
    let crop_h = scaled(height, scale).min(shot.height().saturating_sub(offset_y));

    if crop_w == 0 || crop_h == 0 {
        return Err(WatchError::CaptureUnavailable(format!(
            "region {width}x{height} at ({left}, {top}) is off screen"
        )));
    }

    Ok(DynamicImage::ImageRgba8(shot).crop_imm(offset_x, offset_y, crop_w, crop_h))
}

/// Captures a window by id even when it is partially covered.
pub fn capture_window(id: u32) -> Result<DynamicImage, WatchError> {
    let windows = Window::all()
        .map_err(|err| WatchError::CaptureUnavailable(format!("window enumeration failed: {err}")))?;
    let window = windows
        .into_iter()
        .find(|window| window.id() == id)
        .ok_or_else(|| WatchError::CaptureUnavailable(format!("window #{id} is gone")))?;

    if window.is_minimized() {
        return Err(WatchError::CaptureUnavailable(format!(
            "'{}' is minimized; keep the window visible",
            window.title()
        )));
    }

    let image = window.capture_image().map_err(|err| {
        WatchError::CaptureUnavailable(format!(
            "capture of '{}' failed ({err}); try keeping the window visible or disabling GPU acceleration",
            window.title()
        ))
    })?;
    Ok(DynamicImage::ImageRgba8(image))
}

/// Visible, titled windows with duplicate titles removed, in stacking order.
pub fn list_windows() -> Result<Vec<WindowInfo>> {
    let windows = Window::all().map_err(|err| anyhow!("window enumeration failed: {err}"))?;
    let visible = windows
        .iter()
        .filter(|window| !window.is_minimized() && !window.title().trim().is_empty())
        .map(|window| WindowInfo {
            id: window.id(),
            title: window.title().to_string(),
            app_name: window.app_name().to_string(),
        });
    Ok(dedupe_by_title(visible))
}

/// First visible window whose title contains `fragment`, ignoring case.
pub fn find_window(fragment: &str) -> Result<Option<WindowInfo>> {
    Ok(first_match(&list_windows()?, fragment).cloned())
}

fn dedupe_by_title(windows: impl IntoIterator<Item = WindowInfo>) -> Vec<WindowInfo> {
    let mut seen = std::collections::HashSet::new();
    windows
        .into_iter()
        .filter(|window| seen.insert(window.title.clone()))
        .collect()
}

fn first_match<'a>(windows: &'a [WindowInfo], fragment: &str) -> Option<&'a WindowInfo> {
    let fragment = fragment.trim().to_lowercase();
    if fragment.is_empty() {
        return None;
    }
    windows
        .iter()
        .find(|window| window.title.to_lowercase().contains(&fragment))
}

fn scaled(value: i32, scale: f64) -> u32 {
    (f64::from(value.max(0)) * scale).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(id: u32, title: &str) -> WindowInfo {
        WindowInfo {
            id,
            title: title.into(),
            app_name: "app".into(),
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let out = dedupe_by_title(vec![
            win(1, "ChatGPT - Chrome"),
            win(2, "Terminal"),
            win(3, "ChatGPT - Chrome"),
        ]);
        assert_eq!(out.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn first_match_is_case_insensitive() {
        let windows = vec![win(1, "Notes"), win(2, "ChatGPT - Chrome"), win(3, "chatgpt docs")];
        assert_eq!(first_match(&windows, "  CHATGPT ").map(|w| w.id), Some(2));
        assert_eq!(first_match(&windows, "slack"), None);
    }

    #[test]
    fn empty_fragment_matches_nothing() {
        let windows = vec![win(1, "Notes")];
        assert_eq!(first_match(&windows, "   "), None);
    }

    #[test]
    fn scaled_clamps_negative_offsets() {
        assert_eq!(scaled(-40, 1.0), 0);
        assert_eq!(scaled(100, 2.0), 200);
        assert_eq!(scaled(3, 1.5), 5);
    }
}
