//! Monitor enumeration for capture.

use std::fmt;

use replay_ipc::Resolution;
use tracing::{debug, instrument};
use xcap::Monitor;

use crate::error::CaptureError;
use crate::CaptureResult;

/// Monitor information for capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Position in enumeration order.
    pub index: usize,

    /// Backend monitor identifier.
    pub id: u32,

    /// Monitor name.
    pub name: String,

    /// Monitor origin in desktop coordinates.
    pub origin: (i32, i32),

    /// Monitor size in pixels.
    pub resolution: Resolution,

    /// Whether this is the primary monitor.
    pub is_primary: bool,
}

impl MonitorInfo {
    fn from_monitor(index: usize, monitor: &Monitor) -> Self {
        Self {
            index,
            id: monitor.id(),
            name: monitor.name().to_string(),
            origin: (monitor.x(), monitor.y()),
            resolution: Resolution::new(monitor.width(), monitor.height()),
            is_primary: monitor.is_primary(),
        }
    }
}

impl fmt::Display for MonitorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} at ({}, {})",
            self.index, self.name, self.resolution, self.origin.0, self.origin.1
        )?;
        if self.is_primary {
            f.write_str(" (Primary)")?;
        }
        Ok(())
    }
}

/// Enumerate all available monitors.
#[instrument(name = "enumerate_monitors")]
pub fn enumerate_monitors() -> CaptureResult<Vec<MonitorInfo>> {
    let monitors = Monitor::all()?;
    let infos: Vec<MonitorInfo> = monitors
        .iter()
        .enumerate()
        .map(|(index, monitor)| MonitorInfo::from_monitor(index, monitor))
        .collect();

    debug!(count = infos.len(), "Enumerated monitors");
    Ok(infos)
}

/// Open a monitor by enumeration index, or the primary monitor when `index` is None.
pub(crate) fn open_monitor(index: Option<usize>) -> CaptureResult<(MonitorInfo, Monitor)> {
    let monitors = Monitor::all()?;
    let infos: Vec<MonitorInfo> = monitors
        .iter()
        .enumerate()
        .map(|(i, monitor)| MonitorInfo::from_monitor(i, monitor))
        .collect();

    let chosen = pick_monitor(&infos, index)?;
    let info = infos[chosen].clone();
    let monitor = monitors
        .into_iter()
        .nth(chosen)
        .ok_or_else(|| CaptureError::SourceNotFound(format!("monitor {chosen}")))?;

    Ok((info, monitor))
}

/// Resolve which monitor to use. Falls back to the first monitor if none is marked primary.
fn pick_monitor(infos: &[MonitorInfo], index: Option<usize>) -> CaptureResult<usize> {
    if infos.is_empty() {
        return Err(CaptureError::NoMonitors);
    }

    match index {
        Some(i) if i < infos.len() => Ok(i),
        Some(i) => Err(CaptureError::SourceNotFound(format!(
            "monitor {i} (found {})",
            infos.len()
        ))),
        None => Ok(infos.iter().position(|m| m.is_primary).unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(index: usize, is_primary: bool) -> MonitorInfo {
        MonitorInfo {
            index,
            id: index as u32 + 100,
            name: format!("DP-{index}"),
            origin: (index as i32 * 1920, 0),
            resolution: Resolution::new(1920, 1080),
            is_primary,
        }
    }

    #[test]
    fn test_pick_monitor_prefers_primary() {
        let infos = vec![info(0, false), info(1, true), info(2, false)];
        assert_eq!(pick_monitor(&infos, None).unwrap(), 1);
    }

    #[test]
    fn test_pick_monitor_without_primary_uses_first() {
        let infos = vec![info(0, false), info(1, false)];
        assert_eq!(pick_monitor(&infos, None).unwrap(), 0);
    }

    #[test]
    fn test_pick_monitor_by_index() {
        let infos = vec![info(0, true), info(1, false), info(2, false)];
        assert_eq!(pick_monitor(&infos, Some(2)).unwrap(), 2);
        assert!(matches!(
            pick_monitor(&infos, Some(3)),
            Err(CaptureError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_pick_monitor_empty() {
        assert!(matches!(
            pick_monitor(&[], None),
            Err(CaptureError::NoMonitors)
        ));
    }

    #[test]
    fn test_display() {
        let text = info(1, true).to_string();
        assert_eq!(text, "[1] DP-1 1920x1080 at (1920, 0) (Primary)");
    }
}
