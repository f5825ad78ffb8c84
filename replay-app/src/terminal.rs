//! Terminal control surface: raw-mode key input and a one-line live status.

use std::io::{self, Stderr, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};
use replay_engine::{ControlSurface, Preview, SurfaceError};
use replay_ipc::KeyCommand;
use tracing::{debug, warn};

/// Minimum time between status line redraws.
pub const STATUS_REDRAW_INTERVAL: Duration = Duration::from_millis(250);

/// Back-to-back input failures after which the terminal is treated as gone.
pub const MAX_INPUT_ERRORS: u32 = 10;

/// Counts consecutive terminal input failures.
#[derive(Debug, Default)]
struct InputErrors {
    consecutive: u32,
}

impl InputErrors {
    fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Map a read failure to a surface error, giving up once failures keep repeating.
    fn record(&mut self, err: io::Error) -> SurfaceError {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= MAX_INPUT_ERRORS {
            warn!(
                errors = self.consecutive,
                "Terminal input keeps failing, closing: {}", err
            );
            SurfaceError::Closed
        } else {
            SurfaceError::Io(err)
        }
    }
}

/// Reads clip/quit keys from the terminal and draws the status line on stderr.
///
/// Raw mode is enabled for the lifetime of the surface.
pub struct TerminalSurface {
    clip_key: char,
    quit_key: char,
    out: Stderr,
    last_draw: Option<Instant>,
    last_frames: u64,
    fps: f32,
    input_errors: InputErrors,
}

impl TerminalSurface {
    pub fn new(clip_key: char, quit_key: char) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!("Terminal raw mode enabled");

        Ok(Self {
            clip_key,
            quit_key,
            out: io::stderr(),
            last_draw: None,
            last_frames: 0,
            fps: 0.0,
            input_errors: InputErrors::default(),
        })
    }

    fn draw(&mut self, line: &str) -> io::Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        self.out.flush()
    }
}

impl ControlSurface for TerminalSurface {
    fn poll_command(&mut self, timeout: Duration) -> Result<Option<KeyCommand>, SurfaceError> {
        match read_command(timeout, self.clip_key, self.quit_key) {
            Ok(command) => {
                self.input_errors.reset();
                Ok(command)
            }
            Err(e) => Err(self.input_errors.record(e)),
        }
    }

    fn present(&mut self, preview: &Preview<'_>) -> Result<(), SurfaceError> {
        let now = Instant::now();
        if let Some(last) = self.last_draw {
            let elapsed = now.duration_since(last);
            if elapsed < STATUS_REDRAW_INTERVAL {
                return Ok(());
            }
            let frames = preview.frames_captured.saturating_sub(self.last_frames);
            self.fps = frames as f32 / elapsed.as_secs_f32();
        }
        self.last_draw = Some(now);
        self.last_frames = preview.frames_captured;

        let line = status_line(preview, self.fps, self.clip_key, self.quit_key);
        self.draw(&line)?;
        Ok(())
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine));
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

fn read_command(
    timeout: Duration,
    clip_key: char,
    quit_key: char,
) -> io::Result<Option<KeyCommand>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }

    match event::read()? {
        Event::Key(key) => Ok(map_key(&key, clip_key, quit_key)),
        _ => Ok(None),
    }
}

/// Translate a key press into a command. Keys are case-insensitive; Ctrl-C quits.
pub fn map_key(key: &KeyEvent, clip_key: char, quit_key: char) -> Option<KeyCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyCommand::Quit)
        }
        KeyCode::Char(c) if c.eq_ignore_ascii_case(&quit_key) => Some(KeyCommand::Quit),
        KeyCode::Char(c) if c.eq_ignore_ascii_case(&clip_key) => Some(KeyCommand::Clip),
        _ => None,
    }
}

/// Status line shown while capturing.
pub fn status_line(preview: &Preview<'_>, fps: f32, clip_key: char, quit_key: char) -> String {
    let total_seconds = preview.capacity as f32 / preview.target_fps.max(1) as f32;
    let fill = if preview.capacity == 0 {
        0.0
    } else {
        preview.buffered as f32 * 100.0 / preview.capacity as f32
    };

    format!(
        "[{}] {:.1}/{:.0}s buffered ({:.0}%) | {:.1} fps | {} frames | '{}' clip, '{}' quit",
        preview.state,
        preview.buffered_seconds(),
        total_seconds,
        fill,
        fps,
        preview.frames_captured,
        clip_key,
        quit_key
    )
}
