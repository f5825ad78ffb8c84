//! Instant replay screen recorder.
//!
//! Keeps the last few seconds of the screen in memory and writes them to a
//! video file when the clip key is pressed.

fn main() -> anyhow::Result<()> {
    replay_lib::run()
}
