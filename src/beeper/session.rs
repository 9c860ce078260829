use anyhow::{Context, Result};
use crossterm::terminal;
use portable_pty::{native_pty_system, CommandBuilder, PtyPair, PtySize};
use std::io::{self, IsTerminal, Read, Write};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread;
use std::time::{Duration, Instant};

use super::{BeepPlayer, BeepScheduler};
use crate::settings::{BeepSettings, SettingsStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const SCHEDULER_STEP: Duration = Duration::from_millis(50);
const RELOAD_INTERVAL: Duration = Duration::from_secs(1);
const READ_BUF_SIZE: usize = 4096;

pub struct ShellOptions {
    /// Program and arguments; empty means the user's shell.
    pub command: Vec<String>,
}

/// Runs the command in a PTY, ticking while it prints and chiming when it
/// goes quiet. Returns the child's exit code.
pub fn run_shell(
    options: ShellOptions,
    store: Arc<SettingsStore>,
    player: BeepPlayer,
) -> Result<i32> {
    run_session(options, store, player, io::stdout(), true)
}

/// `interactive` puts the terminal in raw mode and forwards stdin.
fn run_session<W>(
    options: ShellOptions,
    store: Arc<SettingsStore>,
    player: BeepPlayer,
    output: W,
    interactive: bool,
) -> Result<i32>
where
    W: Write + Send + 'static,
{
    let settings = Arc::new(Mutex::new(store.beep()));
    let activity = Arc::new(Mutex::new(BeepScheduler::new()));
    let alive = Arc::new(AtomicBool::new(true));

    let (cols, rows) = terminal::size().unwrap_or((80, 24));
    let pair = open_pty(rows, cols)?;
    let command = build_command(&options.command);
    log_debug!("spawning {:?} in a {}x{} pty", options.command, cols, rows);

    let mut child = pair
        .slave
        .spawn_command(command)
        .context("Failed to spawn shell")?;
    // The reader only sees EOF once every slave handle is closed
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .context("Failed to open PTY reader")?;
    let writer = pair
        .master
        .take_writer()
        .context("Failed to open PTY writer")?;

    let raw_mode = interactive.then(RawModeGuard::enable);

    let reader_thread = spawn_named("pty-reader", {
        let activity = activity.clone();
        move || mirror_output(reader, output, activity)
    })?;
    if interactive {
        spawn_named("pty-writer", move || forward_input(writer))?;
    } else {
        drop(writer);
    }
    let scheduler_thread = spawn_named("beep-scheduler", {
        let activity = activity.clone();
        let settings = settings.clone();
        let alive = alive.clone();
        move || schedule_beeps(activity, settings, alive, player)
    })?;
    spawn_named("settings-reload", {
        let settings = settings.clone();
        let alive = alive.clone();
        move || reload_settings(store, settings, alive)
    })?;

    let status = child.wait().context("Failed to wait for shell")?;

    // The reader hits EOF once the child's last output has been mirrored
    drop(pair.master);
    if reader_thread.join().is_err() {
        log_warn!("pty reader panicked");
    }
    alive.store(false, Ordering::SeqCst);

    let _ = scheduler_thread.join();
    drop(raw_mode);

    log_debug!("shell exited with {}", status.exit_code());
    Ok(i32::try_from(status.exit_code()).unwrap_or(1))
}

fn open_pty(rows: u16, cols: u16) -> Result<PtyPair> {
    native_pty_system()
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .context("Failed to open PTY")
}

fn default_shell() -> String {
    if cfg!(windows) {
        "powershell.exe".to_string()
    } else {
        std::env::var("SHELL")
            .ok()
            .filter(|shell| !shell.trim().is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

fn build_command(command: &[String]) -> CommandBuilder {
    let Some((program, args)) = command.split_first() else {
        return CommandBuilder::new(default_shell());
    };
    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd
}

fn spawn_named<F>(name: &str, f: F) -> Result<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .with_context(|| format!("Failed to spawn {name} thread"))
}

fn mirror_output<W: Write>(
    mut reader: Box<dyn Read + Send>,
    mut output: W,
    activity: Arc<Mutex<BeepScheduler>>,
) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if output.write_all(&buf[..n]).and_then(|_| output.flush()).is_err() {
                    break;
                }
                activity
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record_output(Instant::now());
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            // EIO once the child side is gone
            Err(_) => break,
        }
    }
}

fn forward_input(mut writer: Box<dyn Write + Send>) {
    let mut stdin = io::stdin();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if writer.write_all(&buf[..n]).and_then(|_| writer.flush()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

fn schedule_beeps(
    activity: Arc<Mutex<BeepScheduler>>,
    settings: Arc<Mutex<BeepSettings>>,
    alive: Arc<AtomicBool>,
    player: BeepPlayer,
) {
    while alive.load(Ordering::SeqCst) {
        let current = settings.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let action = activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .poll(Instant::now(), &current);
        if let Some(action) = action {
            player.play(action, &current);
        }
        thread::sleep(SCHEDULER_STEP);
    }
}

fn reload_settings(
    store: Arc<SettingsStore>,
    settings: Arc<Mutex<BeepSettings>>,
    alive: Arc<AtomicBool>,
) {
    let mut last_seen = store.modified();
    while alive.load(Ordering::SeqCst) {
        thread::sleep(RELOAD_INTERVAL);
        let modified = store.modified();
        if modified == last_seen {
            continue;
        }
        last_seen = modified;
        match store.reload() {
            Ok(()) => {
                *settings.lock().unwrap_or_else(PoisonError::into_inner) = store.beep();
                log_debug!("beep settings reloaded");
            }
            Err(err) => log_warn!("keeping previous beep settings: {err:#}"),
        }
    }
}

/// Puts an interactive terminal into raw mode and restores it on drop.
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        let enabled = io::stdin().is_terminal() && terminal::enable_raw_mode().is_ok();
        Self { enabled }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = terminal::disable_raw_mode();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_uses_a_shell() {
        assert!(!default_shell().is_empty());
        let cmd = build_command(&[]);
        let argv = cmd.get_argv();
        assert_eq!(argv.len(), 1);
        assert_eq!(argv[0].to_string_lossy(), default_shell());
    }

    #[test]
    fn explicit_command_keeps_its_arguments() {
        let command = ["cargo", "build", "--release"].map(String::from);
        let cmd = build_command(&command);
        let argv: Vec<String> = cmd
            .get_argv()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(argv, vec!["cargo", "build", "--release"]);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn muted_store(dir: &tempfile::TempDir) -> Arc<SettingsStore> {
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        store.set("beep.mute", "true").unwrap();
        Arc::new(store)
    }

    fn run_captured(command: &[&str]) -> (i32, String) {
        let dir = tempfile::tempdir().unwrap();
        let captured = Captured::default();
        let options = ShellOptions {
            command: command.iter().map(|arg| arg.to_string()).collect(),
        };
        let code = run_session(
            options,
            muted_store(&dir),
            BeepPlayer::default(),
            captured.clone(),
            false,
        )
        .unwrap();
        let text = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
        (code, text)
    }

    #[cfg(unix)]
    #[test]
    fn output_printed_just_before_exit_is_mirrored() {
        let (code, text) = run_captured(&["sh", "-c", "printf 'first\\nlast-line'"]);
        assert_eq!(code, 0);
        assert!(text.contains("first"), "got {text:?}");
        assert!(text.contains("last-line"), "got {text:?}");
    }

    #[cfg(unix)]
    #[test]
    fn child_exit_code_is_returned() {
        let (code, _) = run_captured(&["sh", "-c", "exit 3"]);
        assert_eq!(code, 3);
    }
}
