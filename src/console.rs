use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// True for a line whose first non-blank character is `q`.
pub fn is_quit_command(line: &str) -> bool {
    line.trim_start().starts_with('q')
}

/// Read stdin on a detached thread and send one message when the user
/// types `q`. The thread is left blocked in `read_line` at exit; it never
/// holds the process open.
pub fn spawn_quit_listener() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);

    let spawned = thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if is_quit_command(&line) => {
                        let _ = tx.blocking_send(());
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("stdin read error: {}", e);
                        return;
                    }
                }
            }
            log::debug!("stdin closed");
        });

    if let Err(e) = spawned {
        log::warn!("Failed to spawn console listener: {}", e);
    }
    rx
}

/// Run `on_interrupt` if `signal` fires while the session winds down.
/// Stream joins block the main task, so this runs as its own task.
pub fn spawn_interrupt_guard<S, F>(signal: S, on_interrupt: F) -> JoinHandle<()>
where
    S: Future<Output = io::Result<()>> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                log::warn!("Received Ctrl+C during shutdown, exiting");
                on_interrupt();
            }
            Err(e) => log::warn!("Failed to listen for Ctrl+C: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    #[test]
    fn test_quit_command() {
        assert!(is_quit_command("q"));
        assert!(is_quit_command("  quit"));
        assert!(!is_quit_command(""));
        assert!(!is_quit_command("x q"));
        assert!(!is_quit_command("Q"));
    }

    #[tokio::test]
    async fn test_interrupt_guard_fires_on_signal() {
        let (tx, rx) = oneshot::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let guard = spawn_interrupt_guard(
            async move { rx.await.map_err(io::Error::other) },
            move || flag.store(true, Ordering::SeqCst),
        );
        assert!(!fired.load(Ordering::SeqCst));

        tx.send(()).unwrap();
        guard.await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_interrupt_guard_ignores_listener_error() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        spawn_interrupt_guard(
            async { Err(io::Error::other("no signal handler")) },
            move || flag.store(true, Ordering::SeqCst),
        )
        .await
        .unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }
}
