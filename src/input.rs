// breadcrumbs/src/input.rs

//! Line input shared by every profile. Stdin is read on its own thread and
//! Ctrl-C arrives on the same channel, so a blocked prompt wakes up with
//! [`CrumbError::Interrupted`] instead of killing the process.

use std::{
    io::{self, BufRead},
    sync::{
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::{CrumbError, Result};

#[derive(Debug)]
enum Feed {
    Line(String),
    Eof,
    Interrupt,
}

struct LineFeed {
    tx: UnboundedSender<Feed>,
    rx: Mutex<UnboundedReceiver<Feed>>,
    closed: AtomicBool,
}

static FEED: OnceLock<LineFeed> = OnceLock::new();

fn feed() -> &'static LineFeed {
    FEED.get_or_init(|| {
        let (tx, rx) = unbounded_channel();
        let reader = tx.clone();
        let spawned = thread::Builder::new().name("bc-stdin".into()).spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if reader.send(Feed::Line(line)).is_err() { return; }
            }
            let _ = reader.send(Feed::Eof);
        });
        if let Err(e) = spawned { tracing::error!(error = %e, "stdin reader not started"); }
        LineFeed { tx, rx: Mutex::new(rx), closed: AtomicBool::new(false) }
    })
}

/// Forward Ctrl-C into the line feed from a background runtime.
pub fn watch_interrupts() -> io::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let tx = feed().tx.clone();
    thread::Builder::new().name("bc-signals".into()).spawn(move || {
        rt.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received");
                if tx.send(Feed::Interrupt).is_err() { break; }
            }
        })
    })?;
    Ok(())
}

/// Next line from stdin without its newline. End of input and Ctrl-C both
/// surface as [`CrumbError::Interrupted`].
pub fn read_line() -> Result<String> {
    let f = feed();
    if f.closed.load(Ordering::Acquire) { return Err(CrumbError::Interrupted); }
    match f.rx.lock().blocking_recv() {
        Some(Feed::Line(l)) => Ok(l),
        Some(Feed::Eof) | None => {
            f.closed.store(true, Ordering::Release);
            Err(CrumbError::Interrupted)
        }
        Some(Feed::Interrupt) => Err(CrumbError::Interrupted),
    }
}
