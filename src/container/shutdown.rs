//! Socket-based shutdown listener.
//!
//! # Protocol
//! ```text
//! accept → read one line (bounded, timed) → compare to token byte-for-byte
//!     match    → return from wait()
//!     mismatch → log, close connection, keep accepting
//! ```
//!
//! The line ends at `\n` (an `\r` before it is dropped) or at end of stream.
//! Nothing else is trimmed. [`ShutdownListener::stop`] releases a blocked
//! [`ShutdownListener::wait`] deterministically; the listening socket is
//! closed when `wait` returns.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// What a [`ShutdownListener::wait`] call listens for.
#[derive(Debug, Clone)]
pub struct AwaitSettings {
    pub address: String,
    /// `None`: no socket, wait for [`ShutdownListener::stop`] only.
    pub port: Option<u16>,
    pub token: String,
    pub read_timeout: Duration,
    pub line_limit: usize,
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitOutcome {
    /// The shutdown token arrived over the socket.
    Token,
    /// [`ShutdownListener::stop`] was called.
    Stopped,
}

pub struct ShutdownListener {
    bound: Mutex<Option<TcpListener>>,
    stop_tx: watch::Sender<bool>,
}

impl ShutdownListener {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            bound: Mutex::new(None),
            stop_tx,
        }
    }

    /// Binds ahead of [`wait`](Self::wait) and returns the local address.
    /// Port 0 picks a free port.
    pub async fn bind(&self, address: &str, port: u16) -> io::Result<SocketAddr> {
        let mut bound = self.bound.lock().await;
        if let Some(listener) = bound.as_ref() {
            return listener.local_addr();
        }
        let listener = TcpListener::bind((address, port)).await?;
        let local = listener.local_addr()?;
        info!(address = %local, "Shutdown listener bound");
        *bound = Some(listener);
        Ok(local)
    }

    /// Releases any current or future `wait` until [`rearm`](Self::rearm).
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Allows `wait` to block again after a `stop`.
    pub fn rearm(&self) {
        self.stop_tx.send_replace(false);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Blocks until the token arrives or [`stop`](Self::stop) is called.
    pub async fn wait(&self, settings: &AwaitSettings) -> io::Result<AwaitOutcome> {
        let mut stop_rx = self.stop_tx.subscribe();

        let Some(port) = settings.port else {
            stopped(&mut stop_rx).await;
            return Ok(AwaitOutcome::Stopped);
        };

        let pre_bound = self.bound.lock().await.take();
        let listener = match pre_bound {
            Some(listener) => listener,
            None => {
                let listener = TcpListener::bind((settings.address.as_str(), port)).await?;
                info!(address = %listener.local_addr()?, "Shutdown listener bound");
                listener
            }
        };

        loop {
            let accepted = tokio::select! {
                _ = stopped(&mut stop_rx) => {
                    debug!("Await stopped");
                    return Ok(AwaitOutcome::Stopped);
                }
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Shutdown accept failed");
                    continue;
                }
            };
            debug!(%peer, "Shutdown connection accepted");

            // A silent client must not hold off stop.
            let read = tokio::select! {
                _ = stopped(&mut stop_rx) => {
                    debug!(%peer, "Await stopped during read");
                    return Ok(AwaitOutcome::Stopped);
                }
                read = read_line(stream, settings.line_limit, settings.read_timeout) => read,
            };
            match read {
                Ok(line) if line == settings.token.as_bytes() => {
                    info!(%peer, "Shutdown token received");
                    return Ok(AwaitOutcome::Token);
                }
                Ok(line) => {
                    warn!(%peer, bytes = line.len(), "Invalid shutdown command ignored");
                }
                Err(e) => {
                    warn!(%peer, error = %e, "Shutdown connection read failed");
                }
            }
        }
    }
}

impl Default for ShutdownListener {
    fn default() -> Self {
        Self::new()
    }
}

async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            // Sender gone: nobody can stop us any more.
            std::future::pending::<()>().await;
        }
    }
}

async fn read_line(stream: TcpStream, limit: usize, timeout: Duration) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(stream.take(limit as u64));
    let mut line = Vec::new();
    tokio::time::timeout(timeout, reader.read_until(b'\n', &mut line))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "shutdown command timed out"))??;

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    fn settings(port: u16) -> AwaitSettings {
        AwaitSettings {
            address: "127.0.0.1".into(),
            port: Some(port),
            token: "SHUTDOWN".into(),
            read_timeout: Duration::from_secs(2),
            line_limit: 64,
        }
    }

    async fn send(addr: SocketAddr, payload: &[u8]) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(payload).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn token_with_crlf_is_accepted() {
        let listener = Arc::new(ShutdownListener::new());
        let addr = listener.bind("127.0.0.1", 0).await.unwrap();
        let waiter = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.wait(&settings(addr.port())).await })
        };

        send(addr, b"SHUTDOWN\r\n").await;
        assert_eq!(waiter.await.unwrap().unwrap(), AwaitOutcome::Token);
    }

    #[tokio::test]
    async fn token_is_case_sensitive_and_untrimmed() {
        let listener = Arc::new(ShutdownListener::new());
        let addr = listener.bind("127.0.0.1", 0).await.unwrap();
        let waiter = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.wait(&settings(addr.port())).await })
        };

        send(addr, b"shutdown\n").await;
        send(addr, b" SHUTDOWN\n").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        send(addr, b"SHUTDOWN\n").await;
        assert_eq!(waiter.await.unwrap().unwrap(), AwaitOutcome::Token);
    }

    #[tokio::test]
    async fn stop_unblocks_wait() {
        let listener = Arc::new(ShutdownListener::new());
        let addr = listener.bind("127.0.0.1", 0).await.unwrap();
        let waiter = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.wait(&settings(addr.port())).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        listener.stop();
        assert_eq!(waiter.await.unwrap().unwrap(), AwaitOutcome::Stopped);

        // The socket went away with the wait.
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn stop_during_silent_read_unblocks_wait() {
        let listener = Arc::new(ShutdownListener::new());
        let addr = listener.bind("127.0.0.1", 0).await.unwrap();
        let mut s = settings(addr.port());
        s.read_timeout = Duration::from_secs(30);
        let waiter = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.wait(&s).await })
        };

        let _silent = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        listener.stop();

        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stop does not wait out the read timeout")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, AwaitOutcome::Stopped);
    }

    #[tokio::test]
    async fn no_port_waits_for_stop_only() {
        let listener = ShutdownListener::new();
        listener.stop();
        let mut s = settings(0);
        s.port = None;
        assert_eq!(listener.wait(&s).await.unwrap(), AwaitOutcome::Stopped);
    }
}
