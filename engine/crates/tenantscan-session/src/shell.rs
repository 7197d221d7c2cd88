//! Persistent interactive shell session
//!
//! One long-lived shell process is shared by every shell scan. Requests and
//! responses travel over the same ordered byte stream, so the whole round
//! trip runs under a single mutex.

use crate::framing::{find, FrameDecoder, Framing};
use std::process::Stdio;
use std::time::Duration;
use tenantscan_common::{ShellConfig, ShellSetupStep};
use tenantscan_core::{CancellationToken, Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace};

const BACKEND: &str = "shell";
const READ_CHUNK: usize = 4096;
/// How long a shell that closed its stdout gets to exit before it is reported
/// without a code
const EXIT_GRACE: Duration = Duration::from_secs(2);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle on the interactive shell
pub struct ShellSession {
    io: Mutex<ShellIo>,
    framing: Framing,
    heartbeat_marker: String,
    timeout: Duration,
}

struct ShellIo {
    reader: BoxedReader,
    writer: BoxedWriter,
    decoder: FrameDecoder,
    /// Frames still owed by requests that timed out
    abandoned: usize,
    child: Option<Child>,
}

impl ShellSession {
    /// Wrap an existing byte stream pair (used for test doubles)
    pub fn from_io<R, W>(reader: R, writer: W, config: &ShellConfig, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_child(reader, writer, config, timeout, None)
    }

    fn with_child<R, W>(
        reader: R,
        writer: W,
        config: &ShellConfig,
        timeout: Duration,
        child: Option<Child>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let framing = Framing::new(&config.start_marker, &config.end_marker);
        Self {
            io: Mutex::new(ShellIo {
                reader: Box::new(reader),
                writer: Box::new(writer),
                decoder: FrameDecoder::new(framing.clone()),
                abandoned: 0,
                child,
            }),
            framing,
            heartbeat_marker: config.heartbeat_marker.clone(),
            timeout,
        }
    }

    /// Spawn the configured shell with piped stdin/stdout
    pub fn spawn(config: &ShellConfig, timeout: Duration) -> Result<Self> {
        info!("Starting shell: {} {}", config.program, config.args.join(" "));

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::SessionCreationFailed {
                backend: BACKEND,
                reason: format!("cannot start {}: {}", config.program, e),
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(Error::SessionCreationFailed {
                    backend: BACKEND,
                    reason: String::from("shell pipes unavailable"),
                })
            }
        };

        Ok(Self::with_child(stdout, stdin, config, timeout, Some(child)))
    }

    /// Run the login / module import steps. Each step must print its
    /// expected text before the command timeout elapses.
    pub async fn bootstrap(&self, steps: &[ShellSetupStep]) -> Result<()> {
        let mut io = self.io.lock().await;

        for step in steps {
            debug!("Shell setup: {}", step.command);
            let request = format!("{}\n", step.command);
            io.write_request(&request).await.map_err(creation_failed)?;

            if step.expect.is_empty() {
                continue;
            }

            let outcome = timeout(self.timeout, io.read_until(step.expect.as_bytes())).await;
            match outcome {
                Ok(Ok(_)) => debug!("Shell setup step matched {:?}", step.expect),
                Ok(Err(e)) => return Err(creation_failed(e)),
                Err(_) => {
                    return Err(Error::SessionCreationFailed {
                        backend: BACKEND,
                        reason: format!(
                            "expected {:?} after `{}` within {}s",
                            step.expect,
                            step.command,
                            self.timeout.as_secs()
                        ),
                    })
                }
            }
        }

        Ok(())
    }

    /// Verify liveness by echoing the heartbeat marker
    pub async fn check_session(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        let request = format!("echo '{}'\n", self.heartbeat_marker);
        let expected = self.heartbeat_marker.as_bytes();

        let outcome = timeout(self.timeout, async {
            io.write_request(&request).await?;
            io.read_until(expected).await
        })
        .await;

        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::SessionCheckFailed {
                backend: BACKEND,
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::SessionCheckFailed {
                backend: BACKEND,
                reason: String::from("heartbeat not echoed; the shell may have been killed"),
            }),
        }
    }

    /// Execute one command and return the bytes it printed.
    ///
    /// Cancellation is honoured only while waiting for the session lock;
    /// once the request is written the call runs to completion or timeout.
    pub async fn run(&self, command: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let mut io = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            io = self.io.lock() => io,
        };

        debug!("Running shell command: {}", command);
        let request = self.framing.wrap(command);
        let outcome = timeout(self.timeout, io.round_trip(&request)).await;

        match outcome {
            Ok(result) => {
                if let Ok(payload) = &result {
                    trace!("Shell result: {:?}", String::from_utf8_lossy(payload));
                }
                result
            }
            Err(_) => {
                io.abandoned += 1;
                Err(Error::CommandTimeout {
                    backend: BACKEND,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

impl ShellIo {
    async fn write_request(&mut self, request: &str) -> Result<()> {
        self.writer.write_all(request.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read one chunk into the decoder. End of stream means the shell died.
    async fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::ProcessTerminated {
                code: self.exit_code().await,
            });
        }
        self.decoder.push(&chunk[..n]);
        Ok(())
    }

    async fn round_trip(&mut self, request: &str) -> Result<Vec<u8>> {
        self.write_request(request).await?;

        loop {
            while let Some(frame) = self.decoder.next_frame() {
                if self.abandoned > 0 {
                    self.abandoned -= 1;
                    debug!("Discarding response of a timed out shell command");
                    continue;
                }
                return Ok(frame);
            }
            self.fill().await?;
        }
    }

    /// Read until `needle` has been seen, consuming everything up to and
    /// including it. Used by the handshake, outside the framed protocol.
    async fn read_until(&mut self, needle: &[u8]) -> Result<Vec<u8>> {
        loop {
            if let Some(at) = find(self.decoder.pending(), needle) {
                let consumed = at + needle.len();
                let mut taken = self.decoder.take_pending();
                let rest = taken.split_off(consumed);
                self.decoder.push(&rest);
                return Ok(taken);
            }
            self.fill().await?;
        }
    }

    /// Reap the child once its stdout has closed
    async fn exit_code(&mut self) -> Option<i32> {
        let child = self.child.as_mut()?;
        match timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            _ => None,
        }
    }
}

fn creation_failed(e: Error) -> Error {
    Error::SessionCreationFailed {
        backend: BACKEND,
        reason: e.to_string(),
    }
}
