//! One-shot delivery of an encoded record buffer to the co-resident
//! daemon, spawning it first when nothing listens on the loopback
//! address.

use std::env;
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

use ocxp_common::error::Error;

/// Launches the forwarding daemon when no instance is listening.
/// A seam so tests can substitute the process launch.
pub trait Spawn: Send + Sync {
    fn spawn(&self) -> Result<(), Error>;
}

/// Spawns a detached copy of the current executable in daemon mode,
/// with all standard streams detached.
pub struct ExecSpawner {
    amqp_url: String,
    config_path: Option<String>,
}

impl ExecSpawner {
    pub fn new(amqp_url: String, config_path: Option<String>) -> Self {
        Self {
            amqp_url,
            config_path,
        }
    }

    fn daemon_args(&self) -> Vec<String> {
        let mut args = vec![
            "--daemonize".to_string(),
            "--amqp-url".to_string(),
            self.amqp_url.clone(),
        ];
        if let Some(path) = &self.config_path {
            args.push("--config".to_string());
            args.push(path.clone());
        }
        args
    }
}

impl Spawn for ExecSpawner {
    fn spawn(&self) -> Result<(), Error> {
        let exe = env::current_exe()
            .map_err(|e| Error::spawn_failed(format!("cannot resolve own executable: {}", e)))?;
        Command::new(exe)
            .args(self.daemon_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::spawn_failed(e.to_string()))?;
        info!("spawned forwarding daemon");
        Ok(())
    }
}

pub struct SenderClient {
    listen_address: String,
    spawner: Box<dyn Spawn>,
    spawn_wait: Duration,
}

impl SenderClient {
    pub fn new(listen_address: String, spawner: Box<dyn Spawn>, spawn_wait: Duration) -> Self {
        Self {
            listen_address,
            spawner,
            spawn_wait,
        }
    }

    /// Delivers the payload with bounded effort: connect, or spawn the
    /// daemon and retry once after the spawn wait. The sender never
    /// reads a reply; a completed write plus close is success.
    pub async fn send(&self, payload: &[u8]) -> Result<(), Error> {
        if payload.is_empty() {
            debug!("empty payload, nothing to send");
            return Ok(());
        }
        let stream = match TcpStream::connect(self.listen_address.as_str()).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!("no daemon on {}: {}", self.listen_address, e);
                if let Err(e) = self.spawner.spawn() {
                    // a concurrent sender may have won the race; the
                    // retry below proves liveness either way
                    warn!("daemon spawn failed: {}", e);
                }
                sleep(self.spawn_wait).await;
                TcpStream::connect(self.listen_address.as_str())
                    .await
                    .map_err(|e| {
                        Error::connect_failed(format!(
                            "daemon did not come up on {}: {}",
                            self.listen_address, e
                        ))
                    })?
            }
        };
        self.write_payload(stream, payload).await
    }

    async fn write_payload(&self, mut stream: TcpStream, payload: &[u8]) -> Result<(), Error> {
        stream
            .write_all(payload)
            .await
            .map_err(|e| Error::write_failed(format!("payload write failed: {}", e)))?;
        // close the write side; the daemon reads to EOF
        stream
            .shutdown()
            .await
            .map_err(|e| Error::write_failed(format!("connection shutdown failed: {}", e)))?;
        trace!("sent {} bytes to {}", payload.len(), self.listen_address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    impl<S: Spawn> Spawn for Arc<S> {
        fn spawn(&self) -> Result<(), Error> {
            (**self).spawn()
        }
    }

    #[derive(Default)]
    struct NoopSpawner {
        calls: AtomicUsize,
    }

    impl Spawn for NoopSpawner {
        fn spawn(&self) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSpawner;

    impl Spawn for FailingSpawner {
        fn spawn(&self) -> Result<(), Error> {
            Err(Error::spawn_failed("executable is gone"))
        }
    }

    // binds the listener only when spawned, like the real daemon
    struct ListenerSpawner {
        addr: String,
        payload_tx: Mutex<Option<oneshot::Sender<Vec<u8>>>>,
    }

    impl Spawn for ListenerSpawner {
        fn spawn(&self) -> Result<(), Error> {
            let addr = self.addr.clone();
            let tx = self
                .payload_tx
                .lock()
                .expect("payload channel mutex")
                .take()
                .expect("spawned twice");
            tokio::spawn(async move {
                let listener = TcpListener::bind(addr.as_str()).await.unwrap();
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).await.unwrap();
                let _ = tx.send(buf);
            });
            Ok(())
        }
    }

    fn free_loopback_addr() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    #[tokio::test]
    async fn delivers_payload_to_listening_daemon() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let daemon = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let spawner = Arc::new(NoopSpawner::default());
        let client = SenderClient::new(
            addr,
            Box::new(spawner.clone()),
            Duration::from_millis(10),
        );
        client
            .send(b"state,host=h,service=s value=0i 1\n")
            .await
            .unwrap();

        assert_eq!(
            daemon.await.unwrap(),
            b"state,host=h,service=s value=0i 1\n"
        );
        // the first connect succeeded, no daemon was spawned
        assert_eq!(spawner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn spawns_daemon_and_retries_when_first_connect_misses() {
        let addr = free_loopback_addr();
        let (tx, rx) = oneshot::channel();
        let spawner = ListenerSpawner {
            addr: addr.clone(),
            payload_tx: Mutex::new(Some(tx)),
        };
        let client = SenderClient::new(addr, Box::new(spawner), Duration::from_millis(100));

        client.send(b"metric,label=a value=1 1\n").await.unwrap();

        assert_eq!(rx.await.unwrap(), b"metric,label=a value=1 1\n");
    }

    #[tokio::test]
    async fn second_connect_failure_is_fatal() {
        let spawner = Arc::new(NoopSpawner::default());
        let client = SenderClient::new(
            "127.0.0.1:1".to_string(),
            Box::new(spawner.clone()),
            Duration::from_millis(10),
        );

        let err = client.send(b"state value=0i 1\n").await.unwrap_err();

        assert!(err.is_connect_failed());
        assert_eq!(spawner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn spawn_failure_is_tolerated_when_daemon_appears() {
        let addr = free_loopback_addr();
        let daemon = tokio::spawn({
            let addr = addr.clone();
            async move {
                // a concurrent sender's daemon wins the race mid-wait
                sleep(Duration::from_millis(20)).await;
                let listener = TcpListener::bind(addr.as_str()).await.unwrap();
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).await.unwrap();
                buf
            }
        });
        let client = SenderClient::new(addr, Box::new(FailingSpawner), Duration::from_millis(150));

        client.send(b"state value=2i 1\n").await.unwrap();

        assert_eq!(daemon.await.unwrap(), b"state value=2i 1\n");
    }

    #[tokio::test]
    async fn empty_payload_is_a_no_op() {
        let spawner = Arc::new(NoopSpawner::default());
        let client = SenderClient::new(
            "127.0.0.1:1".to_string(),
            Box::new(spawner.clone()),
            Duration::from_millis(10),
        );
        client.send(&[]).await.unwrap();
        assert_eq!(spawner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn daemon_args_carry_broker_url() {
        let spawner = ExecSpawner::new("amqp://localhost:5672".to_string(), None);
        assert_eq!(
            spawner.daemon_args(),
            vec!["--daemonize", "--amqp-url", "amqp://localhost:5672"]
        );
    }

    #[test]
    fn daemon_args_pass_config_file_through() {
        let spawner = ExecSpawner::new(
            "amqp://broker:5672".to_string(),
            Some("/etc/ocxp.yaml".to_string()),
        );
        assert_eq!(
            spawner.daemon_args(),
            vec![
                "--daemonize",
                "--amqp-url",
                "amqp://broker:5672",
                "--config",
                "/etc/ocxp.yaml"
            ]
        );
    }
}
