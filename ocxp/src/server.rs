//! The forwarding daemon: loopback acceptor, per-connection handlers
//! and the shutdown choreography around the supervisor.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, Instant};

use crate::publisher::{AmqpPublisher, Publish};
use crate::supervisor::{supervise, Event};
use ocxp_common::configs::Agent as AgentConfig;
use ocxp_common::error::Error;

// buffers above this capacity are not returned to the pool
const POOL_BUFFER_CEILING: usize = 100 * 1024;
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

pub struct Daemon {
    config: AgentConfig,
}

impl Daemon {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Binds the loopback listener, connects the publisher and runs
    /// until idle timeout, termination signal or a fatal error.
    pub async fn run(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.listen_address())
            .await
            .map_err(|e| {
                Error::bind_failed(format!(
                    "cannot bind {}: {}",
                    self.config.listen_address(),
                    e
                ))
            })?;
        info!("listening on {}", self.config.listen_address());
        let publisher = Arc::new(
            AmqpPublisher::connect(self.config.amqp_url(), self.config.exchange()).await?,
        );
        let handle: Arc<dyn Publish> = publisher.clone();
        let result = serve(listener, handle, self.config.idle_timeout(), termination()).await;
        publisher.close().await;
        result
    }
}

/// Accept loop plus supervisor; returns once the daemon should exit.
/// Split from [`Daemon::run`] so tests can drive it with an ephemeral
/// listener and a fake publisher.
pub async fn serve(
    listener: TcpListener,
    publisher: Arc<dyn Publish>,
    idle_timeout: Duration,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<(), Error> {
    let (events_tx, events_rx) = mpsc::channel(64);
    let stop = Arc::new(Notify::new());
    let active = Arc::new(AtomicUsize::new(0));
    let pool = Arc::new(BufferPool::default());

    let acceptor = tokio::spawn(accept_loop(
        listener,
        publisher,
        events_tx,
        stop.clone(),
        active.clone(),
        pool,
    ));

    let result = supervise(events_rx, idle_timeout, shutdown).await;

    // stop accepting first, then give in-flight handlers a bounded
    // chance to finish
    stop.notify_one();
    if let Err(e) = acceptor.await {
        debug!("acceptor task join failed: {}", e);
    }
    drain(&active).await;
    result
}

async fn accept_loop(
    listener: TcpListener,
    publisher: Arc<dyn Publish>,
    events: mpsc::Sender<Event>,
    stop: Arc<Notify>,
    active: Arc<AtomicUsize>,
    pool: Arc<BufferPool>,
) {
    loop {
        tokio::select! {
            _ = stop.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!("accepted connection from {}", peer);
                    let publisher = publisher.clone();
                    let events = events.clone();
                    let pool = pool.clone();
                    let guard = ActiveGuard::new(active.clone());
                    tokio::spawn(async move {
                        handle_connection(stream, publisher, events, pool).await;
                        drop(guard);
                    });
                }
                Err(e) => {
                    let _ = events
                        .send(Event::AcceptError(Error::accept_failed(e.to_string())))
                        .await;
                    break;
                }
            }
        }
    }
    debug!("acceptor stopped");
}

// Reads one payload to EOF and publishes it once. The sender's close
// is the only message boundary; a publish failure goes to the
// supervisor, a heartbeat otherwise.
async fn handle_connection(
    mut stream: TcpStream,
    publisher: Arc<dyn Publish>,
    events: mpsc::Sender<Event>,
    pool: Arc<BufferPool>,
) {
    let mut buffer = pool.take();
    match stream.read_to_end(&mut buffer).await {
        // only a completed publish counts as activity
        Ok(_) if buffer.is_empty() => debug!("empty payload, connection ignored"),
        Ok(read) => {
            trace!("received {} bytes", read);
            match publisher.publish(&buffer).await {
                Ok(()) => {
                    let _ = events.send(Event::Heartbeat).await;
                }
                Err(e) => {
                    let _ = events.send(Event::PublishError(e)).await;
                }
            }
        }
        Err(e) => warn!("connection read failed: {}", e),
    }
    pool.put(buffer);
}

async fn drain(active: &AtomicUsize) {
    let deadline = Instant::now() + DRAIN_DEADLINE;
    while active.load(Ordering::SeqCst) > 0 {
        if Instant::now() >= deadline {
            warn!(
                "{} handler(s) still in flight at drain deadline",
                active.load(Ordering::SeqCst)
            );
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

// Resolves on SIGTERM or SIGINT.
async fn termination() {
    use tokio::signal::unix::{signal, SignalKind};
    let (Ok(mut terminate), Ok(mut interrupt)) =
        (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
    else {
        error!("cannot install signal handlers");
        return std::future::pending::<()>().await;
    };
    tokio::select! {
        _ = terminate.recv() => debug!("got SIGTERM"),
        _ = interrupt.recv() => debug!("got SIGINT"),
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reusable read buffers. Buffers are cleared before reuse so one
/// handler never observes bytes from another; oversized buffers are
/// dropped instead of retained.
#[derive(Default)]
struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    fn take(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .expect("buffer pool mutex")
            .pop()
            .unwrap_or_default()
    }

    fn put(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() > POOL_BUFFER_CEILING {
            return;
        }
        buffer.clear();
        self.buffers.lock().expect("buffer pool mutex").push(buffer);
    }
}
