//! Batch cancellation.
//!
//! A [`CancelToken`] is shared by the dispatcher and every worker of one
//! batch. Sockets opened by the prober are registered with the token so that
//! [`CancelToken::cancel`] can shut them down and unblock workers that are
//! waiting on a reply.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    sockets: Mutex<HashMap<u64, TcpStream>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the batch as cancelled and close every in-flight socket.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let sockets: Vec<TcpStream> = self
            .inner
            .sockets
            .lock()
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        tracing::debug!(target: "mailprobe::pipeline", "cancelling batch, closing {} socket(s)", sockets.len());
        for stream in sockets {
            stream.shutdown(Shutdown::Both).ok();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Track `stream` until the returned registration is dropped.
    pub(crate) fn register(&self, stream: &TcpStream) -> io::Result<SocketRegistration> {
        let handle = stream.try_clone()?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.sockets.lock().insert(id, handle);

        // cancel() may have drained the map before the insert above
        if self.is_cancelled() {
            if let Some(stream) = self.inner.sockets.lock().remove(&id) {
                stream.shutdown(Shutdown::Both).ok();
            }
        }

        Ok(SocketRegistration {
            token: self.clone(),
            id,
        })
    }

    #[cfg(test)]
    pub(crate) fn registered_sockets(&self) -> usize {
        self.inner.sockets.lock().len()
    }
}

#[derive(Debug)]
pub(crate) struct SocketRegistration {
    token: CancelToken,
    id: u64,
}

impl Drop for SocketRegistration {
    fn drop(&mut self) {
        self.token.inner.sockets.lock().remove(&self.id);
    }
}
