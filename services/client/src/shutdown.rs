use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Non-blocking "has a stop been requested" check
pub trait ShutdownSignal: Send + Sync {
    fn is_requested(&self) -> bool;
}

/// Flag flipped by the process signal listener
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Spawn a listener that sets the flag on SIGTERM or Ctrl-C
    ///
    /// Must be called from inside a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        let flag = Self::new();
        let listener = flag.clone();
        let signal = wait_for_signal()?;

        tokio::spawn(async move {
            signal.await;
            tracing::info!("Shutdown signal received");
            listener.request();
        });

        Ok(flag)
    }
}

#[cfg(unix)]
fn wait_for_signal() -> std::io::Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    // registered before returning so an early SIGTERM is not lost
    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    })
}

#[cfg(not(unix))]
fn wait_for_signal() -> std::io::Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
    })
}

impl ShutdownSignal for ShutdownFlag {
    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
