//! Pool of reusable raster engines.
//!
//! Engines are expensive to set up, so a fixed set of them is created once
//! and lent out to one conversion batch at a time. Idle engines wait in a
//! bounded channel; [`ConverterPool::acquire`] suspends until one is free and
//! the returned [`PooledEngine`] puts it back when dropped, whichever way the
//! batch ends.

use crate::config::PoolConfig;
use crate::engine::{GhostscriptEngine, RasterEngine};
use crate::error::{ConversionError, Result};
use async_channel::{bounded, Receiver, Sender, TrySendError};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

/// Pool of raster engines shared by concurrent batches.
#[derive(Debug)]
pub struct ConverterPool<E> {
    /// Number of engines owned by the pool.
    pool_size: usize,
    /// Returns engines to the idle queue.
    idle_tx: Sender<E>,
    /// Hands out idle engines.
    idle_rx: Receiver<E>,
    /// Whether the pool is shut down.
    is_shutdown: AtomicBool,
    /// Total checkouts since creation.
    total_checkouts: AtomicUsize,
}

impl ConverterPool<GhostscriptEngine> {
    /// Create a pool of Ghostscript engines.
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let gs_path = GhostscriptEngine::find_ghostscript(config)?;
        info!("Found Ghostscript at: {:?}", gs_path);

        let engines = (0..config.pool_size)
            .map(|id| GhostscriptEngine::new(id, gs_path.clone(), config.conversion_timeout))
            .collect();

        Self::from_engines(engines)
    }
}

impl<E: RasterEngine> ConverterPool<E> {
    /// Create a pool owning the given engines.
    pub fn from_engines(engines: Vec<E>) -> Result<Self> {
        if engines.is_empty() {
            return Err(ConversionError::InvalidConfig(
                "pool needs at least one engine".to_string(),
            ));
        }

        let pool_size = engines.len();
        let (idle_tx, idle_rx) = bounded(pool_size);
        for engine in engines {
            idle_tx
                .try_send(engine)
                .map_err(|_| ConversionError::ChannelError("Idle queue full".to_string()))?;
        }

        info!("Converter pool initialized with {} engines", pool_size);

        Ok(Self {
            pool_size,
            idle_tx,
            idle_rx,
            is_shutdown: AtomicBool::new(false),
            total_checkouts: AtomicUsize::new(0),
        })
    }

    /// Borrow an engine, waiting until one is idle.
    pub async fn acquire(&self) -> Result<PooledEngine<E>> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(ConversionError::PoolShutdown);
        }

        let engine = self
            .idle_rx
            .recv()
            .await
            .map_err(|_| ConversionError::PoolShutdown)?;

        Ok(self.checkout(engine))
    }

    /// Borrow an engine only if one is idle right now.
    pub fn try_acquire(&self) -> Result<Option<PooledEngine<E>>> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(ConversionError::PoolShutdown);
        }

        match self.idle_rx.try_recv() {
            Ok(engine) => Ok(Some(self.checkout(engine))),
            Err(async_channel::TryRecvError::Empty) => Ok(None),
            Err(async_channel::TryRecvError::Closed) => Err(ConversionError::PoolShutdown),
        }
    }

    fn checkout(&self, engine: E) -> PooledEngine<E> {
        let checkouts = self.total_checkouts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Engine checked out ({} idle, {} checkouts)",
            self.idle_rx.len(),
            checkouts
        );
        PooledEngine {
            engine: Some(engine),
            home: self.idle_tx.clone(),
        }
    }

    /// Number of engines owned by the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of engines currently idle.
    pub fn available(&self) -> usize {
        self.idle_rx.len()
    }

    /// Total checkouts since creation.
    pub fn total_checkouts(&self) -> usize {
        self.total_checkouts.load(Ordering::SeqCst)
    }

    /// Get pool health information.
    pub fn health(&self) -> PoolHealth {
        let idle = self.available();
        PoolHealth {
            pool_size: self.pool_size,
            idle,
            in_use: self.pool_size.saturating_sub(idle),
            total_checkouts: self.total_checkouts(),
            is_shutdown: self.is_shutdown(),
        }
    }

    /// Whether the pool has been shut down.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Shut the pool down.
    ///
    /// Idle engines are dropped now, borrowed ones when their batch ends.
    /// Callers waiting in [`acquire`](Self::acquire) get
    /// [`ConversionError::PoolShutdown`].
    pub fn shutdown(&self) {
        info!("Shutting down converter pool");
        self.is_shutdown.store(true, Ordering::SeqCst);
        self.idle_tx.close();
        while self.idle_rx.try_recv().is_ok() {}
    }
}

/// An engine borrowed from a [`ConverterPool`].
///
/// Dereferences to the engine; returns it to the pool on drop.
#[derive(Debug)]
pub struct PooledEngine<E: RasterEngine> {
    engine: Option<E>,
    home: Sender<E>,
}

impl<E: RasterEngine> Deref for PooledEngine<E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine.as_ref().expect("engine is only taken on drop")
    }
}

impl<E: RasterEngine> DerefMut for PooledEngine<E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine.as_mut().expect("engine is only taken on drop")
    }
}

impl<E: RasterEngine> Drop for PooledEngine<E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            match self.home.try_send(engine) {
                Ok(()) => debug!("Engine returned to pool"),
                Err(TrySendError::Closed(_)) => debug!("Pool shut down, dropping engine"),
                // Capacity equals the number of engines, so a slot is always free.
                Err(TrySendError::Full(_)) => debug!("Idle queue full, dropping engine"),
            }
        }
    }
}

/// Health information for the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHealth {
    /// Total pool size.
    pub pool_size: usize,
    /// Engines waiting to be borrowed.
    pub idle: usize,
    /// Engines currently borrowed.
    pub in_use: usize,
    /// Total checkouts since creation.
    pub total_checkouts: usize,
    /// Whether the pool is shut down.
    pub is_shutdown: bool,
}
