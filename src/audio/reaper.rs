//! Idle Reaper: the only thing besides `/leave` that disconnects a guild.

use std::{sync::Arc, time::Duration};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::SessionStore;
use crate::error::PlaybackError;

pub struct IdleReaper {
    store: Arc<SessionStore>,
    threshold: Duration,
    interval: Duration,
}

impl IdleReaper {
    pub fn new(store: Arc<SessionStore>, threshold: Duration, interval: Duration) -> Self {
        Self {
            store,
            threshold,
            interval,
        }
    }

    /// One pass over every session. Idle sessions whose last activity is at
    /// least `threshold` old are stopped, disconnected and removed.
    pub async fn sweep(&self, now: Instant) -> usize {
        let mut reaped = 0;

        for handle in self.store.handles() {
            match handle.reap_if_idle(now, self.threshold).await {
                Ok(true) => {
                    self.store.remove(&handle);
                    reaped += 1;
                }
                Ok(false) => {}
                Err(PlaybackError::SessionClosed) => {
                    // worker ya terminó (leave concurrente); solo limpiar el mapa
                    self.store.remove(&handle);
                }
                Err(e) => warn!("⚠️ Error revisando guild {}: {}", handle.guild_id(), e),
            }
        }

        if reaped > 0 {
            info!("🧹 {} sesiones inactivas liberadas, {} activas", reaped, self.store.len());
        }
        reaped
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "🧹 Reaper iniciado (umbral {:?}, cada {:?})",
            self.threshold, self.interval
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // el primer tick es inmediato
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    debug!("🧹 Revisando {} sesiones", self.store.len());
                    self.sweep(Instant::now()).await;
                }
            }
        }

        info!("🛑 Reaper detenido");
    }
}
