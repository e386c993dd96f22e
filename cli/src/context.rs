use fightline_core::context::{ReplayConfig, ReplayConfigExt};
use fightline_core::{ActorPositionsTimeline, BuffLookup, CombatWorkload, PoolRegistry};
use fightline_types::{ActorId, ActorMeta, BuffEvent, Fight, FightEvents, RosterEntry};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Contents of a fight file passed to `load`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayInput {
    pub fight: Fight,
    pub events: FightEvents,
    /// Buff/debuff events used for taunt detection
    #[serde(default)]
    pub debuffs: Vec<BuffEvent>,
    /// Buff applications that mark map changes
    #[serde(default)]
    pub phase_signal: Vec<BuffEvent>,
    #[serde(default)]
    pub roster: HashMap<ActorId, RosterEntry>,
    #[serde(default)]
    pub actors: HashMap<ActorId, ActorMeta>,
}

/// A loaded fight and whatever has been computed from it so far.
pub struct Replay {
    pub path: PathBuf,
    pub input: Arc<ReplayInput>,
    pub debuffs: Option<BuffLookup>,
    pub timeline: Option<Arc<ActorPositionsTimeline>>,
}

/// Holds all shared state for the CLI application.
#[derive(Clone)]
pub struct CliContext {
    pub config: Arc<RwLock<ReplayConfig>>,
    pub registry: Arc<PoolRegistry<CombatWorkload>>,
    replay: Arc<RwLock<Option<Replay>>>,
}

impl CliContext {
    pub fn new(config_path: Option<&Path>) -> Result<Self, String> {
        let config = match config_path {
            Some(path) => ReplayConfig::load_from_path(path).map_err(|e| e.to_string())?,
            None => ReplayConfig::load(),
        };
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: ReplayConfig) -> Self {
        Self {
            registry: Arc::new(PoolRegistry::combat(config.clone())),
            config: Arc::new(RwLock::new(config)),
            replay: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the loaded fight, dropping anything computed for the old one.
    pub async fn set_input(&self, path: PathBuf, input: ReplayInput) {
        *self.replay.write().await = Some(Replay {
            path,
            input: Arc::new(input),
            debuffs: None,
            timeline: None,
        });
    }

    pub async fn input(&self) -> Option<Arc<ReplayInput>> {
        self.replay
            .read()
            .await
            .as_ref()
            .map(|r| Arc::clone(&r.input))
    }

    pub async fn timeline(&self) -> Option<Arc<ActorPositionsTimeline>> {
        self.replay.read().await.as_ref().and_then(|r| r.timeline.clone())
    }

    /// Store results computed for `input`. Ignored if another fight was
    /// loaded in the meantime.
    pub async fn store_results(
        &self,
        input: &Arc<ReplayInput>,
        debuffs: BuffLookup,
        timeline: ActorPositionsTimeline,
    ) -> bool {
        let mut replay = self.replay.write().await;
        match replay.as_mut() {
            Some(r) if Arc::ptr_eq(&r.input, input) => {
                r.debuffs = Some(debuffs);
                r.timeline = Some(Arc::new(timeline));
                true
            }
            _ => false,
        }
    }

    pub async fn loaded_path(&self) -> Option<PathBuf> {
        self.replay.read().await.as_ref().map(|r| r.path.clone())
    }
}
