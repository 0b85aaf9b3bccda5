use std::collections::HashSet;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::board::{Grid, Tile, reachable_capture_targets};
use crate::coords::HexCoord;
use crate::game::players::Participant;
use crate::game::rules::{
    CITADEL_MAX_HEALTH, CITADEL_MAX_TURRETS, CITADEL_REPAIR_COST, CITADEL_TURRET_COST,
    ROLL_COIN_COST, bank_bonus, build_cost, capture_cost,
};
use crate::store::{Snapshot, StoreAdapter, StoreError, VersionedDoc};
use crate::types::{BuildKind, LocalPhase, TileKind};

/// Stale-write retries before an action is given up and local state restored.
pub const WRITE_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub radius: i32,
    pub num_teams: usize,
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            radius: 13,
            num_teams: 6,
            seed: 42,
        }
    }
}

/// External currency hook supplied by the surrounding application. `true`
/// means the balance was already decremented by the callee.
pub trait CoinPurse {
    fn try_debit(&mut self, amount: u32) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("action only available in the {0} phase")]
    WrongPhase(LocalPhase),
    #[error("a roll is already in flight")]
    RollInFlight,
    #[error("no roll awaiting completion")]
    NoRollPending,
    #[error("not enough coins for a roll (need {0})")]
    InsufficientCoins(u32),
    #[error("invalid team index {0}")]
    InvalidTeam(usize),
    #[error("team {0} has been eliminated")]
    Eliminated(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollOutcome {
    pub die: u32,
    pub bank_bonus: u32,
    /// Action points after the roll was committed.
    pub action_points: u32,
}

/// What a tile click resolved to. Illegal clicks are `Ignored`, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    Ignored,
    /// Read-only view of a citadel that is not currently a legal siege target.
    InspectCitadel(Tile),
    Built {
        kind: BuildKind,
        at: HexCoord,
    },
    SiegeHit {
        at: HexCoord,
        health_left: u8,
    },
    Captured {
        at: HexCoord,
        taken_from: Option<usize>,
        eliminated: Option<usize>,
    },
    MineTriggered {
        at: HexCoord,
    },
    Repaired {
        at: HexCoord,
        health: u8,
    },
    TurretRaised {
        at: HexCoord,
        turrets: u8,
    },
}

/// Result of resolving one mutation against a snapshot: the new aggregate
/// plus log lines and a typed outcome. `None` means the action is not legal
/// against this snapshot.
type Resolved<R> = Option<(Vec<Participant>, Grid, Vec<String>, R)>;

/// The per-client state machine: local phase layered over the shared
/// document. Each client runs one of these for its own team; there is no
/// global turn order.
pub struct TurnEngine {
    adapter: StoreAdapter,
    team: usize,
    snapshot: Snapshot,
    phase: LocalPhase,
    build_mode: Option<BuildKind>,
    roll_in_flight: bool,
    legal_moves: HashSet<HexCoord>,
    rng: StdRng,
}

impl TurnEngine {
    /// Creates (or adopts) the cohort document and starts in the Rolling phase.
    pub fn new(adapter: StoreAdapter, team: usize, config: &GameConfig) -> Result<Self, EngineError> {
        let snapshot = adapter.initialize_if_absent(config)?;
        if team >= snapshot.players.len() {
            return Err(EngineError::InvalidTeam(team));
        }
        let mut engine = Self {
            adapter,
            team,
            snapshot,
            phase: LocalPhase::Rolling,
            build_mode: None,
            roll_in_flight: false,
            legal_moves: HashSet::new(),
            rng: StdRng::seed_from_u64(config.seed),
        };
        engine.refresh_legal_moves();
        Ok(engine)
    }

    // --- rendering contract (read-only) ---

    pub fn team(&self) -> usize {
        self.team
    }

    pub fn grid(&self) -> &Grid {
        &self.snapshot.grid
    }

    pub fn participants(&self) -> &[Participant] {
        &self.snapshot.players
    }

    pub fn me(&self) -> &Participant {
        &self.snapshot.players[self.team]
    }

    pub fn local_phase(&self) -> LocalPhase {
        self.phase
    }

    pub fn build_mode(&self) -> Option<BuildKind> {
        self.build_mode
    }

    pub fn legal_moves(&self) -> &HashSet<HexCoord> {
        &self.legal_moves
    }

    pub fn logs(&self) -> &[String] {
        &self.snapshot.logs
    }

    pub fn roll_in_flight(&self) -> bool {
        self.roll_in_flight
    }

    // --- synchronization ---

    /// Adopt a delivered snapshot wholesale (no diffing) and re-derive the
    /// legal-move set. Fires for our own write echoes too.
    pub fn sync_from(&mut self, versioned: VersionedDoc) -> Result<(), EngineError> {
        if versioned.version < self.snapshot.version {
            // Out-of-order delivery; the newer state already won.
            return Ok(());
        }
        if versioned.doc.players.len() <= self.team {
            warn!(
                team = self.team,
                roster = versioned.doc.players.len(),
                "snapshot roster does not include this team, ignoring"
            );
            return Ok(());
        }
        self.snapshot = Snapshot::from_versioned(versioned)?;
        self.refresh_legal_moves();
        Ok(())
    }

    // --- rolling phase ---

    /// Pre-debit the coin cost and mark a roll in flight. The shell animates
    /// the delay and then calls [`TurnEngine::finish_roll`].
    pub fn start_roll(&mut self, purse: &mut dyn CoinPurse) -> Result<(), EngineError> {
        if self.phase != LocalPhase::Rolling {
            return Err(EngineError::WrongPhase(LocalPhase::Rolling));
        }
        if self.roll_in_flight {
            return Err(EngineError::RollInFlight);
        }
        if self.me().is_dead {
            return Err(EngineError::Eliminated(self.team));
        }
        if !purse.try_debit(ROLL_COIN_COST) {
            return Err(EngineError::InsufficientCoins(ROLL_COIN_COST));
        }
        self.roll_in_flight = true;
        Ok(())
    }

    /// Draw the die, add the bank bonus, commit the new action-point total,
    /// and move to Expanding. The bonus is recomputed against whatever grid
    /// the commit lands on, so a snapshot that arrived mid-animation is not
    /// clobbered.
    pub fn finish_roll(&mut self) -> Result<RollOutcome, EngineError> {
        if !self.roll_in_flight {
            return Err(EngineError::NoRollPending);
        }
        self.roll_in_flight = false;

        let team = self.team;
        let die: u32 = self.rng.gen_range(1..=6);
        let committed = self.commit_with(|snap| {
            let me = snap.players.get(team)?;
            if me.is_dead {
                return None;
            }
            let bonus = bank_bonus(&snap.grid, team);
            let mut players = snap.players.clone();
            players[team].action_points += die + bonus;
            let log = format!(
                "{} rolled {} (+{} bank), {} AP",
                me.name, die, bonus, players[team].action_points
            );
            Some((players, snap.grid.clone(), vec![log], bonus))
        })?;

        let Some(bank) = committed else {
            // Eliminated while the roulette was spinning.
            return Err(EngineError::Eliminated(team));
        };
        self.phase = LocalPhase::Expanding;
        self.refresh_legal_moves();
        let outcome = RollOutcome {
            die,
            bank_bonus: bank,
            action_points: self.me().action_points,
        };
        info!(team, die, bank, ap = outcome.action_points, "roll committed");
        Ok(outcome)
    }

    // --- expanding phase ---

    /// Select build mode (clearing the legal-move set) or clear it again.
    pub fn toggle_build_mode(&mut self, kind: BuildKind) {
        if self.phase != LocalPhase::Expanding {
            return;
        }
        self.build_mode = if self.build_mode == Some(kind) {
            None
        } else {
            Some(kind)
        };
        self.refresh_legal_moves();
    }

    /// Resolve a click on a tile: build, siege, capture, mine trap, citadel
    /// inspection, or a silent no-op.
    pub fn select_tile(&mut self, coord: HexCoord) -> Result<SelectOutcome, EngineError> {
        if self.phase != LocalPhase::Expanding || self.me().is_dead {
            return Ok(SelectOutcome::Ignored);
        }
        let Some(tile) = self.snapshot.grid.get(coord).cloned() else {
            return Ok(SelectOutcome::Ignored);
        };

        if let Some(kind) = self.build_mode {
            let team = self.team;
            let built = self.commit_with(|snap| resolve_build(team, coord, kind, snap))?;
            return Ok(match built {
                Some(outcome) => {
                    self.build_mode = None;
                    self.after_spend();
                    outcome
                }
                None => SelectOutcome::Ignored,
            });
        }

        if tile.kind == TileKind::Citadel && !self.legal_moves.contains(&coord) {
            return Ok(SelectOutcome::InspectCitadel(tile));
        }

        if !self.legal_moves.contains(&coord) {
            return Ok(SelectOutcome::Ignored);
        }

        let team = self.team;
        let resolved = self.commit_with(|snap| resolve_capture(team, coord, snap))?;
        Ok(match resolved {
            Some(outcome) => {
                if let SelectOutcome::Captured {
                    eliminated: Some(loser),
                    ..
                } = outcome
                {
                    info!(team, loser, "citadel fell, team eliminated");
                }
                self.after_spend();
                outcome
            }
            None => SelectOutcome::Ignored,
        })
    }

    /// Repair one hit point on an own citadel (from the inspection view).
    pub fn repair_citadel(&mut self, coord: HexCoord) -> Result<SelectOutcome, EngineError> {
        if self.phase != LocalPhase::Expanding || self.me().is_dead {
            return Ok(SelectOutcome::Ignored);
        }
        let team = self.team;
        let resolved = self.commit_with(|snap| {
            let me = snap.players.get(team)?;
            let tile = snap.grid.get(coord)?;
            if tile.owner != Some(team) || tile.kind != TileKind::Citadel {
                return None;
            }
            let health = tile.health.unwrap_or(0);
            if health >= CITADEL_MAX_HEALTH || me.action_points < CITADEL_REPAIR_COST {
                return None;
            }
            let mut players = snap.players.clone();
            let mut grid = snap.grid.clone();
            players[team].action_points -= CITADEL_REPAIR_COST;
            grid.get_mut(coord)?.health = Some(health + 1);
            let log = format!("{} repaired the citadel at {}", me.name, coord);
            Some((
                players,
                grid,
                vec![log],
                SelectOutcome::Repaired {
                    at: coord,
                    health: health + 1,
                },
            ))
        })?;
        Ok(resolved.map_or(SelectOutcome::Ignored, |outcome| {
            self.after_spend();
            outcome
        }))
    }

    /// Add a turret to an own citadel (from the inspection view).
    pub fn upgrade_turret(&mut self, coord: HexCoord) -> Result<SelectOutcome, EngineError> {
        if self.phase != LocalPhase::Expanding || self.me().is_dead {
            return Ok(SelectOutcome::Ignored);
        }
        let team = self.team;
        let resolved = self.commit_with(|snap| {
            let me = snap.players.get(team)?;
            let tile = snap.grid.get(coord)?;
            if tile.owner != Some(team) || tile.kind != TileKind::Citadel {
                return None;
            }
            let turrets = tile.turret_count.unwrap_or(0);
            if turrets >= CITADEL_MAX_TURRETS || me.action_points < CITADEL_TURRET_COST {
                return None;
            }
            let mut players = snap.players.clone();
            let mut grid = snap.grid.clone();
            players[team].action_points -= CITADEL_TURRET_COST;
            grid.get_mut(coord)?.turret_count = Some(turrets + 1);
            let log = format!("{} raised a turret at {}", me.name, coord);
            Some((
                players,
                grid,
                vec![log],
                SelectOutcome::TurretRaised {
                    at: coord,
                    turrets: turrets + 1,
                },
            ))
        })?;
        Ok(resolved.map_or(SelectOutcome::Ignored, |outcome| {
            self.after_spend();
            outcome
        }))
    }

    /// Manual turn end. Unspent action points persist; nothing is written.
    pub fn skip_turn(&mut self) {
        self.phase = LocalPhase::Rolling;
        self.build_mode = None;
        self.refresh_legal_moves();
    }

    // --- internals ---

    /// Turn auto-ends once the spendable pool hits exactly zero.
    fn after_spend(&mut self) {
        if self.me().action_points == 0 {
            debug!(team = self.team, "action points exhausted, turn ends");
            self.skip_turn();
        } else {
            self.refresh_legal_moves();
        }
    }

    fn refresh_legal_moves(&mut self) {
        self.legal_moves.clear();
        if self.phase != LocalPhase::Expanding || self.build_mode.is_some() {
            return;
        }
        let team = self.team;
        let Some(me) = self.snapshot.players.get(team) else {
            return;
        };
        if me.is_dead {
            return;
        }
        let budget = me.action_points;
        let grid = &self.snapshot.grid;
        self.legal_moves = reachable_capture_targets(team, grid)
            .into_iter()
            .filter(|coord| {
                grid.get(*coord)
                    .is_some_and(|tile| capture_cost(tile, team) <= budget)
            })
            .collect();
    }

    /// Read-resolve-CAS loop. On a stale write the snapshot is refreshed and
    /// the same resolution re-derived; once retries are exhausted (or the
    /// store fails outright) local state is restored from the store and the
    /// error surfaces.
    fn commit_with<R>(
        &mut self,
        resolve: impl Fn(&Snapshot) -> Resolved<R>,
    ) -> Result<Option<R>, EngineError> {
        let mut attempts = 0;
        loop {
            let Some((players, grid, lines, result)) = resolve(&self.snapshot) else {
                self.refresh_legal_moves();
                return Ok(None);
            };
            let mut candidate = Snapshot {
                players,
                grid,
                turn_count: self.snapshot.turn_count,
                logs: self.snapshot.logs.clone(),
                version: self.snapshot.version,
            };
            candidate.logs.extend(lines);
            match self.adapter.save(&candidate) {
                Ok(version) => {
                    candidate.version = version;
                    self.snapshot = candidate;
                    self.refresh_legal_moves();
                    return Ok(Some(result));
                }
                Err(StoreError::StaleWrite { base, current }) if attempts < WRITE_RETRY_LIMIT => {
                    attempts += 1;
                    warn!(base, current, attempts, "stale write, re-deriving action");
                    self.snapshot = self.adapter.load()?;
                }
                Err(err) => {
                    self.snapshot = self.adapter.load()?;
                    self.refresh_legal_moves();
                    return Err(err.into());
                }
            }
        }
    }
}

fn resolve_build(
    team: usize,
    coord: HexCoord,
    kind: BuildKind,
    snap: &Snapshot,
) -> Resolved<SelectOutcome> {
    let me = snap.players.get(team)?;
    if me.is_dead {
        return None;
    }
    let tile = snap.grid.get(coord)?;
    if tile.owner != Some(team) || tile.kind != TileKind::Plain {
        return None;
    }
    let cost = build_cost(kind);
    if me.action_points < cost {
        return None;
    }

    let mut players = snap.players.clone();
    let mut grid = snap.grid.clone();
    players[team].action_points -= cost;
    grid.get_mut(coord)?.set_kind(kind.tile_kind());
    let log = format!("{} built a {} at {}", me.name, kind, coord);
    Some((
        players,
        grid,
        vec![log],
        SelectOutcome::Built { kind, at: coord },
    ))
}

fn resolve_capture(team: usize, coord: HexCoord, snap: &Snapshot) -> Resolved<SelectOutcome> {
    let me = snap.players.get(team)?;
    if me.is_dead {
        return None;
    }
    let tile = snap.grid.get(coord)?.clone();
    if tile.owner == Some(team) {
        return None;
    }
    // Re-derived fresh so a CAS retry cannot act on a move that stopped
    // being reachable or affordable.
    if !reachable_capture_targets(team, &snap.grid).contains(&coord) {
        return None;
    }
    let cost = capture_cost(&tile, team);
    if me.action_points < cost {
        return None;
    }

    let mut players = snap.players.clone();
    let mut grid = snap.grid.clone();
    let mut logs = Vec::new();
    let name = me.name.clone();

    // Stepping on a foreign mine forfeits every action point; the mine is
    // spent and the tile reverts to neutral plain. No score change.
    if tile.kind == TileKind::Mine {
        players[team].action_points = 0;
        let target = grid.get_mut(coord)?;
        target.owner = None;
        target.set_kind(TileKind::Plain);
        logs.push(format!("{name} tripped a mine at {coord}"));
        return Some((
            players,
            grid,
            logs,
            SelectOutcome::MineTriggered { at: coord },
        ));
    }

    let enemy_held = tile.owner.is_some();

    if tile.kind == TileKind::Citadel && enemy_held {
        let health = tile.health.unwrap_or(1);
        players[team].action_points -= cost;
        if health > 1 {
            grid.get_mut(coord)?.health = Some(health - 1);
            logs.push(format!(
                "{name} besieged the citadel at {coord} ({} HP left)",
                health - 1
            ));
            return Some((
                players,
                grid,
                logs,
                SelectOutcome::SiegeHit {
                    at: coord,
                    health_left: health - 1,
                },
            ));
        }
        // Final hit: fall through to capture.
    } else {
        players[team].action_points -= cost;
    }

    players[team].score += 1;
    let taken_from = tile.owner;
    let mut eliminated = None;
    if let Some(prev) = tile.owner {
        // Owner ids outside the roster can appear in documents written by
        // older deployments; the capture proceeds without loser bookkeeping.
        match players.get_mut(prev) {
            Some(loser) if tile.kind == TileKind::Citadel => {
                // Defeat is total: the loser's whole territory reverts to
                // neutral plain, not just the fallen citadel.
                loser.is_dead = true;
                loser.score = 0;
                loser.action_points = 0;
                let loser_name = loser.name.clone();
                eliminated = Some(prev);
                let forfeited: Vec<HexCoord> = grid
                    .tiles()
                    .filter(|t| t.owner == Some(prev) && t.coord != coord)
                    .map(|t| t.coord)
                    .collect();
                for c in forfeited {
                    if let Some(t) = grid.get_mut(c) {
                        t.owner = None;
                        t.set_kind(TileKind::Plain);
                    }
                }
                logs.push(format!("{name} destroyed {loser_name}'s citadel"));
            }
            Some(loser) => {
                loser.score = loser.score.saturating_sub(1);
            }
            None => {}
        }
    }

    let target = grid.get_mut(coord)?;
    target.owner = Some(team);
    if target.kind == TileKind::Citadel {
        // Citadel-ness does not transfer to the conqueror.
        target.set_kind(TileKind::Plain);
    } else {
        target.health = None;
        target.turret_count = None;
    }
    logs.push(format!("{name} captured {coord}"));

    Some((
        players,
        grid,
        logs,
        SelectOutcome::Captured {
            at: coord,
            taken_from,
            eliminated,
        },
    ))
}
