//! Match state machine and the registry of live matches

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ws::protocol::ServerMsg;

use super::grid::{Grid, HitOutcome};
use super::layout::Layout;
use super::{ActionRejected, Emitter, MatchId, ParticipantId};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Only the first player is known
    Forming,
    /// Both players known, grids may be regenerated until locked
    PreGame,
    /// Both grids locked, turns alternate
    Playing,
    /// Winner found or match aborted
    Finished,
}

/// Seat of a player within the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seat {
    One,
    Two,
}

impl Seat {
    const BOTH: [Seat; 2] = [Seat::One, Seat::Two];

    fn index(self) -> usize {
        match self {
            Seat::One => 0,
            Seat::Two => 1,
        }
    }

    fn other(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }
}

/// What a resolved shot did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotResult {
    Miss,
    Hit,
    Sunk { length: usize },
}

/// Outcome of a resolved shot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotReport {
    pub result: ShotResult,
    /// The shot destroyed the opponent's last ship
    pub match_over: bool,
}

/// A two-player match (owned by the matchmaker registry)
pub struct GameMatch {
    id: MatchId,
    player_one: ParticipantId,
    player_two: Option<ParticipantId>,
    grids: [Grid; 2],
    turn_holder: Option<ParticipantId>,
    winner: Option<ParticipantId>,
    phase: MatchPhase,
    layout: Arc<Layout>,
    rng: ChaCha8Rng,
    emitter: Arc<dyn Emitter>,
}

impl GameMatch {
    /// Create a match in `Forming` with only its first player
    pub fn new(
        id: MatchId,
        player_one: ParticipantId,
        layout: Arc<Layout>,
        seed: u64,
        emitter: Arc<dyn Emitter>,
    ) -> Self {
        let grids = [Grid::new(layout.ship_set()), Grid::new(layout.ship_set())];
        Self {
            id,
            player_one,
            player_two: None,
            grids,
            turn_holder: None,
            winner: None,
            phase: MatchPhase::Forming,
            layout,
            rng: ChaCha8Rng::seed_from_u64(seed),
            emitter,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn player_one(&self) -> ParticipantId {
        self.player_one
    }

    pub fn player_two(&self) -> Option<ParticipantId> {
        self.player_two
    }

    /// Every participant currently seated
    pub fn players(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        std::iter::once(self.player_one).chain(self.player_two)
    }

    pub fn turn_holder(&self) -> Option<ParticipantId> {
        self.turn_holder
    }

    pub fn winner(&self) -> Option<ParticipantId> {
        self.winner
    }

    pub fn is_participant(&self, participant_id: ParticipantId) -> bool {
        self.seat_of(participant_id).is_some()
    }

    /// The participant's own grid
    pub fn grid_of(&self, participant_id: ParticipantId) -> Option<&Grid> {
        self.seat_of(participant_id)
            .map(|seat| &self.grids[seat.index()])
    }

    /// The other seated participant
    pub fn opponent_of(&self, participant_id: ParticipantId) -> Option<ParticipantId> {
        self.seat_of(participant_id)
            .and_then(|seat| self.player_at(seat.other()))
    }

    fn seat_of(&self, participant_id: ParticipantId) -> Option<Seat> {
        if participant_id == self.player_one {
            Some(Seat::One)
        } else if self.player_two == Some(participant_id) {
            Some(Seat::Two)
        } else {
            None
        }
    }

    fn player_at(&self, seat: Seat) -> Option<ParticipantId> {
        match seat {
            Seat::One => Some(self.player_one),
            Seat::Two => self.player_two,
        }
    }

    /// Seat the second player, deal both grids and open the pre-game
    pub fn add_second_player(&mut self, participant_id: ParticipantId) -> Result<(), ActionRejected> {
        if self.phase != MatchPhase::Forming {
            return Err(ActionRejected::WrongPhase(self.phase));
        }
        if participant_id == self.player_one {
            return Err(ActionRejected::SameParticipant);
        }

        self.player_two = Some(participant_id);
        for grid in self.grids.iter_mut() {
            grid.generate(&self.layout, &mut self.rng)?;
        }
        self.phase = MatchPhase::PreGame;

        for seat in Seat::BOTH {
            if let Some(player) = self.player_at(seat) {
                self.emitter.emit(player, ServerMsg::PreGameStarted);
                self.emitter.emit(
                    player,
                    ServerMsg::GridSnapshot {
                        cells: self.grids[seat.index()].cells().to_vec(),
                    },
                );
            }
        }

        info!(
            match_id = %self.id,
            player_one = %self.player_one,
            player_two = %participant_id,
            "Match entered pre-game"
        );
        Ok(())
    }

    /// Deal a fresh grid to a player who has not locked theirs yet
    pub fn regenerate_grid(&mut self, participant_id: ParticipantId) -> Result<(), ActionRejected> {
        if self.phase != MatchPhase::PreGame {
            return Err(ActionRejected::WrongPhase(self.phase));
        }
        let seat = self
            .seat_of(participant_id)
            .ok_or(ActionRejected::NotAParticipant)?;

        let grid = &mut self.grids[seat.index()];
        if grid.is_locked() {
            return Err(ActionRejected::GridLocked);
        }
        grid.generate(&self.layout, &mut self.rng)?;

        self.emitter.emit(
            participant_id,
            ServerMsg::GridSnapshot {
                cells: grid.cells().to_vec(),
            },
        );
        debug!(match_id = %self.id, participant_id = %participant_id, "Grid regenerated");
        Ok(())
    }

    /// Lock the caller's grid; starts the game once both grids are locked
    pub fn declare_ready(&mut self, participant_id: ParticipantId) -> Result<(), ActionRejected> {
        if self.phase != MatchPhase::PreGame {
            return Err(ActionRejected::WrongPhase(self.phase));
        }
        let seat = self
            .seat_of(participant_id)
            .ok_or(ActionRejected::NotAParticipant)?;

        let grid = &mut self.grids[seat.index()];
        if grid.is_locked() {
            return Err(ActionRejected::AlreadyReady);
        }
        grid.lock();
        self.emitter
            .emit(participant_id, ServerMsg::WaitingForOpponent);

        info!(match_id = %self.id, participant_id = %participant_id, "Player ready");

        if self.grids.iter().all(Grid::is_locked) {
            self.start_game();
        }
        Ok(())
    }

    fn start_game(&mut self) {
        let first = if self.rng.gen_bool(0.5) {
            Seat::One
        } else {
            Seat::Two
        };
        self.turn_holder = self.player_at(first);
        self.phase = MatchPhase::Playing;

        for player in self.players().collect::<Vec<_>>() {
            self.emitter.emit(player, ServerMsg::GameStarted);
        }
        self.send_information_packet();

        info!(
            match_id = %self.id,
            first_turn = ?self.turn_holder,
            "Match started"
        );
    }

    /// Fire at a cell of the attacker's opponent.
    ///
    /// A hit keeps the turn with the attacker, a miss passes it on.
    pub fn target_cell(
        &mut self,
        attacker: ParticipantId,
        index: usize,
    ) -> Result<ShotReport, ActionRejected> {
        if self.phase != MatchPhase::Playing {
            return Err(ActionRejected::WrongPhase(self.phase));
        }
        let seat = self.seat_of(attacker).ok_or(ActionRejected::NotAParticipant)?;
        if self.turn_holder != Some(attacker) {
            return Err(ActionRejected::NotYourTurn);
        }

        let target = &mut self.grids[seat.other().index()];
        if !target.is_clickable(index) {
            return Err(ActionRejected::CellNotClickable(index));
        }

        let result = match target.apply_hit(index) {
            Some(HitOutcome::Hit) => ShotResult::Hit,
            Some(HitOutcome::Sunk { length, .. }) => ShotResult::Sunk { length },
            None => {
                target.apply_miss(index);
                self.turn_holder = self.player_at(seat.other());
                ShotResult::Miss
            }
        };

        let match_over = !self.grids[seat.other().index()].has_surviving_ship_parts();
        if match_over {
            self.winner = Some(attacker);
            self.turn_holder = None;
            self.phase = MatchPhase::Finished;
            info!(match_id = %self.id, winner = %attacker, "Match won");
        }

        debug!(
            match_id = %self.id,
            attacker = %attacker,
            index,
            result = ?result,
            "Shot resolved"
        );

        self.send_information_packet();
        Ok(ShotReport { result, match_over })
    }

    /// Tear the match down early. Returns `false` if it had already finished.
    pub fn abort(&mut self) -> bool {
        if self.phase == MatchPhase::Finished {
            return false;
        }
        self.phase = MatchPhase::Finished;
        self.turn_holder = None;

        for player in self.players().collect::<Vec<_>>() {
            self.emitter.emit(player, ServerMsg::MatchAborted);
        }

        info!(match_id = %self.id, "Match aborted");
        true
    }

    /// Send each player their grid, the hidden opponent grid, the opponent
    /// fleet legend and either the turn or the final outcome
    fn send_information_packet(&self) {
        for seat in Seat::BOTH {
            let Some(player) = self.player_at(seat) else {
                continue;
            };
            let own = &self.grids[seat.index()];
            let opponent = &self.grids[seat.other().index()];

            self.emitter.emit(
                player,
                ServerMsg::GridSnapshot {
                    cells: own.cells().to_vec(),
                },
            );
            self.emitter.emit(
                player,
                ServerMsg::OpponentGridSnapshot {
                    cells: opponent.exposed_view(),
                },
            );
            self.emitter.emit(
                player,
                ServerMsg::ShipSummary {
                    ships: opponent.ship_summary(),
                },
            );

            let status = match self.winner {
                Some(winner) => ServerMsg::Outcome {
                    won: winner == player,
                },
                None => ServerMsg::TurnIndicator {
                    your_turn: self.turn_holder == Some(player),
                },
            };
            self.emitter.emit(player, status);
        }
    }
}

/// Registry of all live matches
#[derive(Default)]
pub struct MatchRegistry {
    matches: HashMap<MatchId, GameMatch>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: HashMap::new(),
        }
    }

    pub fn get(&self, id: &MatchId) -> Option<&GameMatch> {
        self.matches.get(id)
    }

    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut GameMatch> {
        self.matches.get_mut(id)
    }

    pub fn insert(&mut self, game: GameMatch) {
        self.matches.insert(game.id(), game);
    }

    pub fn remove(&mut self, id: &MatchId) -> Option<GameMatch> {
        self.matches.remove(id)
    }

    pub fn contains(&self, id: &MatchId) -> bool {
        self.matches.contains_key(id)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches.values().map(|m| m.players().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::{ShipSet, DEFAULT_FIXED_LAYOUT};
    use crate::testing::RecordingEmitter;
    use crate::ws::protocol::CellState;
    use uuid::Uuid;

    struct Fixture {
        game: GameMatch,
        emitter: Arc<RecordingEmitter>,
        one: ParticipantId,
        two: ParticipantId,
    }

    fn fixture() -> Fixture {
        let layout = Arc::new(Layout::fixed(ShipSet::default(), DEFAULT_FIXED_LAYOUT).unwrap());
        let emitter = Arc::new(RecordingEmitter::new());
        let one = Uuid::new_v4();
        let two = Uuid::new_v4();
        let game = GameMatch::new(Uuid::new_v4(), one, layout, 7, emitter.clone());
        Fixture {
            game,
            emitter,
            one,
            two,
        }
    }

    fn playing() -> Fixture {
        let mut f = fixture();
        f.game.add_second_player(f.two).unwrap();
        f.game.declare_ready(f.one).unwrap();
        f.game.declare_ready(f.two).unwrap();
        f.emitter.clear();
        f
    }

    #[test]
    fn forming_until_second_player() {
        let mut f = fixture();
        assert_eq!(f.game.phase(), MatchPhase::Forming);
        assert_eq!(
            f.game.declare_ready(f.one),
            Err(ActionRejected::WrongPhase(MatchPhase::Forming))
        );
        assert_eq!(
            f.game.add_second_player(f.one),
            Err(ActionRejected::SameParticipant)
        );

        f.game.add_second_player(f.two).unwrap();
        assert_eq!(f.game.phase(), MatchPhase::PreGame);
        assert_eq!(f.game.players().collect::<Vec<_>>(), vec![f.one, f.two]);

        let sent = f.emitter.messages_for(f.two);
        assert_eq!(sent[0], ServerMsg::PreGameStarted);
        assert!(matches!(&sent[1], ServerMsg::GridSnapshot { cells } if cells.len() == 36));

        assert_eq!(
            f.game.add_second_player(Uuid::new_v4()),
            Err(ActionRejected::WrongPhase(MatchPhase::PreGame))
        );
    }

    #[test]
    fn regenerate_only_before_lock() {
        let mut f = fixture();
        f.game.add_second_player(f.two).unwrap();
        f.emitter.clear();

        f.game.regenerate_grid(f.one).unwrap();
        assert_eq!(f.emitter.messages_for(f.one).len(), 1);
        assert!(f.emitter.messages_for(f.two).is_empty());

        f.game.declare_ready(f.one).unwrap();
        assert_eq!(f.game.regenerate_grid(f.one), Err(ActionRejected::GridLocked));
        assert_eq!(
            f.game.regenerate_grid(Uuid::new_v4()),
            Err(ActionRejected::NotAParticipant)
        );
    }

    #[test]
    fn ready_twice_is_ignored() {
        let mut f = fixture();
        f.game.add_second_player(f.two).unwrap();
        f.emitter.clear();

        f.game.declare_ready(f.one).unwrap();
        assert_eq!(
            f.emitter.messages_for(f.one),
            vec![ServerMsg::WaitingForOpponent]
        );
        assert_eq!(f.game.declare_ready(f.one), Err(ActionRejected::AlreadyReady));
        assert_eq!(f.emitter.messages_for(f.one).len(), 1);
        assert_eq!(f.game.phase(), MatchPhase::PreGame);
    }

    #[test]
    fn both_ready_starts_with_one_turn_holder() {
        let mut f = fixture();
        f.game.add_second_player(f.two).unwrap();
        f.game.declare_ready(f.one).unwrap();
        f.game.declare_ready(f.two).unwrap();

        assert_eq!(f.game.phase(), MatchPhase::Playing);
        let holder = f.game.turn_holder().unwrap();
        assert!(holder == f.one || holder == f.two);

        for player in [f.one, f.two] {
            let sent = f.emitter.messages_for(player);
            assert!(sent.contains(&ServerMsg::GameStarted));
            assert_eq!(
                sent.last(),
                Some(&ServerMsg::TurnIndicator {
                    your_turn: player == holder
                })
            );
        }
    }

    #[test]
    fn miss_passes_turn_and_hit_keeps_it() {
        let mut f = playing();
        let attacker = f.game.turn_holder().unwrap();
        let defender = f.game.opponent_of(attacker).unwrap();

        // cell 0 holds ship 0 in the fixed layout
        let report = f.game.target_cell(attacker, 0).unwrap();
        assert_eq!(report.result, ShotResult::Hit);
        assert!(!report.match_over);
        assert_eq!(f.game.turn_holder(), Some(attacker));
        assert_eq!(f.game.grid_of(defender).unwrap().cells()[0], CellState::Hit);

        // cell 5 is water
        let report = f.game.target_cell(attacker, 5).unwrap();
        assert_eq!(report.result, ShotResult::Miss);
        assert_eq!(f.game.turn_holder(), Some(defender));
        assert_eq!(
            f.game.grid_of(defender).unwrap().cells()[5],
            CellState::Missed
        );
    }

    #[test]
    fn out_of_turn_and_resolved_shots_change_nothing() {
        let mut f = playing();
        let attacker = f.game.turn_holder().unwrap();
        let defender = f.game.opponent_of(attacker).unwrap();

        assert_eq!(f.game.target_cell(defender, 0), Err(ActionRejected::NotYourTurn));
        assert_eq!(
            f.game.target_cell(attacker, 36),
            Err(ActionRejected::CellNotClickable(36))
        );

        f.game.target_cell(attacker, 0).unwrap();
        f.emitter.clear();
        assert_eq!(
            f.game.target_cell(attacker, 0),
            Err(ActionRejected::CellNotClickable(0))
        );
        assert_eq!(f.game.turn_holder(), Some(attacker));
        assert!(f.emitter.is_empty());
    }

    #[test]
    fn sinking_the_fleet_ends_the_match() {
        let mut f = playing();
        let attacker = f.game.turn_holder().unwrap();
        let defender = f.game.opponent_of(attacker).unwrap();
        let targets: Vec<usize> = f
            .game
            .grid_of(defender)
            .unwrap()
            .ships()
            .iter()
            .flat_map(|s| s.cells.clone())
            .collect();

        let last = targets.len() - 1;
        for (i, index) in targets.into_iter().enumerate() {
            let report = f.game.target_cell(attacker, index).unwrap();
            assert_eq!(report.match_over, i == last);
        }

        assert_eq!(f.game.phase(), MatchPhase::Finished);
        assert_eq!(f.game.winner(), Some(attacker));
        assert_eq!(f.game.turn_holder(), None);
        assert_eq!(
            f.emitter.messages_for(attacker).last(),
            Some(&ServerMsg::Outcome { won: true })
        );
        assert_eq!(
            f.emitter.messages_for(defender).last(),
            Some(&ServerMsg::Outcome { won: false })
        );
        assert!(!f.game.abort());
    }

    #[test]
    fn information_packet_hides_intact_ships() {
        let mut f = playing();
        let attacker = f.game.turn_holder().unwrap();
        f.game.target_cell(attacker, 0).unwrap();

        let sent = f.emitter.messages_for(attacker);
        let opponent_view = sent
            .iter()
            .find_map(|m| match m {
                ServerMsg::OpponentGridSnapshot { cells } => Some(cells.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(opponent_view[0], CellState::Hit);
        assert_eq!(opponent_view[1], CellState::Water);
        assert!(!opponent_view.contains(&CellState::IntactShip));
    }

    #[test]
    fn abort_notifies_everyone_once() {
        let mut f = fixture();
        f.game.add_second_player(f.two).unwrap();
        f.emitter.clear();

        assert!(f.game.abort());
        assert!(!f.game.abort());
        assert_eq!(f.game.phase(), MatchPhase::Finished);
        assert_eq!(f.emitter.messages_for(f.one), vec![ServerMsg::MatchAborted]);
        assert_eq!(f.emitter.messages_for(f.two), vec![ServerMsg::MatchAborted]);
    }

    #[test]
    fn registry_tracks_matches() {
        let f = fixture();
        let id = f.game.id();
        let mut registry = MatchRegistry::new();
        registry.insert(f.game);

        assert!(registry.contains(&id));
        assert_eq!(registry.active_matches(), 1);
        assert_eq!(registry.total_players(), 1);
        assert!(registry.remove(&id).is_some());
        assert_eq!(registry.active_matches(), 0);
    }
}
