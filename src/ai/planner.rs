use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::game::{
    Card, Coord, GameEvent, GameState, Highlight, PieceId, RuleEngine, RuleError, Side,
    SpellEffect,
};

const AI_SIDE: Side = Side::Ai;
const DEFAULT_MAX_CASTS: u8 = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Attack,
    Summon,
}

/// 每回合随机选取的行动顺序，各顺序概率相同。
pub const ACTION_ORDERS: [&[ActionKind]; 5] = [
    &[ActionKind::Move, ActionKind::Attack, ActionKind::Summon],
    &[ActionKind::Move, ActionKind::Summon, ActionKind::Attack],
    &[ActionKind::Attack, ActionKind::Summon],
    &[ActionKind::Summon, ActionKind::Move, ActionKind::Attack],
    &[ActionKind::Summon, ActionKind::Attack],
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// 单次召唤阶段最多打出的卡牌数。
    pub max_casts: u8,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_casts: DEFAULT_MAX_CASTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AiStep {
    Moved { piece: PieceId, to: Coord },
    Attacked { piece: PieceId, target: Coord },
    Played { card_id: u32, at: Coord },
    Skipped { kind: ActionKind },
}

#[derive(Debug, Clone, Serialize)]
pub struct AiTurnReport {
    pub order: Vec<ActionKind>,
    pub steps: Vec<AiStep>,
    pub events: Vec<GameEvent>,
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// 通过与玩家相同的操作入口完成整个 AI 回合，然后交还控制权。
    pub fn take_turn(
        &mut self,
        engine: &RuleEngine,
        state: &mut GameState,
    ) -> Result<AiTurnReport, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if state.control.active != AI_SIDE {
            return Err(RuleError::NotYourTurn);
        }
        let mark = state.event_log.len();
        engine.begin_turn(state, AI_SIDE);

        let order = ACTION_ORDERS
            .choose(&mut self.rng)
            .map(|order| order.to_vec())
            .unwrap_or_default();
        log::info!("AI turn order {order:?}");

        let mut steps = Vec::new();
        for kind in &order {
            if state.is_finished() {
                break;
            }
            let before = steps.len();
            match kind {
                ActionKind::Move => self.move_once(engine, state, &mut steps),
                ActionKind::Attack => self.attack_once(engine, state, &mut steps),
                ActionKind::Summon => self.play_cards(engine, state, &mut steps),
            }
            if steps.len() == before {
                steps.push(AiStep::Skipped { kind: *kind });
            }
        }

        if !state.is_finished() {
            engine.end_turn(state, AI_SIDE)?;
        }
        Ok(AiTurnReport {
            order,
            steps,
            events: state.events_since(mark),
        })
    }

    /// 本回合可以移动的棋子（被挑衅的除外）。
    pub fn move_candidates(state: &GameState) -> Vec<PieceId> {
        let turn = state.control.turn;
        state
            .pieces_of(AI_SIDE)
            .filter(|piece| !piece.is_summoning_sick(turn) && piece.can_move())
            .filter(|piece| !Self::is_engaged(state, piece.position))
            .filter(|piece| !RuleEngine::legal_moves(state, piece.id).is_empty())
            .map(|piece| piece.id)
            .collect()
    }

    pub fn attack_candidates(state: &GameState) -> Vec<PieceId> {
        let turn = state.control.turn;
        state
            .pieces_of(AI_SIDE)
            .filter(|piece| !piece.is_summoning_sick(turn) && piece.can_attack())
            .filter(|piece| !RuleEngine::legal_attacks(state, piece.id).is_empty())
            .map(|piece| piece.id)
            .collect()
    }

    fn is_engaged(state: &GameState, at: Coord) -> bool {
        state.board.surrounding(at).into_iter().any(|near| {
            state
                .piece_at(near)
                .map(|p| p.owner != AI_SIDE && p.can_provoke)
                .unwrap_or(false)
        })
    }

    fn cancel(engine: &RuleEngine, state: &mut GameState) {
        if let Err(error) = engine.clear_selection(state, AI_SIDE) {
            log::warn!("AI could not clear its selection: {error}");
        }
    }

    fn position_of(state: &GameState, piece: PieceId) -> Option<Coord> {
        state.piece(piece).map(|p| p.position)
    }

    fn move_once(&mut self, engine: &RuleEngine, state: &mut GameState, steps: &mut Vec<AiStep>) {
        let candidates = Self::move_candidates(state);
        let Some(&piece) = candidates.choose(&mut self.rng) else {
            return;
        };
        let Some(from) = Self::position_of(state, piece) else {
            return;
        };
        if let Err(error) = engine.select_or_act_cell(state, AI_SIDE, from) {
            log::debug!("AI could not select {piece} to move: {error}");
            return;
        }
        let lit = state.board.with_highlight(Highlight::Selectable);
        let Some(&to) = lit.choose(&mut self.rng) else {
            Self::cancel(engine, state);
            return;
        };
        match engine.select_or_act_cell(state, AI_SIDE, to) {
            Ok(_) => steps.push(AiStep::Moved { piece, to }),
            Err(error) => {
                log::warn!("AI move of {piece} to {to:?} failed: {error}");
                Self::cancel(engine, state);
            }
        }
    }

    fn attack_once(&mut self, engine: &RuleEngine, state: &mut GameState, steps: &mut Vec<AiStep>) {
        let candidates = Self::attack_candidates(state);
        let Some(&piece) = candidates.choose(&mut self.rng) else {
            return;
        };
        let targets = RuleEngine::legal_attacks(state, piece);
        let Some(&target) = targets.choose(&mut self.rng) else {
            return;
        };
        let Some(from) = Self::position_of(state, piece) else {
            return;
        };
        if let Err(error) = engine.select_or_act_cell(state, AI_SIDE, from) {
            log::debug!("AI could not select {piece} to attack: {error}");
            return;
        }
        if state.board.highlight(target) != Highlight::Attackable {
            Self::cancel(engine, state);
            return;
        }
        match engine.select_or_act_cell(state, AI_SIDE, target) {
            Ok(_) => steps.push(AiStep::Attacked { piece, target }),
            Err(error) => {
                log::warn!("AI attack by {piece} on {target:?} failed: {error}");
                Self::cancel(engine, state);
            }
        }
    }

    fn play_cards(&mut self, engine: &RuleEngine, state: &mut GameState, steps: &mut Vec<AiStep>) {
        let mut tried: Vec<usize> = Vec::new();
        let mut played = 0;
        while played < self.config.max_casts && !state.is_finished() {
            let candidates: Vec<usize> = state
                .player(AI_SIDE)
                .map(|player| player.affordable_slots())
                .unwrap_or_default()
                .into_iter()
                .filter(|slot| !tried.contains(slot))
                .collect();
            let Some(&slot) = candidates.choose(&mut self.rng) else {
                break;
            };
            tried.push(slot);
            let Some(card) = state
                .player(AI_SIDE)
                .and_then(|player| player.hand_card(slot))
                .cloned()
            else {
                continue;
            };

            if let Err(error) = engine.select_hand_card(state, AI_SIDE, slot) {
                log::debug!("AI could not stage {}: {error}", card.name);
                continue;
            }
            let targets: Vec<Coord> = state
                .board
                .with_highlight(Highlight::Selectable)
                .into_iter()
                .filter(|at| Self::suits(state, &card, *at))
                .collect();
            let Some(&at) = targets.choose(&mut self.rng) else {
                Self::cancel(engine, state);
                continue;
            };
            match engine.select_or_act_cell(state, AI_SIDE, at) {
                Ok(_) => {
                    played += 1;
                    steps.push(AiStep::Played {
                        card_id: card.id,
                        at,
                    });
                }
                Err(error) => {
                    log::warn!("AI could not play {} at {at:?}: {error}", card.name);
                    Self::cancel(engine, state);
                }
            }
        }
    }

    fn suits(state: &GameState, card: &Card, at: Coord) -> bool {
        let owner = state.piece_at(at).map(|p| p.owner);
        match card.tags.spell {
            Some(SpellEffect::Damage { .. }) | Some(SpellEffect::Destroy) => owner == Some(Side::Human),
            Some(SpellEffect::Heal { .. }) | Some(SpellEffect::Buff { .. }) => owner == Some(AI_SIDE),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{MatchSetup, Piece, Readiness};

    fn ai_to_move(seed: u64) -> (RuleEngine, GameState) {
        let engine = RuleEngine::new();
        let mut state = MatchSetup::sample().with_seed(seed).into_state();
        engine.start_match(&mut state).expect("match starts");
        (engine, state)
    }

    fn place(state: &mut GameState, card: Card, owner: Side, at: Coord) {
        let mut piece = Piece::from_card(&card, owner, at);
        piece.refresh();
        state.pieces.push(piece);
        if let Some(cell) = state.board.cell_mut(at) {
            cell.occupant = Some(card.id);
        }
    }

    #[test]
    fn ai_turn_hands_control_back() {
        for seed in 0..8 {
            let (engine, mut state) = ai_to_move(seed);
            engine.end_turn(&mut state, Side::Human).expect("human ends");
            let mut agent = AiAgent::with_seed(AiConfig::default(), seed);

            let report = agent.take_turn(&engine, &mut state).expect("ai plays");

            assert!(ACTION_ORDERS.iter().any(|order| *order == report.order.as_slice()));
            assert_eq!(state.control.active, Side::Human);
            assert_eq!(state.control.turn, 2);
            assert_eq!(state.player(Side::Ai).map(|p| p.mana), Some(0));
            assert_eq!(state.player(Side::Human).map(|p| p.mana), Some(3));
            assert!(state
                .pieces_of(Side::Human)
                .all(|piece| piece.readiness == Readiness::Ready));
            assert!(report
                .events
                .iter()
                .any(|e| matches!(e, GameEvent::TurnEnded { side: Side::Ai })));
        }
    }

    #[test]
    fn provoked_avatar_attacks_the_provoker() {
        for seed in 0..8 {
            let (engine, mut state) = ai_to_move(100 + seed);
            place(
                &mut state,
                Card::unit(7, "Ironcliff Guardian", 5, 3, 10, "Provoke"),
                Side::Human,
                Coord::new(6, 2),
            );
            engine.end_turn(&mut state, Side::Human).expect("human ends");
            let mut agent = AiAgent::with_seed(AiConfig::default(), seed);

            let report = agent.take_turn(&engine, &mut state).expect("ai plays");

            assert!(report.steps.contains(&AiStep::Attacked {
                piece: 100,
                target: Coord::new(6, 2),
            }));
            assert!(!report.steps.iter().any(|s| matches!(s, AiStep::Moved { piece: 100, .. })));
            assert!(state.piece(7).map(|p| p.health < 10).unwrap_or(false));
        }
    }

    #[test]
    fn nothing_to_do_is_skipped_not_retried() {
        let (engine, mut state) = ai_to_move(5);
        if let Some(player) = state.player_mut(Side::Ai) {
            player.hand.iter_mut().for_each(|slot| *slot = None);
        }
        engine.end_turn(&mut state, Side::Human).expect("human ends");
        let mut agent = AiAgent::with_seed(AiConfig::default(), 5);

        let report = agent.take_turn(&engine, &mut state).expect("ai plays");

        assert!(report.steps.contains(&AiStep::Skipped { kind: ActionKind::Summon }));
        assert!(report.steps.contains(&AiStep::Skipped { kind: ActionKind::Attack }));
        assert_eq!(report.steps.len(), report.order.len());
    }

    #[test]
    fn ai_refuses_to_act_out_of_turn() {
        let (engine, mut state) = ai_to_move(9);
        let mut agent = AiAgent::new(AiConfig::default());
        assert!(matches!(
            agent.take_turn(&engine, &mut state),
            Err(RuleError::NotYourTurn)
        ));
    }
}
