use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    board::Coord,
    effects::{EffectContext, EffectRegistry, EffectTrigger, Mutation, STANDARD_EFFECTS},
    events::{self, CellEvent, PieceEvent},
    state::{
        GameEvent, GameState, IntegrityError, Interaction, Piece, PieceId, Side, VictoryState,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the match is over")]
    GameFinished,
    #[error("not your turn")]
    NotYourTurn,
    #[error("hand slot {slot} does not exist")]
    InvalidHandSlot { slot: usize },
    #[error("hand slot {slot} is empty")]
    EmptyHandSlot { slot: usize },
    #[error("not enough mana ({available}/{required})")]
    InsufficientMana { required: u8, available: u8 },
    #[error("cell ({x}, {y}) is off the board")]
    CellOutOfBounds { x: i32, y: i32 },
    #[error("invalid target")]
    InvalidTarget,
    #[error("unit {piece} cannot act any more this turn")]
    PieceNotReady { piece: PieceId },
    #[error("unit {piece} cannot act on the turn it was summoned")]
    SummoningSickness { piece: PieceId },
    #[error("nothing is selected")]
    NoSelection,
    #[error("match setup is invalid: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

impl RuleError {
    /// 需要通知操作方的错误。
    pub fn is_notifiable(&self) -> bool {
        matches!(
            self,
            RuleError::NotYourTurn
                | RuleError::InsufficientMana { .. }
                | RuleError::InvalidTarget
                | RuleError::SummoningSickness { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl RuleResolution {
    pub fn new(state: GameState, mut events: Vec<GameEvent>) -> Self {
        let victory = state.outcome;
        if let Some(outcome) = victory {
            let has_event = events
                .iter()
                .any(|event| matches!(event, GameEvent::MatchWon { .. }));
            if !has_event {
                events.push(GameEvent::MatchWon {
                    winner: outcome.winner,
                    reason: outcome.reason,
                });
            }
        }

        Self {
            state,
            events,
            victory,
        }
    }
}

/// 规则引擎：回合状态机与玩家操作入口，结算细节见 `combat`。
#[derive(Debug, Clone)]
pub struct RuleEngine {
    registry: EffectRegistry,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::with_registry(STANDARD_EFFECTS.clone())
    }

    pub fn with_registry(registry: EffectRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    fn ensure_turn_owner(state: &GameState, side: Side) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if state.control.active != side {
            return Err(RuleError::NotYourTurn);
        }
        Ok(())
    }

    fn ensure_on_board(state: &GameState, at: Coord) -> Result<(), RuleError> {
        if state.board.contains(at) {
            Ok(())
        } else {
            Err(RuleError::CellOutOfBounds { x: at.x, y: at.y })
        }
    }

    /// 执行一次玩家操作并返回其产生的事件；可通知的错误会记录为提示。
    fn inbound<F>(&self, state: &mut GameState, side: Side, action: F) -> Result<Vec<GameEvent>, RuleError>
    where
        F: FnOnce(&Self, &mut GameState) -> Result<(), RuleError>,
    {
        let mark = state.event_log.len();
        match Self::ensure_turn_owner(state, side).and_then(|_| action(self, state)) {
            Ok(()) => Ok(state.events_since(mark)),
            Err(error) => {
                log::debug!("{side:?} action rejected: {error}");
                if error.is_notifiable() {
                    state.notify(side, error.to_string());
                }
                Err(error)
            }
        }
    }

    pub(crate) fn trigger(&self, state: &mut GameState, trigger: EffectTrigger, source: PieceId, owner: Side) {
        if !self.registry.has(trigger, source) {
            return;
        }
        let ctx = EffectContext::new(trigger, source, owner, state.control.active);
        let mutations = self.registry.fire(&ctx);
        self.apply_mutations(state, mutations);
    }

    pub(crate) fn apply_mutations(&self, state: &mut GameState, mutations: Vec<Mutation>) {
        for mutation in mutations {
            if state.is_finished() {
                return;
            }
            match mutation {
                Mutation::Publish(event) => events::publish(state, self, event),
                Mutation::Draw { side } => {
                    state.draw_card(side);
                }
            }
        }
    }

    pub(crate) fn reset_selection(&self, state: &mut GameState) {
        events::publish(state, self, CellEvent::ResetHighlight);
        state.control.clear_selection();
    }

    /// 放置双方化身、发起始手牌并开始玩家回合。
    pub fn start_match(&self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;
        if !state.pieces.is_empty() {
            state.clear();
        }
        let mark = state.event_log.len();
        state.control.reset();
        state.record_event(GameEvent::BoardDrawn {
            width: state.board.width(),
            height: state.board.height(),
        });

        let config = state.config.clone();
        for (side, at) in [
            (Side::Human, config.human_avatar_at),
            (Side::Ai, config.ai_avatar_at),
        ] {
            let avatar = Piece::avatar(side, config.avatar_health, config.avatar_attack, at);
            state.pieces.push(avatar);
            events::publish(
                state,
                self,
                CellEvent::PlacePiece {
                    at,
                    piece: side.avatar_id(),
                },
            );
            state.record_event(GameEvent::PiecePlaced {
                piece: side.avatar_id(),
                owner: side,
                at,
            });
            state.sync_avatar(side, config.avatar_attack, config.avatar_health);
        }

        for _ in 0..config.opening_hand {
            for side in [Side::Human, Side::Ai] {
                state.draw_card(side);
            }
        }

        events::publish(state, self, PieceEvent::BecomeReady { side: Side::Human });
        self.begin_turn(state, Side::Human);
        log::info!("match started on a {}x{} board", config.board_width, config.board_height);
        Ok(state.events_since(mark))
    }

    pub fn begin_turn(&self, state: &mut GameState, side: Side) {
        if state.is_finished() {
            return;
        }
        let turn = state.control.turn;
        state.set_mana(side, turn as i32 + 1);
        if side == Side::Ai {
            state.control.turn += 1;
        }
        state.control.interaction = Interaction::Ready;
        log::info!("{side:?} turn {turn} begins");
        state.record_event(GameEvent::TurnStarted { side, turn });
    }

    pub fn select_hand_card(
        &self,
        state: &mut GameState,
        side: Side,
        slot: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.inbound(state, side, |engine, state| {
            let player = state.player(side).ok_or(RuleError::NotYourTurn)?;
            if slot >= player.hand.len() {
                return Err(RuleError::InvalidHandSlot { slot });
            }
            let card = player
                .hand_card(slot)
                .cloned()
                .ok_or(RuleError::EmptyHandSlot { slot })?;
            if card.cost > player.mana {
                return Err(RuleError::InsufficientMana {
                    required: card.cost,
                    available: player.mana,
                });
            }

            engine.reset_selection(state);
            state.control.select_card(slot);
            state.record_event(GameEvent::CardSelected {
                side,
                slot,
                card_id: card.id,
            });

            if card.is_spell() {
                if let Some(range) = card.tags.target {
                    events::publish(state, engine, CellEvent::SearchUnits { range });
                }
            } else if card.tags.area {
                events::publish(state, engine, CellEvent::AreaHighlight);
            } else {
                events::publish(state, engine, CellEvent::SummonHighlight);
            }
            engine.trigger(state, EffectTrigger::CardSelected, card.id, side);
            Ok(())
        })
    }

    /// 点击棋盘格子，含义取决于当前交互状态。
    pub fn select_or_act_cell(
        &self,
        state: &mut GameState,
        side: Side,
        at: Coord,
    ) -> Result<Vec<GameEvent>, RuleError> {
        self.inbound(state, side, |engine, state| {
            Self::ensure_on_board(state, at)?;
            match state.control.interaction {
                Interaction::CardSelected => engine.play_selected_card(state, side, at),
                Interaction::Ready => engine.activate(state, side, at),
                Interaction::UnitSelected => engine.operate(state, side, at),
            }
        })
    }

    pub fn clear_selection(&self, state: &mut GameState, side: Side) -> Result<Vec<GameEvent>, RuleError> {
        self.inbound(state, side, |engine, state| {
            engine.reset_selection(state);
            Ok(())
        })
    }

    /// 清空法力、抽牌并把控制权交给对手。
    pub fn end_turn(&self, state: &mut GameState, side: Side) -> Result<Vec<GameEvent>, RuleError> {
        self.inbound(state, side, |engine, state| {
            state.set_mana(side, 0);
            state.draw_card(side);
            if state.is_finished() {
                return Ok(());
            }
            engine.reset_selection(state);
            state.record_event(GameEvent::TurnEnded { side });

            let next = side.opponent();
            state.control.active = next;
            events::publish(state, engine, PieceEvent::BecomeReady { side: next });
            if next == Side::Human {
                engine.begin_turn(state, next);
            }
            Ok(())
        })
    }

    fn play_selected_card(&self, state: &mut GameState, side: Side, at: Coord) -> Result<(), RuleError> {
        let slot = state.control.selected_card.ok_or(RuleError::NoSelection)?;
        let card = state
            .player(side)
            .and_then(|player| player.hand_card(slot))
            .cloned()
            .ok_or(RuleError::EmptyHandSlot { slot })?;
        if card.is_spell() {
            self.cast_spell(state, at);
            Ok(())
        } else {
            self.summon(state, side, slot, at)
        }
    }

    pub fn check_victory(state: &GameState) -> Option<VictoryState> {
        state.outcome
    }
}
