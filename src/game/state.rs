use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::board::{Board, Coord};
use super::config::MatchConfig;
use super::events::BusStats;

/// 全局唯一的卡牌标识，棋子沿用其卡牌的标识。
pub type CardId = u32;
/// 棋子标识。不小于 [`AVATAR_ID_FLOOR`] 的为化身。
pub type PieceId = u32;

pub const AVATAR_ID_FLOOR: PieceId = 99;
pub const HUMAN_AVATAR_ID: PieceId = 99;
pub const AI_AVATAR_ID: PieceId = 100;

const HEAL_SPELL_AMOUNT: i32 = 5;
const DAMAGE_SPELL_AMOUNT: i32 = 2;
const BUFF_SPELL_ATTACK: i32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Human,
    Ai,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Human => Side::Ai,
            Side::Ai => Side::Human,
        }
    }

    pub fn avatar_id(self) -> PieceId {
        match self {
            Side::Human => HUMAN_AVATAR_ID,
            Side::Ai => AI_AVATAR_ID,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VictoryReason {
    AvatarDestroyed { loser: Side },
    DeckOut { loser: Side },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictoryState {
    pub winner: Side,
    pub reason: VictoryReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    #[default]
    Unit,
    Spell,
}

/// 法术可以指定的目标范围。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetRange {
    Enemy,
    NonAvatar,
    AnyUnit,
    OwnAvatar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpellEffect {
    Damage { amount: i32 },
    Destroy,
    Heal { amount: i32 },
    Buff { attack: i32 },
}

/// 从卡牌规则文本中解析出的能力标记。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RuleTags {
    pub ranged: bool,
    pub double_action: bool,
    pub provoke: bool,
    pub ranged_move: bool,
    /// 可放置在任意空格。
    pub area: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spell: Option<SpellEffect>,
}

impl RuleTags {
    pub fn parse(rules: &str, kind: CardKind) -> Self {
        let text = rules.to_lowercase();
        match kind {
            CardKind::Unit => Self {
                ranged: text.contains("ranged"),
                double_action: text.contains("twice"),
                provoke: text.contains("provoke"),
                ranged_move: text.contains("flying"),
                area: text.contains("anywhere on the board") || text.contains("airdrop"),
                target: None,
                spell: None,
            },
            CardKind::Spell => {
                let target = if text.contains("unit") {
                    if text.contains("enemy") {
                        Some(TargetRange::Enemy)
                    } else if text.contains("non-avatar") {
                        Some(TargetRange::NonAvatar)
                    } else {
                        Some(TargetRange::AnyUnit)
                    }
                } else if text.contains("your avatar") {
                    Some(TargetRange::OwnAvatar)
                } else {
                    None
                };
                let spell = if text.contains("enemy") {
                    Some(SpellEffect::Damage {
                        amount: DAMAGE_SPELL_AMOUNT,
                    })
                } else if text.contains("non-avatar") {
                    Some(SpellEffect::Destroy)
                } else if text.contains("health") {
                    Some(SpellEffect::Heal {
                        amount: HEAL_SPELL_AMOUNT,
                    })
                } else if text.contains("gains") {
                    Some(SpellEffect::Buff {
                        attack: BUFF_SPELL_ATTACK,
                    })
                } else {
                    None
                };
                Self {
                    target,
                    spell,
                    ..Self::default()
                }
            }
        }
    }
}

/// 卡组数据中的原始卡牌定义。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDef {
    pub id: CardId,
    pub name: String,
    pub cost: u8,
    #[serde(default)]
    pub kind: CardKind,
    #[serde(default)]
    pub attack: i32,
    #[serde(default)]
    pub health: i32,
    #[serde(default)]
    pub rules: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "CardDef")]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub cost: u8,
    pub kind: CardKind,
    pub attack: i32,
    pub health: i32,
    pub rules: String,
    pub tags: RuleTags,
}

impl From<CardDef> for Card {
    fn from(def: CardDef) -> Self {
        let tags = RuleTags::parse(&def.rules, def.kind);
        Self {
            id: def.id,
            name: def.name,
            cost: def.cost,
            kind: def.kind,
            attack: def.attack,
            health: def.health,
            rules: def.rules,
            tags,
        }
    }
}

impl Card {
    pub fn unit(id: CardId, name: &str, cost: u8, attack: i32, health: i32, rules: &str) -> Self {
        Card::from(CardDef {
            id,
            name: name.into(),
            cost,
            kind: CardKind::Unit,
            attack,
            health,
            rules: rules.into(),
        })
    }

    pub fn spell(id: CardId, name: &str, cost: u8, rules: &str) -> Self {
        Card::from(CardDef {
            id,
            name: name.into(),
            cost,
            kind: CardKind::Spell,
            attack: 0,
            health: 0,
            rules: rules.into(),
        })
    }

    pub fn is_spell(&self) -> bool {
        self.kind == CardKind::Spell
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
    HasMoved,
    HasAttacked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub health: i32,
    pub slain: bool,
}

/// 棋盘上的单位（包括化身）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Piece {
    pub id: PieceId,
    pub owner: Side,
    pub position: Coord,
    pub health: i32,
    pub max_health: i32,
    pub attack: i32,
    pub moves_left: u8,
    pub attacks_left: u8,
    pub max_moves: u8,
    pub max_attacks: u8,
    pub readiness: Readiness,
    pub ranged_attack: bool,
    pub ranged_move: bool,
    pub can_provoke: bool,
    pub provoked: bool,
    pub summon_turn: u32,
}

impl Piece {
    pub fn from_card(card: &Card, owner: Side, position: Coord) -> Self {
        let budget = if card.tags.double_action { 2 } else { 1 };
        Self {
            id: card.id,
            owner,
            position,
            health: card.health,
            max_health: card.health,
            attack: card.attack,
            moves_left: budget,
            attacks_left: budget,
            max_moves: budget,
            max_attacks: budget,
            readiness: Readiness::NotReady,
            ranged_attack: card.tags.ranged,
            ranged_move: card.tags.ranged_move,
            can_provoke: card.tags.provoke,
            provoked: false,
            summon_turn: 0,
        }
    }

    pub fn avatar(side: Side, health: i32, attack: i32, position: Coord) -> Self {
        Self {
            id: side.avatar_id(),
            owner: side,
            position,
            health,
            max_health: health,
            attack,
            moves_left: 1,
            attacks_left: 1,
            max_moves: 1,
            max_attacks: 1,
            readiness: Readiness::NotReady,
            ranged_attack: false,
            ranged_move: false,
            can_provoke: false,
            provoked: false,
            summon_turn: 0,
        }
    }

    pub fn is_avatar(&self) -> bool {
        self.id >= AVATAR_ID_FLOOR
    }

    /// 非化身棋子在召唤当回合不能行动。
    pub fn is_summoning_sick(&self, turn: u32) -> bool {
        !self.is_avatar() && self.summon_turn == turn
    }

    pub fn can_move(&self) -> bool {
        self.readiness == Readiness::Ready && self.moves_left > 0
    }

    pub fn can_attack(&self) -> bool {
        matches!(self.readiness, Readiness::Ready | Readiness::HasMoved) && self.attacks_left > 0
    }

    pub fn refresh(&mut self) {
        self.readiness = Readiness::Ready;
        self.moves_left = self.max_moves;
        self.attacks_left = self.max_attacks;
        self.provoked = false;
    }

    pub fn spend_move(&mut self) {
        self.moves_left = self.moves_left.saturating_sub(1);
        if self.moves_left == 0 {
            self.readiness = Readiness::HasMoved;
        }
    }

    pub fn spend_attack(&mut self) {
        self.attacks_left = self.attacks_left.saturating_sub(1);
        if self.attacks_left == 0 {
            self.readiness = Readiness::HasAttacked;
        }
    }

    /// 写入新的生命值：低于 1 时归零并判定阵亡，超过上限时按 `allow_over_max` 决定是否截断。
    pub fn change_health(&mut self, value: i32, allow_over_max: bool) -> HealthChange {
        let health = if value < 1 {
            0
        } else if value > self.max_health && !allow_over_max {
            self.max_health
        } else {
            value
        };
        self.health = health;
        HealthChange {
            health,
            slain: health == 0,
        }
    }
}

/// 对战双方之一的状态，包括手牌、牌库与法力。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub side: Side,
    pub health: i32,
    pub attack: i32,
    pub mana: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deck: Vec<Card>,
    pub hand: Vec<Option<Card>>,
}

impl Player {
    pub fn new(side: Side, health: i32, attack: i32, deck: Vec<Card>, hand_slots: usize) -> Self {
        Self {
            side,
            health,
            attack,
            mana: 0,
            deck,
            hand: vec![None; hand_slots],
        }
    }

    pub fn hand_card(&self, slot: usize) -> Option<&Card> {
        self.hand.get(slot).and_then(Option::as_ref)
    }

    pub fn take_card(&mut self, slot: usize) -> Option<Card> {
        self.hand.get_mut(slot).and_then(Option::take)
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.hand.iter().position(Option::is_none)
    }

    pub fn hand_size(&self) -> usize {
        self.hand.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn affordable_slots(&self) -> Vec<usize> {
        self.hand
            .iter()
            .enumerate()
            .filter_map(|(slot, card)| match card {
                Some(card) if card.cost <= self.mana => Some(slot),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    #[default]
    Ready,
    CardSelected,
    UnitSelected,
}

/// 回合控制器：当前行动方与交互状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnController {
    pub turn: u32,
    pub active: Side,
    pub interaction: Interaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_card: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_cell: Option<Coord>,
}

impl TurnController {
    pub fn new() -> Self {
        Self {
            turn: 1,
            active: Side::Human,
            interaction: Interaction::Ready,
            selected_card: None,
            selected_cell: None,
        }
    }

    pub fn select_card(&mut self, slot: usize) {
        self.selected_card = Some(slot);
        self.selected_cell = None;
        self.interaction = Interaction::CardSelected;
    }

    pub fn select_cell(&mut self, at: Coord) {
        self.selected_card = None;
        self.selected_cell = Some(at);
        self.interaction = Interaction::UnitSelected;
    }

    pub fn clear_selection(&mut self) {
        self.selected_card = None;
        self.selected_cell = None;
        self.interaction = Interaction::Ready;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new()
    }
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    BoardDrawn {
        width: i32,
        height: i32,
    },
    CellHighlighted {
        at: Coord,
        highlight: super::board::Highlight,
    },
    PiecePlaced {
        piece: PieceId,
        owner: Side,
        at: Coord,
    },
    PieceMoved {
        piece: PieceId,
        from: Coord,
        to: Coord,
    },
    PieceRemoved {
        piece: PieceId,
        at: Coord,
    },
    AttackResolved {
        attacker: PieceId,
        defender: PieceId,
        damage: i32,
        counter: bool,
    },
    PieceStatsChanged {
        piece: PieceId,
        attack: i32,
        health: i32,
    },
    ParticipantHealthChanged {
        side: Side,
        health: i32,
    },
    ManaChanged {
        side: Side,
        mana: u8,
    },
    CardDrawn {
        side: Side,
        slot: usize,
        card_id: CardId,
    },
    CardSelected {
        side: Side,
        slot: usize,
        card_id: CardId,
    },
    CardPlayed {
        side: Side,
        card_id: CardId,
        at: Coord,
    },
    TurnStarted {
        side: Side,
        turn: u32,
    },
    TurnEnded {
        side: Side,
    },
    Notification {
        side: Side,
        text: String,
    },
    MatchWon {
        winner: Side,
        reason: VictoryReason,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    InvalidBoard { width: i32, height: i32 },
    AvatarOutOfBounds { side: Side, at: Coord },
    AvatarsOverlap { at: Coord },
    DuplicateCardId { card_id: CardId },
    ReservedCardId { card_id: CardId },
    EmptyHand { hand_slots: usize },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub config: MatchConfig,
    pub board: Board,
    pub pieces: Vec<Piece>,
    pub players: Vec<Player>,
    pub control: TurnController,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VictoryState>,
    pub bus: BusStats,
    #[serde(skip)]
    rng: SmallRng,
}

impl GameState {
    pub fn new(config: MatchConfig, human_deck: Vec<Card>, ai_deck: Vec<Card>) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let board = Board::new(config.board_width, config.board_height);
        let players = vec![
            Player::new(
                Side::Human,
                config.avatar_health,
                config.avatar_attack,
                human_deck,
                config.hand_slots,
            ),
            Player::new(
                Side::Ai,
                config.avatar_health,
                config.avatar_attack,
                ai_deck,
                config.hand_slots,
            ),
        ];
        Self {
            config,
            board,
            pieces: Vec::new(),
            players,
            control: TurnController::new(),
            event_log: Vec::new(),
            outcome: None,
            bus: BusStats::default(),
            rng,
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn events_since(&self, mark: usize) -> Vec<GameEvent> {
        self.event_log.get(mark..).map(<[GameEvent]>::to_vec).unwrap_or_default()
    }

    pub fn notify(&mut self, side: Side, text: impl Into<String>) {
        self.record_event(GameEvent::Notification {
            side,
            text: text.into(),
        });
    }

    pub fn active_side(&self) -> Side {
        self.control.active
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn player(&self, side: Side) -> Option<&Player> {
        self.players.iter().find(|player| player.side == side)
    }

    pub fn player_mut(&mut self, side: Side) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.side == side)
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|piece| piece.id == id)
    }

    pub fn piece_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        self.pieces.iter_mut().find(|piece| piece.id == id)
    }

    pub fn piece_at(&self, at: Coord) -> Option<&Piece> {
        self.board.occupant(at).and_then(|id| self.piece(id))
    }

    pub fn pieces_of(&self, side: Side) -> impl Iterator<Item = &Piece> {
        self.pieces.iter().filter(move |piece| piece.owner == side)
    }

    pub fn avatar(&self, side: Side) -> Option<&Piece> {
        self.piece(side.avatar_id())
    }

    pub fn set_mana(&mut self, side: Side, mana: i32) {
        let max = self.config.max_mana;
        let clamped = mana.clamp(0, i32::from(max)) as u8;
        if let Some(player) = self.player_mut(side) {
            player.mana = clamped;
        }
        self.record_event(GameEvent::ManaChanged {
            side,
            mana: clamped,
        });
    }

    pub fn sync_avatar(&mut self, side: Side, attack: i32, health: i32) {
        if let Some(player) = self.player_mut(side) {
            player.attack = attack;
            player.health = health;
        }
        self.record_event(GameEvent::ParticipantHealthChanged { side, health });
    }

    /// 从牌库随机抽一张牌放入第一个空手牌槽。
    pub fn draw_card(&mut self, side: Side) -> Option<GameEvent> {
        let (deck_len, free_slot) = {
            let player = self.player(side)?;
            (player.deck.len(), player.free_slot())
        };
        if deck_len == 0 {
            log::info!("{side:?} drew from an empty deck");
            self.declare_victory(side.opponent(), VictoryReason::DeckOut { loser: side });
            return None;
        }
        let Some(slot) = free_slot else {
            log::warn!("{side:?} hand is full, draw skipped");
            self.notify(side, "Hand is full, no card drawn");
            return None;
        };
        let pick = self.rng.gen_range(0..deck_len);
        let player = self.player_mut(side)?;
        let card = player.deck.swap_remove(pick);
        let card_id = card.id;
        player.hand[slot] = Some(card);
        let event = GameEvent::CardDrawn {
            side,
            slot,
            card_id,
        };
        self.record_event(event.clone());
        Some(event)
    }

    pub fn declare_victory(&mut self, winner: Side, reason: VictoryReason) -> VictoryState {
        let victory = VictoryState { winner, reason };
        if self.outcome.is_none() {
            log::info!("match over: {winner:?} wins ({reason:?})");
            self.record_event(GameEvent::MatchWon { winner, reason });
            self.outcome = Some(victory);
            self.clear();
        }
        victory
    }

    pub fn clear(&mut self) {
        self.board.clear();
        self.pieces.clear();
        self.control.reset();
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let width = self.config.board_width;
        let height = self.config.board_height;
        if width <= 0 || height <= 0 {
            return Err(IntegrityError::InvalidBoard { width, height });
        }
        if self.config.hand_slots == 0 {
            return Err(IntegrityError::EmptyHand { hand_slots: 0 });
        }
        for (side, at) in [
            (Side::Human, self.config.human_avatar_at),
            (Side::Ai, self.config.ai_avatar_at),
        ] {
            if !self.board.contains(at) {
                return Err(IntegrityError::AvatarOutOfBounds { side, at });
            }
        }
        if self.config.human_avatar_at == self.config.ai_avatar_at {
            return Err(IntegrityError::AvatarsOverlap {
                at: self.config.human_avatar_at,
            });
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            for card in player.deck.iter().chain(player.hand.iter().flatten()) {
                if card.id >= AVATAR_ID_FLOOR {
                    return Err(IntegrityError::ReservedCardId { card_id: card.id });
                }
                if !seen.insert(card.id) {
                    return Err(IntegrityError::DuplicateCardId { card_id: card.id });
                }
            }
        }
        Ok(())
    }
}
