use serde::{Deserialize, Serialize};

use super::board::{Cell, Coord, Highlight, MOVE_RINGS, ORTHOGONAL, SURROUNDING};
use super::state::{GameEvent, GameState, Piece, PieceId, Side, TargetRange};

/// 属性修改时的生命值限制。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatLimit {
    CapAtMax,
    OutsideOwnersTurn,
}

/// 按格子顺序投递给每个棋盘格子的事件。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellEvent {
    ResetHighlight,
    SearchUnits { range: TargetRange },
    AreaHighlight,
    SummonHighlight,
    CheckSummonNeighbour { at: Coord },
    PlacePiece { at: Coord, piece: PieceId },
    MoveHighlight { at: Coord, step: u8 },
    AttackHighlight { at: Coord },
    RangedAttackHighlight,
    RangedMoveHighlight,
    SearchProvoke { at: Coord, provoked: PieceId },
    ClearProvoke { at: Coord },
    CastSpell { at: Coord },
    RemovePiece { at: Coord },
}

/// 按召唤顺序投递给每个棋子的事件。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PieceEvent {
    BecomeReady {
        side: Side,
    },
    Attacked {
        attacker: PieceId,
        attacker_at: Coord,
        defender: PieceId,
        damage: i32,
        allow_counter: bool,
    },
    Modify {
        target: PieceId,
        attack: i32,
        health: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<StatLimit>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum BusEvent {
    Cell(CellEvent),
    Piece(PieceEvent),
}

impl From<CellEvent> for BusEvent {
    fn from(event: CellEvent) -> Self {
        BusEvent::Cell(event)
    }
}

impl From<PieceEvent> for BusEvent {
    fn from(event: PieceEvent) -> Self {
        BusEvent::Piece(event)
    }
}

/// 订阅者处理事件后请求的后续动作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Publish(BusEvent),
    Emit(GameEvent),
    Provoked { piece: PieceId },
    Unprovoked { piece: PieceId },
    SpellLanded { at: Coord, target: PieceId },
    Strike { attacker: PieceId, defender: PieceId },
    AvatarStats { side: Side, attack: i32, health: i32 },
    Slain { piece: PieceId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceView {
    pub id: PieceId,
    pub owner: Side,
    pub is_avatar: bool,
    pub can_provoke: bool,
}

impl From<&Piece> for PieceView {
    fn from(piece: &Piece) -> Self {
        Self {
            id: piece.id,
            owner: piece.owner,
            is_avatar: piece.is_avatar(),
            can_provoke: piece.can_provoke,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scope {
    pub active: Side,
    pub occupant: Option<PieceView>,
}

impl Scope {
    fn of(state: &GameState, occupant: Option<PieceId>) -> Self {
        Self {
            active: state.control.active,
            occupant: occupant.and_then(|id| state.piece(id)).map(PieceView::from),
        }
    }

    fn enemy_occupant(&self) -> Option<PieceView> {
        self.occupant.filter(|piece| piece.owner != self.active)
    }
}

pub trait Subscriber {
    type Event;

    fn on_event(&mut self, event: &Self::Event, scope: &Scope) -> Vec<Reaction>;
}

pub trait ReactionSink {
    fn react(&self, state: &mut GameState, reaction: Reaction);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub deepest: u32,
    pub truncated: u64,
    #[serde(skip)]
    depth: u32,
}

impl BusStats {
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

impl TargetRange {
    pub fn admits(self, piece: PieceView, active: Side) -> bool {
        match self {
            TargetRange::Enemy => piece.owner != active,
            TargetRange::NonAvatar => !piece.is_avatar,
            TargetRange::AnyUnit => true,
            TargetRange::OwnAvatar => piece.is_avatar && piece.owner == active,
        }
    }
}

fn paint(cell: &mut Cell, highlight: Highlight) -> Vec<Reaction> {
    if cell.highlight == highlight {
        return Vec::new();
    }
    cell.highlight = highlight;
    vec![Reaction::Emit(GameEvent::CellHighlighted {
        at: cell.coord,
        highlight,
    })]
}

fn around(at: Coord, offsets: &[(i32, i32)]) -> impl Iterator<Item = Coord> + '_ {
    offsets
        .iter()
        .map(move |(dx, dy)| at.offset(*dx, *dy))
        .filter(|c| c.x >= 0 && c.y >= 0)
}

impl Subscriber for Cell {
    type Event = CellEvent;

    fn on_event(&mut self, event: &CellEvent, scope: &Scope) -> Vec<Reaction> {
        match *event {
            CellEvent::ResetHighlight => paint(self, Highlight::Normal),
            CellEvent::SearchUnits { range } => match scope.occupant {
                Some(piece) if range.admits(piece, scope.active) => {
                    paint(self, Highlight::Selectable)
                }
                _ => Vec::new(),
            },
            CellEvent::AreaHighlight if self.is_empty() && self.highlight == Highlight::Normal => {
                paint(self, Highlight::Selectable)
            }
            CellEvent::RangedMoveHighlight
                if self.is_empty() && self.highlight == Highlight::Normal =>
            {
                let mut reactions = paint(self, Highlight::Selectable);
                reactions.extend(
                    around(self.coord, &SURROUNDING)
                        .map(|at| Reaction::Publish(CellEvent::AttackHighlight { at }.into())),
                );
                reactions
            }
            CellEvent::SummonHighlight => match scope.occupant {
                Some(piece) if piece.owner == scope.active => around(self.coord, &SURROUNDING)
                    .map(|at| Reaction::Publish(CellEvent::CheckSummonNeighbour { at }.into()))
                    .collect(),
                _ => Vec::new(),
            },
            CellEvent::CheckSummonNeighbour { at } if at == self.coord && self.is_empty() => {
                paint(self, Highlight::Selectable)
            }
            CellEvent::PlacePiece { at, piece } if at == self.coord && self.is_empty() => {
                self.occupant = Some(piece);
                Vec::new()
            }
            CellEvent::MoveHighlight { at, step }
                if at == self.coord && self.is_empty() && self.highlight == Highlight::Normal =>
            {
                let mut reactions = paint(self, Highlight::Selectable);
                if step < MOVE_RINGS {
                    reactions.extend(around(self.coord, &ORTHOGONAL).map(|next| {
                        Reaction::Publish(
                            CellEvent::MoveHighlight {
                                at: next,
                                step: step + 1,
                            }
                            .into(),
                        )
                    }));
                }
                reactions.extend(
                    around(self.coord, &SURROUNDING)
                        .map(|at| Reaction::Publish(CellEvent::AttackHighlight { at }.into())),
                );
                reactions
            }
            CellEvent::AttackHighlight { at }
                if at == self.coord && self.highlight == Highlight::Normal =>
            {
                match scope.enemy_occupant() {
                    Some(_) => paint(self, Highlight::Attackable),
                    None => Vec::new(),
                }
            }
            CellEvent::RangedAttackHighlight => match scope.enemy_occupant() {
                Some(_) => paint(self, Highlight::Attackable),
                None => Vec::new(),
            },
            CellEvent::SearchProvoke { at, provoked } if at == self.coord => {
                match scope.enemy_occupant() {
                    Some(piece) if piece.can_provoke => {
                        let mut reactions = paint(self, Highlight::Attackable);
                        reactions.push(Reaction::Provoked { piece: provoked });
                        reactions
                    }
                    _ => Vec::new(),
                }
            }
            CellEvent::ClearProvoke { at } if at == self.coord => match scope.enemy_occupant() {
                Some(piece) => vec![Reaction::Unprovoked { piece: piece.id }],
                None => Vec::new(),
            },
            CellEvent::CastSpell { at } if at == self.coord => {
                match (self.highlight, self.occupant) {
                    (Highlight::Selectable, Some(target)) => {
                        vec![Reaction::SpellLanded { at, target }]
                    }
                    _ => Vec::new(),
                }
            }
            CellEvent::RemovePiece { at } if at == self.coord => match self.occupant.take() {
                Some(piece) => vec![Reaction::Emit(GameEvent::PieceRemoved { piece, at })],
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

impl Subscriber for Piece {
    type Event = PieceEvent;

    fn on_event(&mut self, event: &PieceEvent, scope: &Scope) -> Vec<Reaction> {
        match *event {
            PieceEvent::BecomeReady { side } if side == self.owner => {
                self.refresh();
                Vec::new()
            }
            PieceEvent::Attacked {
                attacker,
                attacker_at,
                defender,
                damage,
                allow_counter,
            } if defender == self.id => {
                let change = self.change_health(self.health - damage, true);
                let mut reactions = vec![Reaction::Emit(GameEvent::AttackResolved {
                    attacker,
                    defender,
                    damage,
                    counter: !allow_counter,
                })];
                if self.is_avatar() {
                    reactions.push(self.avatar_stats());
                } else {
                    reactions.push(self.stats_changed());
                }
                if change.slain {
                    reactions.push(Reaction::Slain { piece: self.id });
                } else if allow_counter && self.position.is_adjacent(attacker_at) {
                    reactions.push(Reaction::Strike {
                        attacker: self.id,
                        defender: attacker,
                    });
                }
                reactions
            }
            PieceEvent::Modify {
                target,
                attack,
                health,
                limit,
            } if target == self.id => {
                if limit == Some(StatLimit::OutsideOwnersTurn) && scope.active == self.owner {
                    return Vec::new();
                }
                let allow_over_max = limit != Some(StatLimit::CapAtMax);
                let change = self.change_health(self.health + health, allow_over_max);
                self.attack += attack;
                let mut reactions = vec![self.stats_changed()];
                if self.is_avatar() {
                    reactions.push(self.avatar_stats());
                }
                if change.slain {
                    reactions.push(Reaction::Slain { piece: self.id });
                }
                reactions
            }
            _ => Vec::new(),
        }
    }
}

impl Piece {
    fn avatar_stats(&self) -> Reaction {
        Reaction::AvatarStats {
            side: self.owner,
            attack: self.attack,
            health: self.health,
        }
    }

    fn stats_changed(&self) -> Reaction {
        Reaction::Emit(GameEvent::PieceStatsChanged {
            piece: self.id,
            attack: self.attack,
            health: self.health,
        })
    }
}

/// 同步投递事件，每个订阅者的连锁反应先深度优先处理完毕，再轮到下一个订阅者。
pub fn publish<S>(state: &mut GameState, sink: &S, event: impl Into<BusEvent>)
where
    S: ReactionSink + ?Sized,
{
    let event = event.into();
    if state.is_finished() {
        return;
    }
    if state.bus.depth >= state.config.max_cascade_depth {
        log::error!(
            "cascade depth {} reached, dropping {:?}",
            state.bus.depth,
            event
        );
        state.bus.truncated += 1;
        return;
    }

    state.bus.published += 1;
    state.bus.depth += 1;
    state.bus.deepest = state.bus.deepest.max(state.bus.depth);

    match event {
        BusEvent::Cell(cell_event) => {
            let count = state.board.cells().len();
            for index in 0..count {
                if state.is_finished() {
                    break;
                }
                let occupant = state.board.cells().get(index).and_then(|cell| cell.occupant);
                let scope = Scope::of(state, occupant);
                let reactions = match state.board.cells_mut().get_mut(index) {
                    Some(cell) => cell.on_event(&cell_event, &scope),
                    None => break,
                };
                settle(state, sink, reactions);
            }
        }
        BusEvent::Piece(piece_event) => {
            let subscribers: Vec<PieceId> = state.pieces.iter().map(|piece| piece.id).collect();
            for id in subscribers {
                if state.is_finished() {
                    break;
                }
                let scope = Scope::of(state, None);
                let reactions = match state.piece_mut(id) {
                    Some(piece) => piece.on_event(&piece_event, &scope),
                    None => continue,
                };
                settle(state, sink, reactions);
            }
        }
    }

    state.bus.depth = state.bus.depth.saturating_sub(1);
}

fn settle<S>(state: &mut GameState, sink: &S, reactions: Vec<Reaction>)
where
    S: ReactionSink + ?Sized,
{
    for reaction in reactions {
        match reaction {
            Reaction::Publish(event) => publish(state, sink, event),
            Reaction::Emit(event) => state.record_event(event),
            other => sink.react(state, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::MatchConfig;
    use crate::game::state::Card;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<Reaction>>,
    }

    impl ReactionSink for Recorder {
        fn react(&self, _state: &mut GameState, reaction: Reaction) {
            self.seen.borrow_mut().push(reaction);
        }
    }

    struct Echo;

    impl ReactionSink for Echo {
        fn react(&self, state: &mut GameState, _reaction: Reaction) {
            publish(state, self, CellEvent::CastSpell { at: Coord::new(0, 0) });
        }
    }

    fn state() -> GameState {
        GameState::new(MatchConfig::default().with_seed(11), Vec::new(), Vec::new())
    }

    fn put(state: &mut GameState, card: &Card, owner: Side, at: Coord) {
        state.pieces.push(Piece::from_card(card, owner, at));
        if let Some(cell) = state.board.cell_mut(at) {
            cell.occupant = Some(card.id);
        }
    }

    #[test]
    fn move_cascade_matches_reachable_set() {
        let mut state = state();
        let sink = Recorder::default();
        let origin = Coord::new(4, 2);
        put(&mut state, &Card::unit(1, "A", 1, 1, 1, ""), Side::Human, origin);
        put(&mut state, &Card::unit(2, "B", 1, 1, 1, ""), Side::Human, Coord::new(4, 3));
        put(&mut state, &Card::unit(3, "C", 1, 1, 1, ""), Side::Ai, Coord::new(7, 2));

        for next in state.board.orthogonal(origin) {
            publish(&mut state, &sink, CellEvent::MoveHighlight { at: next, step: 1 });
        }

        let mut highlighted = state.board.with_highlight(Highlight::Selectable);
        let mut expected = state.board.reachable_from(origin);
        highlighted.sort();
        expected.sort();
        assert_eq!(highlighted, expected);
        // (6,2) 可达且与 (7,2) 的敌人相邻
        assert_eq!(state.board.highlight(Coord::new(7, 2)), Highlight::Attackable);
        assert_eq!(state.board.highlight(Coord::new(4, 3)), Highlight::Normal);
        assert!(state.bus.deepest >= 2);
        assert_eq!(state.bus.depth(), 0);
    }

    #[test]
    fn summon_highlight_marks_empty_cells_around_friends() {
        let mut state = state();
        let sink = Recorder::default();
        put(&mut state, &Card::unit(1, "A", 1, 1, 1, ""), Side::Human, Coord::new(0, 0));
        put(&mut state, &Card::unit(2, "B", 1, 1, 1, ""), Side::Ai, Coord::new(1, 1));

        publish(&mut state, &sink, CellEvent::SummonHighlight);

        let mut lit = state.board.with_highlight(Highlight::Selectable);
        lit.sort();
        assert_eq!(lit, vec![Coord::new(0, 1), Coord::new(1, 0)]);
    }

    #[test]
    fn refresh_reaches_only_the_named_side() {
        let mut state = state();
        let sink = Recorder::default();
        put(&mut state, &Card::unit(1, "A", 1, 1, 1, "twice"), Side::Human, Coord::new(0, 0));
        put(&mut state, &Card::unit(2, "B", 1, 1, 1, ""), Side::Ai, Coord::new(3, 3));

        publish(&mut state, &sink, PieceEvent::BecomeReady { side: Side::Human });

        let human = state.piece(1).expect("piece 1");
        assert_eq!(human.readiness, crate::game::state::Readiness::Ready);
        assert_eq!((human.moves_left, human.attacks_left), (2, 2));
        let ai = state.piece(2).expect("piece 2");
        assert_eq!(ai.readiness, crate::game::state::Readiness::NotReady);
        assert_eq!(state.bus.published, 1);
    }

    #[test]
    fn outside_owners_turn_limit_is_respected() {
        let mut state = state();
        let sink = Recorder::default();
        put(&mut state, &Card::unit(2, "B", 1, 1, 4, ""), Side::Human, Coord::new(0, 0));
        let buff = PieceEvent::Modify {
            target: 2,
            attack: 1,
            health: 1,
            limit: Some(StatLimit::OutsideOwnersTurn),
        };

        publish(&mut state, &sink, buff);
        assert_eq!(state.piece(2).map(|p| (p.attack, p.health)), Some((1, 4)));

        state.control.active = Side::Ai;
        publish(&mut state, &sink, buff);
        assert_eq!(state.piece(2).map(|p| (p.attack, p.health)), Some((2, 5)));
    }

    #[test]
    fn runaway_cascade_is_truncated() {
        let mut state = GameState::new(
            MatchConfig::default().with_seed(2).with_cascade_depth(5),
            Vec::new(),
            Vec::new(),
        );
        put(&mut state, &Card::unit(1, "A", 1, 1, 1, ""), Side::Human, Coord::new(0, 0));
        if let Some(cell) = state.board.cell_mut(Coord::new(0, 0)) {
            cell.highlight = Highlight::Selectable;
        }

        publish(&mut state, &Echo, CellEvent::CastSpell { at: Coord::new(0, 0) });

        assert_eq!(state.bus.deepest, 5);
        assert_eq!(state.bus.truncated, 1);
        assert_eq!(state.bus.depth(), 0);
    }
}
