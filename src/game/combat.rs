use super::{
    board::{Coord, Highlight},
    effects::EffectTrigger,
    events::{self, CellEvent, PieceEvent, Reaction, ReactionSink, StatLimit},
    rules::{RuleEngine, RuleError},
    state::{GameEvent, GameState, Piece, PieceId, Readiness, Side, SpellEffect, VictoryReason},
};

impl ReactionSink for RuleEngine {
    fn react(&self, state: &mut GameState, reaction: Reaction) {
        match reaction {
            Reaction::Publish(event) => events::publish(state, self, event),
            Reaction::Emit(event) => state.record_event(event),
            Reaction::Provoked { piece } => {
                if let Some(piece) = state.piece_mut(piece) {
                    piece.provoked = true;
                }
            }
            Reaction::Unprovoked { piece } => {
                if let Some(piece) = state.piece_mut(piece) {
                    piece.provoked = false;
                }
            }
            Reaction::SpellLanded { at, target } => self.land_spell(state, at, target),
            Reaction::Strike { attacker, defender } => self.strike(state, attacker, defender, false),
            Reaction::AvatarStats {
                side,
                attack,
                health,
            } => state.sync_avatar(side, attack, health),
            Reaction::Slain { piece } => self.resolve_death(state, piece),
        }
    }
}

impl RuleEngine {
    /// 棋子不移动即可攻击的敌方位置。
    pub fn legal_attacks(state: &GameState, piece: PieceId) -> Vec<Coord> {
        let Some(attacker) = state.piece(piece) else {
            return Vec::new();
        };
        let enemies = |at: &Coord| {
            state
                .piece_at(*at)
                .map(|other| other.owner != attacker.owner)
                .unwrap_or(false)
        };

        let provokers: Vec<Coord> = state
            .board
            .surrounding(attacker.position)
            .into_iter()
            .filter(|at| enemies(at))
            .filter(|at| state.piece_at(*at).map(|p| p.can_provoke).unwrap_or(false))
            .collect();
        if !provokers.is_empty() {
            return provokers;
        }

        if attacker.ranged_attack {
            state
                .pieces_of(attacker.owner.opponent())
                .map(|enemy| enemy.position)
                .collect()
        } else {
            state
                .board
                .surrounding(attacker.position)
                .into_iter()
                .filter(|at| enemies(at))
                .collect()
        }
    }

    pub fn legal_moves(state: &GameState, piece: PieceId) -> Vec<Coord> {
        match state.piece(piece) {
            Some(piece) if piece.ranged_move => state.board.vacant_cells(),
            Some(piece) => state.board.reachable_from(piece.position),
            None => Vec::new(),
        }
    }

    /// 选中己方棋子：先检查挑衅，再高亮可行动范围。
    pub(crate) fn activate(&self, state: &mut GameState, side: Side, at: Coord) -> Result<(), RuleError> {
        let Some(piece) = state.piece_at(at).cloned() else {
            return Ok(());
        };
        if piece.owner != side {
            return Ok(());
        }
        if piece.is_summoning_sick(state.control.turn) {
            return Err(RuleError::SummoningSickness { piece: piece.id });
        }
        if !piece.can_attack() && !piece.can_move() {
            return Err(RuleError::PieceNotReady { piece: piece.id });
        }

        events::publish(state, self, CellEvent::ResetHighlight);
        if let Some(selected) = state.piece_mut(piece.id) {
            selected.provoked = false;
        }
        for near in state.board.surrounding(at) {
            events::publish(
                state,
                self,
                CellEvent::SearchProvoke {
                    at: near,
                    provoked: piece.id,
                },
            );
        }
        state.control.select_cell(at);

        let provoked = state.piece(piece.id).map(|p| p.provoked).unwrap_or(false);
        if provoked {
            log::debug!("piece {} is provoked", piece.id);
            return Ok(());
        }

        match piece.readiness {
            Readiness::Ready => {
                if piece.ranged_attack {
                    events::publish(state, self, CellEvent::RangedAttackHighlight);
                }
                if piece.ranged_move {
                    events::publish(state, self, CellEvent::RangedMoveHighlight);
                } else {
                    self.highlight_walk(state, at);
                }
                self.highlight_adjacent_enemies(state, at);
            }
            _ => {
                if piece.ranged_attack {
                    events::publish(state, self, CellEvent::RangedAttackHighlight);
                }
                self.highlight_adjacent_enemies(state, at);
            }
        }
        Ok(())
    }

    fn highlight_walk(&self, state: &mut GameState, origin: Coord) {
        for next in state.board.orthogonal(origin) {
            events::publish(state, self, CellEvent::MoveHighlight { at: next, step: 1 });
        }
    }

    fn highlight_adjacent_enemies(&self, state: &mut GameState, origin: Coord) {
        for near in state.board.surrounding(origin) {
            events::publish(state, self, CellEvent::AttackHighlight { at: near });
        }
    }

    pub(crate) fn operate(&self, state: &mut GameState, side: Side, at: Coord) -> Result<(), RuleError> {
        let origin = state.control.selected_cell.ok_or(RuleError::NoSelection)?;
        let Some(piece) = state.piece_at(origin).cloned() else {
            self.reset_selection(state);
            return Ok(());
        };

        match state.board.highlight(at) {
            Highlight::Normal => {
                self.reset_selection(state);
                let friendly = state.piece_at(at).map(|p| p.owner == side).unwrap_or(false);
                if friendly {
                    return self.activate(state, side, at);
                }
                Ok(())
            }
            Highlight::Selectable => {
                if !piece.can_move() {
                    return Err(RuleError::PieceNotReady { piece: piece.id });
                }
                self.reset_selection(state);
                self.move_piece(state, piece.id, at)
            }
            Highlight::Attackable => {
                if !piece.can_attack() {
                    return Err(RuleError::PieceNotReady { piece: piece.id });
                }
                let defender = state.board.occupant(at).ok_or(RuleError::InvalidTarget)?;
                let in_reach = piece.ranged_attack || piece.position.is_adjacent(at);
                if !in_reach {
                    if !piece.can_move() {
                        return Err(RuleError::InvalidTarget);
                    }
                    let step = state
                        .board
                        .with_highlight(Highlight::Selectable)
                        .into_iter()
                        .find(|cell| cell.is_adjacent(at))
                        .ok_or(RuleError::InvalidTarget)?;
                    self.reset_selection(state);
                    self.move_piece(state, piece.id, step)?;
                } else {
                    self.reset_selection(state);
                }
                self.attack(state, piece.id, defender);
                Ok(())
            }
        }
    }

    pub(crate) fn move_piece(&self, state: &mut GameState, piece: PieceId, to: Coord) -> Result<(), RuleError> {
        let from = state.piece(piece).map(|p| p.position).ok_or(RuleError::InvalidTarget)?;
        if !state.board.relocate(from, to) {
            return Err(RuleError::InvalidTarget);
        }
        let can_provoke = match state.piece_mut(piece) {
            Some(moved) => {
                moved.position = to;
                moved.spend_move();
                moved.can_provoke
            }
            None => false,
        };
        state.record_event(GameEvent::PieceMoved { piece, from, to });
        if can_provoke {
            for near in state.board.surrounding(from) {
                events::publish(state, self, CellEvent::ClearProvoke { at: near });
            }
        }
        Ok(())
    }

    pub(crate) fn attack(&self, state: &mut GameState, attacker: PieceId, defender: PieceId) {
        match state.piece_mut(attacker) {
            Some(piece) => piece.spend_attack(),
            None => return,
        }
        self.strike(state, attacker, defender, true);
    }

    /// 一次单向攻击，先触发防守方的受击效果。
    pub(crate) fn strike(&self, state: &mut GameState, attacker: PieceId, defender: PieceId, allow_counter: bool) {
        let (Some(hitter), Some(target)) = (state.piece(attacker), state.piece(defender)) else {
            return;
        };
        let damage = if hitter.is_avatar() && target.is_avatar() {
            state.player(hitter.owner).map(|p| p.attack).unwrap_or(hitter.attack)
        } else {
            hitter.attack
        };
        let attacker_at = hitter.position;
        let defender_owner = target.owner;

        self.trigger(state, EffectTrigger::OnAttack, defender, defender_owner);
        events::publish(
            state,
            self,
            PieceEvent::Attacked {
                attacker,
                attacker_at,
                defender,
                damage,
                allow_counter,
            },
        );
    }

    pub(crate) fn resolve_death(&self, state: &mut GameState, id: PieceId) {
        let Some(piece) = state.piece(id).cloned() else {
            return;
        };
        self.trigger(state, EffectTrigger::OnDeath, id, piece.owner);
        if let Some(dead) = state.piece_mut(id) {
            dead.health = 0;
        }
        events::publish(state, self, CellEvent::RemovePiece { at: piece.position });
        state.pieces.retain(|p| p.id != id);
        log::debug!("piece {id} removed from {:?}", piece.position);

        if piece.is_avatar() {
            state.declare_victory(
                piece.owner.opponent(),
                VictoryReason::AvatarDestroyed { loser: piece.owner },
            );
        }
    }

    pub(crate) fn summon(&self, state: &mut GameState, side: Side, slot: usize, at: Coord) -> Result<(), RuleError> {
        if side == Side::Human && state.board.highlight(at) != Highlight::Selectable {
            return Err(RuleError::InvalidTarget);
        }
        if !state.board.is_vacant(at) {
            return Err(RuleError::InvalidTarget);
        }
        let player = state.player(side).ok_or(RuleError::NoSelection)?;
        let mana = player.mana;
        let card = player
            .hand_card(slot)
            .cloned()
            .ok_or(RuleError::EmptyHandSlot { slot })?;
        if card.cost > mana {
            return Err(RuleError::InsufficientMana {
                required: card.cost,
                available: mana,
            });
        }

        let mut piece = Piece::from_card(&card, side, at);
        piece.summon_turn = state.control.turn;
        piece.readiness = Readiness::NotReady;
        state.pieces.push(piece);
        events::publish(state, self, CellEvent::PlacePiece { at, piece: card.id });

        if let Some(player) = state.player_mut(side) {
            player.take_card(slot);
        }
        state.set_mana(side, i32::from(mana) - i32::from(card.cost));
        state.record_event(GameEvent::CardPlayed {
            side,
            card_id: card.id,
            at,
        });
        self.trigger(state, EffectTrigger::BeforeSummon, card.id, side);
        state.record_event(GameEvent::PiecePlaced {
            piece: card.id,
            owner: side,
            at,
        });
        self.reset_selection(state);
        log::debug!("{side:?} summoned {} at {at:?}", card.name);
        Ok(())
    }

    pub(crate) fn cast_spell(&self, state: &mut GameState, at: Coord) {
        events::publish(state, self, CellEvent::CastSpell { at });
        if state.control.selected_card.is_some() {
            log::debug!("spell at {at:?} ignored");
        }
        self.reset_selection(state);
    }

    fn land_spell(&self, state: &mut GameState, at: Coord, target: PieceId) {
        let side = state.control.active;
        let Some(slot) = state.control.selected_card else {
            return;
        };
        let Some(card) = state
            .player(side)
            .and_then(|player| player.hand_card(slot))
            .cloned()
        else {
            return;
        };
        let Some(effect) = card.tags.spell else {
            return;
        };

        let watchers: Vec<(PieceId, Side)> = state
            .pieces
            .iter()
            .filter(|piece| self.registry().has(EffectTrigger::OnSpellCast, piece.id))
            .map(|piece| (piece.id, piece.owner))
            .collect();
        for (id, owner) in watchers {
            self.trigger(state, EffectTrigger::OnSpellCast, id, owner);
        }

        // 施法触发可能改变了目标，重新读取
        let Some(victim) = state.piece(target).cloned() else {
            return;
        };
        let modify = match effect {
            SpellEffect::Damage { amount } => Some((0, -amount, None)),
            SpellEffect::Destroy if !victim.is_avatar() => Some((0, -victim.health, None)),
            SpellEffect::Heal { amount } => Some((0, amount, Some(StatLimit::CapAtMax))),
            SpellEffect::Buff { attack } if victim.is_avatar() => Some((attack, 0, None)),
            _ => None,
        };

        let mana = state.player(side).map(|p| p.mana).unwrap_or(0);
        if let Some(player) = state.player_mut(side) {
            player.take_card(slot);
        }
        state.control.selected_card = None;
        state.set_mana(side, i32::from(mana) - i32::from(card.cost));
        state.record_event(GameEvent::CardPlayed {
            side,
            card_id: card.id,
            at,
        });

        if let Some((attack, health, limit)) = modify {
            events::publish(
                state,
                self,
                PieceEvent::Modify {
                    target,
                    attack,
                    health,
                    limit,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::MatchConfig;
    use crate::game::state::{Card, Interaction};

    fn empty_match() -> (RuleEngine, GameState) {
        let engine = RuleEngine::new();
        let mut state = GameState::new(MatchConfig::default().with_seed(21), Vec::new(), Vec::new());
        state.config.opening_hand = 0;
        engine.start_match(&mut state).expect("match starts");
        (engine, state)
    }

    fn spawn(state: &mut GameState, card: Card, owner: Side, at: Coord) -> PieceId {
        let mut piece = Piece::from_card(&card, owner, at);
        piece.refresh();
        state.pieces.push(piece);
        if let Some(cell) = state.board.cell_mut(at) {
            cell.occupant = Some(card.id);
        }
        card.id
    }

    fn health(state: &GameState, id: PieceId) -> Option<i32> {
        state.piece(id).map(|p| p.health)
    }

    #[test]
    fn adjacent_attack_is_answered_once() {
        let (engine, mut state) = empty_match();
        let attacker = spawn(&mut state, Card::unit(13, "Golem", 4, 3, 6, ""), Side::Human, Coord::new(4, 2));
        let defender = spawn(&mut state, Card::unit(18, "Pulveriser", 2, 2, 5, ""), Side::Ai, Coord::new(5, 3));

        engine.attack(&mut state, attacker, defender);

        assert_eq!(health(&state, defender), Some(2));
        assert_eq!(health(&state, attacker), Some(4));
        let hits: Vec<bool> = state
            .event_log
            .iter()
            .filter_map(|event| match event {
                GameEvent::AttackResolved { counter, .. } => Some(*counter),
                _ => None,
            })
            .collect();
        assert_eq!(hits, vec![false, true]);
        assert_eq!(state.piece(attacker).map(|p| p.readiness), Some(Readiness::HasAttacked));
    }

    #[test]
    fn ranged_hit_from_afar_draws_no_counter() {
        let (engine, mut state) = empty_match();
        let archer = spawn(&mut state, Card::unit(8, "Fire Spitter", 4, 3, 2, "Ranged"), Side::Human, Coord::new(0, 0));
        let far = spawn(&mut state, Card::unit(13, "Golem", 4, 4, 6, ""), Side::Ai, Coord::new(6, 4));

        assert!(RuleEngine::legal_attacks(&state, archer).contains(&Coord::new(6, 4)));
        engine.attack(&mut state, archer, far);
        assert_eq!(health(&state, far), Some(3));
        assert_eq!(health(&state, archer), Some(2));
    }

    #[test]
    fn lethal_hit_removes_piece_and_fires_death_effect_once() {
        let (engine, mut state) = empty_match();
        if let Some(player) = state.player_mut(Side::Ai) {
            player.deck = vec![Card::unit(16, "Pyromancer", 2, 2, 1, "")];
        }
        let attacker = spawn(&mut state, Card::unit(17, "Serpenti", 6, 7, 4, ""), Side::Human, Coord::new(3, 1));
        let shrike = spawn(&mut state, Card::unit(15, "Windshrike", 4, 4, 3, "Flying"), Side::Ai, Coord::new(4, 1));

        engine.attack(&mut state, attacker, shrike);

        assert!(state.piece(shrike).is_none());
        assert!(state.board.is_vacant(Coord::new(4, 1)));
        assert_eq!(health(&state, attacker), Some(4));
        let ai = state.player(Side::Ai).expect("ai");
        assert_eq!(ai.hand_size(), 1);
        assert!(ai.deck.is_empty());
        let removals = state
            .event_log
            .iter()
            .filter(|e| matches!(e, GameEvent::PieceRemoved { piece: 15, .. }))
            .count();
        assert_eq!(removals, 1);
    }

    #[test]
    fn avatar_duel_uses_participant_pools() {
        let (engine, mut state) = empty_match();
        // 让两个化身相邻
        state.board.relocate(Coord::new(7, 2), Coord::new(2, 2));
        if let Some(ai) = state.piece_mut(100) {
            ai.position = Coord::new(2, 2);
        }
        if let Some(avatar) = state.piece_mut(99) {
            avatar.attack = 5;
        }
        if let Some(player) = state.player_mut(Side::Human) {
            player.attack = 5;
        }

        engine.attack(&mut state, 99, 100);

        assert_eq!(state.player(Side::Ai).map(|p| p.health), Some(15));
        assert_eq!(health(&state, 100), Some(15));
        assert_eq!(state.player(Side::Human).map(|p| p.health), Some(18));
        assert_eq!(health(&state, 99), Some(18));
    }

    #[test]
    fn killing_an_avatar_ends_the_match() {
        let (engine, mut state) = empty_match();
        if let Some(ai) = state.piece_mut(100) {
            ai.health = 2;
        }
        spawn(&mut state, Card::unit(17, "Serpenti", 6, 7, 4, ""), Side::Human, Coord::new(6, 2));

        engine.attack(&mut state, 17, 100);

        assert_eq!(
            state.outcome.map(|o| (o.winner, o.reason)),
            Some((Side::Human, VictoryReason::AvatarDestroyed { loser: Side::Ai }))
        );
        assert!(state.pieces.is_empty());
        assert_eq!(state.control.interaction, Interaction::Ready);
    }

    #[test]
    fn provoked_piece_may_only_strike_the_provoker() {
        let (engine, mut state) = empty_match();
        let lion = spawn(&mut state, Card::unit(9, "Azurite Lion", 3, 2, 3, ""), Side::Human, Coord::new(4, 2));
        spawn(&mut state, Card::unit(18, "Rock Pulveriser", 2, 1, 4, "Provoke"), Side::Ai, Coord::new(5, 2));
        spawn(&mut state, Card::unit(19, "Bloodshard Golem", 3, 4, 3, ""), Side::Ai, Coord::new(3, 3));

        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(4, 2))
            .expect("selected");

        assert_eq!(state.piece(lion).map(|p| p.provoked), Some(true));
        assert_eq!(state.board.with_highlight(Highlight::Attackable), vec![Coord::new(5, 2)]);
        assert!(state.board.with_highlight(Highlight::Selectable).is_empty());
        assert_eq!(RuleEngine::legal_attacks(&state, lion), vec![Coord::new(5, 2)]);

        // 点击另一个敌人只会取消选择
        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(3, 3))
            .expect("deselected");
        assert_eq!(state.control.interaction, Interaction::Ready);
        assert_eq!(health(&state, 19), Some(3));
    }

    #[test]
    fn click_move_updates_cells_and_budget() {
        let (engine, mut state) = empty_match();
        let charger = spawn(&mut state, Card::unit(6, "Comodo Charger", 1, 1, 3, ""), Side::Human, Coord::new(3, 2));

        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(3, 2))
            .expect("selected");
        assert_eq!(state.control.interaction, Interaction::UnitSelected);
        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(5, 2))
            .expect("moved");

        let piece = state.piece(charger).expect("charger");
        assert_eq!(piece.position, Coord::new(5, 2));
        assert_eq!(piece.moves_left, 0);
        assert_eq!(piece.readiness, Readiness::HasMoved);
        assert_eq!(state.board.occupant(Coord::new(5, 2)), Some(charger));
        assert!(state.board.is_vacant(Coord::new(3, 2)));
        assert_eq!(state.control.interaction, Interaction::Ready);
    }

    #[test]
    fn distant_target_is_reached_by_moving_first() {
        let (engine, mut state) = empty_match();
        let charger = spawn(&mut state, Card::unit(6, "Comodo Charger", 1, 1, 3, ""), Side::Human, Coord::new(3, 2));
        let golem = spawn(&mut state, Card::unit(19, "Bloodshard Golem", 3, 1, 3, ""), Side::Ai, Coord::new(6, 2));

        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(3, 2))
            .expect("selected");
        assert_eq!(state.board.highlight(Coord::new(6, 2)), Highlight::Attackable);
        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(6, 2))
            .expect("moved and attacked");

        let piece = state.piece(charger).expect("charger survives");
        assert!(piece.position.is_adjacent(Coord::new(6, 2)));
        assert_eq!(piece.readiness, Readiness::HasAttacked);
        assert_eq!(health(&state, golem), Some(2));
        assert_eq!(health(&state, charger), Some(2));
    }

    #[test]
    fn moving_provoker_releases_its_neighbours() {
        let (engine, mut state) = empty_match();
        let knight = spawn(&mut state, Card::unit(4, "Silverguard Knight", 3, 1, 5, "Provoke"), Side::Human, Coord::new(4, 2));
        let golem = spawn(&mut state, Card::unit(19, "Bloodshard Golem", 3, 4, 3, ""), Side::Ai, Coord::new(5, 2));
        if let Some(piece) = state.piece_mut(golem) {
            piece.provoked = true;
        }

        engine.move_piece(&mut state, knight, Coord::new(3, 1)).expect("moved");
        assert_eq!(state.piece(golem).map(|p| p.provoked), Some(false));
    }

    #[test]
    fn heal_spell_is_capped_and_consumed() {
        let (engine, mut state) = empty_match();
        let knight = spawn(&mut state, Card::unit(4, "Silverguard Knight", 3, 1, 5, ""), Side::Human, Coord::new(2, 2));
        if let Some(piece) = state.piece_mut(knight) {
            piece.health = 2;
        }
        if let Some(player) = state.player_mut(Side::Human) {
            player.hand[0] = Some(Card::spell(5, "Sundrop Elixir", 1, "Add +5 health to a unit"));
        }

        engine.select_hand_card(&mut state, Side::Human, 0).expect("selected");
        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(2, 2))
            .expect("cast");

        assert_eq!(health(&state, knight), Some(5));
        let player = state.player(Side::Human).expect("human");
        assert!(player.hand[0].is_none());
        assert_eq!(player.mana, 1);
    }

    #[test]
    fn spell_on_unlit_cell_is_ignored() {
        let (engine, mut state) = empty_match();
        if let Some(player) = state.player_mut(Side::Human) {
            player.hand[0] = Some(Card::spell(1, "Truestrike", 1, "Deal 2 damage to an enemy unit"));
        }
        engine.select_hand_card(&mut state, Side::Human, 0).expect("selected");
        assert_eq!(state.board.highlight(Coord::new(7, 2)), Highlight::Selectable);
        assert_eq!(state.board.highlight(Coord::new(1, 2)), Highlight::Normal);

        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(1, 2))
            .expect("ignored");
        assert_eq!(health(&state, 99), Some(20));
        let player = state.player(Side::Human).expect("human");
        assert!(player.hand[0].is_some());
        assert_eq!(player.mana, 2);
        assert_eq!(state.control.interaction, Interaction::Ready);
    }

    #[test]
    fn spellbound_grows_only_on_enemy_spells() {
        let (engine, mut state) = empty_match();
        let blade = spawn(&mut state, Card::unit(2, "Pureblade Enforcer", 2, 1, 4, ""), Side::Human, Coord::new(2, 2));
        if let Some(player) = state.player_mut(Side::Human) {
            player.hand[0] = Some(Card::spell(1, "Truestrike", 1, "Deal 2 damage to an enemy unit"));
        }
        engine.select_hand_card(&mut state, Side::Human, 0).expect("selected");
        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(7, 2))
            .expect("cast");
        assert_eq!(health(&state, 100), Some(18));
        assert_eq!(state.player(Side::Ai).map(|p| p.health), Some(18));
        assert_eq!(state.piece(blade).map(|p| (p.attack, p.health)), Some((1, 4)));

        state.control.active = Side::Ai;
        if let Some(player) = state.player_mut(Side::Ai) {
            player.mana = 5;
            player.hand[0] = Some(Card::spell(11, "Staff of Y'Kir'", 2, "Your avatar gains +2 attack"));
        }
        engine.select_hand_card(&mut state, Side::Ai, 0).expect("selected");
        engine
            .select_or_act_cell(&mut state, Side::Ai, Coord::new(7, 2))
            .expect("cast");
        assert_eq!(state.piece(blade).map(|p| (p.attack, p.health)), Some((2, 5)));
        assert_eq!(state.player(Side::Ai).map(|p| p.attack), Some(4));
    }

    #[test]
    fn decay_destroys_a_watcher_that_grew_first() {
        let (engine, mut state) = empty_match();
        let blade = spawn(&mut state, Card::unit(2, "Pureblade Enforcer", 2, 1, 4, ""), Side::Human, Coord::new(2, 2));
        state.control.active = Side::Ai;
        if let Some(player) = state.player_mut(Side::Ai) {
            player.mana = 5;
            player.hand[0] = Some(Card::spell(12, "Entropic Decay", 5, "Reduce a non-avatar unit to 0 health"));
        }

        engine.select_hand_card(&mut state, Side::Ai, 0).expect("selected");
        assert_eq!(state.board.highlight(Coord::new(2, 2)), Highlight::Selectable);
        engine
            .select_or_act_cell(&mut state, Side::Ai, Coord::new(2, 2))
            .expect("cast");

        assert!(state.piece(blade).is_none());
        assert_eq!(state.board.occupant(Coord::new(2, 2)), None);
        assert!(state
            .event_log
            .iter()
            .any(|e| matches!(e, GameEvent::PieceStatsChanged { piece: 2, attack: 2, health: 5 })));
        assert_eq!(state.player(Side::Ai).map(|p| p.mana), Some(0));
    }

    #[test]
    fn hitting_the_human_avatar_arms_the_knight() {
        let (engine, mut state) = empty_match();
        let knight = spawn(&mut state, Card::unit(4, "Silverguard Knight", 3, 1, 5, ""), Side::Human, Coord::new(4, 4));
        let golem = spawn(&mut state, Card::unit(19, "Bloodshard Golem", 3, 4, 3, ""), Side::Ai, Coord::new(2, 2));
        state.control.active = Side::Ai;

        engine
            .select_or_act_cell(&mut state, Side::Ai, Coord::new(2, 2))
            .expect("golem selected");
        assert_eq!(state.board.highlight(Coord::new(1, 2)), Highlight::Attackable);
        engine
            .select_or_act_cell(&mut state, Side::Ai, Coord::new(1, 2))
            .expect("avatar attacked");

        assert_eq!(state.piece(knight).map(|p| p.attack), Some(3));
        assert_eq!(health(&state, 99), Some(16));
        assert_eq!(state.player(Side::Human).map(|p| p.health), Some(16));
        // 化身以自身攻击力 2 反击
        assert_eq!(health(&state, golem), Some(1));
    }

    #[test]
    fn herald_heals_its_avatar_up_to_the_cap() {
        let (engine, mut state) = empty_match();
        if let Some(avatar) = state.piece_mut(99) {
            avatar.health = 18;
        }
        state.sync_avatar(Side::Human, 2, 18);
        if let Some(player) = state.player_mut(Side::Human) {
            player.hand[0] = Some(Card::unit(3, "Azure Herald", 2, 1, 4, "When this unit is summoned give your avatar +3 health"));
        }

        engine.select_hand_card(&mut state, Side::Human, 0).expect("selected");
        engine
            .select_or_act_cell(&mut state, Side::Human, Coord::new(2, 2))
            .expect("summoned");

        assert_eq!(state.board.occupant(Coord::new(2, 2)), Some(3));
        assert_eq!(health(&state, 99), Some(20));
        assert_eq!(state.player(Side::Human).map(|p| p.health), Some(20));
    }

    #[test]
    fn blaze_hound_makes_both_sides_draw() {
        let (engine, mut state) = empty_match();
        if let Some(player) = state.player_mut(Side::Human) {
            player.deck = vec![Card::unit(30, "Filler", 1, 1, 1, "")];
        }
        state.control.active = Side::Ai;
        if let Some(player) = state.player_mut(Side::Ai) {
            player.deck = vec![Card::unit(31, "Filler", 1, 1, 1, "")];
            player.mana = 3;
            player.hand[0] = Some(Card::unit(14, "Blaze Hound", 3, 4, 3, ""));
        }

        engine.select_hand_card(&mut state, Side::Ai, 0).expect("selected");
        engine
            .select_or_act_cell(&mut state, Side::Ai, Coord::new(6, 2))
            .expect("summoned");

        assert!(!state.is_finished());
        assert_eq!(state.board.occupant(Coord::new(6, 2)), Some(14));
        let human = state.player(Side::Human).expect("human");
        assert_eq!(human.hand_card(0).map(|c| c.id), Some(30));
        assert!(human.deck.is_empty());
        let ai = state.player(Side::Ai).expect("ai");
        assert_eq!(ai.hand_card(0).map(|c| c.id), Some(31));
        assert_eq!(ai.mana, 0);
    }
}
