use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::events::{BusEvent, CellEvent, PieceEvent, StatLimit};
use super::state::{PieceId, Side};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EffectTrigger {
    BeforeSummon,
    CardSelected,
    OnAttack,
    OnDeath,
    OnSpellCast,
}

/// 脚本效果可读取的上下文。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectContext {
    pub trigger: EffectTrigger,
    pub source: PieceId,
    pub owner: Side,
    pub active: Side,
}

impl EffectContext {
    pub fn new(trigger: EffectTrigger, source: PieceId, owner: Side, active: Side) -> Self {
        Self {
            trigger,
            source,
            owner,
            active,
        }
    }
}

/// 效果请求的状态变更，由规则引擎执行。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Publish(BusEvent),
    Draw { side: Side },
}

impl From<CellEvent> for Mutation {
    fn from(event: CellEvent) -> Self {
        Mutation::Publish(event.into())
    }
}

impl From<PieceEvent> for Mutation {
    fn from(event: PieceEvent) -> Self {
        Mutation::Publish(event.into())
    }
}

pub type EffectFn = fn(&EffectContext) -> Vec<Mutation>;

#[derive(Clone, Copy)]
pub struct ScriptedEffect {
    pub name: &'static str,
    apply: EffectFn,
}

impl ScriptedEffect {
    pub const fn new(name: &'static str, apply: EffectFn) -> Self {
        Self { name, apply }
    }

    pub fn apply(&self, ctx: &EffectContext) -> Vec<Mutation> {
        (self.apply)(ctx)
    }
}

impl std::fmt::Debug for ScriptedEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEffect")
            .field("name", &self.name)
            .finish()
    }
}

/// 按触发时机与单位标识索引的脚本效果表，构建后只读。
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    entries: HashMap<(EffectTrigger, PieceId), ScriptedEffect>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, trigger: EffectTrigger, id: PieceId, effect: ScriptedEffect) -> Self {
        if self.entries.insert((trigger, id), effect).is_some() {
            log::warn!("effect for {trigger:?} #{id} registered twice, keeping the last");
        }
        self
    }

    pub fn lookup(&self, trigger: EffectTrigger, id: PieceId) -> Option<&ScriptedEffect> {
        self.entries.get(&(trigger, id))
    }

    pub fn has(&self, trigger: EffectTrigger, id: PieceId) -> bool {
        self.entries.contains_key(&(trigger, id))
    }

    pub fn fire(&self, ctx: &EffectContext) -> Vec<Mutation> {
        match self.lookup(ctx.trigger, ctx.source) {
            Some(effect) => {
                log::debug!("{} fires on {:?}", effect.name, ctx.trigger);
                effect.apply(ctx)
            }
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

const HERALD_HEAL: i32 = 3;
const KNIGHT_ID: PieceId = 4;
const KNIGHT_ATTACK_GAIN: i32 = 2;

fn heal_own_avatar(ctx: &EffectContext) -> Vec<Mutation> {
    vec![PieceEvent::Modify {
        target: ctx.owner.avatar_id(),
        attack: 0,
        health: HERALD_HEAL,
        limit: Some(StatLimit::CapAtMax),
    }
    .into()]
}

fn highlight_every_empty_cell(_ctx: &EffectContext) -> Vec<Mutation> {
    vec![CellEvent::AreaHighlight.into()]
}

fn grow_outside_own_turn(ctx: &EffectContext) -> Vec<Mutation> {
    vec![PieceEvent::Modify {
        target: ctx.source,
        attack: 1,
        health: 1,
        limit: Some(StatLimit::OutsideOwnersTurn),
    }
    .into()]
}

fn arm_the_knight(_ctx: &EffectContext) -> Vec<Mutation> {
    vec![PieceEvent::Modify {
        target: KNIGHT_ID,
        attack: KNIGHT_ATTACK_GAIN,
        health: 0,
        limit: None,
    }
    .into()]
}

fn both_draw(_ctx: &EffectContext) -> Vec<Mutation> {
    vec![
        Mutation::Draw { side: Side::Human },
        Mutation::Draw { side: Side::Ai },
    ]
}

fn owner_draws(ctx: &EffectContext) -> Vec<Mutation> {
    vec![Mutation::Draw { side: ctx.owner }]
}

/// 示例卡组中带脚本效果的卡牌。
pub static STANDARD_EFFECTS: Lazy<EffectRegistry> = Lazy::new(|| {
    use EffectTrigger::*;

    EffectRegistry::new()
        .with(BeforeSummon, 3, ScriptedEffect::new("azure herald", heal_own_avatar))
        .with(
            CardSelected,
            7,
            ScriptedEffect::new("ironcliff airdrop", highlight_every_empty_cell),
        )
        .with(
            CardSelected,
            10,
            ScriptedEffect::new("planar scout airdrop", highlight_every_empty_cell),
        )
        .with(
            OnSpellCast,
            2,
            ScriptedEffect::new("pureblade spellbound", grow_outside_own_turn),
        )
        .with(
            OnAttack,
            99,
            ScriptedEffect::new("silverguard zeal", arm_the_knight),
        )
        .with(BeforeSummon, 14, ScriptedEffect::new("blaze hound", both_draw))
        .with(OnDeath, 15, ScriptedEffect::new("windshrike", owner_draws))
});
