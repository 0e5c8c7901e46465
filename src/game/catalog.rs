use serde::{Deserialize, Serialize};

use super::config::MatchConfig;
use super::state::{Card, GameState};

/// 开局数据：对局参数与双方卡组。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MatchSetup {
    #[serde(default)]
    pub config: MatchConfig,
    #[serde(default)]
    pub human_deck: Vec<Card>,
    #[serde(default)]
    pub ai_deck: Vec<Card>,
}

impl MatchSetup {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config = self.config.with_seed(seed);
        self
    }

    pub fn into_state(self) -> GameState {
        GameState::new(self.config, self.human_deck, self.ai_deck)
    }

    /// 示例卡组，卡牌标识与标准效果表对应。
    pub fn sample() -> Self {
        let human_deck = vec![
            Card::spell(1, "Truestrike", 1, "Deal 2 damage to an enemy unit"),
            Card::unit(2, "Pureblade Enforcer", 2, 1, 4, "If the enemy player casts a spell, this unit gains +1 attack and +1 health"),
            Card::unit(3, "Azure Herald", 2, 1, 4, "When this unit is summoned give your avatar +3 health (maximum 20)"),
            Card::unit(4, "Silverguard Knight", 3, 1, 5, "Zeal: If your avatar is dealt damage this unit gains +2 attack. Provoke"),
            Card::spell(5, "Sundrop Elixir", 1, "Add +5 health to a unit. This cannot take a unit over its starting health value"),
            Card::unit(6, "Comodo Charger", 1, 1, 3, ""),
            Card::unit(7, "Ironcliff Guardian", 5, 3, 10, "Can be summoned anywhere on the board. Provoke"),
            Card::unit(8, "Fire Spitter", 4, 3, 2, "Ranged: can attack any enemy on the board"),
            Card::unit(9, "Azurite Lion", 3, 2, 3, "Can attack twice per turn"),
            Card::unit(10, "Planar Scout", 1, 2, 1, "Can be summoned anywhere on the board"),
        ];
        let ai_deck = vec![
            Card::spell(11, "Staff of Y'Kir'", 2, "Your avatar gains +2 attack"),
            Card::spell(12, "Entropic Decay", 5, "Reduce a non-avatar unit to 0 health"),
            Card::unit(13, "Hailstone Golem", 4, 4, 6, ""),
            Card::unit(14, "Blaze Hound", 3, 4, 3, "When this unit is summoned, both players draw a card"),
            Card::unit(15, "Windshrike", 4, 4, 3, "Flying. When this unit dies, its owner draws a card"),
            Card::unit(16, "Pyromancer", 2, 2, 1, "Ranged: can attack any enemy on the board"),
            Card::unit(17, "Serpenti", 6, 7, 4, "Can attack twice per turn"),
            Card::unit(18, "Rock Pulveriser", 2, 1, 4, "Provoke"),
            Card::unit(19, "Bloodshard Golem", 3, 4, 3, ""),
            Card::unit(20, "Hailstone Golem R", 4, 4, 6, ""),
        ];
        Self {
            config: MatchConfig::default(),
            human_deck,
            ai_deck,
        }
    }
}
