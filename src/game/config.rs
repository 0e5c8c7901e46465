use serde::{Deserialize, Serialize};

use super::board::Coord;

const DEFAULT_BOARD_WIDTH: i32 = 9;
const DEFAULT_BOARD_HEIGHT: i32 = 5;
const DEFAULT_HAND_SLOTS: usize = 6;
const DEFAULT_MAX_MANA: u8 = 9;
const DEFAULT_AVATAR_HEALTH: i32 = 20;
const DEFAULT_AVATAR_ATTACK: i32 = 2;
const DEFAULT_OPENING_HAND: u8 = 3;
const DEFAULT_MAX_CASCADE_DEPTH: u32 = 32;

/// 对局参数。所有字段都有默认值，可只提供部分 JSON。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchConfig {
    pub board_width: i32,
    pub board_height: i32,
    pub hand_slots: usize,
    pub max_mana: u8,
    pub avatar_health: i32,
    pub avatar_attack: i32,
    pub opening_hand: u8,
    pub human_avatar_at: Coord,
    pub ai_avatar_at: Coord,
    /// 事件嵌套超过此深度时丢弃。
    pub max_cascade_depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl MatchConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_cascade_depth(mut self, depth: u32) -> Self {
        self.max_cascade_depth = depth;
        self
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            board_width: DEFAULT_BOARD_WIDTH,
            board_height: DEFAULT_BOARD_HEIGHT,
            hand_slots: DEFAULT_HAND_SLOTS,
            max_mana: DEFAULT_MAX_MANA,
            avatar_health: DEFAULT_AVATAR_HEALTH,
            avatar_attack: DEFAULT_AVATAR_ATTACK,
            opening_hand: DEFAULT_OPENING_HAND,
            human_avatar_at: Coord::new(1, 2),
            ai_avatar_at: Coord::new(7, 2),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            seed: None,
        }
    }
}
