//! 对战核心逻辑模块（棋盘、事件总线、规则引擎等）。

pub mod board;
pub mod catalog;
pub mod combat;
pub mod config;
pub mod effects;
pub mod events;
pub mod rules;
pub mod state;

pub use board::{Board, Cell, Coord, Highlight};
pub use catalog::MatchSetup;
pub use config::MatchConfig;
pub use effects::{
    EffectContext,
    EffectRegistry,
    EffectTrigger,
    Mutation,
    ScriptedEffect,
    STANDARD_EFFECTS,
};
pub use events::{
    BusEvent,
    BusStats,
    CellEvent,
    PieceEvent,
    Reaction,
    ReactionSink,
    StatLimit,
    Subscriber,
};
pub use state::{
    Card,
    CardDef,
    CardId,
    CardKind,
    GameEvent,
    GameState,
    IntegrityError,
    Interaction,
    Piece,
    PieceId,
    Player,
    Readiness,
    RuleTags,
    Side,
    SpellEffect,
    TargetRange,
    TurnController,
    VictoryReason,
    VictoryState,
};
pub use rules::{RuleEngine, RuleError, RuleResolution};
