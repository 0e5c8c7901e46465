//! 网格卡牌对战引擎，对外提供 WebAssembly 接口。

pub mod ai;
pub mod game;
pub mod utils;

use log::LevelFilter;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use ai::{ActionKind, AiAgent, AiConfig, AiStep, AiTurnReport};
pub use game::{
    Board, Card, CardId, Coord, EffectRegistry, EffectTrigger, GameEvent, GameState, Highlight,
    IntegrityError, MatchConfig, MatchSetup, Piece, PieceId, Player, RuleEngine, RuleError,
    RuleResolution, Side, VictoryReason, VictoryState,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging(LevelFilter::Info);
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(state: &GameState, events: Vec<GameEvent>) -> Result<String, JsValue> {
    let resolution = RuleResolution::new(state.clone(), events);
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn setup_from_js(setup: JsValue) -> Result<MatchSetup, JsValue> {
    if setup.is_undefined() || setup.is_null() {
        return Ok(MatchSetup::sample());
    }
    from_value(setup).map_err(JsValue::from)
}

fn open_match(setup: MatchSetup) -> Result<(RuleEngine, GameState, Vec<GameEvent>), JsValue> {
    let engine = RuleEngine::new();
    let mut state = setup.into_state();
    let events = engine.start_match(&mut state).map_err(to_js_error)?;
    Ok((engine, state, events))
}

#[derive(Serialize)]
struct EndTurnResponse {
    #[serde(flatten)]
    resolution: RuleResolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_turn: Option<AiTurnReport>,
}

#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
    engine: RuleEngine,
    agent: AiAgent,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(setup_json: Option<String>, seed: Option<u32>) -> Result<GameEngine, JsValue> {
        let mut setup = match setup_json {
            Some(json) => MatchSetup::from_json(&json).map_err(serde_to_js_error)?,
            None => MatchSetup::sample(),
        };
        if let Some(seed) = seed {
            setup = setup.with_seed(u64::from(seed));
        }
        let ai_config = AiConfig {
            seed: setup.config.seed.map(|seed| seed.wrapping_add(1)),
            ..AiConfig::default()
        };
        let (engine, state, _) = open_match(setup)?;
        Ok(GameEngine {
            state,
            engine,
            agent: AiAgent::new(ai_config),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn outcome_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&RuleEngine::check_victory(&self.state)).map_err(serde_to_js_error)
    }

    pub fn select_hand_card(&mut self, slot: usize) -> Result<String, JsValue> {
        let events = self
            .engine
            .select_hand_card(&mut self.state, Side::Human, slot)
            .map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }

    pub fn select_or_act_cell(&mut self, x: i32, y: i32) -> Result<String, JsValue> {
        let events = self
            .engine
            .select_or_act_cell(&mut self.state, Side::Human, Coord::new(x, y))
            .map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }

    pub fn clear_selection(&mut self) -> Result<String, JsValue> {
        let events = self
            .engine
            .clear_selection(&mut self.state, Side::Human)
            .map_err(to_js_error)?;
        make_resolution_json(&self.state, events)
    }

    /// 结束玩家回合；控制权交给 AI 时立即执行 AI 回合。
    pub fn end_turn(&mut self) -> Result<String, JsValue> {
        let mut events = self
            .engine
            .end_turn(&mut self.state, Side::Human)
            .map_err(to_js_error)?;

        let ai_turn = if !self.state.is_finished() && self.state.active_side() == Side::Ai {
            let report = self
                .agent
                .take_turn(&self.engine, &mut self.state)
                .map_err(to_js_error)?;
            events.extend(report.events.iter().cloned());
            Some(report)
        } else {
            None
        };

        let response = EndTurnResponse {
            resolution: RuleResolution::new(self.state.clone(), events),
            ai_turn,
        };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }
}

/// 按给定配置（缺省为示例卡组）开局，返回开局状态与事件。
#[wasm_bindgen(js_name = "createMatch")]
pub fn create_match(setup: JsValue) -> Result<JsValue, JsValue> {
    let (_, state, events) = open_match(setup_from_js(setup)?)?;
    to_value(&RuleResolution::new(state, events)).map_err(JsValue::from)
}

/// 返回示例开局配置，方便前端调试。
#[wasm_bindgen(js_name = "sampleSetup")]
pub fn sample_setup() -> Result<JsValue, JsValue> {
    to_value(&MatchSetup::sample()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateSetup")]
pub fn validate_setup(setup: JsValue) -> Result<(), JsValue> {
    let state = setup_from_js(setup)?.into_state();
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}
