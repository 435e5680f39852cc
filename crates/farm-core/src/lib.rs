//! farm-core
//!
//! Pure farming simulation logic:
//! - plot lifecycle state
//! - per-player farm grid
//! - player accounts as plain data
//! - steal-quota rounds
//! - plant/harvest/steal/maturation transitions

pub mod plot;
pub mod farm;
pub mod player;
pub mod quota;
pub mod engine;
pub mod error;

pub use plot::{Plot, PlotState};
pub use farm::{Farm, FARM_COLS, FARM_ROWS};
pub use player::{Player, PlayerId};
pub use quota::StealRound;
pub use engine::{
    harvest, mature, plant, steal, HarvestOutcome, PlantOutcome, StealOutcome, HARVEST_REWARD,
    PLANT_COST, SIGNUP_COINS, STEAL_AMOUNT, STEAL_MIN_RIPE,
};
pub use error::GameError;
