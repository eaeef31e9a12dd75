pub mod calibration;
pub mod context;
pub mod cricsheet;
pub mod edge;
pub mod error;
pub mod historical_dataset;
pub mod innings_sim;
pub mod lineup;
pub mod live;
pub mod logging;
pub mod match_sim;
pub mod model_config;
pub mod odds_log;
pub mod registry;
pub mod report_export;

pub use context::{MatchContext, MatchSetup, build_match_context};
pub use edge::{EvSignal, MarketEdgeReport, OddsTable, detect_ev};
pub use match_sim::{SessionLines, SimulationResult, simulate_match};
