//! Decision oracle adapters.

pub mod anthropic;
pub mod scripted;

pub use anthropic::AnthropicDecisionOracle;
pub use scripted::ScriptedOracle;
