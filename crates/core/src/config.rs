use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Economic policies every new pool is built with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub yield_policy: YieldPolicyKind,
    #[serde(default)]
    pub slashing: SlashingKind,
}

/// How spiral yield is split among the remaining positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldPolicyKind {
    /// Equal share per remaining position.
    #[default]
    Equal,
    /// Weighted by the number of cycles each position deposited.
    DepositWeighted,
}

/// What happens to a position that misses a cycle deposit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashingKind {
    /// Collateral worth one cycle deposit is taken into the cycle's liquidity.
    #[default]
    FullCycleAmount,
    /// Missed deposits go unpunished.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Capacity of each pool actor's command queue.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Capacity of each pool's event broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

const fn default_command_buffer() -> usize {
    64
}

const fn default_event_buffer() -> usize {
    1000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            event_buffer: default_event_buffer(),
        }
    }
}
