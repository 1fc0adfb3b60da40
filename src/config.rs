//! Node configuration: identity, outbound priority, timing, and authority
//! policy. Values are assembled through [`HatConfigBuilder`] and validated once
//! in [`HatConfigBuilder::build`]; the node never mutates them afterwards.
//!
//! # Example
//!
//! ```
//! use embassy_time::Duration;
//! use hat_can_core::config::HatConfig;
//! use hat_can_core::protocol::safety::{Authority, OperatingState};
//! use hat_can_core::protocol::transport::priority;
//!
//! let config = HatConfig::builder(0x02)
//!     .priority(priority::DRIVE_HAT)
//!     .source_authority(0x01, Authority::BaseStation)
//!     .state_timeout(OperatingState::Unlocked, Some(Duration::from_millis(3000)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.node_id(), 0x02);
//! assert_eq!(config.authority_of(0x01), Authority::BaseStation);
//! assert_eq!(config.authority_of(0x30), Authority::System);
//! ```
use embassy_time::Duration;
use heapless::LinearMap;

use crate::error::ConfigError;
use crate::protocol::messages::responses::ResponseBuilder;
use crate::protocol::safety::{
    transitions::TransitionTable, Authority, OperatingState, StateMachineEvent,
};
use crate::protocol::transport::{priority, BROADCAST_ADDR};

/// Node id used when none is configured.
pub const DEFAULT_NODE_ID: u8 = 0x07;
/// Base of the node's reserved logical addresses.
pub const DEFAULT_BASE_ADDRESS: u16 = 0x700;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_millis(5000);
/// Maximum number of source nodes with an explicit authority.
pub const AUTHORITY_MAP_CAPACITY: usize = 16;

/// Source node id -> authority carried by its state commands.
pub type AuthorityMap = LinearMap<u8, Authority, AUTHORITY_MAP_CAPACITY>;

//==================================================================================TIMEOUT_POLICY
/// Per-state inactivity timeout. `None` marks the state as timeout-exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    timeouts: [Option<Duration>; OperatingState::COUNT],
}

impl Default for TimeoutPolicy {
    /// `Unlocked` and `PowerArmed` time out after five seconds; everything else is exempt.
    fn default() -> Self {
        let mut timeouts = [None; OperatingState::COUNT];
        timeouts[OperatingState::Unlocked.index()] = Some(DEFAULT_STATE_TIMEOUT);
        timeouts[OperatingState::PowerArmed.index()] = Some(DEFAULT_STATE_TIMEOUT);
        Self { timeouts }
    }
}

impl TimeoutPolicy {
    /// Policy where no state ever times out.
    pub const fn disabled() -> Self {
        Self {
            timeouts: [None; OperatingState::COUNT],
        }
    }

    pub fn timeout_for(&self, state: OperatingState) -> Option<Duration> {
        self.timeouts[state.index()]
    }

    pub fn set(&mut self, state: OperatingState, timeout: Option<Duration>) {
        self.timeouts[state.index()] = timeout;
    }

    /// Every configured timeout must target a state with a `Timeout` transition.
    pub fn validate(&self, table: &TransitionTable) -> Result<(), ConfigError> {
        for state in OperatingState::ALL {
            match self.timeout_for(state) {
                Some(timeout) if timeout.as_ticks() == 0 => return Err(ConfigError::ZeroInterval),
                Some(_) if !table.has_transition(state, StateMachineEvent::Timeout) => {
                    return Err(ConfigError::TimeoutWithoutTransition { state })
                }
                _ => {}
            }
        }
        Ok(())
    }
}

//==================================================================================CONFIG
/// Validated node configuration.
#[derive(Debug, Clone)]
pub struct HatConfig {
    node_id: u8,
    base_address: u16,
    priority: u8,
    heartbeat_interval: Duration,
    timeouts: TimeoutPolicy,
    table: TransitionTable,
    authorities: AuthorityMap,
    default_authority: Authority,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID,
            base_address: DEFAULT_BASE_ADDRESS,
            priority: priority::TEMPLATE_HAT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeouts: TimeoutPolicy::default(),
            table: TransitionTable::new(),
            authorities: AuthorityMap::new(),
            default_authority: Authority::System,
        }
    }
}

impl HatConfig {
    /// Start a configuration for `node_id`, every other field at its default.
    pub fn builder(node_id: u8) -> HatConfigBuilder {
        HatConfigBuilder::new(node_id)
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn base_address(&self) -> u16 {
        self.base_address
    }

    /// Arbitration priority of frames emitted by this node (emergency stop excepted).
    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn timeouts(&self) -> &TimeoutPolicy {
        &self.timeouts
    }

    /// Transition table with this deployment's authority floors.
    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Admission filter: broadcast or addressed to this node.
    #[inline]
    pub fn accepts_target(&self, target_node: u8) -> bool {
        target_node == BROADCAST_ADDR || target_node == self.node_id
    }

    /// Authority carried by a state command from `source_node`.
    pub fn authority_of(&self, source_node: u8) -> Authority {
        self.authorities
            .get(&source_node)
            .copied()
            .unwrap_or(self.default_authority)
    }

    /// Frame builder emitting on behalf of this node.
    pub fn responder(&self) -> ResponseBuilder {
        ResponseBuilder::new(self.node_id, self.priority)
    }
}

//==================================================================================BUILDER
/// Fluent builder for [`HatConfig`].
#[derive(Debug, Clone)]
pub struct HatConfigBuilder {
    config: HatConfig,
    tighten: [Option<Authority>; StateMachineEvent::COUNT],
    map_overflow: bool,
}

impl HatConfigBuilder {
    pub fn new(node_id: u8) -> Self {
        Self {
            config: HatConfig {
                node_id,
                ..HatConfig::default()
            },
            tighten: [None; StateMachineEvent::COUNT],
            map_overflow: false,
        }
    }

    pub fn base_address(mut self, base_address: u16) -> Self {
        self.config.base_address = base_address;
        self
    }

    /// Outbound priority, masked to five bits.
    pub fn priority(mut self, priority: u8) -> Self {
        self.config.priority = priority & 0x1F;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Timeout for one state; `None` makes it exempt.
    pub fn state_timeout(mut self, state: OperatingState, timeout: Option<Duration>) -> Self {
        self.config.timeouts.set(state, timeout);
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Raise the minimum authority of `event`; checked in [`build`](Self::build).
    pub fn tighten(mut self, event: StateMachineEvent, authority: Authority) -> Self {
        self.tighten[event.index()] = Some(authority);
        self
    }

    /// Authority carried by state commands from `source_node`.
    pub fn source_authority(mut self, source_node: u8, authority: Authority) -> Self {
        if self
            .config
            .authorities
            .insert(source_node, authority)
            .is_err()
        {
            self.map_overflow = true;
        }
        self
    }

    /// Authority for sources missing from the map.
    pub fn default_authority(mut self, authority: Authority) -> Self {
        self.config.default_authority = authority;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<HatConfig, ConfigError> {
        let mut config = self.config;

        if config.node_id == BROADCAST_ADDR {
            return Err(ConfigError::BroadcastNodeId);
        }
        if config.heartbeat_interval.as_ticks() == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.map_overflow {
            return Err(ConfigError::AuthorityMapFull);
        }
        for (event, authority) in StateMachineEvent::ALL.iter().zip(self.tighten) {
            if let Some(authority) = authority {
                config.table.tighten(*event, authority)?;
            }
        }
        config.timeouts.validate(&config.table)?;

        Ok(config)
    }
}
