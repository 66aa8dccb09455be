//! Client hydration lifecycle.
//!
//! The `<island-root>` element in the browser is table-driven: the table is
//! generated from [`transition`] and embedded in the runtime script, so the
//! lifecycle has a single definition that is unit-tested here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Custom element name of the hydration wrapper.
pub const WRAPPER_TAG: &str = "island-root";

const RUNTIME_TEMPLATE: &str = include_str!("runtime/island-root.js");
const LIVE_RELOAD_TEMPLATE: &str = include_str!("runtime/live-reload.js");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HydrationState {
    /// Attached, not yet hydrated.
    Idle,
    /// Trigger pending (viewport observer registered).
    Waiting,
    Hydrating,
    Ready,
    /// Mount threw. Terminal; the static markup stays.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HydrationEvent {
    ConnectEager,
    ConnectVisible,
    Intersect,
    Disconnect,
    Mounted,
    Failed,
}

impl HydrationState {
    pub const ALL: [HydrationState; 5] = [
        HydrationState::Idle,
        HydrationState::Waiting,
        HydrationState::Hydrating,
        HydrationState::Ready,
        HydrationState::Failed,
    ];
}

impl HydrationEvent {
    pub const ALL: [HydrationEvent; 6] = [
        HydrationEvent::ConnectEager,
        HydrationEvent::ConnectVisible,
        HydrationEvent::Intersect,
        HydrationEvent::Disconnect,
        HydrationEvent::Mounted,
        HydrationEvent::Failed,
    ];
}

/// Next state, or `None` when the event is ignored in `state`.
pub fn transition(state: HydrationState, event: HydrationEvent) -> Option<HydrationState> {
    use HydrationEvent as E;
    use HydrationState as S;

    match (state, event) {
        (S::Idle, E::ConnectEager) => Some(S::Hydrating),
        (S::Idle, E::ConnectVisible) => Some(S::Waiting),
        (S::Waiting, E::Intersect) => Some(S::Hydrating),
        (S::Waiting, E::Disconnect) => Some(S::Idle),
        (S::Hydrating, E::Mounted) => Some(S::Ready),
        (S::Hydrating, E::Failed) => Some(S::Failed),
        _ => None,
    }
}

fn token<T: Serialize>(value: T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

/// `{ state: { event: next } }` for every non-ignored pair.
pub fn transition_table() -> Value {
    let mut table = Map::new();
    for state in HydrationState::ALL {
        let mut row = Map::new();
        for event in HydrationEvent::ALL {
            if let Some(next) = transition(state, event) {
                row.insert(token(event), Value::String(token(next)));
            }
        }
        table.insert(token(state), Value::Object(row));
    }
    Value::Object(table)
}

/// Browser module defining `<island-root>`.
pub fn runtime_script() -> String {
    RUNTIME_TEMPLATE.replace("__TRANSITIONS__", &transition_table().to_string())
}

/// Dev-mode client that reloads the page when the server says so.
pub fn live_reload_script(endpoint: &str) -> String {
    let endpoint = Value::String(endpoint.to_string()).to_string();
    LIVE_RELOAD_TEMPLATE.replace("__ENDPOINT__", &endpoint)
}
