//! Logical wire messages.
//!
//! Three families share the stream:
//! - [`Request`]: client → server, tagged by the `type` field.
//! - [`Response`]: server → client, `type:"RESP"`, echoing the request's
//!   `requestId` and carrying `ok` + `msg` plus operation-specific fields.
//! - Pushes ([`PushCellUpdate`], [`Info`]): server → client, uncorrelated.
//!
//! Field names on the wire are camelCase; optional response fields are
//! omitted when absent, except `requestId`, which is serialized as `null`
//! for uncorrelated error responses.

use farm_core::{PlayerId, PlotState};
use serde::{Deserialize, Serialize};

/// A client request, minus the `requestId` envelope field (the codec peels
/// that off before typed decoding so it survives malformed payloads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "SIGNUP")]
    Signup { username: String, password: String },

    #[serde(rename = "LOGIN")]
    Login { username: String, password: String },

    #[serde(rename = "PLANT")]
    Plant {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        row: i32,
        col: i32,
    },

    #[serde(rename = "HARVEST")]
    Harvest {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        row: i32,
        col: i32,
    },

    #[serde(rename = "STEAL")]
    Steal {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "targetId")]
        target_id: PlayerId,
        row: i32,
        col: i32,
    },

    #[serde(rename = "ADD_FRIEND")]
    AddFriend {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "targetId")]
        target_id: PlayerId,
    },

    #[serde(rename = "LIST_FRIENDS")]
    ListFriends {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },

    #[serde(rename = "VISIT_FARM")]
    VisitFarm {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "targetId")]
        target_id: PlayerId,
    },

    #[serde(rename = "PING")]
    Ping,
}

/// A resolved friend entry in LIST_FRIENDS responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendInfo {
    pub id: PlayerId,
    pub name: String,
}

/// The single response shell used by every request type.
///
/// Handlers fill in the fields relevant to the operation and leave the rest
/// `None`; only `requestId` serializes when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: Option<String>,
    pub ok: bool,
    pub msg: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,

    // Single-cell operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_state: Option<PlotState>,

    // Farm snapshots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cols: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<PlotState>>,

    // Friends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friends: Option<Vec<FriendInfo>>,

    // Farm visits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_steal: Option<bool>,

    // Steals: the owner's balance after the transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_coins: Option<u32>,
}

impl Response {
    /// A successful response with the given correlation id and message.
    pub fn success(request_id: Option<String>, msg: impl Into<String>) -> Self {
        Response {
            kind: "RESP".to_string(),
            request_id,
            ok: true,
            msg: msg.into(),
            ..Response::default()
        }
    }

    /// A failed response with the given correlation id and message.
    pub fn failure(request_id: Option<String>, msg: impl Into<String>) -> Self {
        Response {
            kind: "RESP".to_string(),
            request_id,
            ok: false,
            msg: msg.into(),
            ..Response::default()
        }
    }
}

/// Unsolicited single-cell update, pushed to the farm's owner and every
/// current viewer after any visible state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushCellUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    /// The farm owner's id.
    pub player_id: PlayerId,
    pub row: i32,
    pub col: i32,
    pub plot_state: PlotState,
    /// The farm owner's balance after the triggering operation.
    pub coins: u32,
}

impl PushCellUpdate {
    pub fn new(owner: PlayerId, row: i32, col: i32, plot_state: PlotState, coins: u32) -> Self {
        PushCellUpdate {
            kind: "PUSH_CELL_UPDATE".to_string(),
            player_id: owner,
            row,
            col,
            plot_state,
            coins,
        }
    }
}

/// Out-of-band notice, currently only the relogin eviction message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    #[serde(rename = "type")]
    pub kind: String,
    pub msg: String,
}

impl Info {
    /// The notice sent to a connection displaced by a newer login.
    pub fn relogin() -> Self {
        Info {
            kind: "INFO".to_string(),
            msg: "relogin".to_string(),
        }
    }
}
