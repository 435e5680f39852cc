//! Request dispatch and operation handlers.
//!
//! Every handler is synchronous: farm mutations happen under that farm's
//! mutex, account updates are per-entry, and broadcast/flush/timer signals
//! are non-blocking channel sends. The connection task calls straight into
//! here between reads.
//!
//! Identity rule: SIGNUP, LOGIN and PING work on any connection. Every
//! other request names a `playerId`, which must match the identity bound
//! to this connection at login: a connection that never logged in gets
//! "login first", a mismatched id gets "not your session". The `session`
//! token from LOGIN is issued for the client's benefit but is not the
//! authority; the connection binding is.

use std::sync::Arc;

use tokio::sync::Notify;
use uuid::Uuid;

use farm_core::{engine, quota, GameError, PlayerId, PlotState, PLANT_COST};
use farm_protocol::{FriendInfo, Request, Response};

use crate::broadcast;
use crate::clock;
use crate::persist::Aggregate;
use crate::scheduler::MaturationJob;
use crate::state::{lock_slot, AppState};
use crate::types::{ConnId, OutboundTx, SessionEntry};

/// Per-connection context a handler may need: enough to bind the
/// connection into the session registry at login.
pub struct ConnCtx<'a> {
    pub conn_id: ConnId,
    pub outbound: &'a OutboundTx,
    pub shutdown: &'a Arc<Notify>,
}

/// Handle one decoded request, producing exactly one response.
pub fn handle_request(
    state: &AppState,
    conn: &ConnCtx<'_>,
    bound: &mut Option<PlayerId>,
    request_id: Option<String>,
    request: Request,
) -> Response {
    let rid = request_id;
    let result = match request {
        Request::Ping => Ok(Response::success(rid.clone(), "pong")),
        Request::Signup { username, password } => {
            do_signup(state, rid.clone(), &username, &password)
        }
        Request::Login { username, password } => {
            do_login(state, conn, bound, rid.clone(), &username, &password)
        }
        Request::Plant {
            player_id,
            row,
            col,
        } => authorize(bound, player_id)
            .and_then(|_| do_plant(state, rid.clone(), player_id, row, col)),
        Request::Harvest {
            player_id,
            row,
            col,
        } => authorize(bound, player_id)
            .and_then(|_| do_harvest(state, rid.clone(), player_id, row, col)),
        Request::Steal {
            player_id,
            target_id,
            row,
            col,
        } => authorize(bound, player_id)
            .and_then(|_| do_steal(state, rid.clone(), player_id, target_id, row, col)),
        Request::AddFriend {
            player_id,
            target_id,
        } => authorize(bound, player_id)
            .and_then(|_| do_add_friend(state, rid.clone(), player_id, target_id)),
        Request::ListFriends { player_id } => authorize(bound, player_id)
            .and_then(|_| do_list_friends(state, rid.clone(), player_id)),
        Request::VisitFarm {
            player_id,
            target_id,
        } => authorize(bound, player_id)
            .and_then(|_| do_visit_farm(state, rid.clone(), player_id, target_id)),
    };

    result.unwrap_or_else(|e| Response::failure(rid, e.to_string()))
}

/// The request's `playerId` must be the identity bound to this connection.
fn authorize(bound: &Option<PlayerId>, player_id: PlayerId) -> Result<(), GameError> {
    match bound {
        None => Err(GameError::NotLoggedIn),
        Some(id) if *id != player_id => Err(GameError::SessionMismatch),
        Some(_) => Ok(()),
    }
}

fn do_signup(
    state: &AppState,
    rid: Option<String>,
    username: &str,
    password: &str,
) -> Result<Response, GameError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(GameError::BadRequest);
    }

    let player = state.accounts.signup(username, password)?;
    state.farm_slot(player.id);
    state.social.ensure_entry(player.id);

    state.queue_flush(Aggregate::Players);
    state.queue_flush(Aggregate::Farms);
    state.queue_flush(Aggregate::Friends);

    Ok(Response::success(rid, "signup ok"))
}

fn do_login(
    state: &AppState,
    conn: &ConnCtx<'_>,
    bound: &mut Option<PlayerId>,
    rid: Option<String>,
    username: &str,
    password: &str,
) -> Result<Response, GameError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(GameError::BadRequest);
    }

    let player = state.accounts.authenticate(username, password)?;
    let slot = state.farm_slot(player.id);
    state.social.ensure_entry(player.id);

    // A (re)binding owner clears the board for thieves.
    {
        let mut guard = lock_slot(&slot);
        guard.quota = None;
    }

    // Same connection switching identity: release the previous binding.
    if let Some(previous) = *bound {
        if previous != player.id {
            state.sessions.unbind(previous, conn.conn_id);
            state.social.clear_viewer(previous);
        }
    }

    state.sessions.bind(
        player.id,
        SessionEntry {
            conn_id: conn.conn_id,
            outbound: conn.outbound.clone(),
            shutdown: conn.shutdown.clone(),
        },
    );
    *bound = Some(player.id);

    // Fresh logins look at their own farm.
    state.social.watch(player.id, player.id);

    let mut resp = Response::success(rid, "login ok");
    resp.player_id = Some(player.id);
    resp.player_name = Some(player.name.clone());
    resp.coins = Some(player.coins);
    resp.session = Some(Uuid::new_v4().to_string());
    {
        let guard = lock_slot(&slot);
        resp.rows = Some(guard.farm.rows());
        resp.cols = Some(guard.farm.cols());
        resp.cells = Some(guard.farm.cell_states());
    }
    Ok(resp)
}

fn do_plant(
    state: &AppState,
    rid: Option<String>,
    player_id: PlayerId,
    row: i32,
    col: i32,
) -> Result<Response, GameError> {
    if !state.accounts.contains(player_id) {
        return Err(GameError::UnknownPlayer);
    }

    let slot = state.farm_slot(player_id);
    let new_coins;
    {
        let mut guard = lock_slot(&slot);
        let coins = state
            .accounts
            .coins(player_id)
            .ok_or(GameError::UnknownPlayer)?;
        let outcome = engine::plant(
            &mut guard.farm,
            coins,
            row,
            col,
            clock::now_ms(),
            state.config.grow_ms,
        )?;
        new_coins = state
            .accounts
            .adjust_coins(player_id, |c| c.saturating_sub(PLANT_COST))
            .unwrap_or(0);

        state.schedule_maturation(MaturationJob {
            owner: player_id,
            row,
            col,
            ripe_at_ms: outcome.ripe_at,
        });
        broadcast::cell_update(state, player_id, row, col, PlotState::Growing, new_coins);
    }

    state.queue_flush(Aggregate::Players);
    state.queue_flush(Aggregate::Farms);

    let mut resp = Response::success(rid, "plant ok");
    resp.player_id = Some(player_id);
    resp.row = Some(row);
    resp.col = Some(col);
    resp.plot_state = Some(PlotState::Growing);
    resp.coins = Some(new_coins);
    Ok(resp)
}

fn do_harvest(
    state: &AppState,
    rid: Option<String>,
    player_id: PlayerId,
    row: i32,
    col: i32,
) -> Result<Response, GameError> {
    if !state.accounts.contains(player_id) {
        return Err(GameError::UnknownPlayer);
    }

    let slot = state.farm_slot(player_id);
    let new_coins;
    {
        let mut guard = lock_slot(&slot);
        let slot_ref = &mut *guard;
        let outcome = engine::harvest(&mut slot_ref.farm, &mut slot_ref.quota, row, col)?;
        new_coins = state
            .accounts
            .adjust_coins(player_id, |c| c.saturating_add(outcome.reward))
            .unwrap_or(0);
        broadcast::cell_update(state, player_id, row, col, PlotState::Empty, new_coins);
    }

    state.queue_flush(Aggregate::Players);
    state.queue_flush(Aggregate::Farms);

    let mut resp = Response::success(rid, "harvest ok");
    resp.player_id = Some(player_id);
    resp.row = Some(row);
    resp.col = Some(col);
    resp.plot_state = Some(PlotState::Empty);
    resp.coins = Some(new_coins);
    Ok(resp)
}

fn do_steal(
    state: &AppState,
    rid: Option<String>,
    thief_id: PlayerId,
    owner_id: PlayerId,
    row: i32,
    col: i32,
) -> Result<Response, GameError> {
    if thief_id == owner_id {
        return Err(GameError::SelfTheft);
    }
    if !state.accounts.contains(thief_id) || !state.accounts.contains(owner_id) {
        return Err(GameError::UnknownPlayer);
    }
    if !state.social.are_friends(thief_id, owner_id) {
        return Err(GameError::NotFriends);
    }
    if state.sessions.is_online(owner_id) {
        return Err(GameError::OwnerOnline);
    }

    let slot = state.farm_slot(owner_id);
    let outcome;
    let owner_coins;
    let thief_coins;
    {
        let mut guard = lock_slot(&slot);
        let slot_ref = &mut *guard;
        outcome = engine::steal(&mut slot_ref.farm, &mut slot_ref.quota, row, col)?;
        owner_coins = state
            .accounts
            .adjust_coins(owner_id, |c| c.saturating_sub(outcome.transfer))
            .unwrap_or(0);
        thief_coins = state
            .accounts
            .adjust_coins(thief_id, |c| c.saturating_add(outcome.transfer))
            .unwrap_or(0);
        broadcast::cell_update(state, owner_id, row, col, PlotState::Empty, owner_coins);
    }

    state.queue_flush(Aggregate::Players);
    state.queue_flush(Aggregate::Farms);

    let mut resp = Response::success(rid, "steal ok");
    resp.player_id = Some(thief_id);
    resp.target_id = Some(owner_id);
    resp.row = Some(row);
    resp.col = Some(col);
    resp.plot_state = Some(PlotState::Empty);
    resp.coins = Some(thief_coins);
    resp.owner_coins = Some(owner_coins);
    resp.can_steal = Some(outcome.can_steal_again);
    Ok(resp)
}

fn do_add_friend(
    state: &AppState,
    rid: Option<String>,
    player_id: PlayerId,
    target_id: PlayerId,
) -> Result<Response, GameError> {
    if player_id == target_id {
        return Err(GameError::SelfFriend);
    }
    let target_name = state
        .accounts
        .name_of(target_id)
        .ok_or(GameError::UnknownPlayer)?;
    if !state.accounts.contains(player_id) {
        return Err(GameError::UnknownPlayer);
    }

    state.social.add_friend(player_id, target_id)?;
    state.queue_flush(Aggregate::Friends);

    let mut resp = Response::success(rid, "add friend ok");
    resp.player_id = Some(player_id);
    resp.friend_id = Some(target_id);
    resp.friend_name = Some(target_name);
    Ok(resp)
}

fn do_list_friends(
    state: &AppState,
    rid: Option<String>,
    player_id: PlayerId,
) -> Result<Response, GameError> {
    if !state.accounts.contains(player_id) {
        return Err(GameError::UnknownPlayer);
    }

    let friends: Vec<FriendInfo> = state
        .social
        .friend_ids(player_id)
        .into_iter()
        .filter_map(|id| {
            state
                .accounts
                .name_of(id)
                .map(|name| FriendInfo { id, name })
        })
        .collect();

    let mut resp = Response::success(rid, "list friends ok");
    resp.player_id = Some(player_id);
    resp.friends = Some(friends);
    Ok(resp)
}

fn do_visit_farm(
    state: &AppState,
    rid: Option<String>,
    viewer_id: PlayerId,
    target_id: PlayerId,
) -> Result<Response, GameError> {
    let target_name = state
        .accounts
        .name_of(target_id)
        .ok_or(GameError::UnknownPlayer)?;
    if !state.accounts.contains(viewer_id) {
        return Err(GameError::UnknownPlayer);
    }
    if viewer_id != target_id && !state.social.are_friends(viewer_id, target_id) {
        return Err(GameError::NotFriends);
    }

    let slot = state.farm_slot(target_id);
    let online = state.sessions.is_online(target_id);

    let mut resp = Response::success(rid, "visit ok");
    resp.player_id = Some(viewer_id);
    resp.target_id = Some(target_id);
    resp.target_name = Some(target_name);
    resp.owner_online = Some(online);
    {
        let mut guard = lock_slot(&slot);
        let ripe = guard.farm.count_ripe();
        resp.can_steal = Some(!online && quota::round_available(ripe, &mut guard.quota));
        resp.rows = Some(guard.farm.rows());
        resp.cols = Some(guard.farm.cols());
        resp.cells = Some(guard.farm.cell_states());
    }
    if viewer_id == target_id {
        resp.coins = state.accounts.coins(viewer_id);
    }

    state.social.watch(viewer_id, target_id);
    Ok(resp)
}
