//! Periodic broadcast leases and the race rules that leave exactly one
//! process re-sending state for a game.
//!
//! Any connected process may start a lease for the view it just
//! rendered; nothing prevents two processes holding one concurrently.
//! Convergence comes from `resolve_race`: every process applies it to
//! each incoming notification and stops its own lease when it loses.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// What a lease is broadcasting: a view rendering at some progress
/// value, or a skip-round notice (which never competes on progress).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseTag {
    Progress(u64),
    SkipRound,
}

/// One process's transient claim to periodically push state for a game.
///
/// The send loop stops on its own after `limit` iterations, the
/// runaway backstop for leases nobody ever supersedes.
pub struct BroadcastLease {
    pub tag: LeaseTag,
    handle: JoinHandle<()>,
}

impl BroadcastLease {
    pub fn start<F, Fut>(tag: LeaseTag, period: Duration, limit: u32, mut send: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            for _ in 0..limit {
                send().await;
                tokio::time::sleep(period).await;
            }
        });
        Self { tag, handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for BroadcastLease {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// What to do about an incoming `game_update` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome {
    /// Our lease lost: stop it, cancel any running reel, forward the
    /// payload.
    Yield,
    /// The sender is behind us: drop the notification entirely. The
    /// sender corrects itself when our next broadcast reaches it.
    Ignore,
    /// Our lease survives; forward the payload.
    Keep,
}

/// Compare an incoming notification against our own lease.
///
/// Progress decides; equal progress falls back to the lexicographically
/// greater player name, so exactly one broadcaster survives per
/// progress value without any coordinator.
pub fn resolve_race(
    own: LeaseTag,
    own_name: &str,
    incoming_progress: u64,
    sender: &str,
) -> RaceOutcome {
    let LeaseTag::Progress(own_progress) = own else {
        return RaceOutcome::Keep;
    };
    if own_progress < incoming_progress {
        RaceOutcome::Yield
    } else if own_progress > incoming_progress {
        RaceOutcome::Ignore
    } else if sender > own_name {
        RaceOutcome::Yield
    } else {
        RaceOutcome::Keep
    }
}
