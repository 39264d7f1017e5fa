use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::select;
use tracing::instrument;

use crate::config::TrendingConfig;
use crate::database::{orm, Backend, Result};
use crate::model::*;

/// Ranked trending state over posts and users.
///
/// Only the very first credit a subject ever receives is folded into the
/// index synchronously; every later credit lands on the pending queue and
/// becomes visible once [`TrendingIndex::converge`] runs (the background
/// task does this on an interval, tests call it directly).
#[derive(Debug, Clone)]
pub struct TrendingIndex {
    backend: Backend,
    config: TrendingConfig,
    posts: Arc<DashMap<PostId, PostEntry>>,
    users: Arc<DashMap<UserId, UserEntry>>,
    pending: Arc<Mutex<Vec<Credit>>>,
}

#[derive(Debug, Clone)]
struct PostEntry {
    score: f64,
    last_updated_at: Timestamp,
    owner_id: UserId,
}

#[derive(Debug, Clone)]
struct UserEntry {
    score: f64,
    last_updated_at: Timestamp,
}

#[derive(Debug, Clone)]
enum Credit {
    Post {
        post_id: PostId,
        owner_id: UserId,
        at: Timestamp,
    },
    User {
        user_id: UserId,
        at: Timestamp,
    },
}

/// One row of the ranked post snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPost {
    pub post_id: PostId,
    pub owner_id: UserId,
    pub score: f64,
}

/// One row of the ranked user snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedUser {
    pub user_id: UserId,
    pub score: f64,
}

impl TrendingIndex {
    pub fn new(backend: Backend, config: TrendingConfig) -> Self {
        Self {
            backend,
            config,
            posts: Arc::new(DashMap::new()),
            users: Arc::new(DashMap::new()),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record one view credit against `post` (must be the original post) and
    /// its owner. Seeds entries synchronously for subjects with no live
    /// entry, otherwise defers to the pending queue.
    #[instrument(skip(self, post), fields(post_id = %post.post_id))]
    pub async fn credit(&self, post: &Post, at: Timestamp) -> Result<()> {
        if post.status != PostStatus::Completed {
            return Ok(());
        }

        // Verification gates post entries only; the owner still accrues.
        // Seed-vs-queue is decided under the shard lock so concurrent first
        // credits cannot both seed.
        if post.is_verified != Some(false) {
            let seeded = match self.posts.entry(post.post_id.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(PostEntry {
                        score: 1.0,
                        last_updated_at: at,
                        owner_id: post.owner_id.clone(),
                    });
                    tracing::debug!("seeded trending entry for post `{}`", post.post_id);
                    true
                }
            };
            if !seeded {
                self.pending_queue().push(Credit::Post {
                    post_id: post.post_id.clone(),
                    owner_id: post.owner_id.clone(),
                    at,
                });
            }
        }

        let owner = orm::users::get(&self.backend, &post.owner_id).await?;
        let owner_active = owner.map_or(false, |user| user.status == UserStatus::Active);
        if owner_active {
            let seeded = match self.users.entry(post.owner_id.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(UserEntry {
                        score: 1.0,
                        last_updated_at: at,
                    });
                    tracing::debug!("seeded trending entry for user `{}`", post.owner_id);
                    true
                }
            };
            if !seeded {
                self.pending_queue().push(Credit::User {
                    user_id: post.owner_id.clone(),
                    at,
                });
            }
        }

        Ok(())
    }

    /// Fold all pending credits into the index, re-checking eligibility
    /// against the store, then prune entries that decayed below the floor.
    /// Returns how many credits were applied.
    #[instrument(skip(self))]
    pub async fn converge(&self, now: Timestamp) -> Result<usize> {
        let credits: Vec<Credit> = std::mem::take(&mut *self.pending_queue());
        let mut applied = 0;

        for credit in credits {
            match credit {
                Credit::Post { post_id, at, .. } => {
                    let Some(post) = orm::posts::get(&self.backend, &post_id).await? else {
                        continue;
                    };
                    if post.status != PostStatus::Completed || post.is_verified == Some(false) {
                        continue;
                    }
                    self.apply_post(&post, at);
                    applied += 1;
                }
                Credit::User { user_id, at } => {
                    let Some(user) = orm::users::get(&self.backend, &user_id).await? else {
                        continue;
                    };
                    if user.status != UserStatus::Active {
                        continue;
                    }
                    self.apply_user(&user_id, at);
                    applied += 1;
                }
            }
        }

        self.prune(now);
        Ok(applied)
    }

    /// Post left the COMPLETED state; forget it.
    pub fn remove_post(&self, post_id: &PostId) {
        self.posts.remove(post_id);
        self.pending_queue().retain(|credit| {
            !matches!(credit, Credit::Post { post_id: pending, .. } if pending == post_id)
        });
    }

    /// User reset or deleted their account; drop the user entry, every post
    /// entry they own, and any of their credits still in flight.
    pub fn remove_user(&self, user_id: &UserId) {
        self.users.remove(user_id);
        self.posts.retain(|_, entry| entry.owner_id != *user_id);
        self.pending_queue().retain(|credit| match credit {
            Credit::Post { owner_id, .. } => owner_id != user_id,
            Credit::User { user_id: pending, .. } => pending != user_id,
        });
    }

    /// Ranked posts, best first, scored as of `now`.
    pub fn trending_posts(&self, now: Timestamp) -> Vec<RankedPost> {
        let mut ranked: Vec<(RankedPost, Timestamp)> = self
            .posts
            .iter()
            .map(|entry| {
                let row = RankedPost {
                    post_id: entry.key().clone(),
                    owner_id: entry.value().owner_id.clone(),
                    score: decayed(
                        entry.value().score,
                        entry.value().last_updated_at,
                        now,
                        self.config.half_life,
                    ),
                };
                (row, entry.value().last_updated_at)
            })
            .collect();

        ranked.sort_by(|(a, a_updated), (b, b_updated)| {
            rank_order(a.score, *a_updated, b.score, *b_updated)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });

        ranked.into_iter().map(|(row, _)| row).collect()
    }

    /// Ranked users, best first, scored as of `now`.
    pub fn trending_users(&self, now: Timestamp) -> Vec<RankedUser> {
        let mut ranked: Vec<(RankedUser, Timestamp)> = self
            .users
            .iter()
            .map(|entry| {
                let row = RankedUser {
                    user_id: entry.key().clone(),
                    score: decayed(
                        entry.value().score,
                        entry.value().last_updated_at,
                        now,
                        self.config.half_life,
                    ),
                };
                (row, entry.value().last_updated_at)
            })
            .collect();

        ranked.sort_by(|(a, a_updated), (b, b_updated)| {
            rank_order(a.score, *a_updated, b.score, *b_updated)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        ranked.into_iter().map(|(row, _)| row).collect()
    }

    pub fn pending_credits(&self) -> usize {
        self.pending_queue().len()
    }

    fn apply_post(&self, post: &Post, at: Timestamp) {
        let mut entry = self
            .posts
            .entry(post.post_id.clone())
            .or_insert_with(|| PostEntry {
                score: 0.0,
                last_updated_at: at,
                owner_id: post.owner_id.clone(),
            });

        entry.score = decayed(entry.score, entry.last_updated_at, at, self.config.half_life) + 1.0;
        if at > entry.last_updated_at {
            entry.last_updated_at = at;
        }
    }

    fn apply_user(&self, user_id: &UserId, at: Timestamp) {
        let mut entry = self.users.entry(user_id.clone()).or_insert_with(|| UserEntry {
            score: 0.0,
            last_updated_at: at,
        });

        entry.score = decayed(entry.score, entry.last_updated_at, at, self.config.half_life) + 1.0;
        if at > entry.last_updated_at {
            entry.last_updated_at = at;
        }
    }

    fn prune(&self, now: Timestamp) {
        let half_life = self.config.half_life;
        let floor = self.config.score_floor;

        self.posts
            .retain(|_, entry| decayed(entry.score, entry.last_updated_at, now, half_life) >= floor);
        self.users
            .retain(|_, entry| decayed(entry.score, entry.last_updated_at, now, half_life) >= floor);
    }

    fn pending_queue(&self) -> MutexGuard<'_, Vec<Credit>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exponential half-life decay of `score` from `from` to `to`. Time moving
/// backwards is treated as no elapsed time.
fn decayed(score: f64, from: Timestamp, to: Timestamp, half_life: Duration) -> f64 {
    let half_life = half_life.as_secs_f64();
    if half_life <= 0.0 {
        return score;
    }

    let elapsed = (to - from).num_milliseconds().max(0) as f64 / 1000.0;
    score * 0.5_f64.powf(elapsed / half_life)
}

fn rank_order(a_score: f64, a_updated: Timestamp, b_score: f64, b_updated: Timestamp) -> Ordering {
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b_updated.cmp(&a_updated))
}

/// Handle for the background convergence task.
#[derive(Debug, Clone)]
pub struct ConvergenceTask {
    tx: tokio::sync::mpsc::Sender<Message>,
}

#[derive(Debug)]
enum Message {
    Stop,
}

impl ConvergenceTask {
    pub async fn stop(&self) {
        let _ = self.tx.send(Message::Stop).await;
    }
}

/// Spawn the background task that folds pending credits into the index every
/// `recompute_interval`.
pub fn spawn_convergence(index: TrendingIndex) -> ConvergenceTask {
    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    let period = index.config.recompute_interval;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!("trending convergence task runs every {:?}", period);

        loop {
            select! {
                _ = interval.tick() => {
                    match index.converge(now()).await {
                        Ok(applied) if applied > 0 => {
                            tracing::debug!(applied, "folded pending view credits");
                        }
                        Ok(_) => {}
                        Err(error) => {
                            tracing::error!(%error, "trending recompute failed");
                        }
                    }
                },
                Some(Message::Stop) = rx.recv() => break,
            }
        }
    });

    ConvergenceTask { tx }
}
