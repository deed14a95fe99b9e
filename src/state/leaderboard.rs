use std::collections::HashMap;

use uuid::Uuid;

use crate::dao::models::{PlayerEntity, Version};

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// 1-based position.
    pub rank: usize,
    /// Player identity.
    pub player_id: Uuid,
    /// Nickname.
    pub display_name: String,
    /// Current score.
    pub score: i64,
}

#[derive(Debug, Clone)]
struct Row {
    display_name: String,
    score: i64,
    registration_seq: u64,
    version: Version,
}

/// Locally mirrored ranking over every player.
///
/// Ordered by score descending, ties broken by earlier registration.
#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    rows: HashMap<Uuid, Row>,
}

impl Leaderboard {
    /// Build from a fetched player list.
    pub fn from_players<'a>(players: impl IntoIterator<Item = &'a PlayerEntity>) -> Self {
        let mut board = Self::default();
        for player in players {
            board.upsert(player);
        }
        board
    }

    /// Merge a player record; stale versions are ignored. Returns whether the board changed.
    pub fn upsert(&mut self, player: &PlayerEntity) -> bool {
        if let Some(row) = self.rows.get(&player.id) {
            if row.version >= player.version {
                return false;
            }
        }

        self.rows.insert(
            player.id,
            Row {
                display_name: player.display_name.clone(),
                score: player.score,
                registration_seq: player.registration_seq,
                version: player.version,
            },
        );
        true
    }

    /// Number of players on the board.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no player registered yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full ranking.
    pub fn ranked(&self) -> Vec<Standing> {
        let mut rows: Vec<(&Uuid, &Row)> = self.rows.iter().collect();
        rows.sort_by(|(_, a), (_, b)| {
            b.score
                .cmp(&a.score)
                .then(a.registration_seq.cmp(&b.registration_seq))
        });

        rows.into_iter()
            .enumerate()
            .map(|(index, (id, row))| Standing {
                rank: index + 1,
                player_id: *id,
                display_name: row.display_name.clone(),
                score: row.score,
            })
            .collect()
    }

    /// First `limit` rows of the ranking.
    pub fn top(&self, limit: usize) -> Vec<Standing> {
        let mut ranked = self.ranked();
        ranked.truncate(limit);
        ranked
    }
}
