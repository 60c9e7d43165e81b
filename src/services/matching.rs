use crate::entities::{items, prelude::*};
use crate::utils::geo;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;

/// A candidate counterpart item together with its relevance score.
#[derive(Debug, Serialize)]
pub struct ScoredMatch {
    pub item: items::Model,
    pub match_score: i32,
}

/// Relevance score for a candidate against a reference item.
///
/// +2 for category equality (already guaranteed by the candidate filter,
/// kept so the weights survive a future relaxation of that filter),
/// +2 for locality-string equality, +1 when both items carry a color and
/// the values match case-insensitively.
pub fn score_candidate(base: &items::Model, candidate: &items::Model) -> i32 {
    let mut score = 0;

    if candidate.category == base.category {
        score += 2;
    }
    if candidate.area == base.area {
        score += 2;
    }
    if let (Some(a), Some(b)) = (&base.color, &candidate.color) {
        if !a.is_empty() && !b.is_empty() && a.to_lowercase() == b.to_lowercase() {
            score += 1;
        }
    }

    score
}

/// Locality gate: exact area match, or both points present and within
/// `radius_km` of each other. A reference item without coordinates simply
/// never passes the proximity leg.
fn passes_locality(base: &items::Model, candidate: &items::Model, radius_km: f64) -> bool {
    if candidate.area == base.area {
        return true;
    }

    match (base.lat, base.lng, candidate.lat, candidate.lng) {
        (Some(blat), Some(blng), Some(clat), Some(clng)) => {
            geo::within_radius_km(blat, blng, clat, clng, radius_km)
        }
        _ => false,
    }
}

/// Rank pre-filtered candidates: locality gate, score, drop zero scores,
/// sort score-descending with newest-first tie-break, cap at `limit`.
pub fn rank_candidates(
    base: &items::Model,
    candidates: Vec<items::Model>,
    radius_km: f64,
    limit: usize,
) -> Vec<ScoredMatch> {
    let mut matches: Vec<ScoredMatch> = candidates
        .into_iter()
        .filter(|c| c.id != base.id)
        .filter(|c| passes_locality(base, c, radius_km))
        .map(|c| {
            let match_score = score_candidate(base, &c);
            ScoredMatch {
                item: c,
                match_score,
            }
        })
        .filter(|m| m.match_score > 0)
        .collect();

    matches.sort_by(|a, b| {
        b.match_score
            .cmp(&a.match_score)
            .then(b.item.created_at.cmp(&a.item.created_at))
    });
    matches.truncate(limit);
    matches
}

/// Find plausible counterparts for `base`: open items of the opposite
/// disposition and the same category, near the reference item.
pub async fn find_matches(
    db: &DatabaseConnection,
    base: &items::Model,
    radius_km: f64,
    limit: usize,
) -> Result<Vec<ScoredMatch>, sea_orm::DbErr> {
    let candidates = Items::find()
        .filter(items::Column::ItemType.eq(items::opposite_type(&base.item_type)))
        .filter(items::Column::Category.eq(&base.category))
        .filter(items::Column::Status.eq(items::ItemStatus::Open.as_str()))
        .filter(items::Column::Id.ne(&base.id))
        .all(db)
        .await?;

    Ok(rank_candidates(base, candidates, radius_km, limit))
}
