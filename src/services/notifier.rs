use crate::config::AppConfig;
use crate::entities::{items, prelude::*};
use crate::services::mailer::Mailer;
use crate::services::matching;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fire-and-forget match notifications for a freshly created item.
///
/// Runs detached from the request that created the item: nothing in here
/// may surface to the creator or undo the insert. Called on creation only,
/// never on update.
pub fn spawn_match_notifications(
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    config: AppConfig,
    item: items::Model,
) {
    tokio::spawn(async move {
        if let Err(e) = notify_matches(&db, mailer, &config, &item).await {
            warn!("Match notification run failed for item {}: {}", item.id, e);
        }
    });
}

async fn notify_matches(
    db: &DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    config: &AppConfig,
    item: &items::Model,
) -> Result<(), sea_orm::DbErr> {
    let matches = matching::find_matches(
        db,
        item,
        config.notify_radius_km,
        config.match_limit as usize,
    )
    .await?;

    if matches.is_empty() {
        debug!("No match notifications for item {}", item.id);
        return Ok(());
    }

    info!(
        "🔔 Notifying {} potential match owner(s) for item {}",
        matches.len(),
        item.id
    );

    let mut handles = Vec::new();
    for m in matches {
        // Opposite-disposition filtering already excludes the creator;
        // re-checked here so a data glitch cannot self-notify.
        if m.item.user_id == item.user_id {
            continue;
        }

        let owner = match Users::find_by_id(&m.item.user_id).one(db).await? {
            Some(owner) => owner,
            // Owner deleted mid-flight: benign, skip.
            None => continue,
        };
        if owner.email.is_empty() {
            continue;
        }

        let subject = format!("Reclaim: possible match for \"{}\"", m.item.title);
        let body = format!(
            "A new {} report \"{}\" in {} looks like a match for your item \"{}\".\n\n\
             Log in to Reclaim to view it and get in touch.",
            item.item_type, item.title, item.area, m.item.title
        );

        // One task per recipient: a slow or failing mailbox must not
        // delay or abort the others.
        let mailer = mailer.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = mailer.send(&owner.email, &subject, &body).await {
                warn!("Failed to notify {}: {}", owner.email, e);
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
