use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, warn};

use crate::model::notification::{
    NewNotification, NotificationChannel, NotificationKind, NotificationReason,
};
use crate::model::settings::AttendanceSettings;
use crate::store::{AttendanceStore, CompliancePhotos};

/// Dispatch contract for the delivery providers. Providers themselves live
/// outside this service; each call covers exactly one channel and one
/// recipient.
#[async_trait::async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn dispatch(
        &self,
        channel: NotificationChannel,
        message: &NotificationMessage,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub tenant_id: u64,
    pub employee_id: u64,
    pub site_id: u64,
    pub work_date: NaiveDate,
    pub title: String,
    pub body: String,
}

/// Gateway used until the delivery providers are wired in: records the
/// dispatch in the log and reports it delivered.
pub struct LogOnlyGateway;

#[async_trait::async_trait]
impl NotificationGateway for LogOnlyGateway {
    async fn dispatch(
        &self,
        channel: NotificationChannel,
        message: &NotificationMessage,
    ) -> Result<()> {
        info!(
            %channel,
            employee_id = message.employee_id,
            site_id = message.site_id,
            "notification dispatched: {}",
            message.title
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub notification_id: u64,
    /// (channel, delivered) per attempted channel, in dispatch order.
    pub attempts: Vec<(NotificationChannel, bool)>,
}

/// Missing-compliance-photo trigger, invoked synchronously on direct
/// check-in Enter events. Returns `None` when no reminder is due (tenant has
/// no settings row, or the photo already exists). Each enabled channel is
/// attempted independently; one channel failing never blocks the rest.
pub async fn trigger_compliance_reminder(
    store: &dyn AttendanceStore,
    photos: &dyn CompliancePhotos,
    gateway: &dyn NotificationGateway,
    settings: Option<&AttendanceSettings>,
    tenant_id: u64,
    employee_id: u64,
    site_id: u64,
    date: NaiveDate,
) -> Result<Option<DispatchOutcome>> {
    let Some(settings) = settings else {
        return Ok(None);
    };

    if photos
        .photo_exists(tenant_id, employee_id, site_id, date)
        .await?
    {
        return Ok(None);
    }

    let notification_id = store
        .insert_notification(&NewNotification {
            tenant_id,
            employee_id,
            site_id,
            work_date: date,
            kind: NotificationKind::Push,
            reason: NotificationReason::MissingCompliancePhoto,
        })
        .await?;

    let message = NotificationMessage {
        tenant_id,
        employee_id,
        site_id,
        work_date: date,
        title: "Site attendance photo required".to_string(),
        body: format!(
            "Please submit your site attendance photo within {} minutes of arriving on site.",
            settings.spa_grace_period_minutes
        ),
    };

    let mut channels = Vec::new();
    if settings.notify_push {
        channels.push(NotificationChannel::Push);
    }
    if settings.notify_email {
        channels.push(NotificationChannel::Email);
    }
    if settings.notify_sms {
        channels.push(NotificationChannel::Sms);
    }

    let results = join_all(
        channels
            .iter()
            .map(|channel| gateway.dispatch(*channel, &message)),
    )
    .await;

    let mut attempts = Vec::with_capacity(channels.len());
    for (channel, result) in channels.into_iter().zip(results) {
        let delivered = match result {
            Ok(()) => true,
            Err(e) => {
                warn!(%channel, employee_id, site_id, error = %e, "notification dispatch failed");
                false
            }
        };
        store
            .record_notification_outcome(notification_id, channel, delivered)
            .await?;
        attempts.push((channel, delivered));
    }

    Ok(Some(DispatchOutcome {
        notification_id,
        attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::store::memory::InMemoryStore;

    struct FlakyGateway {
        failing: NotificationChannel,
    }

    #[async_trait::async_trait]
    impl NotificationGateway for FlakyGateway {
        async fn dispatch(
            &self,
            channel: NotificationChannel,
            _message: &NotificationMessage,
        ) -> Result<()> {
            if channel == self.failing {
                anyhow::bail!("provider down")
            }
            Ok(())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[tokio::test]
    async fn no_settings_row_means_no_reminder() {
        let store = InMemoryStore::new();

        let outcome =
            trigger_compliance_reminder(&store, &store, &LogOnlyGateway, None, 1, 42, 7, date())
                .await
                .unwrap();

        assert!(outcome.is_none());
        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn existing_photo_suppresses_the_reminder() {
        let store = InMemoryStore::new();
        let settings = AttendanceSettings::defaults_for(1);
        store.add_photo(1, 42, 7, date());

        let outcome = trigger_compliance_reminder(
            &store,
            &store,
            &LogOnlyGateway,
            Some(&settings),
            1,
            42,
            7,
            date(),
        )
        .await
        .unwrap();

        assert!(outcome.is_none());
        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_others() {
        let store = InMemoryStore::new();
        let mut settings = AttendanceSettings::defaults_for(1);
        settings.notify_email = true;
        settings.notify_sms = true;
        let gateway = FlakyGateway {
            failing: NotificationChannel::Email,
        };

        let outcome = trigger_compliance_reminder(
            &store,
            &store,
            &gateway,
            Some(&settings),
            1,
            42,
            7,
            date(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome.attempts.len(), 3);

        let notifications = store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].push_delivered, Some(true));
        assert_eq!(notifications[0].email_delivered, Some(false));
        assert_eq!(notifications[0].sms_delivered, Some(true));
        assert_eq!(
            notifications[0].reason,
            NotificationReason::MissingCompliancePhoto
        );
    }
}
