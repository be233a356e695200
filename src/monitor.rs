//! The poll loop: fetch, extract, filter, dedup, notify, mark

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::MonitorError;
use crate::extractor;
use crate::filter;
use crate::models::{NotificationEvent, UserWatch};
use crate::traits::{Notifier, PageFetcher, SeenStore, WatchStore};

/// Knobs the monitor needs from [`Config`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub max_sites: usize,
    pub concurrency: usize,
    pub seen_retention: Option<Duration>,
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            max_sites: config.max_sites,
            concurrency: config.concurrency,
            seen_retention: config.seen_retention,
        }
    }
}

/// What happened for one (user, site) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteOutcome {
    /// One new listing was delivered (carries its url)
    Notified(String),
    /// Delivery was attempted and failed; nothing was marked
    NotifyFailed,
    NothingNew,
}

/// Summary of one cycle, logged at the end of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub watches: usize,
    pub sites_checked: usize,
    pub sites_failed: usize,
    pub notifications: usize,
}

#[derive(Clone)]
pub struct Monitor {
    watches: Arc<dyn WatchStore>,
    seen: Arc<dyn SeenStore>,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        watches: Arc<dyn WatchStore>,
        seen: Arc<dyn SeenStore>,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            watches,
            seen,
            fetcher,
            notifier,
            settings,
        }
    }

    /// Runs cycles forever. A failed cycle is logged and the loop carries on
    /// after the normal sleep; cycles never overlap.
    pub async fn run(&self) {
        info!(
            "Monitor started - {} fetcher, checking every {}s",
            self.fetcher.name(),
            self.settings.interval.as_secs()
        );

        loop {
            match self.run_cycle().await {
                Ok(report) => info!(
                    "Cycle done: {} watches, {} sites checked, {} failed, {} notifications",
                    report.watches, report.sites_checked, report.sites_failed, report.notifications
                ),
                Err(e) => error!("Cycle failed: {}", e),
            }

            tokio::time::sleep(self.settings.interval).await;
        }
    }

    /// One pass over every active watch and its sites.
    pub async fn run_cycle(&self) -> Result<CycleReport, MonitorError> {
        if let Some(retention) = self.settings.seen_retention {
            self.prune_seen(retention).await;
        }

        let watches = self.watches.active_watches().await?;
        let mut report = CycleReport {
            watches: watches.len(),
            ..CycleReport::default()
        };

        // Watches run in parallel; one watch's sites run in order so a listing
        // shown on two of them is claimed by the first and skipped by the second.
        let mut results = futures::stream::iter(watches)
            .map(|watch| {
                let monitor = self.clone();
                let user_id = watch.user_id.clone();
                let site_count = watch.sites.len().min(self.settings.max_sites);
                let handle = tokio::spawn(async move { monitor.check_watch(&watch).await });
                async move { (user_id, site_count, handle.await) }
            })
            .buffer_unordered(self.settings.concurrency.max(1));

        while let Some((user_id, site_count, joined)) = results.next().await {
            let outcomes = match joined {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    error!(user_id = %user_id, "Watch check task aborted: {}", e);
                    report.sites_checked += site_count;
                    report.sites_failed += site_count;
                    continue;
                }
            };

            for (site, outcome) in outcomes {
                report.sites_checked += 1;

                match outcome {
                    Ok(SiteOutcome::Notified(_)) => report.notifications += 1,
                    Ok(SiteOutcome::NothingNew) => {}
                    Ok(SiteOutcome::NotifyFailed) => report.sites_failed += 1,
                    Err(MonitorError::Fetch(e)) => {
                        warn!(user_id = %user_id, site = %site, "Fetch failed, retrying next cycle: {}", e);
                        report.sites_failed += 1;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, site = %site, "Site check failed: {}", e);
                        report.sites_failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Checks the watch's sites one after another, up to the site cap.
    pub async fn check_watch(
        &self,
        watch: &UserWatch,
    ) -> Vec<(String, Result<SiteOutcome, MonitorError>)> {
        let mut outcomes = Vec::new();

        for site in watch.sites.iter().take(self.settings.max_sites) {
            let outcome = self.check_site(watch, site).await;
            outcomes.push((site.clone(), outcome));
        }

        outcomes
    }

    /// Fetch one site for one watch and deliver at most one new listing.
    pub async fn check_site(&self, watch: &UserWatch, site: &str) -> Result<SiteOutcome, MonitorError> {
        let html = self.fetcher.fetch(site).await?;
        let listings = extractor::extract(&html, site)?;

        for listing in listings {
            if !filter::matches(&listing, watch) {
                continue;
            }

            let already_seen = match self.seen.has(&watch.user_id, &listing.url).await {
                Ok(seen) => seen,
                Err(e) => {
                    // A duplicate beats a silently dropped listing.
                    error!(
                        user_id = %watch.user_id, url = %listing.url,
                        "Seen-set lookup failed, treating listing as new: {}", e
                    );
                    false
                }
            };
            if already_seen {
                debug!("Already notified {} about {}", watch.user_id, listing.url);
                continue;
            }

            info!("New listing for {}: {} ({})", watch.user_id, listing.title, listing.url);

            let event = NotificationEvent::from_listing(&watch.user_id, &listing);
            if let Err(e) = self.notifier.notify(&event.user_id, &event.render()).await {
                error!(
                    user_id = %watch.user_id, site = %site, url = %listing.url,
                    "Notification failed, will retry next cycle: {}", e
                );
                return Ok(SiteOutcome::NotifyFailed);
            }

            if let Err(e) = self.seen.mark(&watch.user_id, &listing.url).await {
                error!(
                    user_id = %watch.user_id, url = %listing.url,
                    "Notified but could not record listing as seen: {}", e
                );
            }

            return Ok(SiteOutcome::Notified(listing.url));
        }

        Ok(SiteOutcome::NothingNew)
    }

    async fn prune_seen(&self, retention: Duration) {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return;
        };

        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            debug!("Seen retention reaches before the representable past, nothing to prune");
            return;
        };

        match self.seen.prune_older_than(cutoff).await {
            Ok(0) => {}
            Ok(removed) => info!("Pruned {} expired seen records", removed),
            Err(e) => warn!("Could not prune seen records: {}", e),
        }
    }
}
