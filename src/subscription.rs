use crate::cache::TtlSet;
use crate::identifiers::ChannelRef;
use crate::observability::METRICS;
use crate::platform::ChatPlatform;
use crate::store::ConfigStore;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a user is subscribed to every required channel.
///
/// Only positive answers are cached. Any platform error counts as "not
/// subscribed", so a misconfigured channel blocks posting instead of
/// silently letting everyone through.
pub struct SubscriptionChecker {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<ConfigStore>,
    fallback_channels: Vec<String>,
    cache: TtlSet<u64>,
    ttl: Duration,
}

impl SubscriptionChecker {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<ConfigStore>,
        fallback_channels: Vec<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            platform,
            store,
            fallback_channels,
            cache: TtlSet::new(),
            ttl,
        }
    }

    /// The channel list in effect: the stored one, or the configured
    /// fallback when the store is empty or unreadable.
    pub async fn required_channels(&self) -> Vec<String> {
        match self.store.list_channels().await {
            Ok(channels) if !channels.is_empty() => channels,
            Ok(_) => self.fallback_channels.clone(),
            Err(e) => {
                tracing::warn!("Falling back to configured channels: {}", e);
                self.fallback_channels.clone()
            }
        }
    }

    pub async fn is_fully_subscribed(&self, user_id: u64) -> bool {
        if self.cache.contains(&user_id) {
            METRICS.record_membership_check(true);
            return true;
        }
        METRICS.record_membership_check(false);

        for channel in self.required_channels().await {
            let Some(chat) = ChannelRef::parse(&channel) else {
                tracing::warn!("Required channel {:?} is not a valid identifier", channel);
                return false;
            };

            match self.platform.get_member_status(&chat, user_id).await {
                Ok(status) if status.is_subscribed() => {}
                Ok(status) => {
                    tracing::debug!("User {} is {:?} in {}", user_id, status, chat);
                    return false;
                }
                Err(e) => {
                    tracing::debug!("Membership of {} in {} unknown: {}", user_id, chat, e);
                    return false;
                }
            }
        }

        self.cache.set_until(user_id, self.ttl);
        true
    }

    /// Drops a cached positive result, e.g. after the user left a channel.
    pub fn forget(&self, user_id: u64) {
        self.cache.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::platform::MemberStatus;
    use crate::store::test_support::temp_store;
    use tokio::time::advance;

    fn checker(platform: Arc<FakePlatform>, store: Arc<ConfigStore>, fallback: &[&str]) -> SubscriptionChecker {
        SubscriptionChecker::new(
            platform,
            store,
            fallback.iter().map(|c| c.to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_channels_satisfied() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        store.add_channel("@a").await.unwrap();
        store.add_channel("-1002").await.unwrap();
        platform.set_member("@a", 7, MemberStatus::Administrator);
        platform.set_member("-1002", 7, MemberStatus::Restricted { is_member: true });

        let checker = checker(platform.clone(), store, &[]);

        assert!(checker.is_fully_subscribed(7).await);
        assert_eq!(platform.member_queries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_short_circuits() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        for channel in ["@a", "@b", "@c"] {
            store.add_channel(channel).await.unwrap();
        }
        platform.set_member("@a", 7, MemberStatus::Member);
        platform.set_member("@b", 7, MemberStatus::Left);
        platform.set_member("@c", 7, MemberStatus::Member);

        let checker = checker(platform.clone(), store, &[]);

        assert!(!checker.is_fully_subscribed(7).await);
        assert_eq!(
            platform.member_queries(),
            vec![("@a".to_string(), 7), ("@b".to_string(), 7)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_platform_error_fails_closed() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        store.add_channel("@private").await.unwrap();

        let checker = checker(platform, store, &[]);

        assert!(!checker.is_fully_subscribed(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_stored_entry_fails_closed() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        std::fs::write(
            store.path(),
            r#"{"chat_id": 100, "required_channels": ["-10012345678901234567890"]}"#,
        )
        .unwrap();

        let checker = checker(platform.clone(), store, &[]);

        assert!(!checker.is_fully_subscribed(7).await);
        assert!(platform.member_queries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_fallback_id_is_dropped() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        let fallback = crate::config::parse_channel_list("-10012345678901234567890,@a");
        platform.set_member("@a", 7, MemberStatus::Left);

        let checker = SubscriptionChecker::new(
            platform.clone(),
            store,
            fallback,
            Duration::from_secs(10),
        );

        assert_eq!(checker.required_channels().await, vec!["@a"]);
        assert!(!checker.is_fully_subscribed(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restricted_non_member_fails() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        store.add_channel("@a").await.unwrap();
        platform.set_member("@a", 7, MemberStatus::Restricted { is_member: false });

        let checker = checker(platform, store, &[]);

        assert!(!checker.is_fully_subscribed(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positive_result_is_cached_until_ttl() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        store.add_channel("@a").await.unwrap();
        platform.set_member("@a", 7, MemberStatus::Member);

        let checker = checker(platform.clone(), store, &[]);

        assert!(checker.is_fully_subscribed(7).await);
        advance(Duration::from_secs(5)).await;
        assert!(checker.is_fully_subscribed(7).await);
        assert_eq!(platform.member_queries().len(), 1);

        advance(Duration::from_secs(6)).await;
        assert!(checker.is_fully_subscribed(7).await);
        assert_eq!(platform.member_queries().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_result_is_not_cached() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        store.add_channel("@a").await.unwrap();
        platform.set_member("@a", 7, MemberStatus::Left);

        let checker = checker(platform.clone(), store, &[]);

        assert!(!checker.is_fully_subscribed(7).await);
        platform.set_member("@a", 7, MemberStatus::Member);
        assert!(checker.is_fully_subscribed(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_drops_cached_result() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        store.add_channel("@a").await.unwrap();
        platform.set_member("@a", 7, MemberStatus::Member);

        let checker = checker(platform.clone(), store, &[]);
        assert!(checker.is_fully_subscribed(7).await);

        platform.set_member("@a", 7, MemberStatus::Left);
        checker.forget(7);

        assert!(!checker.is_fully_subscribed(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_store_uses_fallback_list() {
        let platform = Arc::new(FakePlatform::new());
        let store = Arc::new(temp_store());
        platform.set_member("@fallback", 7, MemberStatus::Owner);

        let checker = checker(platform.clone(), store.clone(), &["@fallback"]);

        assert_eq!(checker.required_channels().await, vec!["@fallback"]);
        assert!(checker.is_fully_subscribed(7).await);

        store.add_channel("@stored").await.unwrap();
        assert_eq!(checker.required_channels().await, vec!["@stored"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_channels_means_subscribed() {
        let platform = Arc::new(FakePlatform::new());
        let checker = checker(platform.clone(), Arc::new(temp_store()), &[]);

        assert!(checker.is_fully_subscribed(7).await);
        assert!(platform.member_queries().is_empty());
    }
}
