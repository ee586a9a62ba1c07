//! Chat role lookup with caching.

use std::collections::HashSet;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMemberKind, UserId};
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};
use crate::router::RoleLookup;

/// Cache key for admin lookups.
type AdminCacheKey = (i64, u64); // (chat_id, user_id)

/// [`RoleLookup`] backed by `getChatMember`.
///
/// Developers (from DEV_IDS env) count as admins in every chat.
#[derive(Clone)]
pub struct Permissions {
    bot: Bot,
    cache: TypedCache<AdminCacheKey, bool>,
    developers: HashSet<u64>,
}

impl Permissions {
    pub fn new(bot: Bot, developers: HashSet<u64>, config: CacheConfig) -> Self {
        Self {
            bot,
            cache: TypedCache::new("chat_admins", config),
            developers,
        }
    }

    /// Check if a user is a developer.
    #[inline]
    pub fn is_developer(&self, user_id: u64) -> bool {
        self.developers.contains(&user_id)
    }

    /// Fetch admin status from the Telegram API.
    async fn fetch_is_admin(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool> {
        let member = self.bot.get_chat_member(ChatId(chat_id), UserId(user_id)).await?;
        Ok(matches!(
            member.kind,
            ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_)
        ))
    }

    /// Forget a cached answer, e.g. after a promotion.
    pub fn invalidate(&self, chat_id: i64, user_id: u64) {
        self.cache.invalidate(&(chat_id, user_id));
        debug!(
            "Invalidated {} entry for user {} in chat {}",
            self.cache.name(),
            user_id,
            chat_id
        );
    }
}

#[async_trait]
impl RoleLookup for Permissions {
    async fn is_chat_admin(&self, chat_id: i64, actor_id: u64) -> anyhow::Result<bool> {
        if self.is_developer(actor_id) {
            debug!("User {} is a developer, treating as admin", actor_id);
            return Ok(true);
        }

        // Everyone administers their own private chat.
        if chat_id == actor_id as i64 {
            return Ok(true);
        }

        let cache_key = (chat_id, actor_id);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in chat {}", actor_id, chat_id);
            return Ok(cached);
        }

        debug!("Admin cache miss for user {} in chat {}", actor_id, chat_id);
        let is_admin = self.fetch_is_admin(chat_id, actor_id).await?;

        // Errors are not cached; negative answers are.
        self.cache.insert(cache_key, is_admin);
        Ok(is_admin)
    }

    fn developer_set(&self) -> &HashSet<u64> {
        &self.developers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions(developers: &[u64]) -> Permissions {
        Permissions::new(
            Bot::new("0:test"),
            developers.iter().copied().collect(),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_developer_is_admin_everywhere() {
        let perms = permissions(&[42]);
        assert!(perms.is_chat_admin(-100, 42).await.unwrap());
        assert!(perms.developer_set().contains(&42));
    }

    #[tokio::test]
    async fn test_private_chat_owner() {
        let perms = permissions(&[]);
        assert!(perms.is_chat_admin(7, 7).await.unwrap());
    }

    #[tokio::test]
    async fn test_cached_answer_skips_api() {
        let perms = permissions(&[]);
        perms.cache.insert((-100, 7), false);
        assert!(!perms.is_chat_admin(-100, 7).await.unwrap());

        perms.cache.insert((-100, 8), true);
        assert!(perms.is_chat_admin(-100, 8).await.unwrap());
    }
}
