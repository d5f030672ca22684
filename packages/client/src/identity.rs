//! Identity of a simulation context.
//!
//! The generated id is kept in the shared storage under
//! `chat_browser_id.<name-slug>`, so the same user name maps to the same id
//! across runs on one machine.

use uuid::Uuid;

use crate::{error::StorageError, simulation::storage::SharedStorage};

const IDENTITY_KEY_PREFIX: &str = "chat_browser_id";

/// Lower-case, dash-separated form of a display name
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "anonymous".to_string()
    } else {
        slug.to_string()
    }
}

pub fn storage_key(name: &str) -> String {
    format!("{}.{}", IDENTITY_KEY_PREFIX, slug(name))
}

/// Stored id for `name`, or a newly generated and stored one
pub async fn load_or_create(
    storage: &dyn SharedStorage,
    name: &str,
) -> Result<String, StorageError> {
    let key = storage_key(name);
    if let Some(id) = storage.get(&key).await? {
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    let id = format!("user-{}", Uuid::new_v4().simple());
    storage.set(&key, &id).await?;
    tracing::info!("Generated identity '{}' for '{}'", id, name);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::storage::MemoryStorageMedium;

    #[test]
    fn test_slug_normalizes_names() {
        // テスト項目: 表示名は小文字・ハイフン区切りのスラッグになる
        // given (前提条件):
        // when (操作):
        // then (期待する結果):
        assert_eq!(slug("Alice"), "alice");
        assert_eq!(slug("  Bob   the Builder! "), "bob-the-builder");
        assert_eq!(slug("!!!"), "anonymous");
    }

    #[tokio::test]
    async fn test_load_or_create_is_stable_per_name() {
        // テスト項目: 同じ名前には同じ ID が返り、別の名前には別の ID が割り当てられる
        // given (前提条件):
        let medium = MemoryStorageMedium::new();
        let storage = medium.handle();

        // when (操作):
        let first = load_or_create(&storage, "Alice").await.unwrap();
        let again = load_or_create(&medium.handle(), "alice").await.unwrap();
        let other = load_or_create(&storage, "Bob").await.unwrap();

        // then (期待する結果):
        assert!(first.starts_with("user-"));
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(
            storage.get("chat_browser_id.alice").await.unwrap(),
            Some(first)
        );
    }
}
