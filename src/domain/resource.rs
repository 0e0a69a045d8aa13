//! Existence checks and idempotent creation of named remote resources

use std::fmt;
use std::future::Future;

use tracing::{debug, info, warn};

use super::DomainError;

/// Kinds of remote resources managed by the provisioner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    VectorBucket,
    VectorIndex,
    SecurityPolicy,
    AccessPolicy,
    SearchCollection,
    KnowledgeBase,
    DataSource,
    Agent,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VectorBucket => write!(f, "vector bucket"),
            Self::VectorIndex => write!(f, "vector index"),
            Self::SecurityPolicy => write!(f, "security policy"),
            Self::AccessPolicy => write!(f, "access policy"),
            Self::SearchCollection => write!(f, "search collection"),
            Self::KnowledgeBase => write!(f, "knowledge base"),
            Self::DataSource => write!(f, "data source"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// Outcome of a single existence lookup
///
/// Lookup failures other than "not found" are not represented here; they
/// travel as the `Err` side of `Result<Presence<T>, DomainError>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Presence<T> {
    Exists(T),
    NotFound,
}

impl<T> Presence<T> {
    /// Normalize a lookup result, mapping a not-found error to [`Presence::NotFound`]
    pub fn from_lookup(result: Result<T, DomainError>) -> Result<Self, DomainError> {
        match result {
            Ok(found) => Ok(Self::Exists(found)),
            Err(error) if error.is_not_found() => Ok(Self::NotFound),
            Err(error) => Err(error),
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Self::Exists(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Exists(found) => Some(found),
            Self::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Presence<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(found) => Self::Exists(found),
            None => Self::NotFound,
        }
    }
}

/// A resource handle together with whether this call created it
#[derive(Debug, Clone, PartialEq)]
pub struct Ensured<T> {
    pub resource: T,
    pub created: bool,
}

/// Look a resource up exactly once
pub async fn find_existing<T, L, Fut>(
    kind: ResourceKind,
    identifier: &str,
    lookup: L,
) -> Result<Presence<T>, DomainError>
where
    L: FnOnce() -> Fut,
    Fut: Future<Output = Result<Presence<T>, DomainError>>,
{
    let found = lookup().await?;
    debug!(kind = %kind, identifier, exists = found.exists(), "Checked resource existence");
    Ok(found)
}

/// Reuse the named resource if present, otherwise create it
///
/// Existing resources are never updated. A conflict from the create call means
/// a concurrent creator won the race: the resource is looked up again and reused.
pub async fn ensure_created<T, L, LFut, C, CFut>(
    kind: ResourceKind,
    identifier: &str,
    mut lookup: L,
    create: C,
) -> Result<Ensured<T>, DomainError>
where
    L: FnMut() -> LFut,
    LFut: Future<Output = Result<Presence<T>, DomainError>>,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<T, DomainError>>,
{
    if let Presence::Exists(resource) = find_existing(kind, identifier, &mut lookup).await? {
        info!(kind = %kind, identifier, "Reusing existing resource");
        return Ok(Ensured {
            resource,
            created: false,
        });
    }

    info!(kind = %kind, identifier, "Creating resource");
    match create().await {
        Ok(resource) => Ok(Ensured {
            resource,
            created: true,
        }),
        Err(error) if error.is_conflict() => {
            warn!(
                kind = %kind,
                identifier,
                error = %error,
                "Create conflicted with a concurrent creator, re-probing"
            );
            match find_existing(kind, identifier, &mut lookup).await? {
                Presence::Exists(resource) => Ok(Ensured {
                    resource,
                    created: false,
                }),
                Presence::NotFound => Err(DomainError::conflict(format!(
                    "{} '{}' reported a conflict on create but is not visible",
                    kind, identifier
                ))),
            }
        }
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct FakeRegistry {
        items: Mutex<HashMap<String, String>>,
        next_id: AtomicUsize,
        creates: AtomicUsize,
    }

    impl FakeRegistry {
        fn get(&self, name: &str) -> Result<String, DomainError> {
            self.items
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("'{}' not found", name)))
        }

        fn create(&self, name: &str) -> Result<String, DomainError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let mut items = self.items.lock().unwrap();
            if items.contains_key(name) {
                return Err(DomainError::conflict(format!("'{}' exists", name)));
            }
            let id = format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            items.insert(name.to_string(), id.clone());
            Ok(id)
        }

        async fn ensure(&self, name: &str) -> Result<Ensured<String>, DomainError> {
            ensure_created(
                ResourceKind::VectorBucket,
                name,
                || async { Presence::from_lookup(self.get(name)) },
                || async { self.create(name) },
            )
            .await
        }
    }

    #[test]
    fn test_from_lookup_maps_not_found() {
        let found: Presence<u32> =
            Presence::from_lookup(Err(DomainError::not_found("missing"))).unwrap();
        assert_eq!(found, Presence::NotFound);
    }

    #[test]
    fn test_from_lookup_propagates_other_errors() {
        let result: Result<Presence<u32>, _> =
            Presence::from_lookup(Err(DomainError::provider("aws", "access denied")));
        assert!(matches!(result, Err(DomainError::Provider { .. })));
    }

    #[test]
    fn test_presence_from_option() {
        assert_eq!(Presence::from(Some(3)), Presence::Exists(3));
        assert_eq!(Presence::<u32>::from(None), Presence::NotFound);
        assert_eq!(Presence::Exists(3).into_option(), Some(3));
    }

    #[tokio::test]
    async fn test_find_existing_issues_single_lookup() {
        let calls = AtomicUsize::new(0);
        let found = find_existing(ResourceKind::Agent, "agent", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Presence::Exists("agent-1")) }
        })
        .await
        .unwrap();

        assert!(found.exists());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_created_is_idempotent() {
        let registry = FakeRegistry::default();

        let first = registry.ensure("docs").await.unwrap();
        let second = registry.ensure("docs").await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.resource, second.resource);
        assert_eq!(registry.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_treated_as_success() {
        let registry = FakeRegistry::default();
        let lookups = AtomicUsize::new(0);

        // The first lookup misses; a concurrent creator then wins the race.
        let ensured = ensure_created(
            ResourceKind::KnowledgeBase,
            "agent-kb",
            || {
                let attempt = lookups.fetch_add(1, Ordering::SeqCst);
                let result = if attempt == 0 {
                    Ok(Presence::NotFound)
                } else {
                    Presence::from_lookup(registry.get("agent-kb"))
                };
                async move { result }
            },
            || async {
                registry.create("agent-kb")?;
                registry.create("agent-kb")
            },
        )
        .await
        .unwrap();

        assert!(!ensured.created);
        assert_eq!(ensured.resource, "id-0");
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conflict_without_visible_resource_fails() {
        let result: Result<Ensured<String>, _> = ensure_created(
            ResourceKind::DataSource,
            "ds",
            || async { Ok(Presence::NotFound) },
            || async { Err(DomainError::conflict("busy")) },
        )
        .await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_other_create_errors_propagate() {
        let result: Result<Ensured<String>, _> = ensure_created(
            ResourceKind::VectorIndex,
            "idx",
            || async { Ok(Presence::NotFound) },
            || async { Err(DomainError::provider("s3vectors", "quota exceeded")) },
        )
        .await;

        assert!(matches!(result, Err(DomainError::Provider { .. })));
    }
}
