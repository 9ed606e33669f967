//! Create-vs-update reconciliation of upstream repository payloads.
//!
//! A repository is identified by `(owner, name)`. If a stored row matches, the
//! candidate replaces it under the stored id; otherwise a new row with a fresh
//! id is created. Lookup and write are two separate store calls: two
//! reconcilers racing on a new repository can both see "absent", and the
//! store's uniqueness constraint rejects the second create.

use uuid::Uuid;

use gitfleet_core::{RemoteRepository, Repository};
use gitfleet_store::{RepoStore, StoreError};

/// What [`apply`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Repository),
    Updated {
        /// The row as it was before the write.
        previous: Repository,
        current: Repository,
    },
}

impl UpsertOutcome {
    /// The row as stored after the write.
    pub fn current(&self) -> &Repository {
        match self {
            Self::Created(repo) => repo,
            Self::Updated { current, .. } => current,
        }
    }

    /// What a single-repository refresh hands back: the new row when it was
    /// created, the pre-update row when an existing one was overwritten.
    pub fn into_refresh_result(self) -> Repository {
        match self {
            Self::Created(repo) => repo,
            Self::Updated { previous, .. } => previous,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Write `remote` as owned by `owner`, given the result of a prior lookup.
pub async fn apply(
    store: &dyn RepoStore,
    existing: Option<Repository>,
    owner: &str,
    remote: &RemoteRepository,
) -> Result<UpsertOutcome, StoreError> {
    match existing {
        Some(previous) => {
            let current = Repository::from_remote(previous.id, owner, remote);
            store.update_repository(&current).await?;
            Ok(UpsertOutcome::Updated { previous, current })
        }
        None => {
            let created = Repository::from_remote(Uuid::new_v4(), owner, remote);
            store.create_repository(&created).await?;
            Ok(UpsertOutcome::Created(created))
        }
    }
}

/// Look up `(owner, remote.name)` and [`apply`].
pub async fn upsert(store: &dyn RepoStore, owner: &str, remote: &RemoteRepository) -> Result<UpsertOutcome, StoreError> {
    let existing = store.find_repository(owner, &remote.name).await?;
    apply(store, existing, owner, remote).await
}
