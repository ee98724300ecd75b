//! Named table of stores and process-wide helpers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;
use uuid::Uuid;

use crate::config::UfsConfig;
use crate::mime;
use crate::permissions::CallerContext;
use crate::record::{FileId, FileRecord};
use crate::store::{Store, copy_file};
use crate::tokens::{AccessToken, TokenConstraints, Tokens};
use crate::{Error, Result, TRACING_TARGET_REGISTRY};

/// Collects stores during startup.
///
/// Registration fails loudly on duplicate names. Once [`build`] is called
/// the table is frozen.
///
/// [`build`]: RegistryBuilder::build
pub struct RegistryBuilder {
    config: UfsConfig,
    stores: HashMap<String, Arc<dyn Store>>,
    order: Vec<String>,
}

impl RegistryBuilder {
    /// Starts a registry with the given configuration.
    pub fn new(config: UfsConfig) -> Self {
        Self {
            config,
            stores: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers a store under its own name.
    pub fn register_store(self, store: impl Store) -> Result<Self> {
        self.register_shared(Arc::new(store))
    }

    /// Registers an already shared store.
    pub fn register_shared(mut self, store: Arc<dyn Store>) -> Result<Self> {
        let name = store.name().to_owned();
        if self.stores.contains_key(&name) {
            return Err(Error::conflict()
                .with_operation("register_store")
                .with_store(name)
                .with_message("store name is already registered"));
        }

        tracing::info!(
            target: TRACING_TARGET_REGISTRY,
            store = %name,
            backend = store.kind(),
            "Store registered"
        );

        self.order.push(name.clone());
        self.stores.insert(name, store);
        Ok(self)
    }

    /// Freezes the table.
    pub fn build(self) -> Registry {
        let tokens = Tokens::new(self.config.token_ttl());
        Registry {
            inner: Arc::new(RegistryInner {
                config: self.config,
                stores: self.stores,
                order: self.order,
                tokens,
            }),
        }
    }
}

struct RegistryInner {
    config: UfsConfig,
    stores: HashMap<String, Arc<dyn Store>>,
    order: Vec<String>,
    tokens: Tokens,
}

/// Process-wide table of named stores.
///
/// Cheap to clone; lookups take no locks.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Starts building a registry.
    pub fn builder(config: UfsConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    /// Returns the store registered as `name`.
    pub fn get_store(&self, name: &str) -> Option<Arc<dyn Store>> {
        self.inner.stores.get(name).cloned()
    }

    /// Returns the store registered as `name`, or a not found error.
    pub fn store(&self, name: &str) -> Result<Arc<dyn Store>> {
        self.get_store(name).ok_or_else(|| {
            Error::not_found()
                .with_store(name)
                .with_message("store is not registered")
        })
    }

    /// Returns all stores in registration order.
    pub fn stores(&self) -> impl Iterator<Item = &Arc<dyn Store>> + '_ {
        self.inner
            .order
            .iter()
            .filter_map(|name| self.inner.stores.get(name))
    }

    /// Returns the registered store names in registration order.
    pub fn store_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.order.iter().map(String::as_str)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UfsConfig {
        &self.inner.config
    }

    /// Returns the token table.
    pub fn tokens(&self) -> &Tokens {
        &self.inner.tokens
    }

    /// Generates a new file identifier.
    pub fn generate_id(&self) -> FileId {
        FileId::generate()
    }

    /// Generates a random ETag for callers that have no content fingerprint.
    pub fn generate_etag(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Resolves the content type registered for `extension`.
    pub fn resolve_mime_type(&self, extension: &str) -> Option<&'static str> {
        mime::lookup(extension)
    }

    /// Returns the full extension to content type table.
    pub fn mime_types(&self) -> &'static [(&'static str, &'static str)] {
        mime::mime_types()
    }

    /// Returns the staging path for `file_id`.
    pub fn temp_path(&self, file_id: &FileId) -> PathBuf {
        self.inner.config.temp_path(file_id)
    }

    /// Builds the streaming URL of a file:
    /// `{base_url}/{stores_path}/{store}/{id}.{ext}[?token=...]`.
    pub fn file_url(&self, record: &FileRecord, token: Option<&AccessToken>) -> Result<Url> {
        let base = self.inner.config.base_url().ok_or_else(|| {
            Error::validation()
                .with_operation("file_url")
                .with_message("base url is not configured")
        })?;

        let mut url = Url::parse(base).map_err(|e| {
            Error::validation()
                .with_operation("file_url")
                .with_message("base url is invalid")
                .with_source(e)
        })?;

        url.path_segments_mut()
            .map_err(|()| {
                Error::validation()
                    .with_operation("file_url")
                    .with_message("base url cannot have a path")
            })?
            .pop_if_empty()
            .extend(self.inner.config.stores_path().split('/').filter(|s| !s.is_empty()))
            .push(&record.store)
            .push(&record.file_name());

        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", &token.token);
        }

        Ok(url)
    }

    /// Issues an access token for a completed file of `store`.
    pub async fn issue_token(
        &self,
        store: &str,
        file_id: &FileId,
        constraints: TokenConstraints,
    ) -> Result<AccessToken> {
        let record = self.store(store)?.get_file(file_id).await?;
        Ok(self.inner.tokens.issue(&record.id, constraints).await)
    }

    /// Resolves a token presented for `store` into the file it grants.
    ///
    /// Invalid, expired or consumed tokens yield a permission error.
    pub async fn resolve_token(&self, store: &str, token: &str) -> Result<FileRecord> {
        let store = self.store(store)?;
        let file_id = self.inner.tokens.validate(token).await.ok_or_else(|| {
            Error::permission()
                .with_operation("resolve_token")
                .with_store(store.name())
                .with_message("access token is invalid")
        })?;
        store.get_file(&file_id).await
    }

    /// Copies a completed file from one store into another.
    pub async fn copy(
        &self,
        caller: &CallerContext,
        source: &str,
        file_id: &FileId,
        destination: &str,
    ) -> Result<FileRecord> {
        let source = self.store(source)?;
        let destination = self.store(destination)?;
        copy_file(caller, source.as_ref(), file_id, destination.as_ref()).await
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.inner.config)
            .field("stores", &self.inner.order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::mock::MemoryBackend;
    use crate::record::NewFile;
    use crate::store::UploadStore;

    fn registry() -> Registry {
        RegistryBuilder::new(UfsConfig::new().with_base_url("https://chat.example.com/"))
            .register_store(UploadStore::new("avatars", MemoryBackend::new()))
            .unwrap()
            .register_store(UploadStore::new("uploads", MemoryBackend::new()))
            .unwrap()
            .build()
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let result = RegistryBuilder::new(UfsConfig::default())
            .register_store(UploadStore::new("avatars", MemoryBackend::new()))
            .unwrap()
            .register_store(UploadStore::new("avatars", MemoryBackend::new()));

        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.store(), Some("avatars"));
    }

    #[test]
    fn lookups() {
        let registry = registry();
        assert!(registry.get_store("avatars").is_some());
        assert!(registry.get_store("missing").is_none());
        assert_eq!(registry.store("missing").err().unwrap().kind(), ErrorKind::NotFound);
        assert_eq!(registry.store_names().collect::<Vec<_>>(), ["avatars", "uploads"]);
        assert_eq!(registry.stores().count(), 2);
    }

    #[test]
    fn helpers() {
        let registry = registry();
        assert_ne!(registry.generate_id(), registry.generate_id());
        assert_ne!(registry.generate_etag(), registry.generate_etag());
        assert_eq!(registry.resolve_mime_type("JPG"), Some("image/jpeg"));
        assert!(!registry.mime_types().is_empty());

        let id = FileId::new("abc").unwrap();
        assert!(registry.temp_path(&id).ends_with("ufs/abc"));
    }

    #[tokio::test]
    async fn file_url_with_token() {
        let registry = registry();
        let caller = CallerContext::user("u1");
        let store = registry.store("uploads").unwrap();
        let record = store
            .create(&caller, NewFile::new("report.pdf", "application/pdf", 3))
            .await
            .unwrap();
        let mut writer = store.get_write_stream(&caller, &record.id).await.unwrap();
        writer.write(&b"pdf"[..]).await.unwrap();
        let record = writer.finalize().await.unwrap();

        let url = registry.file_url(&record, None).unwrap();
        assert_eq!(
            url.as_str(),
            format!("https://chat.example.com/ufs/uploads/{}.pdf", record.id)
        );

        let token = registry
            .issue_token("uploads", &record.id, TokenConstraints::single_use())
            .await
            .unwrap();
        let url = registry.file_url(&record, Some(&token)).unwrap();
        assert_eq!(url.query(), Some(format!("token={}", token.token).as_str()));

        let resolved = registry.resolve_token("uploads", &token.token).await.unwrap();
        assert_eq!(resolved.id, record.id);
        let err = registry
            .resolve_token("uploads", &token.token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn token_for_incomplete_file_is_refused() {
        let registry = registry();
        let store = registry.store("uploads").unwrap();
        let record = store
            .create(&CallerContext::anonymous(), NewFile::new("a.txt", "text/plain", 1))
            .await
            .unwrap();

        let err = registry
            .issue_token("uploads", &record.id, TokenConstraints::reusable())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn file_url_requires_base_url() {
        let registry = RegistryBuilder::new(UfsConfig::default()).build();
        let record = FileRecord::pending(
            FileId::generate(),
            &NewFile::new("a.txt", "text/plain", 1),
            "docs",
            None,
        );
        assert_eq!(
            registry.file_url(&record, None).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }
}
