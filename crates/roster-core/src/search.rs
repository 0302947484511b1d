use ldap3::adapters::PagedResults;
use ldap3::{Scope, SearchEntry};
use tracing::debug;

use crate::connection::LdapConnection;
use crate::entry::DirectoryEntry;
use crate::error::CoreError;

impl LdapConnection {
    /// Run a paged search and collect every returned entry.
    /// Referrals and intermediate messages are dropped.
    pub async fn search_entries(
        &mut self,
        base_dn: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>, CoreError> {
        debug!(
            "search base={} scope={:?} filter={} attrs={:?}",
            base_dn, scope, filter, attrs
        );

        let adapter: PagedResults<String, Vec<String>> = PagedResults::new(self.page_size);
        let mut stream = self
            .ldap
            .streaming_search_with(adapter, base_dn, scope, filter, attrs)
            .await
            .map_err(CoreError::Ldap)?;

        let mut entries = Vec::new();
        while let Some(entry) = stream.next().await.map_err(CoreError::Ldap)? {
            if entry.is_ref() || entry.is_intermediate() {
                continue;
            }
            entries.push(DirectoryEntry::from_search_entry(SearchEntry::construct(entry)));
        }

        let result = stream.finish().await;
        result
            .success()
            .map_err(|e| CoreError::SearchFailed(format!("{} under {}: {}", filter, base_dn, e)))?;

        debug!("search under {} returned {} entries", base_dn, entries.len());
        Ok(entries)
    }
}
