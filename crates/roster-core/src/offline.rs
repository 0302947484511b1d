use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ldap3::{Mod, Scope};
use tracing::debug;

use crate::directory::{Directory, DirectorySession, ModifyOutcome};
use crate::dn;
use crate::entry::DirectoryEntry;
use crate::error::CoreError;
use crate::filter::Filter;
use crate::ldif;

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    searches: AtomicUsize,
    modifies: AtomicUsize,
}

/// An in-memory directory seeded from LDIF.
///
/// Filters are evaluated locally and add-modifications are applied to the
/// in-memory entries. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct OfflineDirectory {
    entries: Arc<Mutex<Vec<DirectoryEntry>>>,
    counters: Arc<Counters>,
}

impl OfflineDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            counters: Arc::default(),
        }
    }

    pub fn from_ldif(content: &str) -> Result<Self, CoreError> {
        Ok(Self::new(ldif::parse(content)?))
    }

    pub fn from_ldif_file(path: &Path) -> Result<Self, CoreError> {
        Ok(Self::new(ldif::read(path)?))
    }

    /// Look up an entry by exact DN (case-insensitive).
    pub fn entry(&self, dn: &str) -> Option<DirectoryEntry> {
        self.lock()
            .iter()
            .find(|e| e.dn.eq_ignore_ascii_case(dn))
            .cloned()
    }

    /// Number of sessions opened so far.
    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> usize {
        self.counters.searches.load(Ordering::SeqCst)
    }

    pub fn modify_count(&self) -> usize {
        self.counters.modifies.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DirectoryEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Directory for OfflineDirectory {
    type Session = OfflineSession;

    async fn connect(&self) -> Result<OfflineSession, CoreError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(OfflineSession {
            directory: self.clone(),
            open: true,
        })
    }
}

/// A session on an [`OfflineDirectory`].
#[derive(Debug)]
pub struct OfflineSession {
    directory: OfflineDirectory,
    open: bool,
}

impl OfflineSession {
    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.open {
            Ok(())
        } else {
            Err(CoreError::ConnectionFailed("session already closed".to_string()))
        }
    }
}

fn in_scope(entry_dn: &str, base_dn: &str, scope: Scope) -> bool {
    match scope {
        Scope::Base => entry_dn.eq_ignore_ascii_case(base_dn),
        Scope::OneLevel => dn::rdn(entry_dn).len() < entry_dn.len()
            && entry_dn[dn::rdn(entry_dn).len() + 1..].eq_ignore_ascii_case(base_dn),
        Scope::Subtree => dn::is_within(entry_dn, base_dn),
    }
}

/// Keep only the requested attributes; `*` or an empty list keeps all.
fn project(entry: &DirectoryEntry, attrs: &[String]) -> DirectoryEntry {
    if attrs.is_empty() || attrs.iter().any(|a| a == "*") {
        return entry.clone();
    }
    let attributes = entry
        .attributes
        .iter()
        .filter(|(name, _)| attrs.iter().any(|a| a.eq_ignore_ascii_case(name)))
        .map(|(name, vals)| (name.clone(), vals.clone()))
        .collect();
    DirectoryEntry::new(entry.dn.clone(), attributes)
}

#[async_trait]
impl DirectorySession for OfflineSession {
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &Filter,
        scope: Scope,
        attrs: &[String],
    ) -> Result<Vec<DirectoryEntry>, CoreError> {
        self.ensure_open()?;
        self.directory.counters.searches.fetch_add(1, Ordering::SeqCst);
        debug!("offline search base={} filter={}", base_dn, filter);

        let entries = self.directory.lock();
        Ok(entries
            .iter()
            .filter(|e| in_scope(&e.dn, base_dn, scope) && filter.matches(e))
            .map(|e| project(e, attrs))
            .collect())
    }

    async fn modify(
        &mut self,
        dn: &str,
        mods: Vec<Mod<String>>,
    ) -> Result<ModifyOutcome, CoreError> {
        self.ensure_open()?;
        self.directory.counters.modifies.fetch_add(1, Ordering::SeqCst);

        let mut entries = self.directory.lock();
        let entry = entries
            .iter_mut()
            .find(|e| e.dn.eq_ignore_ascii_case(dn))
            .ok_or_else(|| CoreError::ModifyFailed(format!("Modify {} failed rc=32: no such object", dn)))?;

        let mut outcome = ModifyOutcome::Applied;
        for m in mods {
            match m {
                Mod::Add(attr, vals) => {
                    let key = entry
                        .attributes
                        .keys()
                        .find(|k| k.eq_ignore_ascii_case(&attr))
                        .cloned()
                        .unwrap_or(attr);
                    let existing = entry.attributes.entry(key).or_default();
                    if vals.iter().any(|v| existing.contains(v)) {
                        outcome = ModifyOutcome::AlreadyPresent;
                        continue;
                    }
                    let mut vals: Vec<String> = vals.into_iter().collect();
                    vals.sort();
                    existing.extend(vals);
                }
                other => {
                    return Err(CoreError::ModifyFailed(format!(
                        "Modify {} failed rc=53: offline directory only supports add, got {:?}",
                        dn, other
                    )))
                }
            }
        }
        Ok(outcome)
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const LDIF: &str = "\
dn: dc=example,dc=com
objectClass: domain

dn: ou=people,dc=example,dc=com
objectClass: organizationalUnit

dn: uid=jdoe,ou=people,dc=example,dc=com
objectClass: person
uid: jdoe
cn: John Doe
mail: jdoe@example.com

dn: cn=eng,dc=example,dc=com
objectClass: posixGroup
cn: eng
memberUid: asmith
";

    #[tokio::test]
    async fn test_search_scopes() {
        let dir = OfflineDirectory::from_ldif(LDIF).unwrap();
        let mut session = dir.connect().await.unwrap();
        let all = Filter::present("objectClass");

        let sub = session
            .search("ou=people,dc=example,dc=com", &all, Scope::Subtree, &[])
            .await
            .unwrap();
        assert_eq!(sub.len(), 2);

        let one = session
            .search("dc=example,dc=com", &all, Scope::OneLevel, &[])
            .await
            .unwrap();
        let dns: Vec<_> = one.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(dns, vec!["ou=people,dc=example,dc=com", "cn=eng,dc=example,dc=com"]);

        let base = session
            .search("DC=EXAMPLE,DC=COM", &all, Scope::Base, &[])
            .await
            .unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(dir.search_count(), 3);
    }

    #[tokio::test]
    async fn test_search_projects_attributes() {
        let dir = OfflineDirectory::from_ldif(LDIF).unwrap();
        let mut session = dir.connect().await.unwrap();
        let found = session
            .search(
                "dc=example,dc=com",
                &Filter::contains("cn", "john"),
                Scope::Subtree,
                &["mail".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_value("mail"), Some("jdoe@example.com"));
        assert!(!found[0].has_attribute("cn"));
    }

    #[tokio::test]
    async fn test_modify_add_and_already_present() {
        let dir = OfflineDirectory::from_ldif(LDIF).unwrap();
        let mut session = dir.connect().await.unwrap();
        let dn = "cn=eng,dc=example,dc=com";

        let add = |v: &str| vec![Mod::Add("memberUid".to_string(), HashSet::from([v.to_string()]))];
        assert_eq!(session.modify(dn, add("jdoe")).await.unwrap(), ModifyOutcome::Applied);
        assert_eq!(
            session.modify(dn, add("jdoe")).await.unwrap(),
            ModifyOutcome::AlreadyPresent
        );
        assert_eq!(
            dir.entry(dn).unwrap().values("memberUid").unwrap(),
            &["asmith".to_string(), "jdoe".to_string()][..]
        );
        assert_eq!(dir.modify_count(), 2);
    }

    #[tokio::test]
    async fn test_modify_add_matches_attribute_case_insensitively() {
        let dir = OfflineDirectory::from_ldif(
            "dn: cn=ops,dc=example,dc=com\nobjectClass: posixGroup\ncn: ops\nmemberuid: jdoe\n",
        )
        .unwrap();
        let mut session = dir.connect().await.unwrap();
        let dn = "cn=ops,dc=example,dc=com";

        let add = |v: &str| vec![Mod::Add("memberUid".to_string(), HashSet::from([v.to_string()]))];
        assert_eq!(
            session.modify(dn, add("jdoe")).await.unwrap(),
            ModifyOutcome::AlreadyPresent
        );
        assert_eq!(session.modify(dn, add("asmith")).await.unwrap(), ModifyOutcome::Applied);

        let entry = dir.entry(dn).unwrap();
        assert_eq!(
            entry.attributes.get("memberuid").unwrap(),
            &vec!["jdoe".to_string(), "asmith".to_string()]
        );
        assert!(!entry.attributes.contains_key("memberUid"));
    }

    #[tokio::test]
    async fn test_modify_missing_entry() {
        let dir = OfflineDirectory::from_ldif(LDIF).unwrap();
        let mut session = dir.connect().await.unwrap();
        let err = session
            .modify("cn=nope,dc=example,dc=com", vec![])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rc=32"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_work() {
        let dir = OfflineDirectory::from_ldif(LDIF).unwrap();
        let mut session = dir.connect().await.unwrap();
        session.close().await.unwrap();
        assert!(session
            .search("dc=example,dc=com", &Filter::present("cn"), Scope::Subtree, &[])
            .await
            .is_err());
        assert_eq!(dir.connect_count(), 1);
    }
}
