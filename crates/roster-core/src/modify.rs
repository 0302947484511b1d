use ldap3::Mod;
use tracing::{debug, info};

use crate::connection::LdapConnection;
use crate::directory::ModifyOutcome;
use crate::error::CoreError;

/// `attributeOrValueExists`: the value being added is already there.
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;

impl LdapConnection {
    /// Apply modifications to an entry.
    pub async fn modify_entry(
        &mut self,
        dn: &str,
        mods: Vec<Mod<String>>,
    ) -> Result<ModifyOutcome, CoreError> {
        debug!("modify_entry dn={}", dn);
        for m in &mods {
            match m {
                Mod::Add(attr, vals) => debug!("  mod ADD attr={} vals={:?}", attr, vals),
                Mod::Delete(attr, vals) => debug!("  mod DELETE attr={} vals={:?}", attr, vals),
                Mod::Replace(attr, vals) => debug!("  mod REPLACE attr={} vals={:?}", attr, vals),
                Mod::Increment(attr, val) => debug!("  mod INCREMENT attr={} val={:?}", attr, val),
            }
        }

        let result = self.ldap.modify(dn, mods).await.map_err(CoreError::Ldap)?;
        debug!("modify_entry result rc={} text={}", result.rc, result.text);

        match result.rc {
            0 => {
                info!("Modified entry: {}", dn);
                Ok(ModifyOutcome::Applied)
            }
            RC_ATTRIBUTE_OR_VALUE_EXISTS => {
                info!("Entry {} already holds the value", dn);
                Ok(ModifyOutcome::AlreadyPresent)
            }
            rc => Err(CoreError::ModifyFailed(format!(
                "Modify {} failed rc={}: {}",
                dn, rc, result.text
            ))),
        }
    }
}
