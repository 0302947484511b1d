use crate::connection::LdapConnection;
use crate::error::CoreError;
use tracing::info;

impl LdapConnection {
    /// Perform a simple bind with the given DN and password.
    pub async fn simple_bind(&mut self, bind_dn: &str, password: &str) -> Result<(), CoreError> {
        let result = self
            .ldap
            .simple_bind(bind_dn, password)
            .await
            .map_err(CoreError::Ldap)?;

        if result.rc != 0 {
            return Err(CoreError::BindFailed(format!(
                "bind as {} to {} returned rc={}: {}",
                bind_dn, self.url, result.rc, result.text
            )));
        }

        info!("Bound as {} to {}", bind_dn, self.url);
        Ok(())
    }
}
