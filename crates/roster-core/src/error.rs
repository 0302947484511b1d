use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid search input {token:?}: {reason}")]
    InvalidFilterInput { token: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("search failed: {0}")]
    SearchFailed(String),

    #[error("modify failed: {0}")]
    ModifyFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("import error: {0}")]
    Import(String),

    #[error("ldap error: {0}")]
    Ldap(#[from] ldap3::LdapError),
}

/// Caller-facing classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Directory,
    Config,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::InvalidFilterInput { .. } => {
                ErrorKind::Validation
            }
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Config(_) | CoreError::Import(_) => ErrorKind::Config,
            CoreError::ConnectionFailed(_)
            | CoreError::BindFailed(_)
            | CoreError::SearchFailed(_)
            | CoreError::ModifyFailed(_)
            | CoreError::Ldap(_) => ErrorKind::Directory,
        }
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            CoreError::Validation("missing".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CoreError::InvalidFilterInput {
                token: "a(b".into(),
                reason: "parenthesis".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(CoreError::NotFound("eng".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::BindFailed("rc=49".into()).kind(),
            ErrorKind::Directory
        );
        assert_eq!(CoreError::Config("bad".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_message_preserved() {
        let err = CoreError::ModifyFailed("Modify cn=eng failed rc=50: denied".into());
        assert_eq!(
            err.to_string(),
            "modify failed: Modify cn=eng failed rc=50: denied"
        );
        assert_eq!(err.kind().to_string(), "Directory");
    }
}
