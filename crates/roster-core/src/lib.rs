pub mod attributes;
pub mod auth;
pub mod compile;
pub mod config;
pub mod connection;
pub mod directory;
pub mod dn;
pub mod entry;
pub mod error;
pub mod filter;
pub mod ldif;
pub mod matcher;
pub mod modify;
pub mod normalize;
pub mod offline;
pub mod query;
pub mod record;
pub mod search;
pub mod service;

pub use attributes::{AttributeMap, LogicalField};
pub use config::RosterConfig;
pub use connection::LdapDirectory;
pub use directory::{Directory, DirectorySession, ModifyOutcome};
pub use error::{CoreError, ErrorKind};
pub use offline::OfflineDirectory;
pub use query::ParsedQuery;
pub use record::{GroupRecord, MembershipReceipt, UserRecord};
pub use service::Roster;
