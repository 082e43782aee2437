// opskit Clients - Thin wrappers around the operational backends
//
// REST backends (Elasticsearch, Gerrit, Jenkins, Jira) share `RestClient`;
// CLI backends (Karaf, OpenShift, Git) share `execute_command`.
// Every client verifies its backend when constructed.

pub mod common;
pub mod elastic;
pub mod gerrit;
pub mod git;
pub mod jenkins;
pub mod jira;
pub mod karaf;
pub mod openshift;

pub use common::{execute_command, CommandOutput, RestClient};
pub use elastic::ElasticClient;
pub use gerrit::GerritClient;
pub use git::GitRepo;
pub use jenkins::JenkinsClient;
pub use jira::JiraClient;
pub use karaf::KarafClient;
pub use openshift::OpenShiftClient;
