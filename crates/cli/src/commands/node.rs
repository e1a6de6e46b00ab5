//! Node Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use provisioner_common::ResourceId;
use provisioner_provider::{CreateRequest, NodeAndCredentials, NodeMetadata};
use serde::Serialize;

use super::Session;
use crate::output::{or_dash, print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Order a node and wait until it can be logged into
    Create {
        /// Hostname of the new node
        #[arg(long)]
        hostname: String,

        /// Domain, defaults to the configured one
        #[arg(long)]
        domain: Option<String>,

        /// Datacenter name (see `locations`)
        #[arg(short, long)]
        location: String,

        /// Image id (see `images`)
        #[arg(short, long)]
        image: String,

        /// Hardware profile id (see `profiles`)
        #[arg(short, long)]
        profile: String,
    },

    /// Cancel a node and wait for it to be reclaimed
    Destroy {
        /// Node ID
        id: ResourceId,
    },

    /// List billable nodes
    List,

    /// Get node details
    Get {
        /// Node ID
        id: ResourceId,
    },

    /// Reboot a node
    Reboot {
        /// Node ID
        id: ResourceId,
    },

    /// Suspend a node
    Suspend {
        /// Node ID
        id: ResourceId,
    },

    /// Resume a suspended node
    Resume {
        /// Node ID
        id: ResourceId,
    },
}

/// Node display wrapper for serialization
#[derive(Serialize)]
pub struct NodeDisplay {
    #[serde(flatten)]
    pub node: NodeMetadata,
}

impl TableDisplay for NodeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Hostname", "Group", "Status", "Public IP", "Private IP", "Location"]
    }

    fn row(&self) -> Vec<String> {
        let node = &self.node;
        vec![
            node.id.to_string(),
            node.hostname.clone(),
            or_dash(node.group.as_deref()),
            node.status.to_string(),
            node.public_addresses.join(", "),
            node.private_addresses.join(", "),
            or_dash(node.location.as_deref()),
        ]
    }
}

/// New node with its initial login
#[derive(Serialize)]
pub struct CreatedDisplay {
    pub id: String,
    pub fqdn: String,
    pub public_ip: Option<String>,
    pub user: String,
    pub password: String,
}

impl From<&NodeAndCredentials> for CreatedDisplay {
    fn from(created: &NodeAndCredentials) -> Self {
        Self {
            id: created.node_id.clone(),
            fqdn: created.resource.fqdn(),
            public_ip: created.resource.primary_ip.clone(),
            user: created.credentials.user.clone(),
            password: created.credentials.password.clone(),
        }
    }
}

impl TableDisplay for CreatedDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "FQDN", "Public IP", "User", "Password"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.fqdn.clone(),
            or_dash(self.public_ip.as_deref()),
            self.user.clone(),
            self.password.clone(),
        ]
    }
}

pub async fn execute(cmd: NodeCommands, session: &Session, format: OutputFormat) -> Result<()> {
    let provisioner = &session.provisioner;

    match cmd {
        NodeCommands::Create {
            hostname,
            domain,
            location,
            image,
            profile,
        } => {
            let request = CreateRequest {
                hostname,
                domain,
                location,
                image_id: image,
                hardware_id: profile,
            };
            let created = provisioner.create_node(&request).await?;
            print_success(&format!("Node '{}' is ready", created.resource.hostname), format);
            print_item(&CreatedDisplay::from(&created), format);
        }

        NodeCommands::Destroy { id } => {
            provisioner.destroy_node(id).await?;
            print_success(&format!("Node {} destroyed", id), format);
        }

        NodeCommands::List => {
            let displays: Vec<NodeDisplay> = provisioner
                .list_nodes()
                .await?
                .iter()
                .map(|resource| NodeDisplay {
                    node: provisioner.node_metadata(resource),
                })
                .collect();
            print_list(&displays, format);
        }

        NodeCommands::Get { id } => {
            let Some(resource) = provisioner.get_node(id).await? else {
                bail!("node {} not found", id);
            };
            let display = NodeDisplay {
                node: provisioner.node_metadata(&resource),
            };
            print_item(&display, format);
        }

        NodeCommands::Reboot { id } => {
            provisioner.reboot_node(id).await?;
            print_success(&format!("Node {} rebooted", id), format);
        }

        NodeCommands::Suspend { id } => {
            provisioner.suspend_node(id).await?;
            print_success(&format!("Node {} suspended", id), format);
        }

        NodeCommands::Resume { id } => {
            provisioner.resume_node(id).await?;
            print_success(&format!("Node {} resumed", id), format);
        }
    }

    Ok(())
}
