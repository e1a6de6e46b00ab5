//! Catalog Commands

use anyhow::Result;
use clap::Subcommand;
use provisioner_common::Datacenter;
use provisioner_provider::{HardwareProfile, Image};
use serde::Serialize;

use super::Session;
use crate::output::{or_dash, print_list, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List orderable hardware profiles
    Profiles,

    /// List operating system images
    Images,

    /// List datacenters
    Locations,
}

#[derive(Serialize)]
pub struct ProfileDisplay {
    pub id: String,
    pub description: String,
}

impl From<HardwareProfile> for ProfileDisplay {
    fn from(profile: HardwareProfile) -> Self {
        Self {
            description: profile.to_string(),
            id: profile.id,
        }
    }
}

impl TableDisplay for ProfileDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.description.clone()]
    }
}

impl TableDisplay for Image {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.description.clone()]
    }
}

#[derive(Serialize)]
pub struct LocationDisplay {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

impl From<Datacenter> for LocationDisplay {
    fn from(dc: Datacenter) -> Self {
        Self {
            id: dc.id,
            name: dc.name,
            description: dc.long_name,
        }
    }
}

impl TableDisplay for LocationDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            or_dash(self.description.as_deref()),
        ]
    }
}

pub async fn execute(cmd: CatalogCommands, session: &Session, format: OutputFormat) -> Result<()> {
    let provisioner = &session.provisioner;

    match cmd {
        CatalogCommands::Profiles => {
            let profiles: Vec<ProfileDisplay> = provisioner
                .list_hardware_profiles()
                .await?
                .into_iter()
                .map(ProfileDisplay::from)
                .collect();
            print_list(&profiles, format);
        }

        CatalogCommands::Images => {
            print_list(&provisioner.list_images().await?, format);
        }

        CatalogCommands::Locations => {
            let locations: Vec<LocationDisplay> = provisioner
                .list_locations()
                .await?
                .into_iter()
                .map(LocationDisplay::from)
                .collect();
            print_list(&locations, format);
        }
    }

    Ok(())
}
