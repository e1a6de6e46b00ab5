//! Hardware profiles, images and order pricing
//!
//! Orderable profiles are the cartesian product of catalog items by role.
//! Bare-metal packages combine a compute/memory unit, a primary disk and an
//! uplink; virtual-guest packages combine cores, memory and a guest disk. A
//! profile id is the comma-joined first price ids of its items and is parsed
//! back into price lines when ordering.

use std::collections::HashSet;
use std::fmt;

use provisioner_common::{Error, ItemPrice, ProductItem, ProductPackage, ResourceKind, Result};
use serde::Serialize;

pub const CATEGORY_COMPUTE: &str = "server_core";
pub const CATEGORY_DISK: &str = "disk0";
pub const CATEGORY_UPLINK: &str = "port_speed";
pub const CATEGORY_GUEST_CORES: &str = "guest_core";
pub const CATEGORY_RAM: &str = "ram";
pub const CATEGORY_GUEST_DISK: &str = "guest_disk0";
pub const CATEGORY_OS: &str = "os";

/// Item categories combined into a profile, in hardware id order
pub fn profile_categories(kind: ResourceKind) -> [&'static str; 3] {
    match kind {
        ResourceKind::BareMetal => [CATEGORY_COMPUTE, CATEGORY_DISK, CATEGORY_UPLINK],
        ResourceKind::VirtualGuest => [CATEGORY_GUEST_CORES, CATEGORY_RAM, CATEGORY_GUEST_DISK],
    }
}

/// One orderable combination of catalog items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareProfile {
    pub id: String,
    /// One item per role, see [`profile_categories`]
    pub items: Vec<ProductItem>,
}

impl fmt::Display for HardwareProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptions: Vec<&str> = self.items.iter().map(|i| i.description.as_str()).collect();
        write!(f, "{}", descriptions.join(" / "))
    }
}

/// Operating system image offered by the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    /// First price id of the backing catalog item
    pub id: String,
    pub item_id: u64,
    pub description: String,
}

impl Image {
    fn from_item(item: &ProductItem) -> Option<Self> {
        let price = item.first_price()?;
        Some(Self {
            id: price.id.to_string(),
            item_id: item.id,
            description: item.description.clone(),
        })
    }
}

fn matches_speed(item: &ProductItem, port_speed: Option<u32>) -> bool {
    match port_speed {
        Some(speed) => item.capacity == Some(f64::from(speed)),
        None => true,
    }
}

/// Every orderable profile in the package for the given kind.
///
/// `port_speed` restricts bare-metal uplinks to items of that capacity;
/// `None` offers all of them. Items without a price cannot be ordered and
/// are skipped.
pub fn hardware_profiles(
    package: &ProductPackage,
    kind: ResourceKind,
    port_speed: Option<u32>,
) -> Vec<HardwareProfile> {
    let [first, second, third] = profile_categories(kind).map(|category| {
        package
            .items_in(category)
            .filter(|item| item.first_price().is_some())
            .filter(|item| category != CATEGORY_UPLINK || matches_speed(item, port_speed))
            .collect::<Vec<_>>()
    });

    let mut profiles = Vec::new();
    for a in &first {
        for b in &second {
            for c in &third {
                if let Some(id) = hardware_id(&[*a, *b, *c]) {
                    profiles.push(HardwareProfile {
                        id,
                        items: vec![(*a).clone(), (*b).clone(), (*c).clone()],
                    });
                }
            }
        }
    }
    profiles
}

/// Uplink price ordered alongside a virtual guest, picked by port speed
pub fn uplink_price(package: &ProductPackage, port_speed: Option<u32>) -> Option<ItemPrice> {
    package
        .items_in(CATEGORY_UPLINK)
        .filter(|item| matches_speed(item, port_speed))
        .find_map(ProductItem::first_price)
}

/// Comma-joined first price ids, `None` if any item has no price
pub fn hardware_id(items: &[&ProductItem]) -> Option<String> {
    let ids = items
        .iter()
        .map(|item| item.first_price().map(|p| p.id.to_string()))
        .collect::<Option<Vec<_>>>()?;
    Some(ids.join(","))
}

pub fn parse_hardware_id(id: &str) -> Result<Vec<ItemPrice>> {
    if id.trim().is_empty() {
        return Err(Error::InvalidProfile("empty hardware id".to_string()));
    }
    id.split(',')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map(|id| ItemPrice { id })
                .map_err(|_| Error::InvalidProfile(format!("'{}' is not a price id in '{}'", part, id)))
        })
        .collect()
}

pub fn images(package: &ProductPackage) -> Vec<Image> {
    package.items_in(CATEGORY_OS).filter_map(Image::from_item).collect()
}

pub fn find_image(package: &ProductPackage, id: &str) -> Option<Image> {
    images(package).into_iter().find(|image| image.id == id)
}

/// Price lines for an order: image, hardware, the optional uplink, then the
/// baseline set. First occurrence wins.
pub fn order_prices(
    image_id: &str,
    hardware_id: &str,
    uplink: Option<ItemPrice>,
    baseline: &[u64],
) -> Result<Vec<ItemPrice>> {
    let image = image_id
        .trim()
        .parse::<u64>()
        .map(|id| ItemPrice { id })
        .map_err(|_| Error::InvalidProfile(format!("'{}' is not an image price id", image_id)))?;

    let candidates = std::iter::once(image)
        .chain(parse_hardware_id(hardware_id)?)
        .chain(uplink)
        .chain(baseline.iter().map(|&id| ItemPrice { id }));

    let mut seen = HashSet::new();
    Ok(candidates.filter(|price| seen.insert(price.id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::demo_catalog;

    #[test]
    fn test_bare_metal_profiles_are_cartesian_product() {
        let package = demo_catalog(ResourceKind::BareMetal);

        // 2 compute x 2 disks x 3 uplinks
        assert_eq!(hardware_profiles(&package, ResourceKind::BareMetal, None).len(), 12);

        let profiles = hardware_profiles(&package, ResourceKind::BareMetal, Some(10));
        assert_eq!(profiles.len(), 4);
        assert!(profiles.iter().all(|p| p.items[2].capacity == Some(10.0)));
        assert_eq!(profiles[0].id, "1921,1267,272");
    }

    #[test]
    fn test_virtual_guest_profiles_use_guest_categories() {
        let package = demo_catalog(ResourceKind::VirtualGuest);

        // 2 core counts x 2 memory sizes x 2 guest disks; port speed only
        // selects the uplink price
        let profiles = hardware_profiles(&package, ResourceKind::VirtualGuest, Some(10));
        assert_eq!(profiles.len(), 8);
        assert_eq!(profiles[0].id, "1640,1644,2202");
        assert!(profiles[0].items[0].has_category(CATEGORY_GUEST_CORES));
        assert!(profiles[0].items[1].has_category(CATEGORY_RAM));
        assert!(profiles[0].items[2].has_category(CATEGORY_GUEST_DISK));

        // guest items never combine into bare-metal profiles
        assert!(hardware_profiles(&package, ResourceKind::BareMetal, None).is_empty());
    }

    #[test]
    fn test_single_guest_item_per_role_yields_one_profile() {
        let mut package = demo_catalog(ResourceKind::VirtualGuest);
        let mut seen = HashSet::new();
        package.items.retain(|item| {
            profile_categories(ResourceKind::VirtualGuest)
                .into_iter()
                .find(|category| item.has_category(category))
                .is_some_and(|category| seen.insert(category))
        });
        assert_eq!(package.items.len(), 3);

        let profiles = hardware_profiles(&package, ResourceKind::VirtualGuest, None);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].to_string(), "1 x 2.0 GHz Core / 1 GB / 25 GB (SAN)");
    }

    #[test]
    fn test_uplink_price_follows_port_speed() {
        let package = demo_catalog(ResourceKind::VirtualGuest);
        assert_eq!(uplink_price(&package, Some(100)), Some(ItemPrice { id: 273 }));
        assert_eq!(uplink_price(&package, None), Some(ItemPrice { id: 272 }));
        assert_eq!(uplink_price(&package, Some(40_000)), None);
    }

    #[test]
    fn test_unknown_port_speed_yields_nothing() {
        let package = demo_catalog(ResourceKind::BareMetal);
        assert!(hardware_profiles(&package, ResourceKind::BareMetal, Some(40_000)).is_empty());
    }

    #[test]
    fn test_parse_hardware_id() {
        let prices = parse_hardware_id("1921, 1267,272").unwrap();
        assert_eq!(prices, vec![ItemPrice { id: 1921 }, ItemPrice { id: 1267 }, ItemPrice { id: 272 }]);

        assert!(matches!(parse_hardware_id(""), Err(Error::InvalidProfile(_))));
        assert!(matches!(parse_hardware_id("1921,,272"), Err(Error::InvalidProfile(_))));
        assert!(matches!(parse_hardware_id("small"), Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_order_prices_keep_order_and_dedupe() {
        let prices = order_prices("17438", "1921,1267,272", None, &[21, 272, 55, 21]).unwrap();
        let ids: Vec<u64> = prices.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![17438, 1921, 1267, 272, 21, 55]);
    }

    #[test]
    fn test_order_prices_place_uplink_after_hardware() {
        let prices = order_prices("17438", "1640,1644,2202", Some(ItemPrice { id: 273 }), &[21, 273]).unwrap();
        let ids: Vec<u64> = prices.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![17438, 1640, 1644, 2202, 273, 21]);
    }

    #[test]
    fn test_images_use_first_price_id() {
        let package = demo_catalog(ResourceKind::BareMetal);
        let listed = images(&package);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "17438");

        let centos = find_image(&package, "13942").unwrap();
        assert!(centos.description.starts_with("CentOS"));
        assert!(find_image(&package, "30").is_none());
    }
}
