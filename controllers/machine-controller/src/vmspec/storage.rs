//! Image reference, OS disk and data disks.

use std::collections::HashSet;
use std::sync::LazyLock;

use azure_client::{
    DataDisk, DiffDiskSettings, ImageReference, ManagedDiskParameters, OsDisk, Plan, SubResource, VmDiskSecurityProfile,
};
use crds::{
    AzureMachineProviderSpec, DISK_DELETION_POLICY_DELETE, DISK_DELETION_POLICY_DETACH, DiskEncryptionSetParameters,
    EPHEMERAL_STORAGE_LOCATION_LOCAL, Image, ImageType, SecurityEncryptionType, ULTRA_SSD_LRS,
};
use regex::Regex;

use crate::error::ReconcileError;
use crate::names;

/// Smallest data disk Azure accepts, in GiB
pub const MIN_DATA_DISK_SIZE_GB: i32 = 4;

/// Highest logical unit number of a data disk
pub const MAX_DATA_DISK_LUN: i32 = 63;

#[allow(clippy::unwrap_used, reason = "literal pattern")]
static NAME_SUFFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9](?:[\w.\-]*[a-zA-Z0-9])?$").unwrap());

/// Image reference and, for marketplace images with a plan, the purchase plan
pub fn image_reference(subscription_id: &str, image: &Image) -> (ImageReference, Option<Plan>) {
    if !image.resource_id.is_empty() {
        let reference = ImageReference {
            id: Some(format!("/subscriptions/{subscription_id}{}", image.resource_id)),
            ..Default::default()
        };
        return (reference, None);
    }

    let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
    let reference = ImageReference {
        id: None,
        publisher: non_empty(&image.publisher),
        offer: non_empty(&image.offer),
        sku: non_empty(&image.sku),
        version: non_empty(&image.version),
    };
    let plan = (image.image_type == Some(ImageType::MarketplaceWithPlan)).then(|| Plan {
        name: image.sku.clone(),
        publisher: image.publisher.clone(),
        product: image.offer.clone(),
    });
    (reference, plan)
}

fn encryption_set(params: Option<&DiskEncryptionSetParameters>) -> Option<SubResource> {
    params.filter(|p| !p.id.is_empty()).map(|p| SubResource::new(p.id.clone()))
}

fn encryption_type_str(kind: SecurityEncryptionType) -> &'static str {
    match kind {
        SecurityEncryptionType::VmGuestStateOnly => "VMGuestStateOnly",
        SecurityEncryptionType::DiskWithVmGuestState => "DiskWithVMGuestState",
    }
}

/// OS disk created from the image, named `<vm>_OSDisk`
pub fn os_disk(vm_name: &str, spec: &AzureMachineProviderSpec) -> OsDisk {
    let disk = &spec.os_disk;
    let managed = &disk.managed_disk;

    let security_profile = managed.security_profile.as_ref().and_then(|profile| {
        let disk_encryption_set = encryption_set(profile.disk_encryption_set.as_ref());
        let security_encryption_type = profile.security_encryption_type.map(|t| encryption_type_str(t).to_string());
        (disk_encryption_set.is_some() || security_encryption_type.is_some()).then_some(VmDiskSecurityProfile {
            security_encryption_type,
            disk_encryption_set,
        })
    });

    let diff_disk_settings = disk
        .disk_settings
        .as_ref()
        .filter(|s| s.ephemeral_storage_location == EPHEMERAL_STORAGE_LOCATION_LOCAL)
        .map(|_| DiffDiskSettings {
            option: Some(EPHEMERAL_STORAGE_LOCATION_LOCAL.to_string()),
        });

    OsDisk {
        name: Some(names::os_disk_name(vm_name)),
        os_type: (!disk.os_type.is_empty()).then(|| disk.os_type.clone()),
        create_option: Some("FromImage".to_string()),
        caching: disk.caching_type.map(|c| c.as_str().to_string()),
        disk_size_gb: (disk.disk_size_gb > 0).then_some(disk.disk_size_gb),
        managed_disk: Some(ManagedDiskParameters {
            storage_account_type: (!managed.storage_account_type.is_empty())
                .then(|| managed.storage_account_type.clone()),
            disk_encryption_set: encryption_set(managed.disk_encryption_set.as_ref()),
            security_profile,
        }),
        diff_disk_settings,
    }
}

/// Validate the data disk list and build the request entries.
///
/// Every violation is collected so one reconcile reports them all.
pub fn data_disks(vm_name: &str, spec: &AzureMachineProviderSpec) -> Result<Vec<DataDisk>, ReconcileError> {
    let mut errors = Vec::new();
    let mut seen_suffixes = HashSet::new();
    let mut seen_luns = HashSet::new();
    let mut disks = Vec::with_capacity(spec.data_disks.len());

    for (index, disk) in spec.data_disks.iter().enumerate() {
        let field = format!("dataDisks[{index}]");
        let suffix = &disk.name_suffix;

        let name = if suffix.is_empty() {
            errors.push(format!("{field}.nameSuffix: is required"));
            None
        } else if !NAME_SUFFIX_PATTERN.is_match(suffix) {
            errors.push(format!(
                "{field}.nameSuffix: {suffix:?} must start and end with an alphanumeric character \
                 and contain only alphanumerics, underscores, periods or hyphens"
            ));
            None
        } else {
            if !seen_suffixes.insert(suffix.as_str()) {
                errors.push(format!("{field}.nameSuffix: {suffix:?} is used by another data disk"));
            }
            match names::data_disk_name(vm_name, suffix) {
                Ok(name) => Some(name),
                Err(e) => {
                    errors.push(format!("{field}.nameSuffix: {e}"));
                    None
                }
            }
        };

        if disk.disk_size_gb < MIN_DATA_DISK_SIZE_GB {
            errors.push(format!(
                "{field}.diskSizeGB: {} must be at least {MIN_DATA_DISK_SIZE_GB}",
                disk.disk_size_gb
            ));
        }

        match disk.lun {
            None => errors.push(format!("{field}.lun: is required")),
            Some(lun) if !(0..=MAX_DATA_DISK_LUN).contains(&lun) => {
                errors.push(format!("{field}.lun: {lun} must be between 0 and {MAX_DATA_DISK_LUN}"));
            }
            Some(lun) => {
                if !seen_luns.insert(lun) {
                    errors.push(format!("{field}.lun: {lun} is used by another data disk"));
                }
            }
        }

        if disk.deletion_policy != DISK_DELETION_POLICY_DELETE && disk.deletion_policy != DISK_DELETION_POLICY_DETACH {
            errors.push(format!(
                "{field}.deletionPolicy: {:?} must be {DISK_DELETION_POLICY_DELETE} or {DISK_DELETION_POLICY_DETACH}",
                disk.deletion_policy
            ));
        }

        let storage_account_type = &disk.managed_disk.storage_account_type;
        if storage_account_type == ULTRA_SSD_LRS
            && disk.caching_type.is_some_and(|c| c != crds::CachingType::None)
        {
            errors.push(format!("{field}.cachingType: must be None for {ULTRA_SSD_LRS} disks"));
        }

        disks.push(DataDisk {
            name,
            lun: disk.lun.unwrap_or_default(),
            create_option: Some("Empty".to_string()),
            caching: disk.caching_type.map(|c| c.as_str().to_string()),
            disk_size_gb: Some(disk.disk_size_gb),
            managed_disk: Some(ManagedDiskParameters {
                storage_account_type: (!storage_account_type.is_empty()).then(|| storage_account_type.clone()),
                disk_encryption_set: encryption_set(disk.managed_disk.disk_encryption_set.as_ref()),
                security_profile: None,
            }),
            delete_option: Some(disk.deletion_policy.clone()),
        });
    }

    if errors.is_empty() {
        Ok(disks)
    } else {
        Err(ReconcileError::InvalidConfiguration(format!(
            "failed validation on data disks: {}",
            errors.join("; ")
        )))
    }
}

/// Whether any data disk is an Ultra SSD
pub fn has_ultra_ssd(spec: &AzureMachineProviderSpec) -> bool {
    spec.data_disks
        .iter()
        .any(|d| d.managed_disk.storage_account_type == ULTRA_SSD_LRS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{CachingType, DataDiskManagedDiskParameters, DiskSettings, OsDiskManagedDiskParameters};

    fn disk(suffix: &str, lun: i32) -> crds::DataDisk {
        crds::DataDisk {
            name_suffix: suffix.to_string(),
            disk_size_gb: 4,
            lun: Some(lun),
            deletion_policy: DISK_DELETION_POLICY_DELETE.to_string(),
            managed_disk: DataDiskManagedDiskParameters {
                storage_account_type: "Premium_LRS".to_string(),
                disk_encryption_set: None,
            },
            caching_type: None,
        }
    }

    fn with_disks(disks: Vec<crds::DataDisk>) -> AzureMachineProviderSpec {
        AzureMachineProviderSpec {
            data_disks: disks,
            ..Default::default()
        }
    }

    fn rejects(disks: Vec<crds::DataDisk>, needle: &str) {
        let err = data_disks("machine-test", &with_disks(disks)).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidConfiguration(_)));
        assert!(err.to_string().contains(needle), "{err} does not mention {needle}");
    }

    #[test]
    fn test_image_by_resource_id() {
        let image = Image {
            resource_id: "/resourceGroups/rg/providers/Microsoft.Compute/images/img".to_string(),
            ..Default::default()
        };
        let (reference, plan) = image_reference("sub", &image);
        assert_eq!(
            reference.id.as_deref(),
            Some("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/images/img")
        );
        assert!(plan.is_none());
    }

    #[test]
    fn test_marketplace_image_with_plan() {
        let image = Image {
            publisher: "redhat".to_string(),
            offer: "rh-ocp-worker".to_string(),
            sku: "rh-ocp-worker".to_string(),
            version: "4.15.0".to_string(),
            image_type: Some(ImageType::MarketplaceWithPlan),
            ..Default::default()
        };
        let (reference, plan) = image_reference("sub", &image);
        assert_eq!(reference.publisher.as_deref(), Some("redhat"));
        assert_eq!(reference.version.as_deref(), Some("4.15.0"));
        assert_eq!(
            plan,
            Some(Plan {
                name: "rh-ocp-worker".to_string(),
                publisher: "redhat".to_string(),
                product: "rh-ocp-worker".to_string(),
            })
        );

        let (_, plan) = image_reference(
            "sub",
            &Image {
                image_type: Some(ImageType::MarketplaceNoPlan),
                ..image
            },
        );
        assert!(plan.is_none());
    }

    #[test]
    fn test_os_disk() {
        let mut spec = AzureMachineProviderSpec::default();
        spec.os_disk = crds::OsDisk {
            os_type: "Linux".to_string(),
            disk_size_gb: 128,
            caching_type: Some(CachingType::ReadOnly),
            disk_settings: Some(DiskSettings {
                ephemeral_storage_location: "Local".to_string(),
            }),
            managed_disk: OsDiskManagedDiskParameters {
                storage_account_type: "Premium_LRS".to_string(),
                disk_encryption_set: Some(DiskEncryptionSetParameters { id: "/des".to_string() }),
                security_profile: None,
            },
        };

        let disk = os_disk("machine-test", &spec);
        assert_eq!(disk.name.as_deref(), Some("machine-test_OSDisk"));
        assert_eq!(disk.create_option.as_deref(), Some("FromImage"));
        assert_eq!(disk.caching.as_deref(), Some("ReadOnly"));
        assert_eq!(disk.disk_size_gb, Some(128));
        assert_eq!(disk.diff_disk_settings.unwrap().option.as_deref(), Some("Local"));
        let managed = disk.managed_disk.unwrap();
        assert_eq!(managed.storage_account_type.as_deref(), Some("Premium_LRS"));
        assert_eq!(managed.disk_encryption_set.unwrap().id, "/des");
        assert!(managed.security_profile.is_none());
    }

    #[test]
    fn test_valid_data_disks() {
        let mut ultra = disk("etcd", 1);
        ultra.managed_disk.storage_account_type = ULTRA_SSD_LRS.to_string();
        ultra.caching_type = Some(CachingType::None);
        let mut detached = disk("data_1.x", 0);
        detached.deletion_policy = DISK_DELETION_POLICY_DETACH.to_string();

        let spec = with_disks(vec![ultra, detached]);
        let disks = data_disks("machine-test", &spec).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].name.as_deref(), Some("machine-test_etcd"));
        assert_eq!(disks[0].lun, 1);
        assert_eq!(disks[0].caching.as_deref(), Some("None"));
        assert_eq!(disks[0].create_option.as_deref(), Some("Empty"));
        assert_eq!(disks[1].delete_option.as_deref(), Some("Detach"));
        assert!(has_ultra_ssd(&spec));
    }

    #[test]
    fn test_data_disk_violations() {
        rejects(vec![disk("a", 0), disk("b", 0)], "lun: 0 is used");
        rejects(vec![disk("a", 0), disk("a", 1)], "\"a\" is used");
        rejects(vec![disk("-bad", 0)], "must start and end");
        rejects(vec![disk("bad-", 0)], "must start and end");
        rejects(vec![disk("", 0)], "nameSuffix: is required");
        rejects(vec![disk("a", 64)], "between 0 and 63");
        rejects(vec![disk("a", -1)], "between 0 and 63");

        let mut small = disk("a", 0);
        small.disk_size_gb = 3;
        rejects(vec![small], "at least 4");

        let mut policy = disk("a", 0);
        policy.deletion_policy = "Keep".to_string();
        rejects(vec![policy], "deletionPolicy");

        let mut no_lun = disk("a", 0);
        no_lun.lun = None;
        rejects(vec![no_lun], "lun: is required");

        let mut cached_ultra = disk("a", 0);
        cached_ultra.managed_disk.storage_account_type = ULTRA_SSD_LRS.to_string();
        cached_ultra.caching_type = Some(CachingType::ReadWrite);
        rejects(vec![cached_ultra], "must be None");

        rejects(vec![disk(&"x".repeat(80), 0)], "longer than");
    }
}
