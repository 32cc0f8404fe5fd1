//! AzureMachineProviderSpec
//!
//! Desired configuration of an Azure virtual machine, carried in
//! `Machine.spec.providerSpec.value`. Field names follow the
//! `machine.openshift.io/v1beta1` wire format and are case-sensitive.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API version written into encoded provider specs and statuses
pub const PROVIDER_API_VERSION: &str = "machine.openshift.io/v1beta1";

/// Kind of the provider spec payload
pub const PROVIDER_SPEC_KIND: &str = "AzureMachineProviderSpec";

/// Storage account type of Ultra SSD managed disks
pub const ULTRA_SSD_LRS: &str = "UltraSSD_LRS";

/// Data disk deletion policy: delete the disk with the VM
pub const DISK_DELETION_POLICY_DELETE: &str = "Delete";

/// Data disk deletion policy: detach the disk and keep it
pub const DISK_DELETION_POLICY_DETACH: &str = "Detach";

/// Ephemeral OS disk placed on the host's local storage
pub const EPHEMERAL_STORAGE_LOCATION_LOCAL: &str = "Local";

/// OS type of the Windows server family
pub const OS_TYPE_WINDOWS: &str = "Windows";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineProviderSpec {
    /// Schema version of the payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    /// Kind of the payload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Secret holding the instance user data (key `userData`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret: Option<SecretReference>,

    /// Secret holding the Azure credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret: Option<SecretReference>,

    /// Region the VM is created in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    /// VM size (hardware profile), immutable once created
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vm_size: String,

    /// Image the OS disk is created from
    #[serde(default, skip_serializing_if = "is_default")]
    pub image: Image,

    /// OS disk parameters
    #[serde(default, skip_serializing_if = "is_default")]
    pub os_disk: OsDisk,

    /// Additional managed data disks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDisk>,

    /// Base64-encoded SSH public key for the admin user
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_public_key: String,

    /// Whether a public IP is allocated for the VM
    #[serde(default, rename = "publicIP", skip_serializing_if = "std::ops::Not::not")]
    pub public_ip: bool,

    /// Tags applied to the VM and its satellite resources
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Network security group attached to the NIC
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_group: String,

    /// Application security groups attached to the NIC IP configurations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub application_security_groups: Vec<String>,

    /// Subnet the NIC is placed in
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet: String,

    /// Public load balancer whose backend pools the NIC joins
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_load_balancer: String,

    /// Internal load balancer whose backend pools the NIC joins
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub internal_load_balancer: String,

    /// Index of the inbound NAT rule of the public load balancer to attach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_rule: Option<i64>,

    /// User-assigned managed identity name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub managed_identity: String,

    /// Virtual network holding the subnet
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vnet: String,

    /// Availability zone
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,

    /// Resource group of the network resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_resource_group: String,

    /// Resource group of the VM and its satellite resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,

    /// Spot VM options; presence selects the Spot priority
    #[serde(default, rename = "spotVMOptions", skip_serializing_if = "Option::is_none")]
    pub spot_vm_options: Option<SpotVmOptions>,

    /// Security profile of the VM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<SecurityProfile>,

    /// Explicit Ultra SSD capability
    #[serde(default, rename = "ultraSSDCapability", skip_serializing_if = "Option::is_none")]
    pub ultra_ssd_capability: Option<UltraSsdCapability>,

    /// Whether accelerated networking is requested for the NIC
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub accelerated_networking: bool,

    /// Explicit availability set name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_set: String,

    /// Diagnostics settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,

    /// Capacity reservation group the VM is placed in
    #[serde(default, rename = "capacityReservationGroupID", skip_serializing_if = "String::is_empty")]
    pub capacity_reservation_group_id: String,

    /// Startup script attached as a VM extension when no user-data secret is set
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub startup_script: String,

    /// Members this version does not model, such as the embedded object
    /// metadata; kept so a decode and re-encode leaves them in place
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Reference to a Secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    #[serde(default)]
    pub name: String,

    /// Secret namespace (defaults to the Machine namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Marketplace publisher
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publisher: String,

    /// Marketplace offer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub offer: String,

    /// Marketplace SKU
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sku: String,

    /// Image version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Resource ID of a custom image, relative to the subscription
    #[serde(default, rename = "resourceID", skip_serializing_if = "String::is_empty")]
    pub resource_id: String,

    /// Marketplace image type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ImageType {
    /// Marketplace image with a purchase plan
    MarketplaceWithPlan,
    /// Marketplace image without a purchase plan
    MarketplaceNoPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    /// OS family ("Linux" or "Windows")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os_type: String,

    /// Managed disk parameters
    #[serde(default, skip_serializing_if = "is_default")]
    pub managed_disk: OsDiskManagedDiskParameters,

    /// Disk size in GiB
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: i32,

    /// Ephemeral disk placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_settings: Option<DiskSettings>,

    /// Host caching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching_type: Option<CachingType>,
}

impl OsDisk {
    /// Whether the OS belongs to the Windows server family
    pub fn is_windows(&self) -> bool {
        self.os_type.eq_ignore_ascii_case(OS_TYPE_WINDOWS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OsDiskManagedDiskParameters {
    /// Storage account type ("Premium_LRS", "StandardSSD_LRS", ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_account_type: String,

    /// Customer-managed key encryption set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_set: Option<DiskEncryptionSetParameters>,

    /// Confidential VM disk security profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<VmDiskSecurityProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskEncryptionSetParameters {
    /// Resource ID of the disk encryption set
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmDiskSecurityProfile {
    /// Encryption set for the VM guest state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_set: Option<DiskEncryptionSetParameters>,

    /// What the confidential VM encrypts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_encryption_type: Option<SecurityEncryptionType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SecurityEncryptionType {
    /// Encrypt the VM guest state only
    #[serde(rename = "VMGuestStateOnly")]
    VmGuestStateOnly,
    /// Encrypt the OS disk together with the VM guest state
    #[serde(rename = "DiskWithVMGuestState")]
    DiskWithVmGuestState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskSettings {
    /// Ephemeral storage location ("Local")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ephemeral_storage_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CachingType {
    None,
    ReadOnly,
    ReadWrite,
}

impl CachingType {
    /// Wire value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::ReadOnly => "ReadOnly",
            Self::ReadWrite => "ReadWrite",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    /// Suffix appended to the machine name to form the disk name
    #[serde(default)]
    pub name_suffix: String,

    /// Disk size in GiB
    #[serde(default, rename = "diskSizeGB")]
    pub disk_size_gb: i32,

    /// Managed disk parameters
    #[serde(default, skip_serializing_if = "is_default")]
    pub managed_disk: DataDiskManagedDiskParameters,

    /// Logical unit number, unique per VM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lun: Option<i32>,

    /// Host caching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching_type: Option<CachingType>,

    /// What happens to the disk when the VM is deleted ("Delete" or "Detach")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deletion_policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataDiskManagedDiskParameters {
    /// Storage account type
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_account_type: String,

    /// Customer-managed key encryption set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_set: Option<DiskEncryptionSetParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpotVmOptions {
    /// Maximum hourly price as a decimal string; absent means on-demand price cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfile {
    /// Encrypt temp disks and caches at the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_at_host: Option<bool>,

    /// Security type specific settings
    #[serde(default, skip_serializing_if = "is_default")]
    pub settings: SecuritySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    /// Selected security type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_type: Option<SecurityType>,

    /// Settings applied when the security type is ConfidentialVM
    #[serde(default, rename = "confidentialVM", skip_serializing_if = "Option::is_none")]
    pub confidential_vm: Option<ConfidentialVm>,

    /// Settings applied when the security type is TrustedLaunch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_launch: Option<TrustedLaunch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SecurityType {
    TrustedLaunch,
    #[serde(rename = "ConfidentialVM")]
    ConfidentialVm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfidentialVm {
    /// UEFI settings
    #[serde(default, skip_serializing_if = "is_default")]
    pub uefi_settings: UefiSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrustedLaunch {
    /// UEFI settings
    #[serde(default, skip_serializing_if = "is_default")]
    pub uefi_settings: UefiSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UefiSettings {
    /// Secure boot policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_boot: Option<SecurityPolicy>,

    /// Virtualized TPM policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualized_trusted_platform_module: Option<SecurityPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SecurityPolicy {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum UltraSsdCapability {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Boot diagnostics policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot: Option<BootDiagnostics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BootDiagnostics {
    /// Where boot diagnostics are stored
    pub storage_account_type: BootDiagnosticsStorageAccountType,

    /// Customer-managed storage account, required for `CustomerManaged`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_managed: Option<CustomerManagedBootDiagnostics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BootDiagnosticsStorageAccountType {
    AzureManaged,
    CustomerManaged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerManagedBootDiagnostics {
    /// Blob endpoint of the storage account
    #[serde(default, rename = "storageAccountURI")]
    pub storage_account_uri: String,
}
