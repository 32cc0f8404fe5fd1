//! VM security profile.

use azure_client::{SecurityProfile, UefiSettings};
use crds::{AzureMachineProviderSpec, SecurityEncryptionType, SecurityPolicy, SecurityType};

use crate::error::ReconcileError;

fn enabled(policy: Option<SecurityPolicy>) -> bool {
    policy == Some(SecurityPolicy::Enabled)
}

fn invalid(message: &str) -> ReconcileError {
    ReconcileError::InvalidConfiguration(format!("failed to generate security profile: {message}"))
}

/// Security profile of the VM, `None` when the spec asks for nothing.
///
/// An OS disk security encryption type requires a confidential VM with a
/// virtualized TPM; `DiskWithVMGuestState` additionally requires secure boot
/// and rules out encryption at host.
pub fn security_profile(spec: &AzureMachineProviderSpec) -> Result<Option<SecurityProfile>, ReconcileError> {
    let encryption_type = spec
        .os_disk
        .managed_disk
        .security_profile
        .as_ref()
        .and_then(|p| p.security_encryption_type);

    let Some(requested) = spec.security_profile.as_ref() else {
        if encryption_type.is_some() {
            return Err(invalid(
                "securityType should be set to ConfidentialVM when securityEncryptionType is defined",
            ));
        }
        return Ok(None);
    };

    let settings = &requested.settings;
    if requested.encryption_at_host.is_none() && settings.security_type.is_none() {
        if encryption_type.is_some() {
            return Err(invalid(
                "securityType should be set to ConfidentialVM when securityEncryptionType is defined",
            ));
        }
        return Ok(None);
    }

    let mut profile = SecurityProfile {
        encryption_at_host: requested.encryption_at_host,
        ..Default::default()
    };

    if let Some(encryption_type) = encryption_type {
        if settings.security_type != Some(SecurityType::ConfidentialVm) {
            return Err(invalid(
                "securityType should be set to ConfidentialVM when securityEncryptionType is defined",
            ));
        }
        let Some(confidential) = settings.confidential_vm.as_ref() else {
            return Err(invalid(
                "confidentialVM.uefiSettings should be set when securityEncryptionType is defined",
            ));
        };
        let uefi = &confidential.uefi_settings;
        if !enabled(uefi.virtualized_trusted_platform_module) {
            return Err(invalid(
                "virtualizedTrustedPlatformModule should be enabled when securityEncryptionType is defined",
            ));
        }
        if encryption_type == SecurityEncryptionType::DiskWithVmGuestState {
            if requested.encryption_at_host == Some(true) {
                return Err(invalid(
                    "encryptionAtHost cannot be set to true when securityEncryptionType is set to DiskWithVMGuestState",
                ));
            }
            if !enabled(uefi.secure_boot) {
                return Err(invalid(
                    "secureBoot should be enabled when securityEncryptionType is set to DiskWithVMGuestState",
                ));
            }
        }

        profile.security_type = Some("ConfidentialVM".to_string());
        profile.uefi_settings = Some(UefiSettings {
            secure_boot_enabled: Some(enabled(uefi.secure_boot)),
            v_tpm_enabled: Some(true),
        });
        return Ok(Some(profile));
    }

    match settings.security_type {
        Some(SecurityType::ConfidentialVm) => {
            return Err(invalid(
                "securityEncryptionType should be set when securityType is set to ConfidentialVM",
            ));
        }
        Some(SecurityType::TrustedLaunch) => {
            let uefi = settings
                .trusted_launch
                .as_ref()
                .map(|t| t.uefi_settings.clone())
                .unwrap_or_default();
            profile.security_type = Some("TrustedLaunch".to_string());
            profile.uefi_settings = Some(UefiSettings {
                secure_boot_enabled: Some(enabled(uefi.secure_boot)),
                v_tpm_enabled: Some(enabled(uefi.virtualized_trusted_platform_module)),
            });
        }
        None => {}
    }

    Ok(Some(profile))
}
