//! OS profile of the VM request: admin account, SSH key or Windows unattend content.

use azure_client::{
    AdditionalUnattendContent, LinuxConfiguration, OsProfile, SshConfiguration, SshPublicKey, WindowsConfiguration,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use crds::OsDisk;
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use ssh_key::PublicKey;
use ssh_key::public::{KeyData, RsaPublicKey};

use crate::error::ReconcileError;

/// Admin account created on every VM
pub const DEFAULT_USER_NAME: &str = "capi";

const PASSWORD_BYTES: usize = 32;
const SSH_KEY_BITS: usize = 2048;

const UNATTEND_PASS: &str = "OobeSystem";
const UNATTEND_COMPONENT: &str = "Microsoft-Windows-Shell-Setup";

/// 32 random bytes, URL-safe base64
pub fn generate_password() -> String {
    let mut bytes = [0u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Public half of a fresh RSA key pair in OpenSSH `ssh-rsa` format; the private half is dropped
pub fn generate_ssh_public_key() -> Result<String, ReconcileError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, SSH_KEY_BITS).map_err(key_error)?;
    let public_key = RsaPublicKey::try_from(private_key.to_public_key()).map_err(key_error)?;
    PublicKey::from(KeyData::from(public_key)).to_openssh().map_err(key_error)
}

fn key_error(err: impl std::fmt::Display) -> ReconcileError {
    ReconcileError::Transient(format!("failed to generate ssh key: {err}"))
}

fn auto_logon(password: &str) -> String {
    format!(
        "<AutoLogon><Password><Value>{password}</Value></Password><Enabled>true</Enabled>\
         <LogonCount>1</LogonCount><Username>{DEFAULT_USER_NAME}</Username></AutoLogon>"
    )
}

// CustomData lands in C:\AzureData\CustomData.bin
const FIRST_LOGON_COMMANDS: &str = "<FirstLogonCommands>\
<SynchronousCommand><Description>Copy user data secret contents to init script</Description>\
<CommandLine>cmd /c \"copy C:\\AzureData\\CustomData.bin C:\\init.ps1\"</CommandLine><Order>11</Order></SynchronousCommand>\
<SynchronousCommand><Description>Launch init script</Description>\
<CommandLine>powershell.exe -NonInteractive -ExecutionPolicy Bypass -File C:\\init.ps1</CommandLine><Order>12</Order></SynchronousCommand>\
</FirstLogonCommands>";

fn windows_configuration(password: &str) -> WindowsConfiguration {
    let unattend = |setting: &str, content: String| AdditionalUnattendContent {
        pass_name: UNATTEND_PASS.to_string(),
        component_name: UNATTEND_COMPONENT.to_string(),
        setting_name: setting.to_string(),
        content,
    };
    WindowsConfiguration {
        enable_automatic_updates: Some(false),
        additional_unattend_content: vec![
            unattend("AutoLogon", auto_logon(password)),
            unattend("FirstLogonCommands", FIRST_LOGON_COMMANDS.to_string()),
        ],
    }
}

/// Build the OS profile.
///
/// `ssh_public_key` is the decoded key; an empty key on Linux gets a generated one.
pub fn os_profile(
    computer_name: &str,
    os_disk: &OsDisk,
    ssh_public_key: &str,
    custom_data: Option<&str>,
) -> Result<OsProfile, ReconcileError> {
    let password = generate_password();
    let mut profile = OsProfile {
        computer_name: Some(computer_name.to_string()),
        admin_username: Some(DEFAULT_USER_NAME.to_string()),
        admin_password: Some(password.clone()),
        custom_data: custom_data.map(str::to_string),
        ..Default::default()
    };

    if os_disk.is_windows() {
        profile.windows_configuration = Some(windows_configuration(&password));
        return Ok(profile);
    }

    let key_data = if ssh_public_key.is_empty() {
        generate_ssh_public_key()?
    } else {
        ssh_public_key.to_string()
    };
    profile.linux_configuration = Some(LinuxConfiguration {
        disable_password_authentication: Some(true),
        ssh: Some(SshConfiguration {
            public_keys: vec![SshPublicKey {
                path: format!("/home/{DEFAULT_USER_NAME}/.ssh/authorized_keys"),
                key_data,
            }],
        }),
    });
    Ok(profile)
}
