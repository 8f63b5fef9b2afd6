//! ssh client config generation.

use fleetrun_core::InstanceRecord;

/// Render an ssh client config with one `Host` block per instance.
///
/// The instance name becomes the host alias, so the dispatch engine can pass
/// plain instance names to `ssh -F <config>`.
pub fn render_ssh_config(instances: &[InstanceRecord]) -> String {
    let mut out = String::new();
    for instance in instances {
        out.push_str(&format!("Host {}\n", instance.name));
        out.push_str(&format!("    HostName {}\n", instance.address));
        if let Some(user) = &instance.user {
            out.push_str(&format!("    User {}\n", user));
        }
        if let Some(port) = instance.port {
            out.push_str(&format!("    Port {}\n", port));
        }
        if let Some(identity) = &instance.identity_file {
            out.push_str(&format!("    IdentityFile {}\n", identity));
            out.push_str("    IdentitiesOnly yes\n");
        }
        out.push('\n');
    }
    out
}
