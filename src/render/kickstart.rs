// src/render/kickstart.rs

//! Kickstart fragment: the settings that belong at deploy time, not in
//! the image. Dynamic interfaces, hostname, DNS, proxy, network mounts.

use crate::error::Result;
use crate::snapshot::{ProfileMethod, Snapshot};
use std::fs;
use std::path::Path;

pub fn render(snapshot: &Snapshot, output_dir: &Path) -> Result<()> {
    let mut lines: Vec<String> = vec![
        "# Kickstart suggestion — review and adapt for your environment".into(),
        "# These settings belong at deploy time, not baked into the image.".into(),
        String::new(),
    ];

    if let Some(network) = &snapshot.network {
        let dynamic: Vec<_> = network
            .connections
            .iter()
            .filter(|c| c.method == ProfileMethod::Dynamic)
            .collect();
        let static_conns: Vec<_> = network
            .connections
            .iter()
            .filter(|c| c.method == ProfileMethod::Static)
            .collect();
        if !dynamic.is_empty() {
            lines.push("# --- Dynamic connections (deploy-time) ---".into());
            for profile in &dynamic {
                lines.push(format!("network --bootproto=dhcp --device={}", profile.name));
            }
            lines.push(String::new());
        }
        if !static_conns.is_empty() {
            lines.push("# --- Static connections (already baked into the image) ---".into());
            for profile in &static_conns {
                lines.push(format!(
                    "# network --bootproto=static --device={}  # in image",
                    profile.name
                ));
            }
            lines.push(String::new());
        }
        if !network.hosts_additions.is_empty() {
            lines.push("# --- /etc/hosts additions detected on the source host ---".into());
            for entry in &network.hosts_additions {
                lines.push(format!("# {entry}"));
            }
            lines.push(String::new());
        }
        if network.resolv.is_some() {
            lines.push("# --- DNS ---".into());
            lines.push("# network --nameserver=<DNS_IP>".into());
            lines.push(String::new());
        }
        if !network.ip_rules.is_empty() {
            lines.push("# --- Policy routing rules detected ---".into());
            for rule in network.ip_rules.iter().take(10) {
                lines.push(format!("# ip rule: {rule}"));
            }
            lines.push(String::new());
        }
        if !network.proxy.is_empty() {
            lines.push("# --- Proxy environment ---".into());
            lines.push("%post".into());
            lines.push("cat > /etc/environment.d/proxy.conf << 'PROXYEOF'".into());
            for proxy in &network.proxy {
                if proxy.line.contains('=') {
                    lines.push(proxy.line.clone());
                }
            }
            lines.push("PROXYEOF".into());
            lines.push("%end".into());
            lines.push(String::new());
        }
    }

    if let Some(host) = &snapshot.host {
        if !host.hostname.is_empty() {
            lines.push(format!("network --hostname={}", host.hostname));
            lines.push(String::new());
        }
    }

    if let Some(storage) = &snapshot.storage {
        let network_mounts: Vec<_> = storage
            .fstab
            .iter()
            .filter(|e| {
                let fs = e.fstype.to_lowercase();
                fs.contains("nfs") || fs.contains("cifs")
            })
            .collect();
        if !network_mounts.is_empty() {
            lines.push("# --- Remote filesystem mounts detected ---".into());
            for mount in &network_mounts {
                lines.push(format!("# {}: {} -> {}", mount.fstype, mount.device, mount.mount_point));
                if mount.fstype.to_lowercase().contains("cifs") {
                    lines.push(
                        "#   FIXME: provide CIFS credentials at deploy time (credentials= file)"
                            .into(),
                    );
                } else if !mount.options.contains("sec=") {
                    lines.push("#   FIXME: provide NFS credentials/authentication at deploy time".into());
                }
            }
            lines.push(String::new());
            lines.push("%post".into());
            for mount in &network_mounts {
                lines.push(format!("# mkdir -p {}", mount.mount_point));
                lines.push(format!(
                    "# echo '{} {} {} {} 0 0' >> /etc/fstab",
                    mount.device,
                    mount.mount_point,
                    mount.fstype,
                    if mount.options.is_empty() {
                        "defaults"
                    } else {
                        &mount.options
                    }
                ));
            }
            lines.push("%end".into());
            lines.push(String::new());
        }
    }

    lines.push("# --- Examples ---".into());
    lines.push("# network --bootproto=dhcp --device=eth0".into());
    lines.push("# network --hostname=myhost.example.com".into());
    lines.push(
        "# network --bootproto=static --ip=192.168.1.10 --netmask=255.255.255.0 --gateway=192.168.1.1"
            .into(),
    );
    lines.push(String::new());

    fs::write(output_dir.join("kickstart-suggestion.ks"), lines.join("\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ConnectionProfile, HostInfo, NetworkSection};

    #[test]
    fn dynamic_interfaces_get_dhcp_lines() {
        let mut snapshot = Snapshot::new();
        snapshot.host = Some(HostInfo {
            hostname: "web01".into(),
            ..Default::default()
        });
        snapshot.network = Some(NetworkSection {
            connections: vec![ConnectionProfile {
                path: "etc/NetworkManager/system-connections/eno1.nmconnection".into(),
                name: "eno1".into(),
                method: ProfileMethod::Dynamic,
                kind: "ethernet".into(),
            }],
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        render(&snapshot, dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("kickstart-suggestion.ks")).unwrap();
        assert!(text.contains("network --bootproto=dhcp --device=eno1"));
        assert!(text.contains("network --hostname=web01"));
    }
}
