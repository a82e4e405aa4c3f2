// src/inspect/users.rs

//! User/group inspector: non-system accounts as raw database lines, plus
//! sudoers rules and SSH key references.
//!
//! Raw passwd/shadow/group lines are what the append-based provisioning in
//! the recipe needs — uids, hashes, and sub-id ranges survive verbatim.
//! The shadow lines themselves are path-excluded by the redaction gate, so
//! they reach the staging fragment files but never a rendered report.

use super::{safe_iterdir, safe_read, Context, Inspector};
use crate::snapshot::{GroupRecord, Snapshot, SshKeyRef, UserRecord, UserSection};

const UID_MIN: u32 = 1000;
const UID_MAX: u32 = 60000;

pub struct UserInspector;

impl Inspector for UserInspector {
    fn name(&self) -> &'static str {
        "users"
    }

    fn run(&self, ctx: &Context, snapshot: &mut Snapshot) {
        let mut section = UserSection::default();

        collect_users(ctx, &mut section);
        collect_groups(ctx, &mut section);
        collect_keyed_lines(ctx, "etc/shadow", &user_names(&section), &mut section.shadow_lines);
        collect_keyed_lines(ctx, "etc/subuid", &user_names(&section), &mut section.subuid_lines);
        collect_keyed_lines(ctx, "etc/subgid", &user_names(&section), &mut section.subgid_lines);
        let group_names: Vec<String> = section.groups.iter().map(|g| g.name.clone()).collect();
        collect_keyed_lines(ctx, "etc/gshadow", &group_names, &mut section.gshadow_lines);
        collect_sudoers(ctx, &mut section);
        collect_ssh_refs(ctx, &mut section);

        snapshot.users = Some(section);
    }
}

fn user_names(section: &UserSection) -> Vec<String> {
    section.users.iter().map(|u| u.name.clone()).collect()
}

fn collect_users(ctx: &Context, section: &mut UserSection) {
    let text = safe_read(&ctx.host_path("etc/passwd"));
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            continue;
        }
        let Ok(uid) = fields[2].parse::<u32>() else {
            continue;
        };
        if !(UID_MIN..UID_MAX).contains(&uid) {
            continue;
        }
        section.users.push(UserRecord {
            name: fields[0].to_string(),
            uid,
            gid: fields[3].parse().unwrap_or(0),
            home: fields[5].to_string(),
            shell: fields[6].to_string(),
        });
        section.passwd_lines.push(line.to_string());
    }
}

fn collect_groups(ctx: &Context, section: &mut UserSection) {
    let text = safe_read(&ctx.host_path("etc/group"));
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 3 {
            continue;
        }
        let Ok(gid) = fields[2].parse::<u32>() else {
            continue;
        };
        if !(UID_MIN..UID_MAX).contains(&gid) {
            continue;
        }
        let members = fields
            .get(3)
            .map(|m| {
                m.split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        section.groups.push(GroupRecord {
            name: fields[0].to_string(),
            gid,
            members,
        });
        section.group_lines.push(line.to_string());
    }
}

/// Keep lines of a colon-separated account file whose first field matches
/// one of the captured names.
fn collect_keyed_lines(ctx: &Context, rel: &str, names: &[String], out: &mut Vec<String>) {
    let text = safe_read(&ctx.host_path(rel));
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(key) = line.split(':').next() {
            if names.iter().any(|n| n == key) {
                out.push(line.to_string());
            }
        }
    }
}

fn collect_sudoers(ctx: &Context, section: &mut UserSection) {
    let mut push_rules = |text: String| {
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') && !line.starts_with("Defaults") {
                section.sudoers_rules.push(line.to_string());
            }
        }
    };
    let main = ctx.host_path("etc/sudoers");
    if main.is_file() {
        push_rules(safe_read(&main));
    }
    for path in safe_iterdir(&ctx.host_path("etc/sudoers.d")) {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if path.is_file() && !name.starts_with('.') {
            push_rules(safe_read(&path));
        }
    }
}

/// Record where authorized_keys files exist. The contents never enter the
/// snapshot — keys are injected at deploy time, not baked into images.
fn collect_ssh_refs(ctx: &Context, section: &mut UserSection) {
    for user in &section.users {
        if user.home.is_empty() || user.home == "/" {
            continue;
        }
        let keys = ctx.host_path(&format!(
            "{}/.ssh/authorized_keys",
            user.home.trim_start_matches('/')
        ));
        if keys.is_file() {
            section.ssh_key_refs.push(SshKeyRef {
                user: user.name.clone(),
                path: format!("{}/.ssh/authorized_keys", user.home),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;
    use crate::snapshot::{Baseline, WarningSink};
    use std::fs;

    fn run_on(host: &std::path::Path) -> UserSection {
        let runner = FakeRunner::new();
        let config = crate::inspect::InspectConfig::default();
        let baseline = Baseline::empty();
        let warnings = WarningSink::new();
        let ctx = Context {
            host_root: host,
            config: &config,
            runner: &runner,
            bridge: None,
            baseline: &baseline,
            warnings: &warnings,
        };
        let mut snapshot = Snapshot::new();
        UserInspector.run(&ctx, &mut snapshot);
        snapshot.users.unwrap()
    }

    #[test]
    fn only_non_system_accounts_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            dir.path().join("etc/passwd"),
            "root:x:0:0:root:/root:/bin/bash\n\
             chrony:x:998:996::/var/lib/chrony:/sbin/nologin\n\
             svc:x:1001:1001::/home/svc:/bin/bash\n\
             nobody:x:65534:65534::/:/sbin/nologin\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("etc/shadow"),
            "root:*:19000::::::\nsvc:$6$salt$hash:19000::::::\n",
        )
        .unwrap();
        fs::write(dir.path().join("etc/group"), "wheel:x:10:svc\nsvc:x:1001:\n").unwrap();
        fs::write(dir.path().join("etc/subuid"), "svc:100000:65536\n").unwrap();

        let section = run_on(dir.path());
        assert_eq!(section.users.len(), 1);
        assert_eq!(section.users[0].name, "svc");
        assert_eq!(section.users[0].uid, 1001);
        assert_eq!(section.passwd_lines.len(), 1);
        assert_eq!(section.shadow_lines.len(), 1);
        assert!(section.shadow_lines[0].starts_with("svc:"));
        assert_eq!(section.groups.len(), 1);
        assert_eq!(section.groups[0].name, "svc");
        assert_eq!(section.subuid_lines, vec!["svc:100000:65536"]);
    }

    #[test]
    fn ssh_key_paths_are_referenced_not_read() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::create_dir_all(dir.path().join("home/svc/.ssh")).unwrap();
        fs::write(
            dir.path().join("etc/passwd"),
            "svc:x:1001:1001::/home/svc:/bin/bash\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("home/svc/.ssh/authorized_keys"),
            "ssh-ed25519 AAAA... ops@bastion\n",
        )
        .unwrap();

        let section = run_on(dir.path());
        assert_eq!(section.ssh_key_refs.len(), 1);
        assert_eq!(section.ssh_key_refs[0].path, "/home/svc/.ssh/authorized_keys");
    }

    #[test]
    fn sudoers_rules_skip_comments_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("etc/sudoers.d")).unwrap();
        fs::write(
            dir.path().join("etc/sudoers"),
            "# base\nDefaults env_reset\nroot ALL=(ALL) ALL\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("etc/sudoers.d/ops"),
            "%ops ALL=(ALL) NOPASSWD: /usr/bin/systemctl\n",
        )
        .unwrap();

        let section = run_on(dir.path());
        assert_eq!(
            section.sudoers_rules,
            vec![
                "root ALL=(ALL) ALL",
                "%ops ALL=(ALL) NOPASSWD: /usr/bin/systemctl"
            ]
        );
    }
}
