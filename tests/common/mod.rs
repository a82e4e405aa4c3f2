// tests/common/mod.rs

//! Shared fixtures: a synthetic host root and a scripted tool runner.

use retrofit::FakeRunner;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Build a minimal CentOS Stream 9 host tree with a few operator changes:
/// an unowned config, a crontab entry, a non-package binary, and a user.
pub fn fake_host() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "etc/os-release",
        "NAME=\"CentOS Stream\"\nID=\"centos\"\nVERSION_ID=\"9\"\nPRETTY_NAME=\"CentOS Stream 9\"\n",
    );
    write(root, "etc/hostname", "web01.example.com\n");
    write(root, "etc/corp-agent.conf", "endpoint=https://inv.example.com\n");
    write(
        root,
        "etc/crontab",
        "SHELL=/bin/bash\n0 3 * * * root /usr/local/bin/backup.sh\n",
    );
    write(root, "usr/local/bin/mytool", "\u{7f}ELFnotreally");
    write(
        root,
        "etc/passwd",
        "root:x:0:0:root:/root:/bin/bash\nsvc:x:1001:1001::/home/svc:/bin/bash\n",
    );
    write(root, "etc/group", "svc:x:1001:\n");
    write(root, "etc/shadow", "svc:$6$salt$hash:19700:0:99999:7:::\n");
    write(
        root,
        "etc/app/db.conf",
        "url=postgresql://app:hunter2sekrit@db:5432/app\n",
    );
    dir
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Runner scripted for the fake host: rpm answers, everything else absent.
pub fn fake_runner() -> FakeRunner {
    FakeRunner::new()
        .on(
            &["rpm", "-qa", "--queryformat"],
            "0:bash-5.1.8-9.el9.x86_64\n0:nginx-1.24.0-4.el9.x86_64\n0:openssh-server-8.7p1-38.el9.x86_64\n",
        )
        .on(&["rpm", "-qal"], "/etc/passwd\n/etc/group\n/etc/shadow\n/etc/crontab\n/etc/hostname\n")
        .without("systemctl")
        .without("dnf")
        .without("findmnt")
        .without("lvs")
        .without("lsmod")
        .without("readelf")
        .without("file")
        .without("chroot")
        .without("ip")
}
